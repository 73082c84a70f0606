use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::info;

use routelab::crc::{self, Polynomial};
use routelab::network::parse_metric;
use routelab::protocol::Session;
use routelab::{Endpoint, PathService, RouterStore, Topology, TopologySpec};

#[derive(Parser)]
#[command(
    name = "routelab",
    about = "Trace packets through simulated routers and work CRC codes by hand",
    version
)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect two devices of a topology by name
    Connect {
        from: String,
        to: String,

        /// Topology description (JSON); the built-in demo when omitted
        #[arg(short, long)]
        topology: Option<PathBuf>,

        /// Extra route as ROUTER,DEST,MASK,INTERFACE,NEXT_HOP,METRIC (NEXT_HOP '-' for direct)
        #[arg(short, long)]
        route: Vec<String>,
    },

    /// Find a path between two endpoints using saved router records
    Trace {
        /// Router records (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Source as ADDRESS/MASK or ADDRESS/PREFIX
        source: String,

        /// Destination as ADDRESS/MASK or ADDRESS/PREFIX
        destination: String,
    },

    /// Print every router's routing table
    Routes {
        #[arg(short, long)]
        topology: Option<PathBuf>,
    },

    /// Compute a CRC code and show the division
    Crc {
        message: String,

        #[arg(short, long, default_value = "x3+x2+x+1")]
        polynomial: String,
    },

    /// Check a message followed by its CRC code
    Validate {
        data: String,

        #[arg(short, long, default_value = "x3+x2+x+1")]
        polynomial: String,
    },

    /// Show a TCP three-way handshake followed by a teardown
    Handshake {
        #[arg(long, default_value_t = 100)]
        client_isn: u32,

        #[arg(long, default_value_t = 300)]
        server_isn: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Connect { from, to, topology, route } => {
            let mut topo = load_topology(topology)?;
            for spec in &route {
                apply_route(&mut topo, spec)?;
            }

            let connection = topo.attempt_connection(&from, &to);
            for line in &connection.trace {
                println!("{}", line);
            }
            println!(
                "{} after {} router hop(s)",
                if connection.success { "SUCCESS" } else { "FAILED" },
                connection.hops
            );
        }
        Commands::Trace { config, source, destination } => {
            let store = RouterStore::load(&config)
                .with_context(|| format!("cannot load router records from {}", config.display()))?;
            let source: Endpoint = source.parse()?;
            let destination: Endpoint = destination.parse()?;

            let trace = PathService::new(&store).try_connect(source, destination);
            for line in trace.lines() {
                println!("{}", line);
            }
            match &trace.error {
                None => println!("SUCCESS after {} router hop(s)", trace.hops),
                Some(e) => println!("FAILED: {}", e),
            }
        }
        Commands::Routes { topology } => {
            let topo = load_topology(topology)?;
            for router in topo.routers() {
                println!("{}", router);
                if let Some(table) = router.routing_table() {
                    for entry in table.iter() {
                        println!("  {}", entry);
                    }
                }
            }
        }
        Commands::Crc { message, polynomial } => {
            crc::ensure_binary(&message)?;
            let polynomial: Polynomial = polynomial.parse()?;
            for line in crc::get_steps(&message, polynomial)? {
                println!("{}", line);
            }
            println!("transmitted: {}", crc::encode(&message, polynomial)?);
        }
        Commands::Validate { data, polynomial } => {
            crc::ensure_binary(&data)?;
            let polynomial: Polynomial = polynomial.parse()?;
            if crc::validate(&data, polynomial)? {
                println!("{} is valid for {}", data, polynomial);
            } else {
                println!("{} is corrupted (non-zero remainder for {})", data, polynomial);
            }
        }
        Commands::Handshake { client_isn, server_isn } => {
            let (mut session, opening) = Session::handshake(client_isn, server_isn);
            println!("three-way handshake:");
            for exchange in &opening {
                println!("  {}", exchange);
            }
            println!("four-way teardown:");
            for exchange in session.teardown()? {
                println!("  {}", exchange);
            }
        }
    }

    Ok(())
}

fn load_topology(path: Option<PathBuf>) -> Result<Topology> {
    let spec = match path {
        Some(path) => TopologySpec::load(&path)
            .with_context(|| format!("cannot load topology from {}", path.display()))?,
        None => TopologySpec::demo(),
    };

    let mut topology = Topology::new();
    topology.initialize(&spec)?;
    info!("{} networks ready", topology.networks().len());
    Ok(topology)
}

fn apply_route(topology: &mut Topology, spec: &str) -> Result<()> {
    let fields: Vec<&str> = spec.split(',').map(str::trim).collect();
    let [router, destination, mask, interface, next_hop, metric] = fields.as_slice() else {
        bail!("route '{}' must have 6 comma-separated fields", spec);
    };

    let next_hop = match *next_hop {
        "" | "-" => None,
        hop => Some(hop),
    };
    topology.edit_routing_table(router, destination, mask, interface, next_hop, parse_metric(metric)?)?;
    Ok(())
}
