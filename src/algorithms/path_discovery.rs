//! Multi-hop path discovery
//!
//! Both the in-memory [`Topology`](crate::network::Topology) and the
//! config-driven [`RouterStore`](crate::config::RouterStore) are walked by the
//! same breadth-first search. A [`Fabric`] tells the search which routes a
//! router offers, which router a next hop lands on, and how a directly
//! connected destination is reached.
//!
//! At each router every entry sharing the longest matching prefix is a
//! candidate. When a table holds one entry per prefix, which the in-memory
//! topology guarantees, the search degenerates into a single deterministic
//! walk.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;

use log::{debug, warn};
use serde::Serialize;

use crate::error::Error;
use crate::network::Address;
use crate::protocol::RoutingEntry;

/// Most routers a single path may pass through.
pub const MAX_HOPS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepAction {
    Begin,
    Forward,
    Deliver,
    Drop,
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StepAction::Begin => "begin",
            StepAction::Forward => "forward",
            StepAction::Deliver => "deliver",
            StepAction::Drop => "drop",
        };
        f.write_str(text)
    }
}

/// One decision taken while moving a packet towards its destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteStep {
    pub router: Option<String>,
    pub incoming: Option<String>,
    pub outgoing: Option<String>,
    pub next_hop: Option<Address>,
    pub destination: Address,
    pub action: StepAction,
    pub reason: String,
}

impl RouteStep {
    pub fn new(action: StepAction, destination: Address, reason: impl Into<String>) -> Self {
        Self {
            router: None,
            incoming: None,
            outgoing: None,
            next_hop: None,
            destination,
            action,
            reason: reason.into(),
        }
    }

    pub fn at(mut self, router: impl Into<String>) -> Self {
        self.router = Some(router.into());
        self
    }

    pub fn incoming(mut self, interface: Option<String>) -> Self {
        self.incoming = interface;
        self
    }

    pub fn outgoing(mut self, interface: impl Into<String>) -> Self {
        self.outgoing = Some(interface.into());
        self
    }

    pub fn next_hop(mut self, hop: Option<Address>) -> Self {
        self.next_hop = hop;
        self
    }
}

impl fmt::Display for RouteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(router) = &self.router {
            write!(f, "[{}] ", router)?;
        }
        write!(f, "{}: {}", self.action, self.reason)?;

        let mut details = Vec::new();
        if let Some(incoming) = &self.incoming {
            details.push(format!("in {}", incoming));
        }
        if let Some(outgoing) = &self.outgoing {
            details.push(format!("out {}", outgoing));
        }
        if let Some(hop) = self.next_hop {
            details.push(format!("next hop {}", hop));
        }
        if !details.is_empty() {
            write!(f, " ({})", details.join(", "))?;
        }
        Ok(())
    }
}

/// Outcome of a path search. The trace is never empty: it ends with the
/// delivering step on success or with the step where the packet was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathTrace {
    pub success: bool,
    pub steps: Vec<RouteStep>,
    /// Routers on the reported path.
    pub hops: usize,
    #[serde(skip)]
    pub error: Option<Error>,
}

impl PathTrace {
    pub fn delivered(steps: Vec<RouteStep>, hops: usize) -> Self {
        Self {
            success: true,
            steps,
            hops,
            error: None,
        }
    }

    pub fn failed(steps: Vec<RouteStep>, hops: usize, error: Error) -> Self {
        Self {
            success: false,
            steps,
            hops,
            error: Some(error),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.steps.iter().map(ToString::to_string).collect()
    }

    /// Routers visited along the reported path, in order.
    pub fn routers(&self) -> Vec<&str> {
        let mut routers: Vec<&str> = Vec::new();
        for step in &self.steps {
            if let Some(router) = step.router.as_deref() {
                if routers.last() != Some(&router) {
                    routers.push(router);
                }
            }
        }
        routers
    }
}

/// Router reached by following a next hop.
#[derive(Debug, Clone)]
pub struct Hop<N> {
    pub node: N,
    /// Interface of `node` that owns the next-hop address, when known.
    pub incoming: Option<String>,
}

/// Routing data a path search can walk.
pub trait Fabric {
    type Node: Copy + Eq + Hash;

    fn router_name(&self, node: Self::Node) -> String;

    /// Matching entries sharing the longest prefix for `target`, best first.
    /// Empty means the router has no route.
    fn candidates(&self, node: Self::Node, target: Address) -> Vec<RoutingEntry>;

    /// Router owning the next hop of `entry`.
    fn next_router(&self, node: Self::Node, entry: &RoutingEntry) -> Result<Hop<Self::Node>, Error>;

    /// Final delivery through a direct route. Returns any steps taken after
    /// the packet leaves the router.
    fn deliver(&self, node: Self::Node, entry: &RoutingEntry, target: Address) -> Result<Vec<RouteStep>, Error>;
}

struct Walk<N> {
    node: N,
    incoming: Option<String>,
    routers: Vec<N>,
    steps: Vec<RouteStep>,
}

/// Breadth-first search from `start` towards `target`.
///
/// Every router on a path re-runs its own longest-prefix lookup, so a table
/// edited between hops is observed. A path fails when a router has no route,
/// when a next hop cannot be resolved or is already on the path, when it
/// reaches a router another path already explored, when a direct route does
/// not hold the target, or when it would pass through more than `max_hops`
/// routers. The first delivering path wins; otherwise the
/// last failing path is reported.
pub fn discover<F: Fabric>(fabric: &F, start: F::Node, target: Address, max_hops: usize) -> PathTrace {
    let start_name = fabric.router_name(start);
    let begin = RouteStep::new(
        StepAction::Begin,
        target,
        format!("packet for {} arrives at router {}", target, start_name),
    )
    .at(start_name.clone());

    let mut queue = VecDeque::new();
    queue.push_back(Walk {
        node: start,
        incoming: None,
        routers: vec![start],
        steps: vec![begin],
    });

    let mut expanded: HashSet<F::Node> = HashSet::new();
    let mut last_failure: Option<PathTrace> = None;

    while let Some(walk) = queue.pop_front() {
        let name = fabric.router_name(walk.node);

        // routes out of a revisited router were already followed, so this
        // path can only end the way the earlier one did or come back round
        if !expanded.insert(walk.node) {
            let error = Error::RoutingLoop { router: name.clone() };
            debug!("Router {} already explored by another path", name);
            let mut steps = walk.steps;
            steps.push(
                RouteStep::new(StepAction::Drop, target, format!("{}, already reached by another path", error))
                    .at(name)
                    .incoming(walk.incoming),
            );
            last_failure = Some(PathTrace::failed(steps, walk.routers.len(), error));
            continue;
        }

        let candidates = fabric.candidates(walk.node, target);

        if candidates.is_empty() {
            let error = Error::NoRoute {
                router: name.clone(),
                destination: target,
            };
            warn!("{}", error);
            let mut steps = walk.steps;
            steps.push(
                RouteStep::new(StepAction::Drop, target, error.to_string())
                    .at(name)
                    .incoming(walk.incoming),
            );
            last_failure = Some(PathTrace::failed(steps, walk.routers.len(), error));
            continue;
        }

        for entry in candidates {
            debug!("Router {} selected {}", name, entry);
            let mut steps = walk.steps.clone();

            let Some(next_hop) = entry.next_hop() else {
                match fabric.deliver(walk.node, &entry, target) {
                    Ok(after) => {
                        steps.push(
                            RouteStep::new(
                                StepAction::Deliver,
                                target,
                                format!("{} is directly connected, route {}", target, entry),
                            )
                            .at(name.clone())
                            .incoming(walk.incoming.clone())
                            .outgoing(entry.interface()),
                        );
                        steps.extend(after);
                        return PathTrace::delivered(steps, walk.routers.len());
                    }
                    Err(error) => {
                        warn!("Router {} cannot deliver to {}: {}", name, target, error);
                        steps.push(
                            RouteStep::new(StepAction::Drop, target, error.to_string())
                                .at(name.clone())
                                .incoming(walk.incoming.clone())
                                .outgoing(entry.interface()),
                        );
                        last_failure = Some(PathTrace::failed(steps, walk.routers.len(), error));
                    }
                }
                continue;
            };

            let drop_step = |reason: String| {
                RouteStep::new(StepAction::Drop, target, reason)
                    .at(name.clone())
                    .incoming(walk.incoming.clone())
                    .outgoing(entry.interface())
                    .next_hop(Some(next_hop))
            };

            let hop = match fabric.next_router(walk.node, &entry) {
                Ok(hop) => hop,
                Err(error) => {
                    warn!("Router {} cannot resolve next hop {}: {}", name, next_hop, error);
                    steps.push(drop_step(error.to_string()));
                    last_failure = Some(PathTrace::failed(steps, walk.routers.len(), error));
                    continue;
                }
            };

            let next_name = fabric.router_name(hop.node);
            if walk.routers.contains(&hop.node) {
                let error = Error::RoutingLoop { router: next_name };
                warn!("{}", error);
                steps.push(drop_step(error.to_string()));
                last_failure = Some(PathTrace::failed(steps, walk.routers.len(), error));
                continue;
            }

            if walk.routers.len() >= max_hops {
                let error = Error::HopLimitExceeded(max_hops);
                warn!("{} at router {}", error, name);
                steps.push(drop_step(error.to_string()));
                last_failure = Some(PathTrace::failed(steps, walk.routers.len(), error));
                continue;
            }

            steps.push(
                RouteStep::new(
                    StepAction::Forward,
                    target,
                    format!("route {} forwards to router {}", entry, next_name),
                )
                .at(name.clone())
                .incoming(walk.incoming.clone())
                .outgoing(entry.interface())
                .next_hop(Some(next_hop)),
            );

            let mut routers = walk.routers.clone();
            routers.push(hop.node);
            queue.push_back(Walk {
                node: hop.node,
                incoming: hop.incoming,
                routers,
                steps,
            });
        }
    }

    // every popped walk either delivers, records a failure or queues more
    last_failure.unwrap_or_else(|| {
        let error = Error::NoRoute {
            router: start_name.clone(),
            destination: target,
        };
        let step = RouteStep::new(StepAction::Drop, target, error.to_string()).at(start_name);
        PathTrace::failed(vec![step], 1, error)
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Routers named by index; next hops resolve through `owners`.
    struct TableFabric {
        tables: Vec<Vec<RoutingEntry>>,
        owners: HashMap<Address, usize>,
        lan: HashMap<usize, Address>,
    }

    impl Fabric for TableFabric {
        type Node = usize;

        fn router_name(&self, node: usize) -> String {
            format!("R{}", node)
        }

        fn candidates(&self, node: usize, target: Address) -> Vec<RoutingEntry> {
            crate::protocol::longest_prefix_candidates(&self.tables[node], target)
                .into_iter()
                .cloned()
                .collect()
        }

        fn next_router(&self, _node: usize, entry: &RoutingEntry) -> Result<Hop<usize>, Error> {
            let hop = entry.next_hop().unwrap_or(Address::UNSPECIFIED);
            self.owners
                .get(&hop)
                .map(|&node| Hop { node, incoming: Some("wan0".into()) })
                .ok_or_else(|| Error::NotFound(format!("router at next hop {}", hop)))
        }

        fn deliver(&self, node: usize, entry: &RoutingEntry, target: Address) -> Result<Vec<RouteStep>, Error> {
            match self.lan.get(&node) {
                Some(host) if *host == target && entry.matches(target) => Ok(Vec::new()),
                _ => Err(Error::SubnetMismatch {
                    network: entry.network(),
                    destination: target,
                }),
            }
        }
    }

    fn addr(text: &str) -> Address {
        Address::parse(text).unwrap()
    }

    fn direct(net: &str) -> RoutingEntry {
        RoutingEntry::direct(addr(net), addr("255.255.255.0"), "lan0")
    }

    fn via(net: &str, mask: &str, hop: &str, metric: u32) -> RoutingEntry {
        RoutingEntry::via(addr(net), addr(mask), "wan0", addr(hop), metric).unwrap()
    }

    /// Router i owns 10.0.i.1 and serves 192.168.i.0/24.
    fn chain(len: usize) -> TableFabric {
        let mut tables = Vec::new();
        let mut owners = HashMap::new();
        let mut lan = HashMap::new();
        for i in 0..len {
            let mut table = vec![direct(&format!("192.168.{}.0", i))];
            if i + 1 < len {
                table.push(via("192.168.0.0", "255.255.0.0", &format!("10.0.{}.1", i + 1), 1));
            }
            tables.push(table);
            owners.insert(addr(&format!("10.0.{}.1", i)), i);
            lan.insert(i, addr(&format!("192.168.{}.10", i)));
        }
        TableFabric { tables, owners, lan }
    }

    #[test]
    fn test_chain_delivers() {
        let fabric = chain(3);
        let trace = discover(&fabric, 0, addr("192.168.2.10"), MAX_HOPS);

        assert!(trace.success, "{:?}", trace.lines());
        assert_eq!(trace.hops, 3);
        assert_eq!(trace.routers(), vec!["R0", "R1", "R2"]);
        assert_eq!(trace.steps.first().unwrap().action, StepAction::Begin);
        assert_eq!(trace.steps.last().unwrap().action, StepAction::Deliver);
        assert_eq!(trace.steps.last().unwrap().incoming.as_deref(), Some("wan0"));
    }

    #[test]
    fn test_no_route_stops_walk() {
        let fabric = chain(2);
        let trace = discover(&fabric, 0, addr("172.16.0.1"), MAX_HOPS);

        assert!(!trace.success);
        assert_eq!(trace.hops, 1);
        assert!(matches!(trace.error, Some(Error::NoRoute { .. })));
        assert_eq!(trace.steps.last().unwrap().action, StepAction::Drop);
    }

    #[test]
    fn test_loop_detected() {
        let mut owners = HashMap::new();
        owners.insert(addr("10.0.0.1"), 0);
        owners.insert(addr("10.0.1.1"), 1);
        let fabric = TableFabric {
            tables: vec![
                vec![via("172.16.0.0", "255.255.0.0", "10.0.1.1", 1)],
                vec![via("172.16.0.0", "255.255.0.0", "10.0.0.1", 1)],
            ],
            owners,
            lan: HashMap::new(),
        };

        let trace = discover(&fabric, 0, addr("172.16.5.5"), MAX_HOPS);
        assert!(!trace.success);
        assert_eq!(trace.error, Some(Error::RoutingLoop { router: "R0".into() }));
        assert!(trace.hops <= MAX_HOPS);
    }

    #[test]
    fn test_hop_limit() {
        let fabric = chain(MAX_HOPS + 2);
        let target = addr(&format!("192.168.{}.10", MAX_HOPS + 1));
        let trace = discover(&fabric, 0, target, MAX_HOPS);

        assert!(!trace.success);
        assert_eq!(trace.error, Some(Error::HopLimitExceeded(MAX_HOPS)));
        assert_eq!(trace.hops, MAX_HOPS);
    }

    #[test]
    fn test_unresolvable_next_hop() {
        let fabric = TableFabric {
            tables: vec![vec![via("172.16.0.0", "255.255.0.0", "10.9.9.9", 1)]],
            owners: HashMap::new(),
            lan: HashMap::new(),
        };
        let trace = discover(&fabric, 0, addr("172.16.0.1"), MAX_HOPS);
        assert!(matches!(trace.error, Some(Error::NotFound(_))));
        assert_eq!(trace.steps.last().unwrap().next_hop, Some(addr("10.9.9.9")));
    }

    #[test]
    fn test_equal_prefix_alternatives_are_explored() {
        // R0 has two /16 routes; the cheaper one dead-ends at R1, the other reaches R2.
        let mut owners = HashMap::new();
        owners.insert(addr("10.0.1.1"), 1);
        owners.insert(addr("10.0.2.1"), 2);
        let mut lan = HashMap::new();
        lan.insert(2, addr("172.16.0.10"));
        let fabric = TableFabric {
            tables: vec![
                vec![
                    via("172.16.0.0", "255.255.0.0", "10.0.1.1", 1),
                    via("172.16.0.0", "255.255.0.0", "10.0.2.1", 5),
                ],
                vec![],
                vec![RoutingEntry::direct(addr("172.16.0.0"), addr("255.255.0.0"), "lan0")],
            ],
            owners,
            lan,
        };

        let trace = discover(&fabric, 0, addr("172.16.0.10"), MAX_HOPS);
        assert!(trace.success, "{:?}", trace.lines());
        assert_eq!(trace.routers(), vec!["R0", "R2"]);
    }

    #[test]
    fn test_tied_routes_into_loop_keep_path() {
        // R0 splits towards R1 and R2, which point at each other
        let mut owners = HashMap::new();
        owners.insert(addr("10.0.1.1"), 1);
        owners.insert(addr("10.0.2.1"), 2);
        let fabric = TableFabric {
            tables: vec![
                vec![
                    via("172.16.0.0", "255.255.0.0", "10.0.1.1", 1),
                    via("172.16.0.0", "255.255.0.0", "10.0.2.1", 2),
                ],
                vec![via("172.16.0.0", "255.255.0.0", "10.0.2.1", 1)],
                vec![via("172.16.0.0", "255.255.0.0", "10.0.1.1", 1)],
            ],
            owners,
            lan: HashMap::new(),
        };

        let trace = discover(&fabric, 0, addr("172.16.0.9"), MAX_HOPS);
        assert!(!trace.success);
        assert_eq!(trace.error, Some(Error::RoutingLoop { router: "R1".into() }));
        assert_eq!(trace.hops, 3);
        assert_eq!(trace.routers(), vec!["R0", "R2", "R1"]);
        let last = trace.steps.last().unwrap();
        assert_eq!(last.action, StepAction::Drop);
        assert_eq!(last.router.as_deref(), Some("R1"));
    }

    #[test]
    fn test_failed_trace_keeps_last_path() {
        let fabric = chain(3);
        // R2 owns the direct route but the host is not there
        let trace = discover(&fabric, 0, addr("192.168.2.99"), MAX_HOPS);
        assert!(!trace.success);
        assert_eq!(trace.routers(), vec!["R0", "R1", "R2"]);
        assert!(matches!(trace.error, Some(Error::SubnetMismatch { .. })));
    }

    #[test]
    fn test_step_display() {
        let step = RouteStep::new(StepAction::Forward, addr("10.0.0.1"), "route found")
            .at("R1")
            .outgoing("eth0")
            .next_hop(Some(addr("10.0.0.254")));
        assert_eq!(step.to_string(), "[R1] forward: route found (out eth0, next hop 10.0.0.254)");
    }
}
