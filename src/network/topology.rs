use log::{debug, info, warn};
use serde::Serialize;

use crate::algorithms::path_discovery::{self, Fabric, Hop, MAX_HOPS, RouteStep, StepAction};
use crate::config::TopologySpec;
use crate::error::{Error, Result};
use crate::network::device::{Device, DeviceId, DeviceKind, Network, NetworkId, RouterState, SwitchState};
use crate::network::Address;
use crate::protocol::{RoutingEntry, RoutingTable};

pub const DEFAULT_SWITCH_CAPACITY: usize = 3;

/// Parses a route metric typed by the user.
pub fn parse_metric(text: &str) -> Result<u32> {
    text.trim()
        .parse()
        .map_err(|_| Error::InvalidInput(format!("metric '{}' is not a non-negative integer", text)))
}

/// Result of [`Topology::attempt_connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub success: bool,
    pub trace: Vec<String>,
    /// Routers the packet passed through.
    pub hops: usize,
    #[serde(skip)]
    pub error: Option<Error>,
}

impl Connection {
    fn delivered(trace: Vec<String>, hops: usize) -> Self {
        Self {
            success: true,
            trace,
            hops,
            error: None,
        }
    }

    fn failed(mut trace: Vec<String>, hops: usize, error: Error) -> Self {
        trace.push(format!("connection failed: {}", error));
        Self {
            success: false,
            trace,
            hops,
            error: Some(error),
        }
    }
}

/// Registry owning every network and device of a simulated internetwork.
///
/// Devices refer to each other through [`DeviceId`] / [`NetworkId`] handles
/// that resolve against this registry.
#[derive(Debug, Clone)]
pub struct Topology {
    networks: Vec<Network>,
    devices: Vec<Device>,
    switch_capacity: usize,
}

impl Default for Topology {
    fn default() -> Self {
        Self::new()
    }
}

impl Topology {
    pub fn new() -> Self {
        Self::with_switch_capacity(DEFAULT_SWITCH_CAPACITY)
    }

    pub fn with_switch_capacity(switch_capacity: usize) -> Self {
        Self {
            networks: Vec::new(),
            devices: Vec::new(),
            switch_capacity,
        }
    }

    /// The three-LAN demo scenario with only direct routes installed.
    pub fn demo() -> Self {
        let mut topology = Self::new();
        // the built-in description is known to be well formed
        if let Err(e) = topology.initialize(&TopologySpec::demo()) {
            warn!("Demo topology failed to build: {}", e);
        }
        topology
    }

    /// Clears the registry and rebuilds it from `spec`.
    ///
    /// The rebuild is all-or-nothing: on error the previous contents are kept.
    pub fn initialize(&mut self, spec: &TopologySpec) -> Result<()> {
        let mut fresh = Self::with_switch_capacity(spec.switch_capacity);

        for net in &spec.networks {
            let network = fresh.add_network(&net.name, net.address, net.mask)?;
            fresh.add_router(
                network,
                &net.router.name,
                net.router.address,
                net.router.mask,
                &net.router.interface,
            )?;
            for sw in &net.switches {
                let switch = fresh.add_switch(network, &sw.name, sw.address, sw.mask)?;
                for host in &sw.devices {
                    fresh.add_end_device(switch, &host.name, host.address, host.mask)?;
                }
            }
        }

        for route in &spec.routes {
            let entry = RoutingEntry::from_parts(
                route.destination,
                route.mask,
                route.interface.as_str(),
                route.next_hop,
                route.metric,
            )?;
            fresh.install_route(&route.router, entry)?;
        }

        info!(
            "Topology initialised: {} networks, {} routers, {} switches, {} end devices",
            fresh.networks.len(),
            fresh.routers().count(),
            fresh.switches().count(),
            fresh.end_devices().count()
        );
        *self = fresh;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.networks.clear();
        self.devices.clear();
    }

    pub fn switch_capacity(&self) -> usize {
        self.switch_capacity
    }

    pub fn add_network(&mut self, name: &str, address: Address, mask: Address) -> Result<NetworkId> {
        mask.validate_mask()?;
        if self.network_by_name(name).is_some() {
            return Err(Error::InvalidInput(format!("network '{}' already exists", name)));
        }

        let id = NetworkId(self.networks.len());
        self.networks
            .push(Network::new(id, name.to_string(), address.network_address(mask), mask));
        debug!("Added network {} ({})", name, Address::cidr_notation(address, mask));
        Ok(id)
    }

    /// Adds the network's router and its direct route for the LAN.
    pub fn add_router(
        &mut self,
        network: NetworkId,
        name: &str,
        address: Address,
        mask: Address,
        interface: &str,
    ) -> Result<DeviceId> {
        let (net_address, net_mask) = {
            let net = self.network(network)?;
            if let Some(existing) = net.router {
                return Err(Error::InvalidInput(format!(
                    "network {} already has router {}",
                    net.name, self.devices[existing.0].name
                )));
            }
            (net.address, net.mask)
        };

        let mut routing_table = RoutingTable::new();
        routing_table.add_direct(net_address, net_mask, interface);
        let state = RouterState {
            routing_table,
            interfaces: vec![interface.to_string()],
        };

        let id = self.push_device(name, address, mask, DeviceKind::Router(state))?;
        self.devices[id.0].network = Some(network);

        let net = &mut self.networks[network.0];
        net.router = Some(id);
        net.devices.push(id);
        info!("{} added direct route {} via {}", name, net.cidr(), interface);
        Ok(id)
    }

    /// Adds a switch behind the network's router. The router must exist.
    pub fn add_switch(&mut self, network: NetworkId, name: &str, address: Address, mask: Address) -> Result<DeviceId> {
        let router = {
            let net = self.network(network)?;
            net.router
                .ok_or_else(|| Error::NotFound(format!("router of network {}", net.name)))?
        };

        let state = SwitchState { connected: Vec::new() };
        let id = self.push_device(name, address, mask, DeviceKind::Switch(state))?;
        let device = &mut self.devices[id.0];
        device.network = Some(network);
        device.router = Some(router);

        let net = &mut self.networks[network.0];
        net.switches.push(id);
        net.devices.push(id);
        Ok(id)
    }

    pub fn add_end_device(&mut self, switch: DeviceId, name: &str, address: Address, mask: Address) -> Result<DeviceId> {
        self.check_capacity(switch)?;
        let id = self.push_device(name, address, mask, DeviceKind::EndDevice)?;
        self.connect(id, switch);
        Ok(id)
    }

    /// Unplugs an end device from its switch. The device stays registered
    /// but belongs to no network until re-attached.
    pub fn detach_device(&mut self, name: &str) -> Result<()> {
        let id = self.end_device_id(name)?;
        let Some(switch) = self.devices[id.0].switch else {
            return Err(Error::InvalidInput(format!("{} is not attached to a switch", name)));
        };

        if let Some(state) = self.devices[switch.0].switch_state_mut() {
            state.connected.retain(|d| *d != id);
        }
        if let Some(network) = self.devices[id.0].network {
            self.networks[network.0].devices.retain(|d| *d != id);
        }

        info!("{} detached from switch {}", name, self.devices[switch.0].name);
        let device = &mut self.devices[id.0];
        device.switch = None;
        device.router = None;
        device.network = None;
        Ok(())
    }

    /// Plugs a detached end device into `switch_name`.
    pub fn attach_device(&mut self, name: &str, switch_name: &str) -> Result<()> {
        let id = self.end_device_id(name)?;
        if let Some(current) = self.devices[id.0].switch {
            return Err(Error::InvalidInput(format!(
                "{} is already attached to switch {}",
                name, self.devices[current.0].name
            )));
        }

        let switch = match self.device_by_name(switch_name) {
            Some(device) if device.is_switch() => device.id,
            _ => return Err(Error::NotFound(format!("switch '{}'", switch_name))),
        };
        self.check_capacity(switch)?;
        self.connect(id, switch);
        Ok(())
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn routers(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_router())
    }

    pub fn switches(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_switch())
    }

    pub fn end_devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.is_end_device())
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0)
    }

    pub fn network(&self, id: NetworkId) -> Result<&Network> {
        self.networks
            .get(id.0)
            .ok_or_else(|| Error::NotFound(format!("network #{}", id.0)))
    }

    pub fn device_by_name(&self, name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.name == name)
    }

    pub fn device_by_address(&self, address: Address) -> Option<&Device> {
        self.devices.iter().find(|d| d.address == address)
    }

    pub fn network_by_name(&self, name: &str) -> Option<&Network> {
        self.networks.iter().find(|n| n.name == name)
    }

    pub fn routing_table(&self, router: &str) -> Option<&RoutingTable> {
        self.device_by_name(router).and_then(Device::routing_table)
    }

    /// Upserts one routing entry on `router` from editor input.
    ///
    /// An empty or missing next hop makes a direct route (metric 0); a next
    /// hop requires a metric of at least 1. Returns the replaced entry.
    pub fn edit_routing_table(
        &mut self,
        router: &str,
        destination: &str,
        mask: &str,
        interface: &str,
        next_hop: Option<&str>,
        metric: u32,
    ) -> Result<Option<RoutingEntry>> {
        let destination = Address::parse(destination)?;
        let mask = Address::parse_mask(mask)?;
        let next_hop = match next_hop.map(str::trim) {
            Some(text) if !text.is_empty() => Some(Address::parse(text)?),
            _ => None,
        };

        if destination.network_address(mask) != destination {
            return Err(Error::InvalidInput(format!(
                "destination {} has host bits set for mask {}",
                destination, mask
            )));
        }

        let entry = RoutingEntry::from_parts(destination, mask, interface, next_hop, metric)?;
        self.install_route(router, entry)
    }

    /// Removes a learned route. Direct routes stay for as long as the LAN is attached.
    pub fn remove_route(&mut self, router: &str, destination: &str, mask: &str) -> Result<RoutingEntry> {
        let destination = Address::parse(destination)?;
        let mask = Address::parse(mask)?;
        let table = self.routing_table_mut(router)?;

        match table.get(destination, mask) {
            None => Err(Error::NotFound(format!(
                "route {} on {}",
                Address::cidr_notation(destination, mask),
                router
            ))),
            Some(entry) if entry.is_direct() => Err(Error::InvalidInput(format!(
                "{} is a direct route and cannot be removed",
                entry.network()
            ))),
            Some(_) => table
                .remove(destination, mask)
                .ok_or_else(|| Error::NotFound(format!("route on {}", router))),
        }
    }

    /// Tries to move a packet from `source` to `destination`, both device names.
    ///
    /// Checks, in order: both devices share a switch; both devices share a
    /// network; otherwise the routers are walked hop by hop. Routing tables
    /// are only read.
    pub fn attempt_connection(&self, source: &str, destination: &str) -> Connection {
        let Some(src) = self.device_by_name(source) else {
            return Connection::failed(Vec::new(), 0, Error::NotFound(format!("source device '{}'", source)));
        };
        let Some(dst) = self.device_by_name(destination) else {
            return Connection::failed(
                Vec::new(),
                0,
                Error::NotFound(format!("destination device '{}'", destination)),
            );
        };

        info!("Attempting connection from {} to {}", src, dst);
        let mut trace = Vec::new();

        if let Some(switch) = src.switch.filter(|s| Some(*s) == dst.switch) {
            return match self.forward_on_switch(switch, src.address, dst.address) {
                Some(line) => {
                    trace.push(format!("{}; delivered on the local segment", line));
                    Connection::delivered(trace, 0)
                }
                None => Connection::failed(
                    trace,
                    0,
                    Error::NotFound(format!("{} on switch {}", dst, self.devices[switch.0].name)),
                ),
            };
        }

        let gateway = if src.is_router() { Some(src.id) } else { src.router };
        let Some(gateway) = gateway else {
            return Connection::failed(trace, 0, Error::NotFound(format!("router connected to {}", src.name)));
        };
        let gateway_device = &self.devices[gateway.0];

        if src.network.is_some() && src.network == dst.network {
            trace.push(format!(
                "{} sends the packet to its gateway {}",
                src.name, gateway_device
            ));

            let target_switch = src
                .network
                .and_then(|n| self.networks.get(n.0))
                .and_then(|net| {
                    net.switches
                        .iter()
                        .copied()
                        .find(|s| self.devices[s.0].connected().contains(&dst.id))
                });

            let Some(switch) = target_switch else {
                return Connection::failed(
                    trace,
                    1,
                    Error::NotFound(format!("switch on {} serving {}", gateway_device.name, dst.name)),
                );
            };

            trace.push(format!(
                "router {} finds {} on the local network and forwards to switch {}",
                gateway_device.name, dst.name, self.devices[switch.0].name
            ));
            return match self.forward_on_switch(switch, src.address, dst.address) {
                Some(line) => {
                    trace.push(format!("{}; delivered within the network", line));
                    Connection::delivered(trace, 1)
                }
                None => Connection::failed(
                    trace,
                    1,
                    Error::NotFound(format!("{} on switch {}", dst, self.devices[switch.0].name)),
                ),
            };
        }

        trace.push(format!(
            "{} sends the packet to its gateway {} for cross-network routing",
            src.name, gateway_device
        ));

        let fabric = TopologyFabric {
            topology: self,
            destination: dst.id,
        };
        let path = path_discovery::discover(&fabric, gateway, dst.address, MAX_HOPS);
        trace.extend(path.lines());

        match path.error {
            None => Connection::delivered(trace, path.hops),
            Some(error) => Connection::failed(trace, path.hops, error),
        }
    }

    /// Checks that `destination` is attached to `switch` and describes the forward.
    fn forward_on_switch(&self, switch: DeviceId, source: Address, destination: Address) -> Option<String> {
        let sw = self.devices.get(switch.0)?;
        sw.connected()
            .iter()
            .map(|id| &self.devices[id.0])
            .find(|device| device.address == destination)
            .map(|device| {
                format!(
                    "switch {} forwards the packet from {} directly to {}",
                    sw.name, source, device
                )
            })
    }

    fn install_route(&mut self, router: &str, entry: RoutingEntry) -> Result<Option<RoutingEntry>> {
        let table = self.routing_table_mut(router)?;
        Ok(table.upsert(entry))
    }

    fn routing_table_mut(&mut self, router: &str) -> Result<&mut RoutingTable> {
        self.devices
            .iter_mut()
            .find(|d| d.name == router)
            .and_then(|d| d.router_state_mut())
            .map(|state| &mut state.routing_table)
            .ok_or_else(|| Error::NotFound(format!("router '{}'", router)))
    }

    fn push_device(&mut self, name: &str, address: Address, mask: Address, kind: DeviceKind) -> Result<DeviceId> {
        mask.validate_mask()?;
        if self.device_by_name(name).is_some() {
            return Err(Error::InvalidInput(format!("device '{}' already exists", name)));
        }
        let id = DeviceId(self.devices.len());
        self.devices
            .push(Device::new(id, name.to_string(), address, mask, kind));
        Ok(id)
    }

    fn end_device_id(&self, name: &str) -> Result<DeviceId> {
        match self.device_by_name(name) {
            Some(device) if device.is_end_device() => Ok(device.id),
            Some(device) => Err(Error::InvalidInput(format!(
                "{} is a {}, only end devices can be re-cabled",
                name,
                device.kind.label()
            ))),
            None => Err(Error::NotFound(format!("device '{}'", name))),
        }
    }

    fn check_capacity(&self, switch: DeviceId) -> Result<()> {
        let sw = self
            .device(switch)
            .filter(|d| d.is_switch())
            .ok_or_else(|| Error::NotFound(format!("switch #{}", switch.0)))?;
        if sw.connected().len() >= self.switch_capacity {
            warn!(
                "Switch {} already has maximum connected devices ({})",
                sw.name, self.switch_capacity
            );
            return Err(Error::CapacityExceeded {
                switch: sw.name.clone(),
                capacity: self.switch_capacity,
            });
        }
        Ok(())
    }

    /// Wires `device` to `switch`, inheriting the switch's router and network.
    fn connect(&mut self, device: DeviceId, switch: DeviceId) {
        let (router, network) = {
            let sw = &self.devices[switch.0];
            info!("{} connected to switch {}", self.devices[device.0].name, sw.name);
            (sw.router, sw.network)
        };

        if let Some(state) = self.devices[switch.0].switch_state_mut() {
            state.connected.push(device);
        }
        if let Some(network) = network {
            self.networks[network.0].devices.push(device);
        }

        let dev = &mut self.devices[device.0];
        dev.switch = Some(switch);
        dev.router = router;
        dev.network = network;
    }
}

/// Walks the in-memory routers towards one destination device.
struct TopologyFabric<'a> {
    topology: &'a Topology,
    destination: DeviceId,
}

impl Fabric for TopologyFabric<'_> {
    type Node = DeviceId;

    fn router_name(&self, node: DeviceId) -> String {
        self.topology.devices[node.0].name.clone()
    }

    fn candidates(&self, node: DeviceId, target: Address) -> Vec<RoutingEntry> {
        self.topology.devices[node.0]
            .routing_table()
            .and_then(|table| table.best_route(target))
            .cloned()
            .into_iter()
            .collect()
    }

    fn next_router(&self, _node: DeviceId, entry: &RoutingEntry) -> Result<Hop<DeviceId>> {
        let hop = entry.next_hop().unwrap_or(Address::UNSPECIFIED);
        let device = self
            .topology
            .device_by_address(hop)
            .ok_or_else(|| Error::NotFound(format!("device at next hop {}", hop)))?;

        match device.router_state() {
            Some(state) => Ok(Hop {
                node: device.id,
                incoming: state.interfaces.first().cloned(),
            }),
            None => Err(Error::NotARouter {
                address: hop,
                device: format!("{} {}", device.kind.label(), device.name),
            }),
        }
    }

    fn deliver(&self, node: DeviceId, entry: &RoutingEntry, target: Address) -> Result<Vec<RouteStep>> {
        if !entry.matches(target) {
            return Err(Error::SubnetMismatch {
                network: entry.network(),
                destination: target,
            });
        }

        let router = &self.topology.devices[node.0];
        let dst = &self.topology.devices[self.destination.0];
        let switch = self
            .topology
            .switches()
            .find(|s| s.router == Some(node) && s.connected().contains(&self.destination))
            .ok_or_else(|| Error::NotFound(format!("switch on {} serving {}", router.name, dst.name)))?;

        let line = self
            .topology
            .forward_on_switch(switch.id, target, dst.address)
            .ok_or_else(|| Error::NotFound(format!("{} on switch {}", dst, switch.name)))?;

        Ok(vec![RouteStep::new(
            StepAction::Deliver,
            target,
            format!("router {} hands the packet to switch {}; {}", router.name, switch.name, line),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(text: &str) -> Address {
        Address::parse(text).unwrap()
    }

    #[test]
    fn test_demo_layout() {
        let topology = Topology::demo();
        assert_eq!(topology.networks().len(), 3);
        assert_eq!(topology.routers().count(), 3);
        assert_eq!(topology.switches().count(), 3);
        assert_eq!(topology.end_devices().count(), 4);

        let pc_a = topology.device_by_name("PC-A").unwrap();
        let sw1 = topology.device_by_name("SW1").unwrap();
        let r1 = topology.device_by_name("R1").unwrap();
        assert_eq!(pc_a.switch, Some(sw1.id));
        assert_eq!(pc_a.router, Some(r1.id));
        assert_eq!(sw1.router, Some(r1.id));
        assert_eq!(pc_a.network, sw1.network);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut topology = Topology::demo();
        topology
            .edit_routing_table("R1", "192.168.2.0", "255.255.255.0", "LocalInterface", Some("192.168.2.1"), 1)
            .unwrap();
        topology.initialize(&TopologySpec::demo()).unwrap();

        assert_eq!(topology.devices().len(), Topology::demo().devices().len());
        assert_eq!(topology.routing_table("R1").unwrap().len(), 1);
    }

    #[test]
    fn test_initialize_failure_keeps_previous_state() {
        let mut topology = Topology::demo();
        let mut spec = TopologySpec::demo();
        spec.networks[1].router.name = "R1".into();

        assert!(topology.initialize(&spec).is_err());
        assert_eq!(topology.routers().count(), 3);
    }

    #[test]
    fn test_router_has_direct_route() {
        let topology = Topology::demo();
        let table = topology.routing_table("R2").unwrap();
        let entry = table.best_route(addr("192.168.2.10")).unwrap();
        assert!(entry.is_direct());
        assert_eq!(entry.interface(), "LocalInterface");
    }

    #[test]
    fn test_switch_capacity() {
        let mut topology = Topology::with_switch_capacity(1);
        let net = topology
            .add_network("Lab", addr("10.0.0.0"), addr("255.255.255.0"))
            .unwrap();
        topology
            .add_router(net, "GW", addr("10.0.0.1"), addr("255.255.255.0"), "lan0")
            .unwrap();
        let sw = topology
            .add_switch(net, "S", addr("10.0.0.254"), addr("255.255.255.0"))
            .unwrap();
        topology
            .add_end_device(sw, "H1", addr("10.0.0.10"), addr("255.255.255.0"))
            .unwrap();

        let err = topology
            .add_end_device(sw, "H2", addr("10.0.0.11"), addr("255.255.255.0"))
            .unwrap_err();
        assert_eq!(err, Error::CapacityExceeded { switch: "S".into(), capacity: 1 });
        assert!(topology.device_by_name("H2").is_none());
    }

    #[test]
    fn test_switch_needs_router() {
        let mut topology = Topology::new();
        let net = topology
            .add_network("Lab", addr("10.0.0.0"), addr("255.255.255.0"))
            .unwrap();
        let err = topology
            .add_switch(net, "S", addr("10.0.0.254"), addr("255.255.255.0"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut topology = Topology::demo();
        let sw = topology.device_by_name("SW3").unwrap().id;
        let err = topology
            .add_end_device(sw, "PC-A", addr("192.168.3.20"), addr("255.255.255.0"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_same_switch_single_step() {
        let topology = Topology::demo();
        let conn = topology.attempt_connection("PC-A", "PC-B");

        assert!(conn.success);
        assert_eq!(conn.trace.len(), 1);
        assert_eq!(conn.hops, 0);
        assert!(conn.trace[0].contains("SW1"));
    }

    #[test]
    fn test_unknown_device() {
        let topology = Topology::demo();
        let conn = topology.attempt_connection("PC-A", "PC-Z");

        assert!(!conn.success);
        assert_eq!(conn.hops, 0);
        assert_eq!(conn.trace.len(), 1);
        assert!(matches!(conn.error, Some(Error::NotFound(_))));
        assert!(conn.trace[0].contains("PC-Z"));
    }

    #[test]
    fn test_cross_network_without_routes_fails() {
        let topology = Topology::demo();
        let conn = topology.attempt_connection("PC-A", "PC-C");

        assert!(!conn.success);
        assert_eq!(conn.hops, 1);
        assert!(matches!(conn.error, Some(Error::NoRoute { .. })));
        assert!(conn.trace.last().unwrap().contains("no route"));
    }

    #[test]
    fn test_cross_network_after_edit() {
        let mut topology = Topology::demo();
        topology
            .edit_routing_table("R1", "192.168.2.0", "255.255.255.0", "LocalInterface", Some("192.168.2.1"), 1)
            .unwrap();

        let conn = topology.attempt_connection("PC-A", "PC-C");
        assert!(conn.success, "{:#?}", conn.trace);
        assert_eq!(conn.hops, 2);
        assert!(conn.trace.last().unwrap().contains("SW2"));
    }

    #[test]
    fn test_next_hop_must_be_router() {
        let mut topology = Topology::demo();
        topology
            .edit_routing_table("R1", "192.168.2.0", "255.255.255.0", "LocalInterface", Some("192.168.1.11"), 1)
            .unwrap();

        let conn = topology.attempt_connection("PC-A", "PC-C");
        assert!(!conn.success);
        assert!(matches!(conn.error, Some(Error::NotARouter { .. })));
    }

    #[test]
    fn test_routing_loop_is_reported() {
        let mut topology = Topology::demo();
        let sw3 = topology.device_by_name("SW3").unwrap().id;
        topology
            .add_end_device(sw3, "Server", addr("10.0.0.5"), addr("255.0.0.0"))
            .unwrap();
        topology
            .edit_routing_table("R1", "10.0.0.0", "255.0.0.0", "LocalInterface", Some("192.168.2.1"), 1)
            .unwrap();
        topology
            .edit_routing_table("R2", "10.0.0.0", "255.0.0.0", "LocalInterface", Some("192.168.1.1"), 1)
            .unwrap();

        let conn = topology.attempt_connection("PC-A", "Server");
        assert!(!conn.success);
        assert_eq!(conn.error, Some(Error::RoutingLoop { router: "R1".into() }));
        assert!(conn.hops <= MAX_HOPS);
        assert!(conn.trace.last().unwrap().contains("routing loop"));
    }

    #[test]
    fn test_parse_metric() {
        assert_eq!(parse_metric(" 4 ").unwrap(), 4);
        assert!(matches!(parse_metric("-1"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_metric("two"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_edit_routing_table_validation() {
        let mut topology = Topology::demo();
        assert!(matches!(
            topology.edit_routing_table("R9", "10.0.0.0", "255.0.0.0", "x", Some("1.1.1.1"), 1),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            topology.edit_routing_table("PC-A", "10.0.0.0", "255.0.0.0", "x", Some("1.1.1.1"), 1),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            topology.edit_routing_table("R1", "10.0.0", "255.0.0.0", "x", Some("1.1.1.1"), 1),
            Err(Error::InvalidAddress(_))
        ));
        assert!(matches!(
            topology.edit_routing_table("R1", "10.0.0.5", "255.0.0.0", "x", Some("1.1.1.1"), 1),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            topology.edit_routing_table("R1", "10.0.0.0", "255.0.0.0", "x", Some(""), 2),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_remove_route() {
        let mut topology = Topology::demo();
        topology
            .edit_routing_table("R1", "192.168.2.0", "255.255.255.0", "LocalInterface", Some("192.168.2.1"), 1)
            .unwrap();

        let removed = topology
            .remove_route("R1", "192.168.2.0", "255.255.255.0")
            .unwrap();
        assert_eq!(removed.next_hop(), Some(addr("192.168.2.1")));
        assert!(matches!(
            topology.remove_route("R1", "192.168.1.0", "255.255.255.0"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            topology.remove_route("R1", "192.168.2.0", "255.255.255.0"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_detach_and_attach() {
        let mut topology = Topology::demo();
        topology.detach_device("PC-B").unwrap();

        let pc_b = topology.device_by_name("PC-B").unwrap();
        assert!(pc_b.switch.is_none());
        assert!(!topology.device_by_name("SW1").unwrap().connected().contains(&pc_b.id));

        let conn = topology.attempt_connection("PC-A", "PC-B");
        assert!(!conn.success);

        topology.attach_device("PC-B", "SW3").unwrap();
        let pc_b = topology.device_by_name("PC-B").unwrap();
        assert_eq!(pc_b.switch, Some(topology.device_by_name("SW3").unwrap().id));
        assert_eq!(pc_b.router, Some(topology.device_by_name("R3").unwrap().id));

        assert!(matches!(
            topology.attach_device("PC-B", "SW1"),
            Err(Error::InvalidInput(_))
        ));
    }
}
