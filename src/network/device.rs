use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::Address;
use crate::protocol::RoutingTable;

/// Handle into the topology's device arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub(crate) usize);

/// Handle into the topology's network arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub(crate) usize);

impl DeviceId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl NetworkId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct RouterState {
    pub routing_table: RoutingTable,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SwitchState {
    pub connected: Vec<DeviceId>,
}

#[derive(Debug, Clone)]
pub enum DeviceKind {
    Router(RouterState),
    Switch(SwitchState),
    EndDevice,
}

impl DeviceKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Router(_) => "router",
            DeviceKind::Switch(_) => "switch",
            DeviceKind::EndDevice => "device",
        }
    }
}

/// A node in the topology.
///
/// Parent links are lookup handles owned by nobody; the registry resolves
/// them on demand.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub address: Address,
    pub mask: Address,
    pub kind: DeviceKind,
    pub network: Option<NetworkId>,
    pub router: Option<DeviceId>,
    pub switch: Option<DeviceId>,
}

impl Device {
    pub fn new(id: DeviceId, name: String, address: Address, mask: Address, kind: DeviceKind) -> Self {
        Self {
            id,
            name,
            address,
            mask,
            kind,
            network: None,
            router: None,
            switch: None,
        }
    }

    pub fn is_router(&self) -> bool {
        matches!(self.kind, DeviceKind::Router(_))
    }

    pub fn is_switch(&self) -> bool {
        matches!(self.kind, DeviceKind::Switch(_))
    }

    pub fn is_end_device(&self) -> bool {
        matches!(self.kind, DeviceKind::EndDevice)
    }

    pub fn router_state(&self) -> Option<&RouterState> {
        match &self.kind {
            DeviceKind::Router(state) => Some(state),
            _ => None,
        }
    }

    pub fn router_state_mut(&mut self) -> Option<&mut RouterState> {
        match &mut self.kind {
            DeviceKind::Router(state) => Some(state),
            _ => None,
        }
    }

    pub fn routing_table(&self) -> Option<&RoutingTable> {
        self.router_state().map(|state| &state.routing_table)
    }

    pub fn switch_state(&self) -> Option<&SwitchState> {
        match &self.kind {
            DeviceKind::Switch(state) => Some(state),
            _ => None,
        }
    }

    pub fn switch_state_mut(&mut self) -> Option<&mut SwitchState> {
        match &mut self.kind {
            DeviceKind::Switch(state) => Some(state),
            _ => None,
        }
    }

    /// Devices directly attached to this switch; empty for other kinds.
    pub fn connected(&self) -> &[DeviceId] {
        self.switch_state()
            .map(|state| state.connected.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// A LAN: one router, its switches, and everything attached to them.
#[derive(Debug, Clone)]
pub struct Network {
    pub id: NetworkId,
    pub name: String,
    pub address: Address,
    pub mask: Address,
    pub router: Option<DeviceId>,
    pub switches: Vec<DeviceId>,
    pub devices: Vec<DeviceId>,
}

impl Network {
    pub fn new(id: NetworkId, name: String, address: Address, mask: Address) -> Self {
        Self {
            id,
            name,
            address,
            mask,
            router: None,
            switches: Vec::new(),
            devices: Vec::new(),
        }
    }

    pub fn cidr(&self) -> String {
        Address::cidr_notation(self.address, self.mask)
    }
}
