//! Declarative topology description and the built-in demo scenario.

pub mod router_config;

pub use router_config::{
    CoreState, InterfaceRecord, RouteRecord, RouterRecord, RouterStore, RoutersDocument,
};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::network::{Address, DEFAULT_SWITCH_CAPACITY};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TopologySpec {
    pub networks: Vec<NetworkSpec>,
    /// Static routes installed after every network is built.
    #[serde(default)]
    pub routes: Vec<StaticRouteSpec>,
    #[serde(default = "default_switch_capacity")]
    pub switch_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSpec {
    pub name: String,
    pub address: Address,
    pub mask: Address,
    pub router: RouterSpec,
    #[serde(default)]
    pub switches: Vec<SwitchSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouterSpec {
    pub name: String,
    pub address: Address,
    pub mask: Address,
    #[serde(default = "default_interface")]
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchSpec {
    pub name: String,
    pub address: Address,
    pub mask: Address,
    #[serde(default)]
    pub devices: Vec<HostSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostSpec {
    pub name: String,
    pub address: Address,
    pub mask: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StaticRouteSpec {
    pub router: String,
    pub destination: Address,
    pub mask: Address,
    #[serde(default = "default_interface")]
    pub interface: String,
    /// `None` for a directly connected network.
    #[serde(default)]
    pub next_hop: Option<Address>,
    #[serde(default)]
    pub metric: u32,
}

fn default_switch_capacity() -> usize {
    DEFAULT_SWITCH_CAPACITY
}

fn default_interface() -> String {
    "LocalInterface".to_string()
}

impl TopologySpec {
    /// Three /24 LANs, one router and one switch each, no routes between them.
    pub fn demo() -> Self {
        let mask = Address::new(255, 255, 255, 0);
        let host = |name: &str, net: u8, last: u8| HostSpec {
            name: name.to_string(),
            address: Address::new(192, 168, net, last),
            mask,
        };
        let lan = |net: u8, hosts: Vec<HostSpec>| NetworkSpec {
            name: format!("Network{}", net),
            address: Address::new(192, 168, net, 0),
            mask,
            router: RouterSpec {
                name: format!("R{}", net),
                address: Address::new(192, 168, net, 1),
                mask,
                interface: default_interface(),
            },
            switches: vec![SwitchSpec {
                name: format!("SW{}", net),
                address: Address::new(192, 168, net, 254),
                mask,
                devices: hosts,
            }],
        };

        Self {
            networks: vec![
                lan(1, vec![host("PC-A", 1, 10), host("PC-B", 1, 11)]),
                lan(2, vec![host("PC-C", 2, 10)]),
                lan(3, vec![host("PC-D", 3, 10)]),
            ],
            routes: Vec::new(),
            switch_capacity: DEFAULT_SWITCH_CAPACITY,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let spec: TopologySpec = serde_json::from_str(content)?;
        for net in &spec.networks {
            net.mask.validate_mask()?;
        }
        Ok(spec)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
