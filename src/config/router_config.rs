//! Persisted per-router interface and route records.
//!
//! The document layout is the one the router editor saves:
//!
//! ```json
//! {"routersData": [{"routerCoreStateData": {"routerId": "R1", "interfaces": [...]},
//!                   "routes": [...]}],
//!  "savedAt": "2024-01-01T00:00:00Z"}
//! ```

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ConfigError, Error, Result};
use crate::network::Address;
use crate::protocol::RoutingEntry;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RoutersDocument {
    pub routers_data: Vec<RouterRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouterRecord {
    pub router_core_state_data: CoreState,
    #[serde(default)]
    pub routes: Vec<RouteRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CoreState {
    pub router_id: String,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterfaceRecord {
    pub name: String,
    pub address: Address,
    pub mask: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub target_network: Address,
    pub mask: Address,
    /// `null` for a directly connected network.
    #[serde(default)]
    pub next_hop: Option<Address>,
    pub out_interface: String,
    #[serde(default)]
    pub metric: u32,
    #[serde(default)]
    pub route_id: Option<String>,
}

impl RouteRecord {
    pub fn direct(interface: &InterfaceRecord) -> Self {
        Self {
            target_network: interface.address.network_address(interface.mask),
            mask: interface.mask,
            next_hop: None,
            out_interface: interface.name.clone(),
            metric: 0,
            route_id: Some(new_route_id()),
        }
    }

    /// Routing-table form. Host bits in the target network are cleared.
    pub fn to_entry(&self) -> Result<RoutingEntry> {
        RoutingEntry::from_parts(
            self.target_network.network_address(self.mask),
            self.mask,
            self.out_interface.as_str(),
            self.next_hop,
            self.metric,
        )
    }

    fn same_prefix(&self, other: &RouteRecord) -> bool {
        self.mask == other.mask
            && self.target_network.network_address(self.mask) == other.target_network.network_address(other.mask)
    }
}

impl RouterRecord {
    pub fn router_id(&self) -> &str {
        &self.router_core_state_data.router_id
    }

    pub fn interfaces(&self) -> &[InterfaceRecord] {
        &self.router_core_state_data.interfaces
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceRecord> {
        self.interfaces().iter().find(|i| i.name == name)
    }

    /// Routes in registration order.
    pub fn routing_entries(&self) -> Vec<RoutingEntry> {
        self.routes
            .iter()
            .filter_map(|route| match route.to_entry() {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Router {} skips route {:?}: {}", self.router_id(), route.route_id, e);
                    None
                }
            })
            .collect()
    }

    /// Adds a direct route for every interface network not yet covered.
    fn generate_direct_routes(&mut self) -> usize {
        let missing: Vec<RouteRecord> = self
            .interfaces()
            .iter()
            .map(RouteRecord::direct)
            .filter(|direct| !self.routes.iter().any(|r| r.same_prefix(direct)))
            .collect();

        let added = missing.len();
        for route in missing {
            debug!(
                "Router {} gains direct route {} out {}",
                self.router_id(),
                Address::cidr_notation(route.target_network, route.mask),
                route.out_interface
            );
            self.routes.push(route);
        }
        added
    }
}

fn new_route_id() -> String {
    Uuid::new_v4().to_string()
}

fn validate_route(router: &str, route: &RouteRecord) -> Result<()> {
    route.mask.validate_mask()?;
    route.to_entry().map(|_| ()).map_err(|e| {
        Error::InvalidInput(format!("router {}: {}", router, e))
    })
}

/// Validated, editable set of router records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterStore {
    document: RoutersDocument,
}

impl RouterStore {
    /// Validates `document`, assigns missing route ids and fills in direct routes.
    pub fn from_document(mut document: RoutersDocument) -> Result<Self> {
        let mut seen: Vec<&str> = Vec::new();
        for router in &document.routers_data {
            let id = router.router_id();
            if seen.contains(&id) {
                return Err(Error::InvalidInput(format!("router '{}' is defined twice", id)));
            }
            seen.push(id);
        }

        for router in &mut document.routers_data {
            for iface in router.interfaces() {
                iface.mask.validate_mask()?;
            }
            for route in &mut router.routes {
                validate_route(&router.router_core_state_data.router_id, route)?;
                if route.route_id.is_none() {
                    route.route_id = Some(new_route_id());
                }
            }
            let added = router.generate_direct_routes();
            if added > 0 {
                info!("Router {}: generated {} direct routes", router.router_id(), added);
            }
        }

        Ok(Self { document })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let store = Self::from_json(&content)?;
        info!(
            "Loaded {} routers from {}",
            store.routers().len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    pub fn from_json(content: &str) -> std::result::Result<Self, ConfigError> {
        let document: RoutersDocument = serde_json::from_str(content)?;
        Ok(Self::from_document(document)?)
    }

    /// Overwrites `path` with the current records and stamps the save time.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> std::result::Result<(), ConfigError> {
        self.document.saved_at = Some(Utc::now());
        let content = serde_json::to_string_pretty(&self.document)?;
        fs::write(path.as_ref(), content)?;
        info!("Saved {} routers to {}", self.routers().len(), path.as_ref().display());
        Ok(())
    }

    pub fn document(&self) -> &RoutersDocument {
        &self.document
    }

    pub fn routers(&self) -> &[RouterRecord] {
        &self.document.routers_data
    }

    pub fn router(&self, router_id: &str) -> Option<&RouterRecord> {
        self.routers().iter().find(|r| r.router_id() == router_id)
    }

    /// Replaces the route with the same id, else the one with the same
    /// network and mask, else appends. Returns the replaced record.
    ///
    /// A router keeps at most one route per network and mask, so moving a
    /// route onto the prefix of another route is rejected.
    pub fn upsert_route(&mut self, router_id: &str, mut record: RouteRecord) -> Result<Option<RouteRecord>> {
        validate_route(router_id, &record)?;
        let router = self.router_mut(router_id)?;

        let by_id = record
            .route_id
            .as_ref()
            .and_then(|id| router.routes.iter().position(|r| r.route_id.as_ref() == Some(id)));
        let by_prefix = router.routes.iter().position(|r| r.same_prefix(&record));

        if let (Some(id_index), Some(prefix_index)) = (by_id, by_prefix) {
            if id_index != prefix_index {
                return Err(Error::InvalidInput(format!(
                    "router {} already has route {:?} for {}",
                    router_id,
                    router.routes[prefix_index].route_id,
                    Address::cidr_notation(record.target_network.network_address(record.mask), record.mask)
                )));
            }
        }
        let position = by_id.or(by_prefix);

        match position {
            Some(index) => {
                if record.route_id.is_none() {
                    record.route_id = router.routes[index].route_id.clone();
                }
                info!("Router {} updates route {:?}", router_id, record.route_id);
                Ok(Some(std::mem::replace(&mut router.routes[index], record)))
            }
            None => {
                if record.route_id.is_none() {
                    record.route_id = Some(new_route_id());
                }
                info!("Router {} adds route {:?}", router_id, record.route_id);
                router.routes.push(record);
                Ok(None)
            }
        }
    }

    pub fn remove_route(&mut self, router_id: &str, route_id: &str) -> Result<RouteRecord> {
        let router = self.router_mut(router_id)?;
        let index = router
            .routes
            .iter()
            .position(|r| r.route_id.as_deref() == Some(route_id))
            .ok_or_else(|| Error::NotFound(format!("route '{}' on router {}", route_id, router_id)))?;
        info!("Router {} removes route {}", router_id, route_id);
        Ok(router.routes.remove(index))
    }

    fn router_mut(&mut self, router_id: &str) -> Result<&mut RouterRecord> {
        self.document
            .routers_data
            .iter_mut()
            .find(|r| r.router_id() == router_id)
            .ok_or_else(|| Error::NotFound(format!("router '{}'", router_id)))
    }
}
