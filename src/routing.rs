//! Path discovery over router records loaded from configuration.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::algorithms::path_discovery::{self, Fabric, Hop, MAX_HOPS, PathTrace, RouteStep, StepAction};
use crate::config::{RouterRecord, RouterStore};
use crate::error::{Error, Result};
use crate::network::{Address, mask_from_cidr};
use crate::protocol::{RoutingEntry, longest_prefix_candidates};

/// A host address together with its subnet mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: Address,
    pub mask: Address,
}

impl Endpoint {
    pub fn new(address: Address, mask: Address) -> Self {
        Self { address, mask }
    }
}

impl FromStr for Endpoint {
    type Err = Error;

    /// Accepts `10.0.0.5/24` or `10.0.0.5/255.255.255.0`.
    fn from_str(s: &str) -> Result<Self> {
        let (address, mask) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidAddress(format!("{} (expected address/mask)", s)))?;

        let mask = match mask.parse::<u8>() {
            Ok(prefix) => mask_from_cidr(prefix)?,
            Err(_) => Address::parse_mask(mask)?,
        };
        Ok(Self::new(Address::parse(address)?, mask))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.mask.prefix_len())
    }
}

/// Connects endpoints across the routers of a [`RouterStore`].
pub struct PathService<'a> {
    store: &'a RouterStore,
    max_hops: usize,
}

impl<'a> PathService<'a> {
    pub fn new(store: &'a RouterStore) -> Self {
        Self {
            store,
            max_hops: MAX_HOPS,
        }
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Router with an interface on the same subnet as `endpoint`.
    pub fn gateway_for(&self, endpoint: Endpoint) -> Option<&'a RouterRecord> {
        self.gateway_index(endpoint).map(|index| &self.store.routers()[index])
    }

    fn gateway_index(&self, endpoint: Endpoint) -> Option<usize> {
        self.store.routers().iter().position(|router| {
            router
                .interfaces()
                .iter()
                .any(|iface| Address::same_subnet(endpoint.address, endpoint.mask, iface.address, iface.mask))
        })
    }

    /// Finds a path from `source` to `destination`.
    ///
    /// Endpoints on one subnet are delivered without a router. Otherwise
    /// the walk starts at the source's gateway. A failed trace still holds
    /// the last path that was tried.
    pub fn try_connect(&self, source: Endpoint, destination: Endpoint) -> PathTrace {
        info!("Trying to connect {} to {}", source, destination);

        if Address::same_subnet(source.address, source.mask, destination.address, destination.mask) {
            let step = RouteStep::new(
                StepAction::Deliver,
                destination.address,
                format!("{} and {} share a subnet, delivered directly", source.address, destination.address),
            );
            return PathTrace::delivered(vec![step], 0);
        }

        let Some(start) = self.gateway_index(source) else {
            let error = Error::NotFound(format!("router connected to {}", source));
            warn!("{}", error);
            let step = RouteStep::new(StepAction::Drop, destination.address, error.to_string());
            return PathTrace::failed(vec![step], 0, error);
        };

        let fabric = StoreFabric {
            routers: self.store.routers(),
            tables: self
                .store
                .routers()
                .iter()
                .map(RouterRecord::routing_entries)
                .collect(),
            destination,
        };

        path_discovery::discover(&fabric, start, destination.address, self.max_hops)
    }
}

struct StoreFabric<'a> {
    routers: &'a [RouterRecord],
    tables: Vec<Vec<RoutingEntry>>,
    destination: Endpoint,
}

impl Fabric for StoreFabric<'_> {
    type Node = usize;

    fn router_name(&self, node: usize) -> String {
        self.routers[node].router_id().to_string()
    }

    fn candidates(&self, node: usize, target: Address) -> Vec<RoutingEntry> {
        longest_prefix_candidates(&self.tables[node], target)
            .into_iter()
            .cloned()
            .collect()
    }

    fn next_router(&self, _node: usize, entry: &RoutingEntry) -> Result<Hop<usize>> {
        let hop = entry.next_hop().unwrap_or(Address::UNSPECIFIED);
        self.routers
            .iter()
            .enumerate()
            .find_map(|(index, router)| {
                router
                    .interfaces()
                    .iter()
                    .find(|iface| iface.address == hop)
                    .map(|iface| Hop {
                        node: index,
                        incoming: Some(iface.name.clone()),
                    })
            })
            .ok_or_else(|| Error::NotFound(format!("router owning next hop {}", hop)))
    }

    fn deliver(&self, node: usize, entry: &RoutingEntry, target: Address) -> Result<Vec<RouteStep>> {
        let router = &self.routers[node];
        let iface = router.interface(entry.interface()).ok_or_else(|| {
            Error::NotFound(format!("interface {} on router {}", entry.interface(), router.router_id()))
        })?;

        if Address::same_subnet(target, self.destination.mask, iface.address, iface.mask) {
            Ok(Vec::new())
        } else {
            Err(Error::SubnetMismatch {
                network: Address::cidr_notation(iface.address.network_address(iface.mask), iface.mask),
                destination: target,
            })
        }
    }
}
