use std::fmt;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::network::Address;

/// One routing-table row.
///
/// A direct route has no next hop and metric 0; a learned route has both a
/// next hop and a metric of at least 1. The constructors keep the two kinds
/// apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingEntry {
    destination: Address,
    mask: Address,
    interface: String,
    next_hop: Option<Address>,
    metric: u32,
}

impl RoutingEntry {
    /// Route to a network attached to one of the router's own interfaces.
    pub fn direct(destination: Address, mask: Address, interface: impl Into<String>) -> Self {
        Self {
            destination,
            mask,
            interface: interface.into(),
            next_hop: None,
            metric: 0,
        }
    }

    /// Static or learned route through `next_hop`.
    pub fn via(
        destination: Address,
        mask: Address,
        interface: impl Into<String>,
        next_hop: Address,
        metric: u32,
    ) -> Result<Self> {
        if metric == 0 {
            return Err(Error::InvalidInput(format!(
                "route to {} via {} needs a metric of at least 1",
                Address::cidr_notation(destination, mask),
                next_hop
            )));
        }
        Ok(Self {
            destination,
            mask,
            interface: interface.into(),
            next_hop: Some(next_hop),
            metric,
        })
    }

    /// Builds either kind from loosely typed editor input.
    pub fn from_parts(
        destination: Address,
        mask: Address,
        interface: impl Into<String>,
        next_hop: Option<Address>,
        metric: u32,
    ) -> Result<Self> {
        match next_hop {
            Some(hop) => Self::via(destination, mask, interface, hop, metric),
            None if metric == 0 => Ok(Self::direct(destination, mask, interface)),
            None => Err(Error::InvalidInput(format!(
                "direct route to {} must have metric 0, got {}",
                Address::cidr_notation(destination, mask),
                metric
            ))),
        }
    }

    pub fn destination(&self) -> Address {
        self.destination
    }

    pub fn mask(&self) -> Address {
        self.mask
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn next_hop(&self) -> Option<Address> {
        self.next_hop
    }

    pub fn metric(&self) -> u32 {
        self.metric
    }

    pub fn is_direct(&self) -> bool {
        self.next_hop.is_none()
    }

    pub fn prefix_len(&self) -> u8 {
        self.mask.prefix_len()
    }

    /// True iff `target` masked with this entry's mask equals its destination.
    pub fn matches(&self, target: Address) -> bool {
        target.network_address(self.mask) == self.destination
    }

    pub fn network(&self) -> String {
        Address::cidr_notation(self.destination, self.mask)
    }
}

impl fmt::Display for RoutingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.next_hop {
            Some(hop) => write!(
                f,
                "{} via {} out {} metric {}",
                self.network(),
                hop,
                self.interface,
                self.metric
            ),
            None => write!(
                f,
                "{} directly connected out {} metric {}",
                self.network(),
                self.interface,
                self.metric
            ),
        }
    }
}

/// Ordered routing table, unique on (destination, mask).
///
/// Entries are kept sorted longest prefix first with registration order
/// preserved among equal prefixes. Lookups never rely on that order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    entries: Vec<RoutingEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserts `entry`, replacing in place any entry for the same
    /// (destination, mask). Returns the replaced entry.
    pub fn upsert(&mut self, entry: RoutingEntry) -> Option<RoutingEntry> {
        if let Some(index) = self.find_index(entry.destination, entry.mask) {
            info!("Updating route {} (was {})", entry, self.entries[index]);
            let old = std::mem::replace(&mut self.entries[index], entry);
            return Some(old);
        }

        info!("Adding route {}", entry);
        self.entries.push(entry);
        // stable: equal prefixes keep registration order
        self.entries.sort_by(|a, b| b.prefix_len().cmp(&a.prefix_len()));
        None
    }

    pub fn add_direct(&mut self, destination: Address, mask: Address, interface: &str) {
        self.upsert(RoutingEntry::direct(destination, mask, interface));
    }

    pub fn remove(&mut self, destination: Address, mask: Address) -> Option<RoutingEntry> {
        let index = self.find_index(destination, mask)?;
        Some(self.entries.remove(index))
    }

    pub fn get(&self, destination: Address, mask: Address) -> Option<&RoutingEntry> {
        self.find_index(destination, mask).map(|i| &self.entries[i])
    }

    /// Longest-prefix match for `target`.
    ///
    /// An entry displaces the current best only when its prefix is strictly
    /// longer, so ties go to the entry registered first.
    pub fn best_route(&self, target: Address) -> Option<&RoutingEntry> {
        let mut best: Option<&RoutingEntry> = None;

        for entry in &self.entries {
            if !entry.matches(target) {
                continue;
            }
            match best {
                Some(current) if entry.prefix_len() <= current.prefix_len() => {}
                _ => best = Some(entry),
            }
        }

        match best {
            Some(entry) => debug!("Best route for {}: {}", target, entry),
            None => debug!("No route for {}", target),
        }
        best
    }

    pub fn entries(&self) -> &[RoutingEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &RoutingEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn find_index(&self, destination: Address, mask: Address) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.destination == destination && e.mask == mask)
    }
}

/// All matching entries that share the longest matching prefix, ordered by
/// metric and then by their position in `entries`.
pub fn longest_prefix_candidates<'a, I>(entries: I, target: Address) -> Vec<&'a RoutingEntry>
where
    I: IntoIterator<Item = &'a RoutingEntry>,
{
    let matching: Vec<&RoutingEntry> = entries.into_iter().filter(|e| e.matches(target)).collect();
    let Some(longest) = matching.iter().map(|e| e.prefix_len()).max() else {
        return Vec::new();
    };

    let mut candidates: Vec<&RoutingEntry> = matching
        .into_iter()
        .filter(|e| e.prefix_len() == longest)
        .collect();
    candidates.sort_by_key(|e| e.metric());
    candidates
}
