//! Routing and error-detection engine for networking lessons.
//!
//! A [`Topology`] holds routers, switches and hosts and answers "can A reach
//! B, and how". A [`RouterStore`] holds router records loaded from JSON and
//! is queried through a [`PathService`]. Both are walked by the same
//! breadth-first search in [`algorithms::path_discovery`]. The [`crc`]
//! module computes and checks CRC codes with a step-by-step trace.

pub mod algorithms;
pub mod config;
pub mod crc;
pub mod error;
pub mod network;
pub mod protocol;
pub mod routing;

pub use algorithms::{MAX_HOPS, PathTrace, RouteStep, StepAction};
pub use config::{RouterStore, TopologySpec};
pub use error::{ConfigError, Error, Result};
pub use network::{Address, Connection, Topology};
pub use protocol::{RoutingEntry, RoutingTable};
pub use routing::{Endpoint, PathService};
