//! Error types for routelab
//!
//! Routing failures are ordinary outcomes a learner can trigger by editing a
//! table, so [`Error`] is cheap to clone and is carried inside result values
//! as well as returned from builders.

use thiserror::Error;

use crate::network::Address;

/// Main error type for routing, topology and CRC operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Unknown device, router, interface or polynomial
    #[error("{0} not found")]
    NotFound(String),

    /// Lookup yielded no matching entry
    #[error("router {router} has no route to {destination}")]
    NoRoute { router: String, destination: Address },

    /// Next-hop router already visited on the current path
    #[error("routing loop detected: {router} was already visited on this path")]
    RoutingLoop { router: String },

    /// Path walked through more routers than allowed
    #[error("hop limit of {0} exceeded, the route is too long or loops")]
    HopLimitExceeded(usize),

    /// Malformed dotted-decimal address or mask
    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    /// A next hop resolved to something other than a router
    #[error("next hop {address} belongs to {device}, which is not a router")]
    NotARouter { address: Address, device: String },

    /// A direct route claimed a network that does not hold the destination
    #[error("direct route {network} does not contain {destination}")]
    SubnetMismatch { network: String, destination: Address },

    /// Switch already has its maximum number of attached devices
    #[error("switch {switch} already has the maximum of {capacity} connected devices")]
    CapacityExceeded { switch: String, capacity: usize },

    /// Non-binary CRC input, unparseable metric, inconsistent route fields
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while reading or writing persisted configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON document
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Document parsed but describes an invalid network
    #[error("invalid configuration: {0}")]
    Invalid(#[from] Error),
}
