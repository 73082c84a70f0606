pub mod routing_table;
pub mod tcp;

pub use routing_table::{RoutingEntry, RoutingTable, longest_prefix_candidates};
pub use tcp::{Exchange, Flags, Segment, Session, Side, TcpState};
