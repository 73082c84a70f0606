pub mod address;
pub mod device;
pub mod topology;

pub use address::{Address, cidr_from_mask, mask_from_cidr};
pub use device::{Device, DeviceId, DeviceKind, Network, NetworkId, RouterState, SwitchState};
pub use topology::{Connection, DEFAULT_SWITCH_CAPACITY, Topology, parse_metric};
