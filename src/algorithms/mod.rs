pub mod path_discovery;

pub use path_discovery::{Fabric, Hop, MAX_HOPS, PathTrace, RouteStep, StepAction, discover};
