pub mod demo;
pub mod table;

pub use demo::DemoHost;
pub use table::{CapabilityFn, HostTable};
