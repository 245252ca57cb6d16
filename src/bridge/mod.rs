pub mod client;
pub mod correlation;
pub mod deferred;
pub mod error;
pub mod registry;
pub mod resolution;

pub use client::BridgeClient;
pub use correlation::{CorrelationId, CorrelationIdAllocator};
pub use deferred::Deferred;
pub use error::{BridgeError, Result};
pub use registry::{PendingCall, PendingCallRegistry};
pub use resolution::{Completion, ResolutionChannel};
