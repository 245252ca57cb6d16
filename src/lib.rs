//! Call bridge between script-side code and the Forca host runtime.
//!
//! Application code invokes named host capabilities through a
//! [`BridgeClient`] in one of three conventions: fire-and-forget, blocking, or
//! deferred. Deferred calls are tagged with a [`CorrelationId`], parked in the
//! [`PendingCallRegistry`], and completed later when the host reports back
//! through the [`ResolutionChannel`].
//!
//! ```
//! use std::sync::Arc;
//! use forca_bridge::{BridgeClient, HostTable, Value, model::config::BridgeConfig};
//!
//! let host = Arc::new(HostTable::new());
//! host.register("save_user", |_: &[Value]| Ok(Value::Null));
//! host.register("double", |args: &[Value]| {
//!     let n = args.first().and_then(Value::as_int).ok_or("expected an integer")?;
//!     Ok(Value::Int(n * 2))
//! });
//!
//! let bridge = BridgeClient::with_host(&BridgeConfig::default(), host);
//! assert_eq!(bridge.call_sync("double", [Value::Int(21)]), Ok(Value::Int(42)));
//! ```

pub mod bridge;
pub mod host;
pub mod model;

pub use bridge::{
    BridgeClient, BridgeError, Completion, CorrelationId, Deferred, PendingCallRegistry,
    ResolutionChannel,
};
pub use host::HostTable;
pub use model::value::{Args, Value};
