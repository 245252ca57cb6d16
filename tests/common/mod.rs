//! Shared host fixtures for the bridge integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use forca_bridge::model::config::BridgeConfig;
use forca_bridge::{BridgeClient, CorrelationId, HostTable, ResolutionChannel, Value};

pub const LIVENESS_MARKER: &str = "save_user";

/// A host table that is ready: it carries the liveness marker.
pub fn ready_host() -> Arc<HostTable> {
    let host = Arc::new(HostTable::new());
    host.register(LIVENESS_MARKER, |_: &[Value]| Ok(Value::Null));
    host
}

pub fn bridge_with(host: Arc<HostTable>) -> BridgeClient {
    BridgeClient::with_host(&BridgeConfig::default(), host)
}

/// Deferred calls received by a parking host, in arrival order.
#[derive(Debug, Default, Clone)]
pub struct Inbox {
    calls: Arc<Mutex<Vec<(CorrelationId, Vec<Value>)>>>,
}

impl Inbox {
    pub fn take(&self) -> Vec<(CorrelationId, Vec<Value>)> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn len(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

/// Register `name` as a deferred capability that parks every call in the inbox.
pub fn parking_capability(host: &HostTable, name: &str) -> Inbox {
    let inbox = Inbox::default();
    let calls = Arc::clone(&inbox.calls);
    host.register(name.to_string(), move |args: &[Value]| {
        let id = CorrelationId::try_from(&args[0]).map_err(|err| err.to_string())?;
        calls.lock().unwrap().push((id, args[1..].to_vec()));
        Ok(Value::Null)
    });
    inbox
}

/// Register `name` as a deferred capability that completes immediately with
/// the result of `f`, before the dispatch returns.
pub fn echoing_capability<F>(host: &HostTable, name: &str, channel: ResolutionChannel, f: F)
where
    F: Fn(&[Value]) -> Value + Send + Sync + 'static,
{
    host.register(name.to_string(), move |args: &[Value]| {
        channel
            .complete_raw(&args[0], true, f(&args[1..]))
            .map_err(|err| err.to_string())?;
        Ok(Value::Null)
    });
}
