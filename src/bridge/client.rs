//! The application-facing side of the bridge.
//!
//! Three calling conventions are offered against a named host capability:
//!
//! - [`send_to_host`](BridgeClient::send_to_host): fire-and-forget, the return
//!   value is discarded.
//! - [`call_sync`](BridgeClient::call_sync): blocking round-trip.
//! - [`call_async`](BridgeClient::call_async): deferred; the host receives a
//!   leading correlation id and later completes the call through the
//!   [`ResolutionChannel`].
//!
//! The synchronous forms report host and capability failures as errors. The
//! deferred form reports them through the returned [`Deferred`] instead, and
//! only fails up front for a malformed capability name.
//!
//! A capability that panics is treated like one that returned an error.

use regex::Regex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::bridge::correlation::{CorrelationId, CorrelationIdAllocator};
use crate::bridge::deferred::Deferred;
use crate::bridge::error::{BridgeError, Result};
use crate::bridge::registry::{PendingCall, PendingCallRegistry};
use crate::bridge::resolution::ResolutionChannel;
use crate::host::table::{CapabilityFn, HostTable};
use crate::model::config::BridgeConfig;
use crate::model::value::{Args, Value};

// Any printable name the host could register: at least one non-space
// character and no control characters.
static CAPABILITY_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\p{Cc}]*[^\s\p{Cc}][^\p{Cc}]*$").expect("valid capability name regex")
});

#[derive(Debug)]
pub struct BridgeClient {
    host: RwLock<Option<Arc<HostTable>>>,
    liveness_marker: String,
    ids: CorrelationIdAllocator,
    registry: Arc<PendingCallRegistry>,
}

impl BridgeClient {
    /// A bridge with no host attached yet.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            host: RwLock::new(None),
            liveness_marker: config.liveness_marker.clone(),
            ids: CorrelationIdAllocator::new(),
            registry: Arc::new(PendingCallRegistry::new()),
        }
    }

    pub fn with_host(config: &BridgeConfig, host: Arc<HostTable>) -> Self {
        let client = Self::new(config);
        client.attach_host(host);
        client
    }

    pub fn attach_host(&self, host: Arc<HostTable>) {
        tracing::info!(capabilities = host.len(), "host attached");
        *self.host.write().unwrap_or_else(PoisonError::into_inner) = Some(host);
    }

    /// Detach the host. Pending calls stay registered; the host may still complete them.
    pub fn detach_host(&self) -> Option<Arc<HostTable>> {
        let host = self
            .host
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if host.is_some() {
            tracing::info!("host detached");
        }
        host
    }

    /// Attached and exposing the liveness marker.
    pub fn is_host_ready(&self) -> bool {
        self.ready_host().is_some()
    }

    pub fn liveness_marker(&self) -> &str {
        &self.liveness_marker
    }

    pub fn resolution_channel(&self) -> ResolutionChannel {
        ResolutionChannel::new(Arc::clone(&self.registry))
    }

    pub fn pending_count(&self) -> usize {
        self.registry.len()
    }

    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        self.registry.pending_ids()
    }

    /// Number of correlation ids allocated so far.
    pub fn issued_ids(&self) -> u64 {
        self.ids.issued()
    }

    /// Fail a pending deferred call with `Cancelled`.
    pub fn cancel(&self, id: CorrelationId) -> Result<()> {
        self.registry.cancel(id)
    }

    /// Abandon every pending call and detach the host.
    pub fn shutdown(&self) -> usize {
        let abandoned = self.registry.abandon_all();
        self.detach_host();
        abandoned
    }

    /// Invoke `name` and discard its return value.
    pub fn send_to_host(&self, name: &str, args: impl IntoIterator<Item = Value>) -> Result<()> {
        validate_name(name)?;
        let capability = self.lookup(name)?;
        let args: Args = args.into_iter().collect();

        tracing::debug!(capability = name, argc = args.len(), "send");
        invoke(&*capability, args.as_slice())
            .map_err(|message| BridgeError::call_failure(name, message))?;
        Ok(())
    }

    /// Invoke `name` and return its value.
    pub fn call_sync(&self, name: &str, args: impl IntoIterator<Item = Value>) -> Result<Value> {
        validate_name(name)?;
        let capability = self.lookup(name)?;
        let args: Args = args.into_iter().collect();

        tracing::debug!(capability = name, argc = args.len(), "sync call");
        invoke(&*capability, args.as_slice())
            .map_err(|message| BridgeError::call_failure(name, message))
    }

    /// Invoke `name` as a deferred call and return a handle to its outcome.
    pub fn call_async(
        &self,
        name: &str,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<Deferred> {
        validate_name(name)?;
        let capability = match self.lookup(name) {
            Ok(capability) => capability,
            Err(err) => return Ok(Deferred::failed(name, err)),
        };

        let id = self.ids.next();
        let (deferred, tx) = Deferred::channel(id, name);
        let tx_err = tx.clone();
        let call = PendingCall::new(
            id,
            name,
            move |value| {
                let _ = tx.send(Ok(value));
            },
            move |err| {
                let _ = tx_err.send(Err(err));
            },
        );

        match self.dispatch(capability, call, args) {
            Ok(()) => Ok(deferred),
            Err(err) => Ok(Deferred::failed(name, err)),
        }
    }

    /// Callback form of [`call_async`](Self::call_async).
    ///
    /// Returns the correlation id of the registered call, or `None` when the
    /// call failed before an id was allocated. In that case `on_failure` has
    /// already run.
    pub fn call_async_with(
        &self,
        name: &str,
        args: impl IntoIterator<Item = Value>,
        on_success: impl FnOnce(Value) + Send + 'static,
        on_failure: impl FnOnce(BridgeError) + Send + 'static,
    ) -> Result<Option<CorrelationId>> {
        validate_name(name)?;
        let capability = match self.lookup(name) {
            Ok(capability) => capability,
            Err(err) => {
                on_failure(err);
                return Ok(None);
            }
        };

        let id = self.ids.next();
        let call = PendingCall::new(id, name, on_success, on_failure);
        self.dispatch(capability, call, args)?;
        Ok(Some(id))
    }

    fn dispatch(
        &self,
        capability: Arc<CapabilityFn>,
        call: PendingCall,
        args: impl IntoIterator<Item = Value>,
    ) -> Result<()> {
        let id = call.id();
        let name = call.capability().to_string();
        self.registry.register(call)?;

        let mut host_args = Args::new();
        host_args.push(id.to_value());
        host_args.extend(args);

        tracing::debug!(%id, capability = %name, argc = host_args.len() - 1, "async call");
        if let Err(message) = invoke(&*capability, host_args.as_slice()) {
            // The host failed before it could schedule a completion.
            tracing::debug!(%id, capability = %name, "async dispatch failed: {message}");
            if let Err(err) = self.registry.resolve(id, false, Value::Str(message)) {
                tracing::error!(%id, capability = %name, "dispatch failure after completion: {err}");
            }
        }
        Ok(())
    }

    fn ready_host(&self) -> Option<Arc<HostTable>> {
        self.host
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|host| host.contains(&self.liveness_marker))
            .cloned()
    }

    fn lookup(&self, name: &str) -> Result<Arc<CapabilityFn>> {
        let host = self.ready_host().ok_or_else(|| BridgeError::HostUnavailable {
            capability: name.to_string(),
        })?;

        host.get(name).ok_or_else(|| BridgeError::CapabilityNotFound {
            capability: name.to_string(),
        })
    }
}

fn validate_name(name: &str) -> Result<()> {
    if CAPABILITY_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(BridgeError::invalid_argument(format!(
            "capability name must be non-blank printable text, got {name:?}"
        )))
    }
}

/// Run a capability, turning a panic into an error message.
fn invoke(capability: &CapabilityFn, args: &[Value]) -> std::result::Result<Value, String> {
    panic::catch_unwind(AssertUnwindSafe(|| capability(args)))
        .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("host capability panicked: {detail}")
}
