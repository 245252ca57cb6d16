//! Outstanding deferred calls, keyed by correlation id.
//!
//! The registry is the only shared mutable state in the bridge. Entries are
//! removed under the lock and their callbacks run after it is released, so a
//! callback may issue new calls or trigger further resolutions.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::bridge::correlation::CorrelationId;
use crate::bridge::error::{BridgeError, Result};
use crate::model::value::Value;

pub type OnSuccess = Box<dyn FnOnce(Value) + Send>;
pub type OnFailure = Box<dyn FnOnce(BridgeError) + Send>;

/// Completion callbacks for one deferred call.
pub struct PendingCall {
    id: CorrelationId,
    capability: String,
    on_success: OnSuccess,
    on_failure: OnFailure,
}

impl PendingCall {
    pub fn new(
        id: CorrelationId,
        capability: impl Into<String>,
        on_success: impl FnOnce(Value) + Send + 'static,
        on_failure: impl FnOnce(BridgeError) + Send + 'static,
    ) -> Self {
        Self {
            id,
            capability: capability.into(),
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        }
    }

    pub fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }

    fn succeed(self, value: Value) {
        (self.on_success)(value);
    }

    fn fail(self, err: BridgeError) {
        (self.on_failure)(err);
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall")
            .field("id", &self.id)
            .field("capability", &self.capability)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct PendingCallRegistry {
    calls: Mutex<HashMap<CorrelationId, PendingCall>>,
}

impl PendingCallRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, call: PendingCall) -> Result<()> {
        let mut calls = self.lock();
        if calls.contains_key(&call.id) {
            tracing::error!(id = %call.id, "duplicate correlation id registered");
            return Err(BridgeError::DuplicateCorrelationId(call.id));
        }

        tracing::debug!(id = %call.id, capability = %call.capability, "registered pending call");
        calls.insert(call.id, call);
        Ok(())
    }

    /// Remove the entry for `id` and drive its success or failure callback.
    ///
    /// On failure the payload is rendered as the error message.
    pub fn resolve(&self, id: CorrelationId, success: bool, payload: Value) -> Result<()> {
        let call = self.take(id)?;
        tracing::debug!(%id, capability = %call.capability, success, "resolving pending call");

        if success {
            call.succeed(payload);
        } else {
            let err = BridgeError::call_failure(call.capability.clone(), payload.into_message());
            call.fail(err);
        }
        Ok(())
    }

    /// Remove the entry for `id` and fail it with `Cancelled`.
    pub fn cancel(&self, id: CorrelationId) -> Result<()> {
        let call = self.take(id)?;
        tracing::warn!(%id, capability = %call.capability, "pending call cancelled");
        call.fail(BridgeError::Cancelled(id));
        Ok(())
    }

    /// Fail every outstanding call with `Abandoned`. Returns how many there were.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<PendingCall> = self.lock().drain().map(|(_, call)| call).collect();
        let count = drained.len();

        for call in drained {
            tracing::warn!(id = %call.id, capability = %call.capability, "pending call abandoned");
            let err = BridgeError::Abandoned {
                capability: call.capability.clone(),
            };
            call.fail(err);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, id: CorrelationId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn pending_ids(&self) -> Vec<CorrelationId> {
        let mut ids: Vec<CorrelationId> = self.lock().keys().copied().collect();
        ids.sort();
        ids
    }

    fn take(&self, id: CorrelationId) -> Result<PendingCall> {
        self.lock()
            .remove(&id)
            .ok_or(BridgeError::UnknownCorrelationId(id))
    }

    // Callbacks never run under the lock, so a poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingCall>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
