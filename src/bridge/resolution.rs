//! Inbound path the host uses to complete deferred calls.

use std::sync::Arc;

use crate::bridge::correlation::CorrelationId;
use crate::bridge::error::Result;
use crate::bridge::registry::PendingCallRegistry;
use crate::model::value::Value;

/// A completion reported by the host, suitable for posting across threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub id: CorrelationId,
    pub success: bool,
    pub payload: Value,
}

impl Completion {
    pub fn success(id: CorrelationId, payload: impl Into<Value>) -> Self {
        Self {
            id,
            success: true,
            payload: payload.into(),
        }
    }

    pub fn failure(id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            payload: Value::Str(message.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionChannel {
    registry: Arc<PendingCallRegistry>,
}

impl ResolutionChannel {
    pub(crate) fn new(registry: Arc<PendingCallRegistry>) -> Self {
        Self { registry }
    }

    /// Route a completion to the call registered under `id`.
    ///
    /// An unknown id means the host completed a call twice, completed one the
    /// bridge never issued, or outlived a bridge restart.
    pub fn complete(&self, id: CorrelationId, success: bool, payload: Value) -> Result<()> {
        self.registry
            .resolve(id, success, payload)
            .inspect_err(|err| tracing::error!(%id, success, "host completion rejected: {err}"))
    }

    /// Same as [`complete`](Self::complete), with the id as echoed by the host.
    pub fn complete_raw(&self, id: &Value, success: bool, payload: Value) -> Result<()> {
        let id = CorrelationId::try_from(id)
            .inspect_err(|err| tracing::error!("host completion rejected: {err}"))?;
        self.complete(id, success, payload)
    }

    pub fn deliver(&self, completion: Completion) -> Result<()> {
        self.complete(completion.id, completion.success, completion.payload)
    }
}
