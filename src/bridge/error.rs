//! Error types for the call bridge.

use crate::bridge::correlation::CorrelationId;

/// Every failure the bridge can surface to a caller.
///
/// Synchronous conventions return these directly. The deferred convention
/// delivers all but `InvalidArgument` through the handle's failure channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Malformed call into the bridge itself.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Host missing, or attached but not yet initialized.
    #[error("host API is not available (calling {capability})")]
    HostUnavailable { capability: String },

    /// Host is ready but does not expose the named capability.
    #[error("host capability not found: {capability}")]
    CapabilityNotFound { capability: String },

    /// The capability itself reported an error.
    #[error("host capability {capability} failed: {message}")]
    CallFailure { capability: String, message: String },

    #[error("correlation id {0} is already pending")]
    DuplicateCorrelationId(CorrelationId),

    /// Completion for an id that is not pending: duplicate or stale completion.
    #[error("no pending call for correlation id {0}")]
    UnknownCorrelationId(CorrelationId),

    #[error("call {0} was cancelled")]
    Cancelled(CorrelationId),

    /// The pending call was dropped without the host ever completing it.
    #[error("call to {capability} was abandoned before completion")]
    Abandoned { capability: String },
}

impl BridgeError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn call_failure(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CallFailure {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
