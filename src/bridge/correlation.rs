//! Correlation ids pair a deferred dispatch with its later completion.
//!
//! Ids cross the host boundary as a plain integer and are echoed back by the
//! host, so they are primitive values rather than references.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::bridge::error::{BridgeError, Result};
use crate::model::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// The form passed to the host as the leading call argument.
    pub fn to_value(self) -> Value {
        // Allocation starts at 1 and never approaches i64::MAX.
        Value::Int(self.0 as i64)
    }
}

impl TryFrom<&Value> for CorrelationId {
    type Error = BridgeError;

    fn try_from(value: &Value) -> Result<Self> {
        match value {
            Value::Int(n) if *n >= 0 => Ok(Self(*n as u64)),
            other => Err(BridgeError::invalid_argument(format!(
                "correlation id must be a non-negative integer, got {other}"
            ))),
        }
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Hands out ids that are never reused for the lifetime of the allocator.
#[derive(Debug)]
pub struct CorrelationIdAllocator {
    next: AtomicU64,
}

impl Default for CorrelationIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationIdAllocator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> CorrelationId {
        CorrelationId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids handed out so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}
