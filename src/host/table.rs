use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::model::value::Value;

/// A host function. Errors are reported as plain messages.
pub type CapabilityFn = dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync;

/// Named capabilities exposed by the host to the bridge.
///
/// Capabilities may be registered after the table has been attached to a
/// bridge; the host is only considered ready once its liveness marker is
/// present.
#[derive(Default)]
pub struct HostTable {
    capabilities: RwLock<HashMap<String, Arc<CapabilityFn>>>,
}

impl HostTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `func` under `name`, replacing any previous registration.
    pub fn register<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        let name = name.into();
        tracing::debug!(capability = %name, "host capability registered");
        self.capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(func));
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.capabilities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Clone the capability out of the table so it runs without the lock held.
    pub fn get(&self, name: &str) -> Option<Arc<CapabilityFn>> {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.capabilities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HostTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostTable")
            .field("capabilities", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_lookup_and_unregister() {
        let table = HostTable::new();
        assert!(table.is_empty());

        table.register("double", |args: &[Value]| {
            let n = args.first().and_then(Value::as_int).ok_or("expected an integer")?;
            Ok(Value::Int(n * 2))
        });

        assert!(table.contains("double"));
        let double = table.get("double").unwrap();
        assert_eq!(double(&[Value::Int(21)]), Ok(Value::Int(42)));
        assert_eq!(double(&[]), Err("expected an integer".to_string()));

        assert!(table.unregister("double"));
        assert!(!table.unregister("double"));
        assert!(table.get("double").is_none());
    }

    #[test]
    fn names_are_sorted() {
        let table = HostTable::new();
        table.register("b", |_: &[Value]| Ok(Value::Null));
        table.register("a", |_: &[Value]| Ok(Value::Null));
        assert_eq!(table.names(), vec!["a", "b"]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn capability_may_register_into_its_own_table() {
        let table = Arc::new(HostTable::new());
        let inner = Arc::clone(&table);
        table.register("install", move |_: &[Value]| {
            inner.register("late", |_: &[Value]| Ok(Value::Bool(true)));
            Ok(Value::Null)
        });

        let install = table.get("install").unwrap();
        install(&[]).unwrap();
        assert!(table.contains("late"));
    }
}
