//! In-memory variable store.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::{VariableEntry, VariableStore};
use crate::value::Value;
use crate::{Error, Result};

/// Variable store backed by a map. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    variables: RwLock<BTreeMap<String, (Value, bool)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

fn poisoned() -> Error {
    Error::Internal("memory store poisoned".to_string())
}

impl VariableStore for MemoryStore {
    fn register(&self, name: &str, value: Value, writable: bool) -> Result<bool> {
        let mut guard = self.variables.write().map_err(|_| poisoned())?;
        if guard.contains_key(name) {
            return Ok(false);
        }
        guard.insert(name.to_string(), (value, writable));
        Ok(true)
    }

    fn get(&self, name: &str) -> Result<Value> {
        let guard = self.variables.read().map_err(|_| poisoned())?;
        guard
            .get(name)
            .map(|(value, _)| value.clone())
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    fn set(&self, name: &str, value: Value) -> Result<Value> {
        let mut guard = self.variables.write().map_err(|_| poisoned())?;
        let slot = guard
            .get_mut(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        Ok(std::mem::replace(&mut slot.0, value))
    }

    fn variables(&self) -> Result<Vec<VariableEntry>> {
        let guard = self.variables.read().map_err(|_| poisoned())?;
        Ok(guard
            .iter()
            .map(|(name, (value, writable))| VariableEntry {
                name: name.clone(),
                value: value.clone(),
                writable: *writable,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn register_is_put_if_absent() {
        let store = MemoryStore::new();
        assert!(store.register("cpu.load", json!(1), false).unwrap());
        assert!(!store.register("cpu.load", json!(9), true).unwrap());
        assert_eq!(store.get("cpu.load").unwrap(), json!(1));
    }

    #[test]
    fn set_returns_previous_value() {
        let store = MemoryStore::new();
        store.register("cpu.load", json!(1), false).unwrap();
        assert_eq!(store.set("cpu.load", json!(2)).unwrap(), json!(1));
        assert_eq!(store.get("cpu.load").unwrap(), json!(2));
    }

    #[test]
    fn unknown_variables_are_errors() {
        let store = MemoryStore::new();
        assert!(matches!(store.get("nope"), Err(Error::UnknownVariable(_))));
        assert!(matches!(store.set("nope", json!(1)), Err(Error::UnknownVariable(_))));
    }

    #[test]
    fn variables_are_sorted() {
        let store = MemoryStore::new();
        store.register("b", json!(2), true).unwrap();
        store.register("a", json!(1), false).unwrap();
        let names: Vec<String> = store.variables().unwrap().into_iter().map(|v| v.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
