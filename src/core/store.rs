//! WC-002: Run-scoped variable store.
//!
//! One store per run, shared by every task. Values are only ever inserted or
//! overwritten; nothing is rolled back when a step fails.

use indexmap::IndexMap;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct VariableStore {
    vars: IndexMap<String, Value>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Store `value` under `name`, returning the value it replaced.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.vars.insert(name.into(), value)
    }

    /// Copy the store into a JSON object.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wc002_set_and_get() {
        let mut store = VariableStore::new();
        assert_eq!(store.get("x"), None);
        assert_eq!(store.set("x", json!("hello")), None);
        assert_eq!(store.get("x"), Some(&json!("hello")));
    }

    #[test]
    fn test_wc002_overwrite_returns_previous() {
        let mut store = VariableStore::new();
        store.set("x", json!(1));
        let prev = store.set("x", json!(2));
        assert_eq!(prev, Some(json!(1)));
        assert_eq!(store.get("x"), Some(&json!(2)));
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn test_wc002_snapshot_is_a_copy() {
        let mut store = VariableStore::new();
        store.set("zeta", json!(1));
        store.set("alpha", json!({"k": [1, 2]}));
        let snap = store.snapshot();
        store.set("zeta", json!(3));
        assert_eq!(snap["zeta"], json!(1));
        assert_eq!(snap["alpha"], json!({"k": [1, 2]}));
        assert_eq!(store.get("zeta"), Some(&json!(3)));
    }
}
