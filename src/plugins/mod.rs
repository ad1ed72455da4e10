//! WC-006: Plugin registry.
//!
//! `registry[namespace][command]` → [`Capability`]. Registries are assembled
//! once at startup and only ever read by the engine.

pub mod builtin;

use crate::core::error::{PluginError, StepError};
use crate::core::types::Payload;
use crate::session::Session;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One command implementation.
///
/// `payload` is the fully substituted operation payload, `command` included.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn invoke(&self, session: &dyn Session, payload: &Payload) -> Result<Value, PluginError>;
}

/// The commands of one plugin namespace.
#[derive(Clone, Default)]
pub struct Namespace {
    commands: BTreeMap<String, Arc<dyn Capability>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_command(mut self, name: impl Into<String>, capability: Arc<dyn Capability>) -> Self {
        self.commands.insert(name.into(), capability);
        self
    }

    pub fn get(&self, command: &str) -> Option<Arc<dyn Capability>> {
        self.commands.get(command).cloned()
    }

    /// Command names, sorted.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.commands.keys()).finish()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    namespaces: BTreeMap<String, Namespace>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in `webchef.builtin.common` namespace.
    pub fn with_builtins() -> Self {
        Self::new().with_namespace(builtin::NAMESPACE, builtin::namespace())
    }

    /// Add (or replace) a namespace.
    pub fn with_namespace(mut self, name: impl Into<String>, namespace: Namespace) -> Self {
        self.namespaces.insert(name.into(), namespace);
        self
    }

    pub fn namespace(&self, name: &str) -> Option<&Namespace> {
        self.namespaces.get(name)
    }

    /// Look up `namespace.command`, distinguishing the two ways it can be missing.
    pub fn resolve(&self, namespace: &str, command: &str) -> Result<Arc<dyn Capability>, StepError> {
        let ns = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| StepError::UnknownNamespace(namespace.to_string()))?;
        ns.get(command).ok_or_else(|| StepError::UnknownCommand {
            namespace: namespace.to_string(),
            command: command.to_string(),
        })
    }

    /// Namespaces, sorted by name.
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &Namespace)> {
        self.namespaces.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        async fn invoke(&self, _session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
            Ok(Value::Object(payload.clone()))
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new().with_namespace("test.ns", Namespace::new().with_command("echo", Arc::new(Echo)))
    }

    #[test]
    fn test_wc006_resolve_known() {
        assert!(registry().resolve("test.ns", "echo").is_ok());
    }

    #[test]
    fn test_wc006_unknown_namespace() {
        let err = registry().resolve("other", "echo").err().unwrap();
        assert!(matches!(err, StepError::UnknownNamespace(ref ns) if ns == "other"));
    }

    #[test]
    fn test_wc006_unknown_command() {
        let err = registry().resolve("test.ns", "nope").err().unwrap();
        assert_eq!(err.to_string(), "unknown command 'nope' in plugin 'test.ns'");
    }

    #[test]
    fn test_wc006_listing_sorted() {
        let reg = registry()
            .with_namespace("a.first", Namespace::new().with_command("z", Arc::new(Echo)).with_command("a", Arc::new(Echo)));
        let names: Vec<_> = reg.namespaces().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.first", "test.ns"]);
        let cmds: Vec<_> = reg.namespace("a.first").unwrap().commands().collect();
        assert_eq!(cmds, vec!["a", "z"]);
    }

    #[test]
    fn test_wc006_builtins_registered() {
        let reg = PluginRegistry::with_builtins();
        let ns = reg.namespace(builtin::NAMESPACE).unwrap();
        for cmd in ["click", "fill_out", "select", "wait", "polling_for", "pollingFor", "debug"] {
            assert!(ns.get(cmd).is_some(), "missing builtin {}", cmd);
        }
    }

    #[tokio::test]
    async fn test_wc006_invoke_passes_payload() {
        let provider = crate::session::memory::MemoryProvider::default();
        let session = crate::session::SessionProvider::open(&provider, &Default::default())
            .await
            .unwrap();
        let cap = registry().resolve("test.ns", "echo").unwrap();
        let payload = json!({"command": "echo", "x": 1}).as_object().unwrap().clone();
        let out = cap.invoke(session.as_ref(), &payload).await.unwrap();
        assert_eq!(out, json!({"command": "echo", "x": 1}));
    }
}
