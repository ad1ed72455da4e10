//! WC-012: Built-in `webchef.builtin.common` commands.
//!
//! click, fill_out, select, wait, polling_for (alias pollingFor), debug.

use super::{Capability, Namespace};
use crate::core::error::PluginError;
use crate::core::types::{value_to_display_string, Payload};
use crate::session::Session;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub const NAMESPACE: &str = "webchef.builtin.common";

/// Element lookup timeout when the step gives none.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Poll interval of `polling_for` when the step gives none.
pub const DEFAULT_INTERVAL_MS: u64 = 1_000;

/// The built-in namespace.
pub fn namespace() -> Namespace {
    let polling: Arc<dyn Capability> = Arc::new(PollingFor);
    Namespace::new()
        .with_command("click", Arc::new(Click))
        .with_command("fill_out", Arc::new(FillOut))
        .with_command("select", Arc::new(Select))
        .with_command("wait", Arc::new(Wait))
        .with_command("polling_for", Arc::clone(&polling))
        .with_command("pollingFor", polling)
        .with_command("debug", Arc::new(DebugPrint))
}

// ============================================================================
// Parameter helpers
// ============================================================================

fn str_param<'a>(payload: &'a Payload, key: &str) -> Result<&'a str, PluginError> {
    match payload.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(PluginError::InvalidArgument(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
        None => Err(PluginError::InvalidArgument(format!("missing '{}'", key))),
    }
}

/// Milliseconds from a number or a numeric string.
fn millis_param(payload: &Payload, key: &str, default: Option<u64>) -> Result<u64, PluginError> {
    let invalid = || {
        PluginError::InvalidArgument(format!(
            "'{}' must be a non-negative number of milliseconds",
            key
        ))
    };
    match payload.get(key) {
        None | Some(Value::Null) => default
            .ok_or_else(|| PluginError::InvalidArgument(format!("missing '{}'", key))),
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(invalid),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

fn timeout(payload: &Payload) -> Result<Duration, PluginError> {
    millis_param(payload, "timeout", Some(DEFAULT_TIMEOUT_MS)).map(Duration::from_millis)
}

// ============================================================================
// Commands
// ============================================================================

pub struct Click;

#[async_trait]
impl Capability for Click {
    async fn invoke(&self, session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
        let selector = str_param(payload, "selector")?;
        session.click(selector, timeout(payload)?).await?;
        Ok(Value::Null)
    }
}

pub struct FillOut;

#[async_trait]
impl Capability for FillOut {
    async fn invoke(&self, session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
        let selector = str_param(payload, "selector")?;
        let data = payload
            .get("data")
            .map(value_to_display_string)
            .ok_or_else(|| PluginError::InvalidArgument("missing 'data'".to_string()))?;
        session.fill(selector, &data, timeout(payload)?).await?;
        Ok(Value::Null)
    }
}

/// Inner texts of every match. A failed lookup is logged and yields `null`
/// so a `register` still happens.
pub struct Select;

#[async_trait]
impl Capability for Select {
    async fn invoke(&self, session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
        let selector = str_param(payload, "selector")?;
        match session.inner_texts(selector, timeout(payload)?).await {
            Ok(texts) => Ok(Value::Array(texts.into_iter().map(Value::String).collect())),
            Err(e) => {
                tracing::warn!(selector, "select failed: {}", e);
                Ok(Value::Null)
            }
        }
    }
}

pub struct Wait;

#[async_trait]
impl Capability for Wait {
    async fn invoke(&self, _session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
        let ms = millis_param(payload, "value", None)?;
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(Value::Null)
    }
}

/// Poll until an element contains `text`, or time out.
pub struct PollingFor;

#[async_trait]
impl Capability for PollingFor {
    async fn invoke(&self, session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
        let selector = str_param(payload, "selector")?;
        let text = str_param(payload, "text")?;
        let interval = Duration::from_millis(millis_param(
            payload,
            "interval",
            Some(DEFAULT_INTERVAL_MS),
        )?);
        let limit = timeout(payload)?;
        let started = Instant::now();

        loop {
            if session.text_contains(selector, text).await? {
                return Ok(Value::Bool(true));
            }
            if started.elapsed() >= limit {
                return Err(PluginError::Timeout {
                    millis: limit.as_millis() as u64,
                    what: format!("'{}' to contain '{}'", selector, text),
                });
            }
            tokio::time::sleep(interval).await;
        }
    }
}

pub struct DebugPrint;

#[async_trait]
impl Capability for DebugPrint {
    async fn invoke(&self, _session: &dyn Session, payload: &Payload) -> Result<Value, PluginError> {
        let format = payload
            .get("format")
            .map(value_to_display_string)
            .unwrap_or_default();
        println!("{}", format);
        Ok(Value::String(format))
    }
}
