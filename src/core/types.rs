//! WC-001: Recipe, task, and step types.
//!
//! Two layers: the *document* types mirror the YAML/JSON a user writes (and
//! derive `JsonSchema` for `webchef schema`); the *normalized* types are what
//! the engine executes. A step's single operation key becomes an explicit
//! [`Operation`] during normalization, so dispatch never inspects object keys.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Step keys that control execution rather than naming an operation.
pub const RESERVED_STEP_KEYS: [&str; 3] = ["register", "ignore_errors", "when"];

/// Result code of a run where every task completed.
pub const RESULT_OK: i32 = 0;

/// Result code of a run with an unrecovered failure.
pub const RESULT_FAILED: i32 = 255;

/// Operation parameters handed to a plugin, `command` included.
pub type Payload = Map<String, Value>;

pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_STEP_KEYS.contains(&key)
}

// ============================================================================
// Document form
// ============================================================================

/// A recipe document as written by the user.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RecipeDocument {
    /// Target URL the session navigates to before running tasks
    pub url: String,

    /// Human-readable recipe name
    pub name: String,

    /// Tasks, executed in order
    pub tasks: Vec<TaskDocument>,
}

/// A named group of steps.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskDocument {
    pub name: String,

    #[serde(default)]
    pub steps: Vec<StepDocument>,
}

/// One step: exactly one operation key plus optional control keys.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StepDocument {
    /// Store the operation result under this variable name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub register: Option<String>,

    /// Continue with the next step if this one fails
    #[serde(default)]
    pub ignore_errors: bool,

    /// Expression gating the step; the step is skipped when it is falsy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,

    /// The operation key (plugin namespace) and its payload
    #[serde(flatten)]
    pub operation: BTreeMap<String, OperationPayload>,
}

/// Payload under a step's operation key.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationPayload {
    /// Command name within the plugin namespace
    pub command: String,

    /// Command-specific parameters (selector, timeout, text, ...)
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl OperationPayload {
    /// Rebuild the payload map the plugin receives, `command` first.
    pub fn into_payload(self) -> Payload {
        let mut payload = Map::new();
        payload.insert("command".to_string(), Value::String(self.command));
        for (k, v) in self.params {
            payload.insert(k, v);
        }
        payload
    }
}

// ============================================================================
// Normalized form
// ============================================================================

/// A validated, normalized recipe. Immutable during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub url: String,
    pub name: String,
    pub tasks: Vec<Task>,
}

impl Recipe {
    pub fn step_count(&self) -> usize {
        self.tasks.iter().map(|t| t.steps.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub name: String,
    pub steps: Vec<Step>,
}

/// A step as the executor sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub control: ControlFields,
    pub operation: Operation,
}

/// Reserved control keys of a step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFields {
    pub register: Option<String>,
    pub ignore_errors: bool,
    pub when: Option<String>,
}

/// The plugin namespace a step dispatches to and its unresolved payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub namespace: String,
    pub payload: Payload,
}

// ============================================================================
// Outcomes
// ============================================================================

/// States of the recipe runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Navigating,
    RunningTasks,
    ClosingSession,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::Navigating => write!(f, "navigating"),
            Self::RunningTasks => write!(f, "running-tasks"),
            Self::ClosingSession => write!(f, "closing-session"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Summary of one recipe run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub recipe: String,
    pub run_id: String,
    pub result_code: i32,
    pub tasks_completed: u32,
    pub steps_completed: u32,
    pub steps_skipped: u32,
    pub steps_ignored: u32,
    /// Description of the failure that set a non-zero result code
    pub failure: Option<String>,
    /// Snapshot of the variable store at the end of the run
    pub variables: Map<String, Value>,
    pub duration: Duration,
}

impl RunReport {
    pub fn new(recipe: &str, run_id: &str) -> Self {
        Self {
            recipe: recipe.to_string(),
            run_id: run_id.to_string(),
            result_code: RESULT_OK,
            tasks_completed: 0,
            steps_completed: 0,
            steps_skipped: 0,
            steps_ignored: 0,
            failure: None,
            variables: Map::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.result_code == RESULT_OK
    }

    pub(crate) fn fail(&mut self, reason: impl Into<String>) {
        self.result_code = RESULT_FAILED;
        if self.failure.is_none() {
            self.failure = Some(reason.into());
        }
    }
}

// ============================================================================
// Display helpers
// ============================================================================

/// Payload fields whose values never appear in logs.
pub const MASKED_FIELDS: [&str; 3] = ["value", "data", "password"];

/// Copy of a payload with sensitive fields replaced by asterisks.
pub fn masked(payload: &Payload) -> Payload {
    payload
        .iter()
        .map(|(k, v)| {
            if MASKED_FIELDS.contains(&k.as_str()) {
                (k.clone(), Value::String("*".repeat(8)))
            } else {
                (k.clone(), v.clone())
            }
        })
        .collect()
}

/// Render a value for string interpolation: strings verbatim, null empty,
/// everything else as compact JSON.
pub fn value_to_display_string(val: &Value) -> String {
    match val {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wc001_step_document_parse() {
        let yaml = r##"
webchef.builtin.common:
  command: click
  selector: "#button"
register: result
when: "true"
"##;
        let step: StepDocument = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(step.register.as_deref(), Some("result"));
        assert!(!step.ignore_errors);
        assert_eq!(step.when.as_deref(), Some("true"));
        assert_eq!(step.operation.len(), 1);
        let op = &step.operation["webchef.builtin.common"];
        assert_eq!(op.command, "click");
        assert_eq!(op.params["selector"], json!("#button"));
    }

    #[test]
    fn test_wc001_reserved_keys_not_captured_as_operations() {
        let step: StepDocument = serde_json::from_value(json!({
            "ns": {"command": "read"},
            "ignore_errors": true
        }))
        .unwrap();
        assert!(step.ignore_errors);
        assert_eq!(step.operation.keys().collect::<Vec<_>>(), vec!["ns"]);
    }

    #[test]
    fn test_wc001_into_payload_keeps_command() {
        let op = OperationPayload {
            command: "click".into(),
            params: json!({"selector": "#btn"}).as_object().unwrap().clone(),
        };
        let payload = op.into_payload();
        assert_eq!(Value::Object(payload), json!({"command": "click", "selector": "#btn"}));
    }

    #[test]
    fn test_wc001_reserved_keys() {
        assert!(is_reserved_key("register"));
        assert!(is_reserved_key("ignore_errors"));
        assert!(is_reserved_key("when"));
        assert!(!is_reserved_key("webchef.builtin.common"));
    }

    #[test]
    fn test_wc001_masked_payload() {
        let payload = json!({"command": "fill_out", "selector": "#pw", "data": "hunter2"})
            .as_object()
            .unwrap()
            .clone();
        let m = masked(&payload);
        assert_eq!(m["data"], json!("********"));
        assert_eq!(m["selector"], json!("#pw"));
        // The original is untouched
        assert_eq!(payload["data"], json!("hunter2"));
    }

    #[test]
    fn test_wc001_value_to_display_string() {
        assert_eq!(value_to_display_string(&json!("hello")), "hello");
        assert_eq!(value_to_display_string(&json!(42)), "42");
        assert_eq!(value_to_display_string(&json!(true)), "true");
        assert_eq!(value_to_display_string(&Value::Null), "");
        assert_eq!(value_to_display_string(&json!(["a", 1])), "[\"a\",1]");
    }

    #[test]
    fn test_wc001_run_state_display() {
        assert_eq!(RunState::Navigating.to_string(), "navigating");
        assert_eq!(RunState::ClosingSession.to_string(), "closing-session");
    }

    #[test]
    fn test_wc001_report_keeps_first_failure() {
        let mut report = RunReport::new("r", "r-1");
        assert!(report.success());
        report.fail("first");
        report.fail("second");
        assert_eq!(report.result_code, RESULT_FAILED);
        assert_eq!(report.failure.as_deref(), Some("first"));
    }
}
