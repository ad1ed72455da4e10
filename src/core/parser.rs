//! WC-003: Recipe loading, structural validation, and normalization.
//!
//! Recipes are YAML or JSON. Loading goes text → `serde_json::Value` →
//! [`validate_document`] (every problem collected, each located by a
//! `/tasks/0/steps/1`-style path) → [`RecipeDocument`] → [`normalize`].
//! Nothing reaches the executor unless the whole document is valid.

use super::error::{ConfigError, ValidationError};
use super::expr;
use super::types::*;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::LazyLock;

static IDENT: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$"));

fn is_identifier(name: &str) -> bool {
    match IDENT.as_ref() {
        Ok(re) => re.is_match(name),
        Err(_) => false,
    }
}

/// Read a recipe file from disk.
pub fn read_recipe_file(path: &Path) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))
}

/// Parse YAML or JSON recipe text into a raw document.
pub fn parse_document(text: &str) -> Result<Value, ConfigError> {
    serde_yaml_ng::from_str::<Value>(text).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Parse, validate and normalize recipe text.
pub fn parse_recipe(text: &str) -> Result<Recipe, ConfigError> {
    recipe_from_value(&parse_document(text)?)
}

/// Validate and normalize a raw document.
pub fn recipe_from_value(doc: &Value) -> Result<Recipe, ConfigError> {
    let errors = validate_document(doc);
    if !errors.is_empty() {
        return Err(ConfigError::Invalid(errors));
    }
    let typed: RecipeDocument =
        serde_json::from_value(doc.clone()).map_err(|e| ConfigError::Parse(e.to_string()))?;
    normalize(typed)
}

// ============================================================================
// Validation
// ============================================================================

fn type_name(val: &Value) -> &'static str {
    match val {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `obj[key]` exists and has the expected JSON type; record a
/// validation error otherwise.
fn require<'a>(
    obj: &'a serde_json::Map<String, Value>,
    key: &str,
    expected: &'static str,
    path: &str,
    errors: &mut Vec<ValidationError>,
) -> Option<&'a Value> {
    match obj.get(key) {
        None => {
            errors.push(ValidationError::new(
                path,
                format!("must have required property '{}'", key),
            ));
            None
        }
        Some(v) if type_name(v) == expected => Some(v),
        Some(_) => {
            errors.push(ValidationError::new(
                format!("{}/{}", path, key),
                format!("must be {}", expected),
            ));
            None
        }
    }
}

/// Validate a raw recipe document. Returns every error found (empty = valid).
pub fn validate_document(doc: &Value) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let Some(root) = doc.as_object() else {
        errors.push(ValidationError::new("", "must be object"));
        return errors;
    };

    require(root, "url", "string", "", &mut errors);
    require(root, "name", "string", "", &mut errors);

    if let Some(Value::Array(tasks)) = require(root, "tasks", "array", "", &mut errors) {
        for (ti, task) in tasks.iter().enumerate() {
            validate_task(task, &format!("/tasks/{}", ti), &mut errors);
        }
    }

    errors
}

fn validate_task(task: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(obj) = task.as_object() else {
        errors.push(ValidationError::new(path, "must be object"));
        return;
    };

    require(obj, "name", "string", path, errors);

    if let Some(Value::Array(steps)) = require(obj, "steps", "array", path, errors) {
        for (si, step) in steps.iter().enumerate() {
            validate_step(step, &format!("{}/steps/{}", path, si), errors);
        }
    }
}

fn validate_step(step: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(obj) = step.as_object() else {
        errors.push(ValidationError::new(path, "must be object"));
        return;
    };

    match obj.get("register") {
        None => {}
        Some(Value::String(name)) if is_reserved_key(name) => errors.push(ValidationError::new(
            format!("{}/register", path),
            format!("must not name reserved key '{}'", name),
        )),
        Some(Value::String(name)) if expr::KEYWORDS.contains(&name.as_str()) => {
            errors.push(ValidationError::new(
                format!("{}/register", path),
                format!("must not name expression keyword '{}'", name),
            ))
        }
        Some(Value::String(name)) if !is_identifier(name) => errors.push(ValidationError::new(
            format!("{}/register", path),
            format!("'{}' is not a valid variable name", name),
        )),
        Some(Value::String(_)) => {}
        Some(_) => errors.push(ValidationError::new(
            format!("{}/register", path),
            "must be string",
        )),
    }
    if obj.get("ignore_errors").is_some_and(|v| !v.is_boolean()) {
        errors.push(ValidationError::new(
            format!("{}/ignore_errors", path),
            "must be boolean",
        ));
    }
    if obj.get("when").is_some_and(|v| !v.is_string()) {
        errors.push(ValidationError::new(format!("{}/when", path), "must be string"));
    }

    let operations: Vec<(&String, &Value)> =
        obj.iter().filter(|(k, _)| !is_reserved_key(k)).collect();
    match operations.as_slice() {
        [(key, payload)] => {
            let op_path = format!("{}/{}", path, key);
            match payload.as_object() {
                Some(p) => {
                    require(p, "command", "string", &op_path, errors);
                }
                None => errors.push(ValidationError::new(op_path, "must be object")),
            }
        }
        ops => errors.push(ValidationError::new(
            path,
            format!("must have exactly one operation key, found {}", ops.len()),
        )),
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Turn a typed document into the executable form. Each step's single
/// operation key becomes an explicit [`Operation`].
pub fn normalize(doc: RecipeDocument) -> Result<Recipe, ConfigError> {
    let tasks = doc
        .tasks
        .into_iter()
        .enumerate()
        .map(|(ti, task)| {
            let steps = task
                .steps
                .into_iter()
                .enumerate()
                .map(|(si, step)| normalize_step(step, &format!("/tasks/{}/steps/{}", ti, si)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Task {
                name: task.name,
                steps,
            })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;

    Ok(Recipe {
        url: doc.url,
        name: doc.name,
        tasks,
    })
}

fn normalize_step(step: StepDocument, path: &str) -> Result<Step, ConfigError> {
    if let Some(reg) = step.register.as_deref().filter(|r| is_reserved_key(r)) {
        return Err(ConfigError::MalformedStep {
            path: path.to_string(),
            reason: format!("register must not name reserved key '{}'", reg),
        });
    }
    if step.operation.len() != 1 {
        return Err(ConfigError::MalformedStep {
            path: path.to_string(),
            reason: format!(
                "expected exactly one operation key, found {}",
                step.operation.len()
            ),
        });
    }
    let mut ops = step.operation.into_iter();
    let (namespace, payload) = ops.next().ok_or_else(|| ConfigError::MalformedStep {
        path: path.to_string(),
        reason: "missing operation key".to_string(),
    })?;

    Ok(Step {
        control: ControlFields {
            register: step.register,
            ignore_errors: step.ignore_errors,
            when: step.when,
        },
        operation: Operation {
            namespace,
            payload: payload.into_payload(),
        },
    })
}
