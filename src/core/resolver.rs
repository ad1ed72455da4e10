//! WC-005: Condition evaluation and `{{ }}` payload interpolation.
//!
//! A string that is exactly one marker (`"{{ rows }}"`) resolves to the typed
//! value of its expression. A string mixing text and markers resolves to a
//! string with every marker rendered in place. `{{{ expr }}}` is accepted as
//! an alias of `{{ expr }}`. Strings without markers, and all object keys, pass
//! through untouched.

use super::error::EvalError;
use super::expr;
use super::store::VariableStore;
use super::types::{value_to_display_string, Payload};
use serde_json::Value;

/// One `{{ expr }}` occurrence inside a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Marker<'a> {
    start: usize,
    end: usize,
    expr: &'a str,
}

/// Offset of `closing` in `inner`, skipping quoted string literals.
fn find_close(inner: &str, closing: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '\'' || c == '"' => quote = Some(c),
            None if inner[i..].starts_with(closing) => return Some(i),
            None => {}
        }
    }
    None
}

fn scan_markers(template: &str) -> Result<Vec<Marker<'_>>, EvalError> {
    let mut markers = Vec::new();
    let mut start = 0;

    while let Some(open) = template[start..].find("{{") {
        let open = start + open;
        let (inner_start, closing) = if template[open..].starts_with("{{{") {
            (open + 3, "}}}")
        } else {
            (open + 2, "}}")
        };
        let close = find_close(&template[inner_start..], closing)
            .ok_or_else(|| EvalError::Syntax {
                offset: open,
                message: format!("unclosed template at position {}", open),
            })?;
        let inner_end = inner_start + close;
        let end = inner_end + closing.len();
        markers.push(Marker {
            start: open,
            end,
            expr: template[inner_start..inner_end].trim(),
        });
        start = end;
    }

    Ok(markers)
}

/// Resolve a single template string.
pub fn resolve_string(template: &str, store: &VariableStore) -> Result<Value, EvalError> {
    let markers = scan_markers(template)?;
    if markers.is_empty() {
        return Ok(Value::String(template.to_string()));
    }
    if let [only] = markers.as_slice() {
        if only.start == 0 && only.end == template.len() {
            return expr::evaluate(only.expr, store);
        }
    }

    let mut result = String::with_capacity(template.len());
    let mut cursor = 0;
    for marker in &markers {
        result.push_str(&template[cursor..marker.start]);
        let value = expr::evaluate(marker.expr, store)?;
        result.push_str(&value_to_display_string(&value));
        cursor = marker.end;
    }
    result.push_str(&template[cursor..]);
    Ok(Value::String(result))
}

/// Resolve every string inside `value`, recursing through arrays and objects.
pub fn resolve_value(value: &Value, store: &VariableStore) -> Result<Value, EvalError> {
    match value {
        Value::String(s) => resolve_string(s, store),
        Value::Array(items) => items
            .iter()
            .map(|v| resolve_value(v, store))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => resolve_payload(map, store).map(Value::Object),
        other => Ok(other.clone()),
    }
}

/// Produce a fully substituted copy of a step payload. The input is never mutated.
pub fn resolve_payload(payload: &Payload, store: &VariableStore) -> Result<Payload, EvalError> {
    payload
        .iter()
        .map(|(k, v)| resolve_value(v, store).map(|v| (k.clone(), v)))
        .collect()
}

/// Evaluate a `when` gate to a boolean.
///
/// The condition may be written bare (`count > 2`) or wrapped in a single
/// marker (`"{{ count > 2 }}"`); both evaluate the same expression.
pub fn evaluate_condition(when: &str, store: &VariableStore) -> Result<bool, EvalError> {
    let markers = scan_markers(when)?;
    let source = match markers.as_slice() {
        [only] if when[..only.start].trim().is_empty() && when[only.end..].trim().is_empty() => {
            only.expr
        }
        [] => when,
        _ => {
            return Err(EvalError::Syntax {
                offset: 0,
                message: "condition must be a single expression".to_string(),
            })
        }
    };
    expr::evaluate_bool(source, store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> VariableStore {
        let mut s = VariableStore::new();
        s.set("val", json!("hello"));
        s.set("n", json!(3));
        s.set("rows", json!(["a", "b"]));
        s.set("user", json!({"name": "ada"}));
        s
    }

    fn payload(v: Value) -> Payload {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_wc005_whole_marker_keeps_type() {
        assert_eq!(resolve_string("{{ n }}", &store()).unwrap(), json!(3));
        assert_eq!(resolve_string("{{rows}}", &store()).unwrap(), json!(["a", "b"]));
        assert_eq!(resolve_string("{{ user }}", &store()).unwrap(), json!({"name": "ada"}));
    }

    #[test]
    fn test_wc005_mixed_text_renders_string() {
        assert_eq!(
            resolve_string("say {{ val }} {{ n }} times", &store()).unwrap(),
            json!("say hello 3 times")
        );
        assert_eq!(
            resolve_string("rows={{ rows }}", &store()).unwrap(),
            json!("rows=[\"a\",\"b\"]")
        );
    }

    #[test]
    fn test_wc005_triple_brace_alias() {
        assert_eq!(resolve_string("{{{ val }}}", &store()).unwrap(), json!("hello"));
        assert_eq!(
            resolve_string("<{{{ user.name }}}>", &store()).unwrap(),
            json!("<ada>")
        );
    }

    #[test]
    fn test_wc005_plain_strings_untouched() {
        assert_eq!(resolve_string("#button", &store()).unwrap(), json!("#button"));
        assert_eq!(resolve_string("a }} b", &store()).unwrap(), json!("a }} b"));
    }

    #[test]
    fn test_wc005_unclosed_marker_is_error() {
        let err = resolve_string("x {{ val", &store()).unwrap_err();
        assert!(matches!(err, EvalError::Syntax { offset: 2, .. }));
    }

    #[test]
    fn test_wc005_braces_inside_string_literals() {
        let s = store();
        assert_eq!(
            resolve_string("{{ 'a}}b' }}", &s).unwrap(),
            json!("a}}b")
        );
        assert_eq!(
            resolve_string("{{ val == 'a}}b' }}", &s).unwrap(),
            json!(false)
        );
        assert_eq!(
            resolve_string(r#"x={{ "q\"}}" + 'z' }}!"#, &s).unwrap(),
            json!("x=q\"}}z!")
        );
        assert!(matches!(
            resolve_string("{{ 'never closed }}", &s),
            Err(EvalError::Syntax { .. })
        ));
    }

    #[test]
    fn test_wc005_unset_variable_in_template_is_error() {
        let err = resolve_string("{{ ghost }}", &store()).unwrap_err();
        assert_eq!(err, EvalError::UnknownVariable("ghost".into()));
    }

    #[test]
    fn test_wc005_payload_nested_and_keys_untouched() {
        let input = payload(json!({
            "command": "fill_out",
            "selector": "#{{ val }}",
            "{{ val }}": "key stays",
            "nested": {"list": ["{{ n }}", 7, true, null]}
        }));
        let resolved = resolve_payload(&input, &store()).unwrap();
        assert_eq!(resolved["selector"], json!("#hello"));
        assert_eq!(resolved["{{ val }}"], json!("key stays"));
        assert_eq!(resolved["nested"]["list"], json!([3, 7, true, null]));
        // The source payload is not mutated
        assert_eq!(input["selector"], json!("#{{ val }}"));
    }

    #[test]
    fn test_wc005_command_can_be_templated() {
        let mut s = store();
        s.set("cmd", json!("click"));
        let resolved = resolve_payload(&payload(json!({"command": "{{ cmd }}"})), &s).unwrap();
        assert_eq!(resolved["command"], json!("click"));
    }

    #[test]
    fn test_wc005_condition_forms() {
        let s = store();
        assert!(evaluate_condition("true", &s).unwrap());
        assert!(!evaluate_condition("false", &s).unwrap());
        assert!(evaluate_condition("n > 2", &s).unwrap());
        assert!(evaluate_condition("{{ n > 2 }}", &s).unwrap());
        assert!(evaluate_condition("  {{ val == 'hello' }} ", &s).unwrap());
        assert!(!evaluate_condition("{{ rows.length == 0 }}", &s).unwrap());
    }

    #[test]
    fn test_wc005_condition_errors() {
        let s = store();
        assert!(evaluate_condition("ghost", &s).is_err());
        assert!(evaluate_condition("{{ n }} and {{ n }}", &s).is_err());
        assert!(evaluate_condition("", &s).is_err());
    }
}
