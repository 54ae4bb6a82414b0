//! Parameter extraction helpers.
//!
//! Tool calls arrive as JSON objects. These helpers pull typed values out
//! with diagnostics precise enough for the model to self-correct when it
//! passes the wrong shape. Extraction failures are returned as ready-made
//! error [`ToolResult`]s so tool call sites stay flat.

use serde_json::{Map, Value};
use vigil_core::ToolResult;

/// Extract a required string parameter.
pub fn required_str(params: &Map<String, Value>, key: &str) -> Result<String, ToolResult> {
    match params.get(key) {
        None => Err(ToolResult::error(format!("missing required parameter: {key:?}"))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(type_error(key, "a string", other)),
    }
}

/// Extract an optional string parameter (`None` when absent).
pub fn optional_str(params: &Map<String, Value>, key: &str) -> Result<Option<String>, ToolResult> {
    match params.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(type_error(key, "a string", other)),
    }
}

/// Extract a required integer parameter. JSON numbers may arrive as floats.
pub fn required_int(params: &Map<String, Value>, key: &str) -> Result<i64, ToolResult> {
    match params.get(key) {
        None => Err(ToolResult::error(format!("missing required parameter: {key:?}"))),
        Some(value) => as_int(key, value),
    }
}

/// Extract an optional integer parameter, with a default when absent.
pub fn optional_int(
    params: &Map<String, Value>,
    key: &str,
    default: i64,
) -> Result<i64, ToolResult> {
    match params.get(key) {
        None => Ok(default),
        Some(value) => as_int(key, value),
    }
}

fn as_int(key: &str, value: &Value) -> Result<i64, ToolResult> {
    if let Some(i) = value.as_i64() {
        return Ok(i);
    }
    // Models frequently send integers as JSON floats.
    if let Some(f) = value.as_f64() {
        if f.fract() == 0.0 {
            #[allow(clippy::cast_possible_truncation)]
            return Ok(f as i64);
        }
    }
    Err(type_error(key, "an integer", value))
}

fn type_error(key: &str, expected: &str, got: &Value) -> ToolResult {
    let kind = match got {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    ToolResult::error(format!("parameter {key:?} must be {expected}, got {kind}"))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn required_str_present() {
        let p = params(json!({"pattern": "eval\\("}));
        assert_eq!(required_str(&p, "pattern").unwrap(), "eval\\(");
    }

    #[test]
    fn required_str_missing() {
        let p = params(json!({}));
        let err = required_str(&p, "pattern").unwrap_err();
        assert!(err.is_error);
        assert!(err.content.contains("missing required parameter"));
        assert!(err.content.contains("pattern"));
    }

    #[test]
    fn required_str_wrong_type() {
        let p = params(json!({"pattern": 42}));
        let err = required_str(&p, "pattern").unwrap_err();
        assert!(err.content.contains("must be a string"));
        assert!(err.content.contains("a number"));
    }

    #[test]
    fn optional_str_absent_is_none() {
        let p = params(json!({}));
        assert_eq!(optional_str(&p, "path").unwrap(), None);
    }

    #[test]
    fn optional_int_default() {
        let p = params(json!({}));
        assert_eq!(optional_int(&p, "count", 20).unwrap(), 20);
    }

    #[test]
    fn int_accepts_float_encoded_integer() {
        let p = params(json!({"count": 30.0}));
        assert_eq!(optional_int(&p, "count", 20).unwrap(), 30);
    }

    #[test]
    fn int_rejects_fractional() {
        let p = params(json!({"count": 1.5}));
        assert!(optional_int(&p, "count", 20).is_err());
    }

    #[test]
    fn required_int_present_and_missing() {
        let p = params(json!({"start_line": 7}));
        assert_eq!(required_int(&p, "start_line").unwrap(), 7);
        assert!(required_int(&p, "end_line").is_err());
    }
}
