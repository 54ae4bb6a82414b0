//! Tool schema and result types.
//!
//! A [`ToolSchema`] describes one primitive to the model; [`ToolResult`] is
//! what every execution returns. Policy rejections, helper failures, and
//! timeouts all surface as results with `is_error` set — never as faults —
//! so the model sees the diagnostic and can adjust.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Schema
// ─────────────────────────────────────────────────────────────────────────────

/// A single parameter definition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamDef {
    /// JSON Schema type name (`"string"`, `"integer"`, ...).
    #[serde(rename = "type")]
    pub param_type: String,
    /// Human/model-readable description.
    pub description: String,
}

impl ParamDef {
    /// A string parameter.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            param_type: "string".into(),
            description: description.into(),
        }
    }

    /// An integer parameter.
    #[must_use]
    pub fn integer(description: impl Into<String>) -> Self {
        Self {
            param_type: "integer".into(),
            description: description.into(),
        }
    }
}

/// Provider-agnostic tool schema, sent to the model every turn.
///
/// Parameters are keyed by name in a `BTreeMap` so serialization order is
/// stable across runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Tool identifier used in tool calls.
    pub name: String,
    /// What the tool does, written for the model.
    pub description: String,
    /// Parameter definitions keyed by name.
    pub parameters: BTreeMap<String, ParamDef>,
    /// Names of required parameters.
    pub required: Vec<String>,
}

impl ToolSchema {
    /// Render the JSON Schema object providers embed in their requests:
    /// `{"type": "object", "properties": {...}, "required": [...]}`.
    #[must_use]
    pub fn to_json_schema(&self) -> Value {
        let mut properties = serde_json::Map::new();
        for (name, def) in &self.parameters {
            let _ = properties.insert(
                name.clone(),
                json!({"type": def.param_type, "description": def.description}),
            );
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one tool execution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Output text (or a diagnostic when `is_error`).
    pub content: String,
    /// Whether `content` is a diagnostic the model should observe.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// Tool-specific metadata (match counts, caps hit, paths).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, Value>,
}

impl ToolResult {
    /// A successful result.
    #[must_use]
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }

    /// An error result.
    #[must_use]
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
            ..Self::default()
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        let _ = self.metadata.insert(key.into(), value);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
