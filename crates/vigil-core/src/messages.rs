//! Conversation model exchanged with LLM providers.
//!
//! The transcript is a list of [`Message`]s, each a role plus ordered content
//! [`Block`]s. Three block kinds exist: plain text, a tool call emitted by the
//! assistant, and a tool result fed back by the runner. Tool results are
//! carried inside a `user` message, matching what every supported wire format
//! expects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolSchema;

// ─────────────────────────────────────────────────────────────────────────────
// Tool call
// ─────────────────────────────────────────────────────────────────────────────

/// A tool invocation requested by the model.
///
/// The `id` correlates this call with the tool-result block appended in the
/// follow-up user message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call ID.
    pub id: String,
    /// Tool name.
    pub name: String,
    /// Parsed JSON arguments.
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a tool call from parts.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content blocks
// ─────────────────────────────────────────────────────────────────────────────

/// A tool-result block, correlated to its call by ID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultBlock {
    /// ID of the tool call this result answers.
    pub tool_call_id: String,
    /// Result text (diagnostics included — see `is_error`).
    pub content: String,
    /// Whether the content is a diagnostic rather than valid output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// One content item within a [`Message`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    /// Plain text.
    Text {
        /// The text content.
        text: String,
    },
    /// A tool call (assistant messages only).
    ToolCall(ToolCall),
    /// A tool result (user messages only).
    ToolResult(ToolResultBlock),
}

impl Block {
    /// Create a text block.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a tool-result block.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self::ToolResult(ToolResultBlock {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            is_error,
        })
    }

    /// Returns the inner tool call, if this is a tool-call block.
    #[must_use]
    pub fn as_tool_call(&self) -> Option<&ToolCall> {
        match self {
            Self::ToolCall(tc) => Some(tc),
            _ => None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

/// Message author role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The user (including synthesized tool-result messages).
    User,
    /// The model.
    Assistant,
}

/// A single turn in the conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Ordered content blocks.
    pub content: Vec<Block>,
}

impl Message {
    /// Create a user message containing one text block.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: vec![Block::text(text)],
        }
    }

    /// Create an assistant message from accumulated text and tool calls.
    ///
    /// An empty text yields no text block; the tool calls follow in the
    /// order the provider surfaced them.
    #[must_use]
    pub fn assistant(text: &str, tool_calls: Vec<ToolCall>) -> Self {
        let mut content = Vec::with_capacity(1 + tool_calls.len());
        if !text.is_empty() {
            content.push(Block::text(text));
        }
        content.extend(tool_calls.into_iter().map(Block::ToolCall));
        Self {
            role: Role::Assistant,
            content,
        }
    }

    /// Create the user message carrying one turn's tool results, in call order.
    #[must_use]
    pub fn tool_results(results: Vec<ToolResultBlock>) -> Self {
        Self {
            role: Role::User,
            content: results.into_iter().map(Block::ToolResult).collect(),
        }
    }

    /// Tool calls contained in this message, in block order.
    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCall> {
        self.content.iter().filter_map(Block::as_tool_call)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Usage and requests
// ─────────────────────────────────────────────────────────────────────────────

/// Token consumption and cost for one completed provider call.
///
/// The provider adapter is the authoritative source: it prices the tokens
/// against its static model table before emitting `done`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    /// Input tokens consumed.
    pub input_tokens: u64,
    /// Output tokens generated (thinking tokens count here).
    pub output_tokens: u64,
    /// Cost in USD for this call.
    pub cost_usd: f64,
}

/// Provider-agnostic completion request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// System prompt (may be empty).
    pub system_prompt: String,
    /// Conversation so far.
    pub messages: Vec<Message>,
    /// Tool schemas offered this turn.
    pub tools: Vec<ToolSchema>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ToolCall {
        let mut args = Map::new();
        let _ = args.insert("pattern".into(), json!("eval\\("));
        ToolCall::new(id, "search_code", args)
    }

    #[test]
    fn block_text_serde() {
        let b = Block::text("hello");
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json, json!({"type": "text", "text": "hello"}));
        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(b, back);
    }

    #[test]
    fn block_tool_call_serde_is_flat() {
        let b = Block::ToolCall(call("tc-1"));
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "tool_call");
        assert_eq!(json["id"], "tc-1");
        assert_eq!(json["name"], "search_code");
        assert_eq!(json["arguments"]["pattern"], "eval\\(");
    }

    #[test]
    fn block_tool_result_serde_omits_false_error() {
        let b = Block::tool_result("tc-1", "No matches found.", false);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["toolCallId"], "tc-1");
        assert!(json.get("isError").is_none());

        let b = Block::tool_result("tc-2", "sandbox: path escapes root", true);
        let json = serde_json::to_value(&b).unwrap();
        assert_eq!(json["isError"], true);
    }

    #[test]
    fn assistant_message_with_text_and_calls() {
        let msg = Message::assistant("Looking at auth now.", vec![call("a"), call("b")]);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content.len(), 3);
        let ids: Vec<&str> = msg.tool_calls().map(|tc| tc.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn assistant_message_empty_text_has_no_text_block() {
        let msg = Message::assistant("", vec![call("a")]);
        assert_eq!(msg.content.len(), 1);
        assert!(matches!(msg.content[0], Block::ToolCall(_)));
    }

    #[test]
    fn tool_results_preserve_order() {
        let msg = Message::tool_results(vec![
            ToolResultBlock {
                tool_call_id: "first".into(),
                content: "one".into(),
                is_error: false,
            },
            ToolResultBlock {
                tool_call_id: "second".into(),
                content: "two".into(),
                is_error: true,
            },
        ]);
        assert_eq!(msg.role, Role::User);
        match (&msg.content[0], &msg.content[1]) {
            (Block::ToolResult(a), Block::ToolResult(b)) => {
                assert_eq!(a.tool_call_id, "first");
                assert_eq!(b.tool_call_id, "second");
                assert!(b.is_error);
            }
            _ => panic!("expected tool-result blocks"),
        }
    }

    #[test]
    fn message_serde_roundtrip() {
        let msg = Message::assistant("text", vec![call("tc-9")]);
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn usage_serde_camel_case() {
        let u = Usage {
            input_tokens: 1200,
            output_tokens: 340,
            cost_usd: 0.0145,
        };
        let json = serde_json::to_value(u).unwrap();
        assert_eq!(json["inputTokens"], 1200);
        assert_eq!(json["outputTokens"], 340);
        assert_eq!(json["costUsd"], 0.0145);
    }

    #[test]
    fn completion_request_default_is_empty() {
        let req = CompletionRequest::default();
        assert!(req.system_prompt.is_empty());
        assert!(req.messages.is_empty());
        assert!(req.tools.is_empty());
        assert_eq!(req.max_tokens, 0);
    }
}
