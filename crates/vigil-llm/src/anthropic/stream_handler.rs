//! Anthropic SSE stream handler.
//!
//! Converts raw SSE events (`message_start`, `content_block_delta`, ...)
//! into the unified [`StreamEvent`] sequence. The handler keeps a
//! [`StreamState`] that buffers partial tool-call JSON across deltas and
//! emits exactly one `tool_call` per completed `tool_use` block — call
//! boundaries are preserved even when a turn carries several calls.

use serde_json::Map;
use tracing::warn;
use vigil_core::{StreamEvent, ToolCall, Usage};

use crate::models::ModelInfo;

use super::types::{AnthropicSseEvent, SseContentBlock, SseDelta};

/// Accumulated state across one message's SSE events.
#[derive(Debug)]
pub struct StreamState {
    model: &'static ModelInfo,
    current_tool_id: Option<String>,
    current_tool_name: Option<String>,
    args_buf: String,
    input_tokens: u64,
    output_tokens: u64,
    stop_reason: Option<String>,
}

impl StreamState {
    /// Fresh state pricing against the given model.
    #[must_use]
    pub fn new(model: &'static ModelInfo) -> Self {
        Self {
            model,
            current_tool_id: None,
            current_tool_name: None,
            args_buf: String::new(),
            input_tokens: 0,
            output_tokens: 0,
            stop_reason: None,
        }
    }

    /// The stop reason reported by `message_delta`, if any.
    #[must_use]
    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }
}

/// Process a single SSE event, mutating state and returning zero or more
/// normalized events.
pub fn process_sse_event(event: &AnthropicSseEvent, state: &mut StreamState) -> Vec<StreamEvent> {
    match event {
        AnthropicSseEvent::MessageStart { message } => {
            state.input_tokens = message.usage.input_tokens;
            vec![]
        }

        AnthropicSseEvent::ContentBlockStart { content_block, .. } => match content_block {
            SseContentBlock::ToolUse { id, name } => {
                state.current_tool_id = Some(id.clone());
                state.current_tool_name = Some(name.clone());
                state.args_buf.clear();
                vec![]
            }
            SseContentBlock::Text { .. } | SseContentBlock::Thinking { .. } => vec![],
        },

        AnthropicSseEvent::ContentBlockDelta { delta, .. } => match delta {
            SseDelta::TextDelta { text } => vec![StreamEvent::TextDelta {
                delta: text.clone(),
            }],
            SseDelta::ThinkingDelta { thinking } => vec![StreamEvent::ThinkingDelta {
                delta: thinking.clone(),
            }],
            SseDelta::SignatureDelta { .. } => vec![],
            SseDelta::InputJsonDelta { partial_json } => {
                // Buffer until content_block_stop; a fragment alone is not
                // a parseable call.
                state.args_buf.push_str(partial_json);
                vec![]
            }
        },

        AnthropicSseEvent::ContentBlockStop { .. } => finish_block(state),

        AnthropicSseEvent::MessageDelta { delta, usage } => {
            state.stop_reason.clone_from(&delta.stop_reason);
            if let Some(u) = usage {
                state.output_tokens = u.output_tokens;
            }
            vec![]
        }

        AnthropicSseEvent::MessageStop => {
            let cost_usd = state.model.cost_usd(state.input_tokens, state.output_tokens);
            vec![StreamEvent::Done {
                usage: Usage {
                    input_tokens: state.input_tokens,
                    output_tokens: state.output_tokens,
                    cost_usd,
                },
            }]
        }

        AnthropicSseEvent::Ping => vec![],

        AnthropicSseEvent::Error { error } => {
            warn!(error_type = %error.error_type, message = %error.message, "Anthropic SSE error");
            vec![StreamEvent::Error {
                error: format!("{}: {}", error.error_type, error.message),
            }]
        }
    }
}

/// Finalize the current block. Only `tool_use` blocks produce an event.
fn finish_block(state: &mut StreamState) -> Vec<StreamEvent> {
    let Some(id) = state.current_tool_id.take() else {
        return vec![];
    };
    let name = state.current_tool_name.take().unwrap_or_default();
    let args_json = std::mem::take(&mut state.args_buf);

    // An empty buffer means a no-argument call; malformed JSON is surfaced
    // to the tool layer as-is rather than dropped.
    let arguments: Map<String, serde_json::Value> = if args_json.is_empty() {
        Map::new()
    } else {
        serde_json::from_str(&args_json).unwrap_or_else(|e| {
            warn!(error = %e, "tool call arguments failed to parse");
            let mut m = Map::new();
            let _ = m.insert("_raw".to_owned(), serde_json::Value::String(args_json));
            m
        })
    };

    vec![StreamEvent::ToolCall {
        tool_call: ToolCall::new(id, name, arguments),
    }]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
