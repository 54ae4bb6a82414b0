//! Chat Completions stream handler.
//!
//! Unlike the Anthropic shape (one block at a time), this protocol streams
//! `tool_calls[index]` fragments that may interleave across chunks. The
//! handler accumulates per-index until the choice reports
//! `finish_reason == "tool_calls"`, then emits the completed calls in index
//! order — one `tool_call` event each, with fully-formed arguments.

use std::collections::BTreeMap;

use serde_json::Map;
use tracing::warn;
use vigil_core::{StreamEvent, ToolCall, Usage};

use crate::models::ModelInfo;

use super::types::ChatChunk;

/// One tool call being assembled across chunks.
#[derive(Debug, Default)]
struct CallAccumulator {
    id: String,
    name: String,
    args: String,
}

/// Accumulated state across one completion's chunks.
#[derive(Debug)]
pub struct StreamState {
    model: &'static ModelInfo,
    calls: BTreeMap<u32, CallAccumulator>,
    calls_emitted: bool,
    input_tokens: u64,
    output_tokens: u64,
}

impl StreamState {
    /// Fresh state pricing against the given model.
    #[must_use]
    pub fn new(model: &'static ModelInfo) -> Self {
        Self {
            model,
            calls: BTreeMap::new(),
            calls_emitted: false,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Terminal `done` event, priced from the usage chunks seen so far.
    /// Called by the pump when the transport reports `[DONE]`.
    #[must_use]
    pub fn finish(&self) -> StreamEvent {
        StreamEvent::Done {
            usage: Usage {
                input_tokens: self.input_tokens,
                output_tokens: self.output_tokens,
                cost_usd: self.model.cost_usd(self.input_tokens, self.output_tokens),
            },
        }
    }
}

/// Process one chunk, mutating state and returning zero or more events.
pub fn process_chunk(chunk: &ChatChunk, state: &mut StreamState) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(usage) = &chunk.usage {
        state.input_tokens = usage.prompt_tokens;
        state.output_tokens = usage.completion_tokens;
    }

    let Some(choice) = chunk.choices.first() else {
        return events;
    };

    if let Some(reasoning) = &choice.delta.reasoning_content {
        if !reasoning.is_empty() {
            events.push(StreamEvent::ThinkingDelta {
                delta: reasoning.clone(),
            });
        }
    }

    if let Some(content) = &choice.delta.content {
        if !content.is_empty() {
            events.push(StreamEvent::TextDelta {
                delta: content.clone(),
            });
        }
    }

    if let Some(fragments) = &choice.delta.tool_calls {
        for fragment in fragments {
            let acc = state.calls.entry(fragment.index).or_default();
            if let Some(id) = &fragment.id {
                acc.id.clone_from(id);
            }
            if let Some(function) = &fragment.function {
                if let Some(name) = &function.name {
                    acc.name.clone_from(name);
                }
                if let Some(arguments) = &function.arguments {
                    acc.args.push_str(arguments);
                }
            }
        }
    }

    if choice.finish_reason.as_deref() == Some("tool_calls") && !state.calls_emitted {
        state.calls_emitted = true;
        for acc in state.calls.values() {
            events.push(StreamEvent::ToolCall {
                tool_call: ToolCall::new(acc.id.clone(), acc.name.clone(), parse_args(&acc.args)),
            });
        }
    }

    events
}

/// Parse an accumulated argument string; malformed JSON is preserved under
/// `_raw` so the tool layer can report it.
fn parse_args(args: &str) -> Map<String, serde_json::Value> {
    if args.is_empty() {
        return Map::new();
    }
    serde_json::from_str(args).unwrap_or_else(|e| {
        warn!(error = %e, "tool call arguments failed to parse");
        let mut m = Map::new();
        let _ = m.insert("_raw".to_owned(), serde_json::Value::String(args.to_owned()));
        m
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
