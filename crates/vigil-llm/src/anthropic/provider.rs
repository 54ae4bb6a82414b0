//! Anthropic provider implementing the [`Provider`] trait.
//!
//! Builds streaming requests against the Messages API and pumps the SSE
//! response through the stream handler into a normalized event channel.

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use vigil_core::{Block, CompletionRequest, Message, Role, StreamEvent, ToolSchema};

use crate::models::ModelInfo;
use crate::provider::{EventStream, Provider, ProviderError, ProviderResult};
use crate::sse::parse_sse_lines;

use super::stream_handler::{process_sse_event, StreamState};
use super::types::AnthropicSseEvent;

/// API version header value.
const API_VERSION: &str = "2023-06-01";
/// Event channel depth between the pump task and the consumer.
const PUMP_BUFFER: usize = 64;

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    api_key: String,
    model: &'static ModelInfo,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a provider for one model.
    #[must_use]
    pub fn new(api_key: String, model: &'static ModelInfo) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    fn build_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": self.model.id,
            "max_tokens": request.max_tokens,
            "stream": true,
            "messages": convert_messages(&request.messages),
        });
        if !request.system_prompt.is_empty() {
            body["system"] = json!(request.system_prompt);
        }
        if !request.tools.is_empty() {
            body["tools"] = convert_tools(&request.tools);
        }
        body
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        self.model.id
    }

    fn max_context_tokens(&self) -> u32 {
        self.model.max_context
    }

    async fn complete(
        &self,
        cancel: &CancellationToken,
        request: CompletionRequest,
    ) -> ProviderResult<EventStream> {
        let body = self.build_body(&request);
        debug!(model = self.model.id, messages = request.messages.len(), "anthropic request");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.model.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let (tx, rx) = tokio::sync::mpsc::channel::<StreamEvent>(PUMP_BUFFER);
        let model = self.model;
        let cancel = cancel.clone();

        let _pump = tokio::spawn(async move {
            let mut lines = Box::pin(parse_sse_lines(response.bytes_stream()));
            let mut state = StreamState::new(model);

            loop {
                let data = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        let _ = tx.send(StreamEvent::Error { error: "cancelled".into() }).await;
                        return;
                    }
                    data = lines.next() => data,
                };
                let Some(data) = data else {
                    return; // transport closed; handler emitted done/error already or the runner treats it as truncation
                };

                let event: AnthropicSseEvent = match serde_json::from_str(&data) {
                    Ok(e) => e,
                    Err(_) => continue, // unknown event types are skipped
                };
                let terminal = matches!(
                    event,
                    AnthropicSseEvent::MessageStop | AnthropicSseEvent::Error { .. }
                );
                for out in process_sse_event(&event, &mut state) {
                    if tx.send(out).await.is_err() {
                        return; // consumer dropped
                    }
                }
                if terminal {
                    return;
                }
            }
        });

        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Translate the provider-agnostic transcript into Messages API JSON.
fn convert_messages(messages: &[Message]) -> Value {
    let converted: Vec<Value> = messages
        .iter()
        .map(|msg| {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let blocks: Vec<Value> = msg
                .content
                .iter()
                .map(|block| match block {
                    Block::Text { text } => json!({"type": "text", "text": text}),
                    Block::ToolCall(tc) => json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.arguments,
                    }),
                    Block::ToolResult(tr) => json!({
                        "type": "tool_result",
                        "tool_use_id": tr.tool_call_id,
                        "content": tr.content,
                        "is_error": tr.is_error,
                    }),
                })
                .collect();
            json!({"role": role, "content": blocks})
        })
        .collect();
    json!(converted)
}

/// Translate tool schemas into Messages API tool definitions.
fn convert_tools(tools: &[ToolSchema]) -> Value {
    let converted: Vec<Value> = tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.to_json_schema(),
            })
        })
        .collect();
    json!(converted)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
