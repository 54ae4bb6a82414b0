//! Static model registry.
//!
//! The definitive list of supported models with their adapter kind, base
//! URL, context window, and per-million-token pricing. Adapters price token
//! usage against this table — the registry, not the vendor response, is the
//! source of cost truth.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiCompatProvider;
use crate::provider::{Provider, ProviderError, ProviderResult};

/// Which adapter serves a model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// Anthropic Messages API.
    Anthropic,
    /// Any OpenAI-compatible Chat Completions API.
    OpenAiCompat,
}

/// Metadata for one supported model.
#[derive(Clone, Debug)]
pub struct ModelInfo {
    /// Model ID sent to the API.
    pub id: &'static str,
    /// Adapter kind.
    pub kind: ProviderKind,
    /// API base URL.
    pub base_url: &'static str,
    /// Context window size in tokens.
    pub max_context: u32,
    /// USD per million input tokens.
    pub input_cost_per_mtok: f64,
    /// USD per million output tokens.
    pub output_cost_per_mtok: f64,
    /// Name of the API key this model needs.
    pub api_key_name: &'static str,
    /// Extra request-body fields some vendors require.
    pub extra_params: Option<fn() -> Value>,
}

impl ModelInfo {
    /// Price a token count pair in USD.
    #[must_use]
    pub fn cost_usd(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let (input, output) = (input_tokens as f64, output_tokens as f64);
        (input / 1_000_000.0) * self.input_cost_per_mtok
            + (output / 1_000_000.0) * self.output_cost_per_mtok
    }
}

fn kimi_extra_params() -> Value {
    json!({"thinking": {"type": "disabled"}})
}

/// The supported model table.
static SUPPORTED_MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "claude-opus-4-6",
        kind: ProviderKind::Anthropic,
        base_url: "https://api.anthropic.com",
        max_context: 200_000,
        input_cost_per_mtok: 5.0,
        output_cost_per_mtok: 25.0,
        api_key_name: "anthropic",
        extra_params: None,
    },
    ModelInfo {
        id: "gpt-5.2",
        kind: ProviderKind::OpenAiCompat,
        base_url: "https://api.openai.com/v1",
        max_context: 128_000,
        input_cost_per_mtok: 10.0,
        output_cost_per_mtok: 30.0,
        api_key_name: "openai",
        extra_params: None,
    },
    ModelInfo {
        id: "glm-5",
        kind: ProviderKind::OpenAiCompat,
        base_url: "https://api.z.ai/api/paas/v4",
        max_context: 128_000,
        input_cost_per_mtok: 0.50,
        output_cost_per_mtok: 2.0,
        api_key_name: "glm",
        extra_params: None,
    },
    ModelInfo {
        id: "kimi-k2.5",
        kind: ProviderKind::OpenAiCompat,
        base_url: "https://api.moonshot.ai/v1",
        max_context: 256_000,
        input_cost_per_mtok: 0.60,
        output_cost_per_mtok: 3.0,
        api_key_name: "kimi",
        extra_params: Some(kimi_extra_params),
    },
    ModelInfo {
        id: "minimax-m2.5",
        kind: ProviderKind::OpenAiCompat,
        base_url: "https://api.minimax.chat/v1",
        max_context: 1_000_000,
        input_cost_per_mtok: 0.15,
        output_cost_per_mtok: 1.20,
        api_key_name: "minimax",
        extra_params: None,
    },
];

/// Look up a model by ID.
#[must_use]
pub fn model_info(model_id: &str) -> Option<&'static ModelInfo> {
    SUPPORTED_MODELS.iter().find(|m| m.id == model_id)
}

/// All supported model IDs, in preference order.
#[must_use]
pub fn model_ids() -> Vec<&'static str> {
    SUPPORTED_MODELS.iter().map(|m| m.id).collect()
}

/// Create the right [`Provider`] for a model ID.
///
/// `api_keys` maps key names (`"anthropic"`, `"openai"`, ...) to secrets.
/// Fails when the model is unknown or its key is missing.
pub fn create_provider(
    model_id: &str,
    api_keys: &HashMap<String, String>,
) -> ProviderResult<Arc<dyn Provider>> {
    let info = model_info(model_id).ok_or_else(|| ProviderError::UnknownModel {
        model: model_id.to_owned(),
    })?;

    let api_key = api_keys
        .get(info.api_key_name)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ProviderError::Auth {
            message: format!(
                "API key {:?} is required for model {:?}",
                info.api_key_name, model_id
            ),
        })?;

    Ok(match info.kind {
        ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(api_key.clone(), info)),
        ProviderKind::OpenAiCompat => Arc::new(OpenAiCompatProvider::new(api_key.clone(), info)),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
