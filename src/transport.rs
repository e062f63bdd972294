//! Remote completion transport
//!
//! OpenRouter-compatible chat completions over HTTP. The transport only moves
//! JSON; interpreting the envelope (content, tool calls, error) is the
//! client's job.

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::message::Message;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

/// Request envelope `{model, messages, stream, tools?}`
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

/// Sends one completion request and returns the raw JSON response
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn send(&self, request: &CompletionRequest) -> AgentResult<Value>;
}

/// Model pricing as reported by the catalog (USD per token, as text)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelPricing {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub completion: Option<String>,
}

/// One entry of the model catalog
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pricing: ModelPricing,
}

impl ModelInfo {
    /// Free models have a zero prompt price
    pub fn is_free(&self) -> bool {
        self.pricing
            .prompt
            .as_deref()
            .and_then(|p| p.trim().parse::<f64>().ok())
            .map(|p| p == 0.0)
            .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct ModelListResponse {
    data: Vec<ModelInfo>,
}

/// Sorted, deduplicated ids
pub fn model_ids<'a>(models: impl IntoIterator<Item = &'a ModelInfo>) -> Vec<String> {
    let mut ids: Vec<String> = models.into_iter().map(|m| m.id.clone()).collect();
    ids.sort();
    ids.dedup();
    ids
}

/// Sorted ids of free models
pub fn free_model_ids(models: &[ModelInfo]) -> Vec<String> {
    model_ids(models.iter().filter(|m| m.is_free()))
}

/// OpenRouter HTTP transport
#[derive(Clone)]
pub struct OpenRouterTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenRouterTransport {
    pub fn new(base_url: &str, api_key: &str, timeout: std::time::Duration) -> AgentResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Create from config
    pub fn from_config(config: &AgentConfig) -> AgentResult<Self> {
        Self::new(&config.base_url, &config.api_key, config.request_timeout)
    }

    /// Fetch the model catalog
    pub async fn models(&self) -> AgentResult<Vec<ModelInfo>> {
        let url = format!("{}/models", self.base_url);
        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Model catalog request failed: {} {}", status, body);
            return Err(AgentError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let list: ModelListResponse = response.json().await?;
        debug!("Fetched {} models from {}", list.data.len(), url);
        Ok(list.data)
    }
}

#[async_trait]
impl CompletionTransport for OpenRouterTransport {
    async fn send(&self, request: &CompletionRequest) -> AgentResult<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(
            "Calling completion API: model={}, messages={}, tools={}",
            request.model,
            request.messages.len(),
            request.tools.as_ref().map(|t| t.len()).unwrap_or(0)
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        decode_completion_body(status, body)
    }
}

/// Parse a completion response body
///
/// Error envelopes come with non-2xx codes and are handed to the client as
/// JSON. A non-JSON body is `Serialization` on success and `Status` otherwise.
pub fn decode_completion_body(status: StatusCode, body: String) -> AgentResult<Value> {
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => Ok(json),
        Err(e) if status.is_success() => Err(AgentError::Serialization(e)),
        Err(_) => {
            error!("Completion API error {}: {}", status, body);
            Err(AgentError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
