//! Agent Facade
//!
//! Binds a purpose, a completion client and a capability registry:
//! - `execute`: ask for a plan, parse it, run it, return the state
//! - `chat`: plain question answering, no capabilities involved

use crate::capability::CapabilityRegistry;
use crate::client::{CompletionClient, ToolMode};
use crate::config::{AgentConfig, ToolModeSetting};
use crate::engine::execute_plan;
use crate::error::{AgentError, AgentResult};
use crate::message::{Content, Message, ResponseShape};
use crate::plan::parse_plan;
use crate::state::ExecutionState;
use crate::transport::{model_ids, OpenRouterTransport};
use std::sync::Arc;
use tracing::{debug, info};

pub struct Agent {
    purpose: String,
    client: CompletionClient,
    registry: CapabilityRegistry,
}

impl Agent {
    pub fn new(purpose: &str, client: CompletionClient, registry: CapabilityRegistry) -> Self {
        Self {
            purpose: purpose.to_string(),
            client,
            registry,
        }
    }

    /// Build an agent backed by OpenRouter
    ///
    /// Checks the configured model against the remote catalog. With
    /// `ToolModeSetting::Auto`, free models get the catalog in the prompt
    /// (they rarely support native tool calling) and the rest get native tools.
    pub async fn connect(config: &AgentConfig, purpose: &str, registry: CapabilityRegistry) -> AgentResult<Self> {
        let transport = OpenRouterTransport::from_config(config)?;
        let models = transport.models().await?;

        let model = models
            .iter()
            .find(|m| m.id == config.model)
            .ok_or_else(|| AgentError::UnknownModel {
                model: config.model.clone(),
                available: model_ids(&models).join(", "),
            })?;

        let tool_mode = match config.tool_mode {
            ToolModeSetting::Prompt => ToolMode::Prompt,
            ToolModeSetting::Native => ToolMode::Native,
            ToolModeSetting::Auto if model.is_free() => ToolMode::Prompt,
            ToolModeSetting::Auto => ToolMode::Native,
        };
        info!("Using the model {} ({:?} tool mode)", model.id, tool_mode);

        let client = CompletionClient::new(Arc::new(transport), &config.model)
            .with_retry(config.retry.clone())
            .with_tool_mode(tool_mode);

        Ok(Self::new(purpose, client, registry))
    }

    pub fn purpose(&self) -> &str {
        &self.purpose
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn client(&self) -> &CompletionClient {
        &self.client
    }

    fn conversation(&self, request: &str) -> Vec<Message> {
        vec![Message::system(self.purpose.as_str()), Message::user(request)]
    }

    /// Ask for a plan and run it
    pub async fn execute(&self, request: &str) -> AgentResult<ExecutionState> {
        let content = self
            .client
            .complete(&self.conversation(request), Some(&self.registry), ResponseShape::Dict)
            .await?;

        let raw = match content {
            Content::Dict(value) => value,
            other => serde_json::from_str(&other.as_text())?,
        };
        debug!("Plan received: {}", raw);

        let actions = parse_plan(&raw);
        Ok(execute_plan(&self.registry, &actions).await)
    }

    /// Answer directly, without planning
    pub async fn chat(&self, request: &str, shape: ResponseShape) -> AgentResult<Content> {
        self.client
            .complete(&self.conversation(request), None, shape)
            .await
    }
}
