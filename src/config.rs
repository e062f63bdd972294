//! Configuration management

use crate::error::{AgentError, AgentResult};
use crate::retry::RetryPolicy;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "deepseek/deepseek-chat:free";

/// How the capability catalog reaches the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolModeSetting {
    /// Prompt for free models, native otherwise (needs the model catalog)
    #[default]
    Auto,
    Prompt,
    Native,
}

impl FromStr for ToolModeSetting {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "prompt" => Ok(Self::Prompt),
            "native" => Ok(Self::Native),
            other => Err(AgentError::Config(format!(
                "invalid tool mode '{}', expected auto, prompt or native",
                other
            ))),
        }
    }
}

/// Agent configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// OpenRouter API key
    pub api_key: String,

    /// Completion service base URL
    pub base_url: String,

    /// Model identifier
    pub model: String,

    /// Retry policy for empty or mis-shaped responses
    pub retry: RetryPolicy,

    /// Tool catalog delivery
    pub tool_mode: ToolModeSetting,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl AgentConfig {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
            tool_mode: ToolModeSetting::default(),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> AgentResult<Self> {
        Self::from_env_with_key(None)
    }

    /// Load from the environment; an explicit key overrides `OPENROUTER_API_KEY`
    pub fn from_env_with_key(api_key: Option<&str>) -> AgentResult<Self> {
        let api_key = match api_key {
            Some(key) => key.to_string(),
            None => std::env::var("OPENROUTER_API_KEY")
                .map_err(|_| AgentError::Config("Provide OPENROUTER_API_KEY".to_string()))?,
        };

        let mut config = Self::new(&api_key);

        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Ok(model) = std::env::var("TOOLPLAN_MODEL") {
            config.model = model;
        }

        if let Some(secs) = env_parse::<u64>("TOOLPLAN_RETRY_DELAY_SECS")? {
            config.retry.delay = Duration::from_secs(secs);
        }

        if let Some(max) = env_parse::<usize>("TOOLPLAN_MAX_ATTEMPTS")? {
            config.retry.max_attempts = if max == 0 { None } else { Some(max) };
        }

        if let Ok(mode) = std::env::var("TOOLPLAN_TOOL_MODE") {
            config.tool_mode = mode.parse()?;
        }

        if let Some(secs) = env_parse::<u64>("TOOLPLAN_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tool_mode(mut self, mode: ToolModeSetting) -> Self {
        self.tool_mode = mode;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> AgentResult<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AgentError::Config(format!("{} has invalid value '{}'", key, raw))),
        Err(_) => Ok(None),
    }
}
