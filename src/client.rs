//! Remote Completion Client
//!
//! Turns a conversation into content of a requested shape:
//! - Seeds the conversation with the capability catalog when planning
//! - Extracts `content` / `tool_calls` from the response envelope
//! - Strips code fences and deserializes JSON shapes
//! - Retries empty or mis-shaped output, aborts on an explicit remote error

use crate::capability::CapabilityRegistry;
use crate::error::{AgentError, AgentResult};
use crate::message::{Content, Message, ResponseShape, Role};
use crate::retry::RetryPolicy;
use crate::transport::{CompletionRequest, CompletionTransport};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Output grammar appended to the request when capabilities are offered
pub const PLAN_DIRECTIVE: &str = r#"Based on the tools provided in the **Tools Description**, respond *only* with a sequence of function calls structured as an array of objects in the following **json** format:
[{
    "id": <unique_id>,
    "type": "function",
    "function": {
        "name": <function_name>,
        "arguments": <arguments_in_json_format>
    }
}]
If a function produces a result that a later function requires, reference that result with the "$id" syntax, where id is the unique identifier of the earlier function call.
"#;

/// How the capability catalog is delivered to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// Catalog and directive appended to the last user message
    #[default]
    Prompt,
    /// Catalog sent in the request's `tools` field
    Native,
}

/// Content and tool calls extracted from one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteReply {
    pub content: String,
    pub tool_calls: Vec<Value>,
}

impl RemoteReply {
    /// Read the response envelope; an `error` field is fatal
    pub fn from_response(response: &Value) -> AgentResult<Self> {
        if let Some(err) = response.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .unwrap_or_else(|| err.to_string());
            return Err(AgentError::Remote(message));
        }

        let message = response.pointer("/choices/0/message");
        if message.is_none() {
            warn!("Response carries no choices, treating as empty");
        }

        let content = message
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .unwrap_or_default()
            .to_string();

        let tool_calls = message
            .and_then(|m| m.get("tool_calls"))
            .and_then(|t| t.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(Self { content, tool_calls })
    }
}

/// Remove markdown code fences around a JSON payload
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Coerce a reply into the requested shape; `None` means "ask again"
pub fn shape_reply(reply: RemoteReply, shape: ResponseShape) -> Option<Content> {
    match shape {
        ResponseShape::Text => {
            if reply.content.trim().is_empty() {
                None
            } else {
                Some(Content::Text(reply.content))
            }
        }
        ResponseShape::Json => {
            let stripped = strip_code_fences(&reply.content);
            if stripped.is_empty() {
                return None;
            }
            match serde_json::from_str::<Value>(stripped) {
                Ok(_) => Some(Content::Json(stripped.to_string())),
                Err(e) => {
                    warn!("Failed to convert content to json format: {}", e);
                    None
                }
            }
        }
        ResponseShape::Dict => {
            let parsed = match strip_code_fences(&reply.content) {
                "" => None,
                stripped => match serde_json::from_str::<Value>(stripped) {
                    Ok(value) => Some(value),
                    Err(e) if reply.tool_calls.is_empty() => {
                        warn!("Failed to convert content to dict format: {}", e);
                        None
                    }
                    Err(_) => {
                        debug!("Content is not a plan, falling back to native tool calls");
                        None
                    }
                },
            };

            match parsed {
                Some(value) => Some(Content::Dict(value)),
                None if reply.tool_calls.is_empty() => None,
                None => {
                    debug!("Using {} native tool calls as plan", reply.tool_calls.len());
                    Some(Content::Dict(Value::Array(reply.tool_calls)))
                }
            }
        }
    }
}

/// Completion client with retry
#[derive(Clone)]
pub struct CompletionClient {
    transport: Arc<dyn CompletionTransport>,
    model: String,
    retry: RetryPolicy,
    tool_mode: ToolMode,
}

impl CompletionClient {
    pub fn new(transport: Arc<dyn CompletionTransport>, model: &str) -> Self {
        Self {
            transport,
            model: model.to_string(),
            retry: RetryPolicy::default(),
            tool_mode: ToolMode::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_tool_mode(mut self, mode: ToolMode) -> Self {
        self.tool_mode = mode;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn tool_mode(&self) -> ToolMode {
        self.tool_mode
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Build the request, seeding it with the catalog if capabilities are given
    pub fn build_request(
        &self,
        conversation: &[Message],
        capabilities: Option<&CapabilityRegistry>,
    ) -> CompletionRequest {
        let mut messages = conversation.to_vec();
        let mut tools = None;

        if let Some(registry) = capabilities {
            match self.tool_mode {
                ToolMode::Prompt => {
                    let block = format!(
                        "\n\n{}### Tools Description\n{}",
                        PLAN_DIRECTIVE,
                        registry.catalog_json()
                    );
                    match messages.iter().rposition(|m| m.role == Role::User) {
                        Some(idx) => messages[idx].content.push_str(&block),
                        None => messages.push(Message::user(block.trim_start())),
                    }
                }
                ToolMode::Native => tools = Some(registry.to_tool_format()),
            }
        }

        CompletionRequest {
            model: self.model.clone(),
            messages,
            stream: false,
            tools,
        }
    }

    /// Ask until content of the requested shape arrives
    pub async fn complete(
        &self,
        conversation: &[Message],
        capabilities: Option<&CapabilityRegistry>,
        shape: ResponseShape,
    ) -> AgentResult<Content> {
        let request = self.build_request(conversation, capabilities);
        debug!(
            "Completion request: {}",
            serde_json::to_string(&request.messages).unwrap_or_default()
        );

        let mut attempts = 0;
        loop {
            attempts += 1;
            let response = self.transport.send(&request).await?;
            let reply = RemoteReply::from_response(&response)?;

            if let Some(content) = shape_reply(reply, shape) {
                if attempts > 1 {
                    info!("Usable response after {} attempts", attempts);
                }
                return Ok(content);
            }

            if !self.retry.should_retry(attempts) {
                warn!("Giving up after {} attempts", attempts);
                return Err(AgentError::RetriesExhausted { attempts });
            }

            let delay = self.retry.delay_for_retry(attempts - 1);
            debug!("Empty or mis-shaped response, retrying in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{Capability, CapabilitySchema};
    use serde_json::json;

    fn registry() -> CapabilityRegistry {
        CapabilityRegistry::new().with(Capability::from_fn(
            CapabilitySchema::new("echo", "Return the text").with_string_param("text", "Text", true),
            |args| Ok(args["text"].clone()),
        ))
    }

    struct NeverCalled;

    #[async_trait::async_trait]
    impl CompletionTransport for NeverCalled {
        async fn send(&self, _request: &CompletionRequest) -> AgentResult<Value> {
            Err(AgentError::Config("transport should not be called".to_string()))
        }
    }

    fn client(mode: ToolMode) -> CompletionClient {
        CompletionClient::new(Arc::new(NeverCalled), "test-model").with_tool_mode(mode)
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  [3] "), "[3]");
    }

    #[test]
    fn test_reply_error_envelope() {
        let response = json!({"error": {"message": "rate limited", "code": 429}});
        match RemoteReply::from_response(&response) {
            Err(AgentError::Remote(msg)) => assert_eq!(msg, "rate limited"),
            other => panic!("expected remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_extracts_content_and_tool_calls() {
        let response = json!({"choices": [{"message": {
            "content": "hello",
            "tool_calls": [{"id": "a", "type": "function", "function": {"name": "echo", "arguments": "{}"}}]
        }}]});
        let reply = RemoteReply::from_response(&response).unwrap();
        assert_eq!(reply.content, "hello");
        assert_eq!(reply.tool_calls.len(), 1);

        let null_content = json!({"choices": [{"message": {"content": null}}]});
        assert_eq!(RemoteReply::from_response(&null_content).unwrap(), RemoteReply::default());
    }

    #[test]
    fn test_shape_reply() {
        let text = |s: &str| RemoteReply { content: s.to_string(), tool_calls: vec![] };

        assert_eq!(shape_reply(text(""), ResponseShape::Text), None);
        assert_eq!(shape_reply(text("hi"), ResponseShape::Text), Some(Content::Text("hi".to_string())));
        assert_eq!(shape_reply(text("not json"), ResponseShape::Json), None);
        assert_eq!(
            shape_reply(text("```json\n{\"a\": 1}\n```"), ResponseShape::Json),
            Some(Content::Json("{\"a\": 1}".to_string()))
        );
        assert_eq!(
            shape_reply(text("[{\"id\": 1}]"), ResponseShape::Dict),
            Some(Content::Dict(json!([{"id": 1}])))
        );
    }

    #[test]
    fn test_dict_falls_back_to_tool_calls() {
        let reply = RemoteReply {
            content: String::new(),
            tool_calls: vec![json!({"id": "1", "function": {"name": "echo"}})],
        };
        match shape_reply(reply, ResponseShape::Dict) {
            Some(Content::Dict(Value::Array(calls))) => assert_eq!(calls.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dict_prefers_tool_calls_over_preamble() {
        let call = json!({"id": "1", "type": "function", "function": {"name": "echo", "arguments": "{}"}});
        let reply = RemoteReply {
            content: "Let me compute that for you.".to_string(),
            tool_calls: vec![call.clone()],
        };
        assert_eq!(
            shape_reply(reply, ResponseShape::Dict),
            Some(Content::Dict(json!([call])))
        );

        let no_calls = RemoteReply {
            content: "Let me compute that for you.".to_string(),
            tool_calls: vec![],
        };
        assert_eq!(shape_reply(no_calls, ResponseShape::Dict), None);
    }

    #[test]
    fn test_prompt_mode_appends_catalog_to_last_user_message() {
        let conversation = vec![
            Message::system("purpose"),
            Message::user("first"),
            Message::assistant("ok"),
            Message::user("second"),
        ];
        let registry = registry();
        let request = client(ToolMode::Prompt).build_request(&conversation, Some(&registry));

        assert!(request.tools.is_none());
        assert_eq!(request.messages[1].content, "first");
        let last = &request.messages[3].content;
        assert!(last.starts_with("second"));
        assert!(last.contains(PLAN_DIRECTIVE));
        assert!(last.contains("### Tools Description"));
        assert!(last.contains("\"name\": \"echo\""));
    }

    #[test]
    fn test_native_mode_sends_tools() {
        let conversation = vec![Message::user("go")];
        let registry = registry();
        let request = client(ToolMode::Native).build_request(&conversation, Some(&registry));

        assert_eq!(request.messages[0].content, "go");
        assert_eq!(request.tools.unwrap()[0]["function"]["name"], "echo");
    }

    #[test]
    fn test_no_capabilities_leaves_conversation_untouched() {
        let conversation = vec![Message::system("p"), Message::user("q")];
        let request = client(ToolMode::Prompt).build_request(&conversation, None);
        assert_eq!(request.messages, conversation);
        assert!(request.tools.is_none());
    }
}
