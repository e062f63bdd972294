//! Capability Registry
//!
//! Locally implemented functions a plan may invoke:
//! - Explicit registration with a declarative parameter schema
//! - Catalog rendering in the OpenAI-style `tools` format
//! - Argument validation before invocation
//!
//! Registration happens once, when the agent is built. Nothing is discovered
//! at runtime.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Semantic type tag of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array,
    Any,
}

impl ParamType {
    /// Name used in the tool catalog
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Any => "any",
        }
    }

    /// Check a JSON value against this tag
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Any => true,
        }
    }
}

/// One named parameter of a capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

/// Declarative description of a capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySchema {
    /// Capability name (snake_case)
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// Parameters in declaration order
    pub params: Vec<ParamSpec>,
}

impl CapabilitySchema {
    /// Create a schema with no parameters
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params: vec![],
        }
    }

    /// Add a parameter; a repeated name replaces the earlier declaration
    pub fn with_param(mut self, name: &str, param_type: ParamType, description: &str, required: bool) -> Self {
        let param = ParamSpec {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required,
        };
        match self.params.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
        self
    }

    /// Add a string parameter
    pub fn with_string_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, ParamType::String, description, required)
    }

    /// Add a number parameter
    pub fn with_number_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, ParamType::Number, description, required)
    }

    /// Add a boolean parameter
    pub fn with_bool_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, ParamType::Boolean, description, required)
    }

    /// Add an array parameter
    pub fn with_array_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, ParamType::Array, description, required)
    }

    /// Add a parameter of any JSON type
    pub fn with_any_param(self, name: &str, description: &str, required: bool) -> Self {
        self.with_param(name, ParamType::Any, description, required)
    }

    /// Names of required parameters, in declaration order
    pub fn required(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Validate resolved arguments against the schema
    pub fn validate(&self, args: &Map<String, Value>) -> Result<()> {
        for param in &self.params {
            match args.get(&param.name) {
                None if param.required => {
                    return Err(anyhow!("Missing required parameter: {}", param.name));
                }
                Some(value) if !param.param_type.accepts(value) => {
                    return Err(anyhow!(
                        "Parameter '{}' has wrong type, expected {}",
                        param.name,
                        param.param_type.as_str()
                    ));
                }
                _ => {}
            }
        }

        if let Some(unknown) = args.keys().find(|k| !self.params.iter().any(|p| &p.name == *k)) {
            return Err(anyhow!("Unexpected parameter: {}", unknown));
        }

        Ok(())
    }

    /// Format as a tool definition (`{"type": "function", "function": {...}}`)
    pub fn to_tool_format(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    json!({
                        "type": p.param_type.as_str(),
                        "description": p.description,
                    }),
                )
            })
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": self.required(),
                }
            }
        })
    }
}

/// Future returned by a capability handler
pub type CapabilityFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;

/// Type alias for capability handler function
pub type CapabilityHandler = Arc<dyn Fn(Map<String, Value>) -> CapabilityFuture + Send + Sync>;

/// A registered capability with schema and handler
#[derive(Clone)]
pub struct Capability {
    pub schema: CapabilitySchema,
    handler: CapabilityHandler,
}

impl std::fmt::Debug for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capability").field("schema", &self.schema).finish()
    }
}

impl Capability {
    /// Create a capability from an async handler
    pub fn new<F, Fut>(schema: CapabilitySchema, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            schema,
            handler: Arc::new(move |args| -> CapabilityFuture { Box::pin(handler(args)) }),
        }
    }

    /// Create a capability from a plain function
    pub fn from_fn<F>(schema: CapabilitySchema, handler: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(schema, move |args| {
            let handler = handler.clone();
            async move { handler(args) }
        })
    }

    /// Capability name
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Validate then invoke
    pub async fn invoke(&self, args: Map<String, Value>) -> Result<Value> {
        self.schema.validate(&args)?;
        (self.handler)(args).await
    }
}

/// Registry of capabilities, keyed by name, in registration order
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: IndexMap<String, Capability>,
}

impl CapabilityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability; the last registration of a name wins and keeps its slot
    pub fn register(&mut self, capability: Capability) {
        let name = capability.schema.name.clone();
        info!("Registered capability: {}", name);
        self.capabilities.insert(name, capability);
    }

    /// Builder-style registration
    pub fn with(mut self, capability: Capability) -> Self {
        self.register(capability);
        self
    }

    /// Look up a capability by name
    pub fn resolve(&self, name: &str) -> Option<&Capability> {
        self.capabilities.get(name)
    }

    /// Number of registered capabilities
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capability names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.capabilities.keys().map(|s| s.as_str()).collect()
    }

    /// Schemas in registration order
    pub fn schemas(&self) -> Vec<&CapabilitySchema> {
        self.capabilities.values().map(|c| &c.schema).collect()
    }

    /// Tool definitions in registration order
    pub fn to_tool_format(&self) -> Vec<Value> {
        self.schemas().iter().map(|s| s.to_tool_format()).collect()
    }

    /// Pretty-printed catalog used in the planning prompt
    pub fn catalog_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_tool_format()).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_schema() -> CapabilitySchema {
        CapabilitySchema::new("echo", "Return the text").with_string_param("text", "Text to echo", true)
    }

    #[test]
    fn test_schema_creation() {
        let schema = CapabilitySchema::new("weather", "Get weather")
            .with_number_param("latitude", "location latitude", true)
            .with_number_param("longitude", "location longitude", true)
            .with_string_param("unit", "celsius or fahrenheit", false);

        assert_eq!(schema.params.len(), 3);
        assert_eq!(schema.required(), vec!["latitude", "longitude"]);
    }

    #[test]
    fn test_schema_validation() {
        let schema = echo_schema();

        let valid = serde_json::json!({"text": "hi"});
        assert!(schema.validate(valid.as_object().unwrap()).is_ok());

        let missing = Map::new();
        assert!(schema.validate(&missing).is_err());

        let wrong_type = serde_json::json!({"text": 3});
        assert!(schema.validate(wrong_type.as_object().unwrap()).is_err());

        let extra = serde_json::json!({"text": "hi", "loud": true});
        assert!(schema.validate(extra.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_tool_format() {
        let formatted = echo_schema().to_tool_format();
        assert_eq!(formatted["type"], "function");
        assert_eq!(formatted["function"]["name"], "echo");
        assert_eq!(formatted["function"]["parameters"]["properties"]["text"]["type"], "string");
        assert_eq!(formatted["function"]["parameters"]["required"], serde_json::json!(["text"]));
    }

    #[test]
    fn test_registry_order_and_overwrite() {
        let mut registry = CapabilityRegistry::new();
        registry.register(Capability::from_fn(echo_schema(), |_| Ok(Value::Null)));
        registry.register(Capability::from_fn(CapabilitySchema::new("noop", "Nothing"), |_| Ok(Value::Null)));
        registry.register(Capability::from_fn(
            CapabilitySchema::new("echo", "Replaced"),
            |_| Ok(Value::Null),
        ));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["echo", "noop"]);
        assert_eq!(registry.resolve("echo").unwrap().schema.description, "Replaced");
        assert!(registry.resolve("missing").is_none());
    }

    #[tokio::test]
    async fn test_invoke_validates() {
        let cap = Capability::from_fn(echo_schema(), |args| Ok(args["text"].clone()));

        let ok = cap.invoke(serde_json::json!({"text": "hello"}).as_object().unwrap().clone()).await;
        assert_eq!(ok.unwrap(), Value::String("hello".to_string()));

        let err = cap.invoke(Map::new()).await;
        assert!(err.unwrap_err().to_string().contains("Missing required parameter"));
    }
}
