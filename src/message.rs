//! Conversation messages and response shapes

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Shape the caller wants the remote output in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    /// Free text, returned as-is
    #[default]
    Text,
    /// JSON text with code fences stripped, validated to deserialize
    Json,
    /// Deserialized JSON value
    Dict,
}

/// Completion content in the requested shape
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Json(String),
    Dict(Value),
}

impl Content {
    /// Text form of the content, whatever the shape
    pub fn as_text(&self) -> String {
        match self {
            Content::Text(s) | Content::Json(s) => s.clone(),
            Content::Dict(v) => v.to_string(),
        }
    }

    /// Structured form of the content, if it has one
    pub fn into_value(self) -> Option<Value> {
        match self {
            Content::Text(_) => None,
            Content::Json(s) => serde_json::from_str(&s).ok(),
            Content::Dict(v) => Some(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::system("be helpful");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be helpful"}));
    }

    #[test]
    fn test_content_conversions() {
        let dict = Content::Dict(serde_json::json!([1, 2]));
        assert_eq!(dict.as_text(), "[1,2]");

        let json = Content::Json("{\"a\": 1}".to_string());
        assert_eq!(json.into_value(), Some(serde_json::json!({"a": 1})));

        assert!(Content::Text("hi".to_string()).into_value().is_none());
    }
}
