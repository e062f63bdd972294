//! Plan Parser
//!
//! Wire format: `[{id, type: "function", function: {name, arguments}}]`.
//! A malformed batch yields an empty plan; problems inside a single action's
//! arguments are left for the engine to report.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One planned capability invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    /// Capability name
    pub name: String,
    /// Arguments as received; normally an object
    pub arguments: Value,
}

impl Action {
    pub fn new(id: &str, name: &str, arguments: Value) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    /// Back to the wire format
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "type": "function",
            "function": {
                "name": self.name,
                "arguments": self.arguments,
            }
        })
    }
}

/// Parse raw plan content into ordered actions
pub fn parse_plan(raw: &Value) -> Vec<Action> {
    let items: Vec<&Value> = match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(obj) if obj.contains_key("function") => vec![raw],
        Value::String(s) => {
            return match serde_json::from_str::<Value>(s) {
                Ok(decoded @ (Value::Array(_) | Value::Object(_))) => parse_plan(&decoded),
                _ => {
                    warn!("Plan is a string that does not decode to a plan: {}", s);
                    vec![]
                }
            };
        }
        other => {
            warn!("Error parsing plan: expected an array of actions, got {}", other);
            return vec![];
        }
    };

    let mut actions = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match parse_action(item, index) {
            Some(action) => actions.push(action),
            None => {
                warn!("Error parsing plan: element {} is not an action object: {}", index, item);
                return vec![];
            }
        }
    }

    let mut seen = HashSet::new();
    if let Some(dup) = actions.iter().find(|a| !seen.insert(a.id.as_str())) {
        warn!("Error parsing plan: duplicate action id '{}', rejecting plan", dup.id);
        return vec![];
    }

    debug!("Parsed plan with {} actions", actions.len());
    actions
}

fn parse_action(item: &Value, index: usize) -> Option<Action> {
    let obj = item.as_object()?;

    let id = match obj.get("id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => (index + 1).to_string(),
    };

    let function = obj.get("function").and_then(|f| f.as_object());

    let name = function
        .and_then(|f| f.get("name"))
        .and_then(|n| n.as_str())
        .unwrap_or_default()
        .to_string();

    let arguments = match function.and_then(|f| f.get("arguments")) {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(Value::String(s)) => decode_arguments(s),
        Some(other) => other.clone(),
    };

    Some(Action { id, name, arguments })
}

/// Decode string-encoded arguments once; keep the raw string on failure
fn decode_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!("Arguments are not valid JSON ({}), keeping raw string", e);
            Value::String(raw.to_string())
        }
    }
}
