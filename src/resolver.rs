//! Dependency Resolver
//!
//! Rewrites argument values that reference earlier actions with `$<id>`:
//! - `"$k"` alone is replaced by the stored result of `k`, verbatim
//! - References embedded in an arithmetic/concatenation expression
//!   (`"$1 + 10"`) are evaluated with the safe sublanguage in [`crate::expr`]
//! - References embedded in any other text are interpolated
//!
//! Values without a reference to the current plan pass through unchanged.

use crate::expr::{self, ExprError};
use crate::state::ExecutionState;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::ops::Range;
use thiserror::Error;

static WHOLE_REFERENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$([A-Za-z0-9_-]+)$").unwrap());

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("arguments must be a JSON object, got {0}")]
    NotAnObject(String),

    #[error("reference ${0} does not name an action of this plan")]
    UnknownReference(String),

    #[error("reference ${0} points to an action that has not run yet")]
    NotYetAvailable(String),

    #[error("reference ${0} points to an action without a result")]
    NoResult(String),

    #[error("cannot evaluate '{value}': {source}")]
    Expression { value: String, source: ExprError },
}

/// Resolves references against the state of the current run
pub struct DependencyResolver<'a> {
    plan_ids: &'a HashSet<String>,
    state: &'a ExecutionState,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(plan_ids: &'a HashSet<String>, state: &'a ExecutionState) -> Self {
        Self { plan_ids, state }
    }

    /// Resolve an action's raw arguments into an argument map
    pub fn resolve_arguments(&self, arguments: &Value) -> Result<Map<String, Value>, ResolveError> {
        let obj = match arguments {
            Value::Object(obj) => obj,
            Value::String(raw) => return Err(ResolveError::NotAnObject(format!("unparsed text '{}'", raw))),
            other => return Err(ResolveError::NotAnObject(other.to_string())),
        };

        obj.iter()
            .map(|(key, value)| Ok::<_, ResolveError>((key.clone(), self.resolve_value(value)?)))
            .collect()
    }

    pub fn resolve_value(&self, value: &Value) -> Result<Value, ResolveError> {
        match value {
            Value::String(s) => self.resolve_string(s),
            Value::Array(items) => items
                .iter()
                .map(|v| self.resolve_value(v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(obj) => obj
                .iter()
                .map(|(k, v)| Ok::<_, ResolveError>((k.clone(), self.resolve_value(v)?)))
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, text: &str) -> Result<Value, ResolveError> {
        if let Some(id) = text.strip_prefix('$') {
            if self.plan_ids.contains(id) || WHOLE_REFERENCE.is_match(text) {
                return self.lookup(id);
            }
        }

        let references = self.references(text);
        if references.is_empty() {
            return Ok(Value::String(text.to_string()));
        }

        match expr::lex(text, |id| self.plan_ids.contains(id)) {
            Some(tokens) => expr::evaluate(&tokens, |id| {
                self.lookup(id).map_err(|e| ExprError::Reference {
                    id: id.to_string(),
                    reason: e.to_string(),
                })
            })
            .map_err(|source| ResolveError::Expression {
                value: text.to_string(),
                source,
            }),
            None => self.interpolate(text, &references).map(Value::String),
        }
    }

    /// Plan references embedded in `text`: byte range of `$<id>` and the id
    fn references<'t>(&self, text: &'t str) -> Vec<(Range<usize>, &'t str)> {
        let mut found = Vec::new();
        let mut next = 0;

        for (pos, _) in text.match_indices('$') {
            if pos < next {
                continue;
            }
            let start = pos + 1;
            if let Some(len) = expr::reference_len(&text[start..], |id| self.plan_ids.contains(id)) {
                next = start + len;
                found.push((pos..next, &text[start..next]));
            }
        }

        found
    }

    /// Replace plan references inside free text with their rendered results
    fn interpolate(&self, text: &str, references: &[(Range<usize>, &str)]) -> Result<String, ResolveError> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;

        for (range, id) in references {
            out.push_str(&text[last..range.start]);
            out.push_str(&render(&self.lookup(id)?));
            last = range.end;
        }

        out.push_str(&text[last..]);
        Ok(out)
    }

    fn lookup(&self, id: &str) -> Result<Value, ResolveError> {
        match self.state.get(id) {
            Some(record) => record
                .result
                .clone()
                .ok_or_else(|| ResolveError::NoResult(id.to_string())),
            None if self.plan_ids.contains(id) => Err(ResolveError::NotYetAvailable(id.to_string())),
            None => Err(ResolveError::UnknownReference(id.to_string())),
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Action;
    use crate::state::{ActionRecord, ActionStatus};
    use serde_json::json;

    fn fixture() -> (HashSet<String>, ExecutionState) {
        let ids: HashSet<String> = ["1", "2", "3", "4"].iter().map(|s| s.to_string()).collect();
        let mut state = ExecutionState::new();
        let mut done = ActionRecord::waiting(Action::new("1", "add", json!({})));
        done.status = ActionStatus::Success;
        done.result = Some(json!(5));
        state.insert(done);

        let mut city = ActionRecord::waiting(Action::new("2", "city", json!({})));
        city.status = ActionStatus::Success;
        city.result = Some(json!({"name": "Paris"}));
        state.insert(city);

        let mut failed = ActionRecord::waiting(Action::new("3", "boom", json!({})));
        failed.status = ActionStatus::ExecutionError;
        state.insert(failed);
        (ids, state)
    }

    #[test]
    fn test_whole_reference_is_verbatim() {
        let (ids, state) = fixture();
        let resolver = DependencyResolver::new(&ids, &state);

        let args = resolver.resolve_arguments(&json!({"n": "$1", "city": "$2", "k": 7})).unwrap();
        assert_eq!(args["n"], json!(5));
        assert_eq!(args["city"], json!({"name": "Paris"}));
        assert_eq!(args["k"], json!(7));
    }

    #[test]
    fn test_literals_pass_through() {
        let (ids, state) = fixture();
        let resolver = DependencyResolver::new(&ids, &state);

        let args = resolver
            .resolve_arguments(&json!({"a": "plain", "b": "costs $99", "c": "2 + 3"}))
            .unwrap();
        assert_eq!(args["a"], "plain");
        assert_eq!(args["b"], "costs $99");
        assert_eq!(args["c"], "2 + 3");
    }

    #[test]
    fn test_embedded_expression_and_template() {
        let (ids, state) = fixture();
        let resolver = DependencyResolver::new(&ids, &state);

        let args = resolver
            .resolve_arguments(&json!({
                "sum": "$1 + 10",
                "text": "Total is $1 units, city $2",
                "nested": ["$1", {"deep": "$1 * 2"}]
            }))
            .unwrap();
        assert_eq!(args["sum"], json!(15));
        assert_eq!(args["text"], json!("Total is 5 units, city {\"name\":\"Paris\"}"));
        assert_eq!(args["nested"], json!([5, {"deep": 10}]));
    }

    #[test]
    fn test_unresolvable_references() {
        let (ids, state) = fixture();
        let resolver = DependencyResolver::new(&ids, &state);

        assert_eq!(
            resolver.resolve_arguments(&json!({"x": "$4"})),
            Err(ResolveError::NotYetAvailable("4".to_string()))
        );
        assert_eq!(
            resolver.resolve_arguments(&json!({"x": "$3"})),
            Err(ResolveError::NoResult("3".to_string()))
        );
        assert_eq!(
            resolver.resolve_arguments(&json!({"x": "$42"})),
            Err(ResolveError::UnknownReference("42".to_string()))
        );
        assert!(matches!(
            resolver.resolve_arguments(&json!({"x": "$2 + 1"})),
            Err(ResolveError::Expression { .. })
        ));
        assert!(matches!(
            resolver.resolve_arguments(&json!({"x": "value of $4"})),
            Err(ResolveError::NotYetAvailable(_))
        ));
    }

    #[test]
    fn test_hyphenated_and_dotted_ids() {
        let ids: HashSet<String> = ["step-1", "step-2", "fetch.city", "step"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut state = ExecutionState::new();
        for (id, result) in [("step-1", json!(5)), ("fetch.city", json!("Paris")), ("step", json!(1))] {
            let mut record = ActionRecord::waiting(Action::new(id, "x", json!({})));
            record.status = ActionStatus::Success;
            record.result = Some(result);
            state.insert(record);
        }
        let resolver = DependencyResolver::new(&ids, &state);

        let args = resolver
            .resolve_arguments(&json!({
                "whole": "$step-1",
                "dotted": "$fetch.city",
                "sum": "$step-1 + 10",
                "short": "$step + 1",
                "text": "Weather in $fetch.city, total $step-1.",
                "cost": "costs $5.00"
            }))
            .unwrap();
        assert_eq!(args["whole"], json!(5));
        assert_eq!(args["dotted"], json!("Paris"));
        assert_eq!(args["sum"], json!(15));
        assert_eq!(args["short"], json!(2));
        assert_eq!(args["text"], json!("Weather in Paris, total 5."));
        assert_eq!(args["cost"], json!("costs $5.00"));

        assert_eq!(
            resolver.resolve_arguments(&json!({"x": "$step-2"})),
            Err(ResolveError::NotYetAvailable("step-2".to_string()))
        );
        assert_eq!(
            resolver.resolve_arguments(&json!({"x": "$step-9"})),
            Err(ResolveError::UnknownReference("step-9".to_string()))
        );
    }

    #[test]
    fn test_arguments_must_be_object() {
        let (ids, state) = fixture();
        let resolver = DependencyResolver::new(&ids, &state);

        assert!(matches!(
            resolver.resolve_arguments(&json!("{broken")),
            Err(ResolveError::NotAnObject(_))
        ));
        assert!(matches!(resolver.resolve_arguments(&json!([1])), Err(ResolveError::NotAnObject(_))));
    }
}
