//! Execution Engine
//!
//! Runs a parsed plan against the capability registry, one action at a time
//! and strictly in plan order. Each action ends in exactly one terminal
//! status; a failing action never stops the actions after it.

use crate::capability::CapabilityRegistry;
use crate::plan::Action;
use crate::resolver::DependencyResolver;
use crate::state::{ActionRecord, ActionStatus, ExecutionState};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, error, info};

/// Values that carry nothing worth passing on to later actions
pub fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Execute `actions` in order and return the state of the run
pub async fn execute_plan(registry: &CapabilityRegistry, actions: &[Action]) -> ExecutionState {
    let mut state = ExecutionState::new();
    let plan_ids: HashSet<String> = actions.iter().map(|a| a.id.clone()).collect();

    for action in actions {
        state.insert(ActionRecord::waiting(action.clone()));
        let started = Instant::now();

        let (status, result, message) = run_action(registry, &plan_ids, &state, action).await;

        if let Some(record) = state.get_mut(&action.id) {
            record.status = status;
            record.result = result;
            record.error = message;
            record.duration_ms = started.elapsed().as_millis() as u64;
        }
    }

    info!(
        "Plan finished: {} actions, {} failed",
        state.len(),
        state.failures().len()
    );
    state
}

async fn run_action(
    registry: &CapabilityRegistry,
    plan_ids: &HashSet<String>,
    state: &ExecutionState,
    action: &Action,
) -> (ActionStatus, Option<Value>, Option<String>) {
    let arguments = match DependencyResolver::new(plan_ids, state).resolve_arguments(&action.arguments) {
        Ok(arguments) => arguments,
        Err(e) => {
            error!(
                "Failed to parse function call arguments: action={}, function={}, arguments={}, error={}",
                action.id, action.name, action.arguments, e
            );
            return (ActionStatus::ArgumentError, None, Some(e.to_string()));
        }
    };

    let capability = match registry.resolve(&action.name) {
        Some(capability) => capability,
        None => {
            error!("Function {} not implemented (action {})", action.name, action.id);
            return (
                ActionStatus::UnknownCapability,
                None,
                Some(format!("Unknown capability: {}", action.name)),
            );
        }
    };

    match capability.invoke(arguments).await {
        Ok(value) if is_empty_result(&value) => {
            debug!("Function {} returned no result (action {})", action.name, action.id);
            (ActionStatus::Success, None, None)
        }
        Ok(value) => {
            debug!("Result from {}: {}", action.name, value);
            (ActionStatus::Success, Some(value), None)
        }
        Err(e) => {
            error!(
                "Failed to call function: action={}, function={}, error={:#}",
                action.id, action.name, e
            );
            (ActionStatus::ExecutionError, None, Some(format!("{:#}", e)))
        }
    }
}
