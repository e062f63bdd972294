//! Execution State
//!
//! Per-run record of every action in a plan, keyed by action id and kept in
//! plan order. A fresh state is built for each run and handed to the caller.

use crate::plan::Action;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Created, not yet finished
    Waiting,
    /// Ran without error
    Success,
    /// Arguments could not be resolved
    ArgumentError,
    /// The capability returned an error
    ExecutionError,
    /// No capability with that name
    UnknownCapability,
}

impl ActionStatus {
    /// Numeric status code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Waiting => 1,
            Self::ArgumentError => 2,
            Self::ExecutionError => 3,
            Self::UnknownCapability => 4,
        }
    }

    /// Argument, execution or lookup failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::ArgumentError | Self::ExecutionError | Self::UnknownCapability
        )
    }
}

/// Record of one action for the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action: Action,
    pub result: Option<Value>,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ActionRecord {
    /// Fresh record for an action that has not run yet
    pub fn waiting(action: Action) -> Self {
        Self {
            action,
            result: None,
            status: ActionStatus::Waiting,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Action id -> record, in plan order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExecutionState {
    records: IndexMap<String, ActionRecord>,
}

impl ExecutionState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for its action id; a replaced record keeps its position
    pub fn insert(&mut self, record: ActionRecord) {
        self.records.insert(record.action.id.clone(), record);
    }

    /// Record for an action id
    pub fn get(&self, id: &str) -> Option<&ActionRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ActionRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Status of an action, if it has a record
    pub fn status(&self, id: &str) -> Option<ActionStatus> {
        self.records.get(id).map(|r| r.status)
    }

    /// Stored result of an action
    pub fn result(&self, id: &str) -> Option<&Value> {
        self.records.get(id).and_then(|r| r.result.as_ref())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Action ids in plan order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|s| s.as_str())
    }

    /// Records in plan order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionRecord)> {
        self.records.iter().map(|(id, r)| (id.as_str(), r))
    }

    /// Every record ended in success
    pub fn all_succeeded(&self) -> bool {
        self.records.values().all(|r| r.status == ActionStatus::Success)
    }

    /// Ids of failed actions, in plan order
    pub fn failures(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, r)| r.status.is_failure())
            .map(|(id, _)| id)
            .collect()
    }

    /// Result of the last action that stored one
    pub fn final_result(&self) -> Option<&Value> {
        self.records.values().rev().find_map(|r| r.result.as_ref())
    }
}
