//! # Rules Module
//!
//! Task rules, their groups, and the matcher that picks one rule per file.
//!
//! ## Selection
//! A rule is a candidate for a file when it is enabled, its group is enabled,
//! its source scope contains the file, its match expression matches the file
//! name, and its filter (if any) accepts the file. The winner is the candidate
//! with the smallest `(priority, created_at, id)`.

mod matcher;
pub mod pattern;

pub use matcher::{CompiledRule, RuleError, RuleMatcher, RuleSnapshot, SnapshotSettings};
pub use pattern::NamePattern;

use crate::core::filter::FilterDefinition;
use crate::core::organize::{ConflictPolicy, OperationMode};
use crate::core::scanner::Scope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default rule priority; lower values win
pub const DEFAULT_PRIORITY: i32 = 5;

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

fn default_enabled() -> bool {
    true
}

/// A named, toggleable collection of rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskGroup {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<TaskRule>,
}

/// One organization rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRule {
    pub id: u64,
    pub name: String,
    /// Match expression; see [`pattern`] for the literal grammar
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    pub source: Scope,
    /// Folder for move/copy, name template for rename, unused for delete
    #[serde(default)]
    pub destination: Option<PathBuf>,
    #[serde(default)]
    pub operation: OperationMode,
    /// Falls back to the configured default when absent
    #[serde(default)]
    pub conflict_policy: Option<ConflictPolicy>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub filter: Option<FilterDefinition>,
    /// Reserved for cross-rule associations; not evaluated
    #[serde(default)]
    pub is_related: bool,
}

impl TaskRule {
    /// A rule with defaults for everything but the essentials
    pub fn new(
        id: u64,
        name: impl Into<String>,
        pattern: impl Into<String>,
        source: Scope,
        operation: OperationMode,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            pattern: pattern.into(),
            is_regex: false,
            source,
            destination: None,
            operation,
            conflict_policy: None,
            enabled: true,
            priority: DEFAULT_PRIORITY,
            created_at: Utc::now(),
            filter: None,
            is_related: false,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = Some(policy);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_filter(mut self, filter: FilterDefinition) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn regex(mut self) -> Self {
        self.is_regex = true;
        self
    }

    /// Ordering key used to break ties between matching rules
    pub fn precedence(&self) -> (i32, DateTime<Utc>, u64) {
        (self.priority, self.created_at, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_defaults_from_json() {
        let rule: TaskRule = serde_json::from_str(
            r#"{
                "id": 7,
                "name": "pdfs",
                "pattern": "*.pdf",
                "source": { "path": "/in" },
                "destination": "/out"
            }"#,
        )
        .unwrap();

        assert_eq!(rule.priority, DEFAULT_PRIORITY);
        assert!(rule.enabled);
        assert_eq!(rule.operation, OperationMode::Move);
        assert!(rule.conflict_policy.is_none());
        assert!(!rule.source.include_subfolders);
    }

    #[test]
    fn precedence_orders_by_priority_then_time_then_id() {
        let scope = Scope::flat("/in");
        let early = TaskRule::new(9, "a", "*", scope.clone(), OperationMode::Move);
        let mut late = TaskRule::new(1, "b", "*", scope, OperationMode::Move);
        late.created_at = early.created_at + chrono::Duration::seconds(1);

        assert!(early.precedence() < late.precedence());
        assert!(late.clone().with_priority(1).precedence() < early.precedence());
    }
}
