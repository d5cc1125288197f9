//! Rule compilation and selection.

use super::{NamePattern, TaskGroup, TaskRule};
use crate::core::filter::{FilterPredicate, FilterPredicateBuilder, DEFAULT_CONTENT_READ_LIMIT};
use crate::core::organize::{ConflictPolicy, OperationMode};
use crate::core::scanner::{FileMetadata, Scope};
use crate::error::ConfigError;
use serde::Serialize;
use std::time::SystemTime;
use tracing::{debug, warn};

/// Settings applied while compiling a snapshot
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub content_read_limit: usize,
    pub default_conflict_policy: ConflictPolicy,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            content_read_limit: DEFAULT_CONTENT_READ_LIMIT,
            default_conflict_policy: ConflictPolicy::Skip,
        }
    }
}

/// A rule with its pattern and filter compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub rule: TaskRule,
    pub group: String,
    /// Rule and group are both enabled
    pub active: bool,
    /// Effective policy after applying the default
    pub conflict_policy: ConflictPolicy,
    pattern: NamePattern,
    filter: FilterPredicate,
}

impl CompiledRule {
    pub fn id(&self) -> u64 {
        self.rule.id
    }

    pub fn operation(&self) -> OperationMode {
        self.rule.operation
    }

    /// Check every selection criterion except the enabled flags
    pub fn applies_to(&self, file: &FileMetadata, now: SystemTime) -> bool {
        self.rule.source.contains(&file.path)
            && self.pattern.matches(&file.file_name())
            && self.filter.matches_at(file, now)
    }
}

/// A rule that failed to compile
#[derive(Debug, Clone, Serialize)]
pub struct RuleError {
    pub rule_id: u64,
    pub rule_name: String,
    pub group: String,
    pub error: String,
}

/// Immutable view of the rule set for the duration of a pass.
///
/// Rules are kept in precedence order so the first applicable rule is the
/// one with the smallest `(priority, created_at, id)`.
#[derive(Debug, Clone, Default)]
pub struct RuleSnapshot {
    rules: Vec<CompiledRule>,
    errors: Vec<RuleError>,
}

impl RuleSnapshot {
    /// Compile every rule in every group.
    ///
    /// A rule that fails to compile is left out of the snapshot, so it never
    /// matches. Its error is kept for reporting.
    pub fn compile(groups: &[TaskGroup], settings: &SnapshotSettings) -> Self {
        let builder = FilterPredicateBuilder::new().content_read_limit(settings.content_read_limit);
        let mut rules = Vec::new();
        let mut errors = Vec::new();

        for group in groups {
            for rule in &group.rules {
                match compile_rule(rule, group, &builder, settings) {
                    Ok(compiled) => rules.push(compiled),
                    Err(error) => {
                        warn!(
                            rule = %rule.name,
                            rule_id = rule.id,
                            group = %group.name,
                            error = %error,
                            "Rule disabled: invalid configuration"
                        );
                        errors.push(RuleError {
                            rule_id: rule.id,
                            rule_name: rule.name.clone(),
                            group: group.name.clone(),
                            error: error.to_string(),
                        });
                    }
                }
            }
        }

        rules.sort_by(|a, b| a.rule.precedence().cmp(&b.rule.precedence()));

        debug!(rules = rules.len(), errors = errors.len(), "Compiled rule snapshot");
        Self { rules, errors }
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn errors(&self) -> &[RuleError] {
        &self.errors
    }

    pub fn active_count(&self) -> usize {
        self.rules.iter().filter(|r| r.active).count()
    }

    /// Distinct source scopes of active rules, in precedence order
    pub fn scopes(&self) -> Vec<Scope> {
        let mut scopes: Vec<Scope> = Vec::new();
        for rule in self.rules.iter().filter(|r| r.active) {
            if !scopes.contains(&rule.rule.source) {
                scopes.push(rule.rule.source.clone());
            }
        }
        scopes
    }

    pub fn select(&self, file: &FileMetadata) -> Option<&CompiledRule> {
        RuleMatcher::select(file, self)
    }
}

/// Picks the single rule that applies to a file
pub struct RuleMatcher;

impl RuleMatcher {
    pub fn select<'a>(file: &FileMetadata, snapshot: &'a RuleSnapshot) -> Option<&'a CompiledRule> {
        Self::select_at(file, snapshot, SystemTime::now())
    }

    /// Select with an explicit clock for date filters
    pub fn select_at<'a>(
        file: &FileMetadata,
        snapshot: &'a RuleSnapshot,
        now: SystemTime,
    ) -> Option<&'a CompiledRule> {
        // Filters run last and only until the first hit, so content reads
        // happen for at most the rules ahead of the winner.
        snapshot
            .rules
            .iter()
            .filter(|rule| rule.active)
            .find(|rule| rule.applies_to(file, now))
    }
}

fn compile_rule(
    rule: &TaskRule,
    group: &TaskGroup,
    builder: &FilterPredicateBuilder,
    settings: &SnapshotSettings,
) -> Result<CompiledRule, ConfigError> {
    let needs_destination = !matches!(rule.operation, OperationMode::Delete);
    let has_destination = rule
        .destination
        .as_ref()
        .is_some_and(|d| !d.as_os_str().is_empty());
    if needs_destination && !has_destination {
        return Err(ConfigError::MissingDestination {
            rule: rule.name.clone(),
            operation: rule.operation.to_string(),
        });
    }

    let pattern = NamePattern::compile(&rule.pattern, rule.is_regex)?;
    let filter = match &rule.filter {
        Some(definition) => builder.build(definition)?,
        None => FilterPredicate::always(),
    };

    Ok(CompiledRule {
        rule: rule.clone(),
        group: group.name.clone(),
        active: rule.enabled && group.enabled,
        conflict_policy: rule
            .conflict_policy
            .unwrap_or(settings.default_conflict_policy),
        pattern,
        filter,
    })
}
