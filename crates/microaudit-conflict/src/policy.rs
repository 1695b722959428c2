//! Policy engine for field-level reconciliation
//!
//! Evaluates reconcile rules from configuration to decide, per conflicting
//! field, whether the pending local value or the fetched value wins. Rules
//! are matched against `"{table}.{field}"` using glob patterns in
//! first-match-wins order.

use std::fmt;

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use microaudit_core::config::{ReconcileConfig, ReconcileRule};
use microaudit_core::domain::Table;

use crate::error::ConflictError;

/// Which side wins a conflicting field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Keep the local value (pending user intent)
    PreferLocal,
    /// Take the fetched value
    PreferRemote,
}

impl Strategy {
    /// Parses a configuration strategy name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prefer_local" => Some(Strategy::PreferLocal),
            "prefer_remote" => Some(Strategy::PreferRemote),
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::PreferLocal => write!(f, "prefer_local"),
            Strategy::PreferRemote => write!(f, "prefer_remote"),
        }
    }
}

/// A single reconcile rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRule {
    /// Glob pattern matched against `"{table}.{field}"` (e.g. `"notes.pinned"`, `"tasks.*"`)
    pub pattern: String,
    /// Strategy to apply when the pattern matches
    pub strategy: String,
}

impl ConflictRule {
    /// Validates the rule's glob pattern and strategy
    pub fn validate(&self) -> Result<(), ConflictError> {
        Pattern::new(&self.pattern).map_err(|e| ConflictError::InvalidPattern {
            pattern: self.pattern.clone(),
            reason: e.to_string(),
        })?;

        Strategy::parse(&self.strategy)
            .ok_or_else(|| ConflictError::InvalidStrategy(self.strategy.clone()))?;

        Ok(())
    }
}

impl From<&ReconcileRule> for ConflictRule {
    fn from(rule: &ReconcileRule) -> Self {
        Self {
            pattern: rule.pattern.clone(),
            strategy: rule.strategy.clone(),
        }
    }
}

/// Engine that evaluates reconcile rules
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    rules: Vec<(Pattern, Strategy)>,
    default_strategy: Strategy,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            default_strategy: Strategy::PreferLocal,
        }
    }
}

impl PolicyEngine {
    /// Creates a PolicyEngine from the default strategy string and a list of rules
    ///
    /// Invalid rules are logged and skipped; an invalid default falls back
    /// to `prefer_local`.
    pub fn new(default_strategy: &str, rules: &[ConflictRule]) -> Self {
        let default = Strategy::parse(default_strategy).unwrap_or(Strategy::PreferLocal);

        let compiled_rules: Vec<(Pattern, Strategy)> = rules
            .iter()
            .filter_map(|rule| {
                let pattern = match Pattern::new(&rule.pattern) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::warn!(
                            pattern = %rule.pattern,
                            error = %e,
                            "Skipping invalid reconcile rule pattern"
                        );
                        return None;
                    }
                };
                let strategy = match Strategy::parse(&rule.strategy) {
                    Some(s) => s,
                    None => {
                        tracing::warn!(
                            strategy = %rule.strategy,
                            "Skipping invalid reconcile rule strategy"
                        );
                        return None;
                    }
                };
                Some((pattern, strategy))
            })
            .collect();

        debug!(
            rules_count = compiled_rules.len(),
            default = %default,
            "PolicyEngine initialized"
        );

        Self {
            rules: compiled_rules,
            default_strategy: default,
        }
    }

    /// Creates a PolicyEngine from the `reconcile` configuration section
    pub fn from_config(config: &ReconcileConfig) -> Self {
        let rules: Vec<ConflictRule> = config.rules.iter().map(ConflictRule::from).collect();
        Self::new(&config.default_strategy, &rules)
    }

    /// Evaluates the policy for one field of one table
    ///
    /// Uses first-match-wins: the first rule whose glob matches
    /// `"{table}.{field}"` decides. If no rule matches, returns the default.
    pub fn evaluate(&self, table: Table, field: &str) -> Strategy {
        let path = format!("{table}.{field}");
        for (pattern, strategy) in &self.rules {
            if pattern.matches(&path) {
                trace!(
                    path = %path,
                    pattern = %pattern,
                    strategy = %strategy,
                    "Reconcile rule matched"
                );
                return *strategy;
            }
        }

        trace!(
            path = %path,
            default = %self.default_strategy,
            "No reconcile rule matched, using default"
        );
        self.default_strategy
    }

    /// Returns the default strategy
    pub fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    /// Returns the number of compiled rules
    pub fn rules_count(&self) -> usize {
        self.rules.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(pattern: &str, strategy: &str) -> ConflictRule {
        ConflictRule {
            pattern: pattern.to_string(),
            strategy: strategy.to_string(),
        }
    }

    #[test]
    fn test_policy_engine_no_rules() {
        let engine = PolicyEngine::new("prefer_local", &[]);
        assert_eq!(engine.evaluate(Table::Notes, "title"), Strategy::PreferLocal);
        assert_eq!(engine.rules_count(), 0);
    }

    #[test]
    fn test_policy_engine_default_strategy() {
        let engine = PolicyEngine::new("prefer_remote", &[]);
        assert_eq!(engine.evaluate(Table::Tasks, "done"), Strategy::PreferRemote);
    }

    #[test]
    fn test_policy_engine_first_match_wins() {
        let rules = vec![
            rule("notes.content", "prefer_local"),
            rule("notes.*", "prefer_remote"),
        ];
        let engine = PolicyEngine::new("prefer_local", &rules);

        assert_eq!(engine.evaluate(Table::Notes, "content"), Strategy::PreferLocal);
        assert_eq!(engine.evaluate(Table::Notes, "pinned"), Strategy::PreferRemote);
        assert_eq!(engine.evaluate(Table::Tasks, "done"), Strategy::PreferLocal);
    }

    #[test]
    fn test_policy_engine_wildcard_table() {
        let engine = PolicyEngine::new("prefer_local", &[rule("*.color", "prefer_remote")]);
        assert_eq!(engine.evaluate(Table::Workspaces, "color"), Strategy::PreferRemote);
        assert_eq!(engine.evaluate(Table::Notes, "color"), Strategy::PreferRemote);
        assert_eq!(engine.evaluate(Table::Notes, "title"), Strategy::PreferLocal);
    }

    #[test]
    fn test_policy_engine_invalid_rules_skipped() {
        let rules = vec![
            rule("[invalid", "prefer_local"),
            rule("notes.*", "keep_both"),
            rule("tasks.*", "prefer_remote"),
        ];
        let engine = PolicyEngine::new("prefer_local", &rules);
        assert_eq!(engine.rules_count(), 1);
        assert_eq!(engine.evaluate(Table::Tasks, "title"), Strategy::PreferRemote);
    }

    #[test]
    fn test_policy_engine_invalid_default() {
        let engine = PolicyEngine::new("garbage", &[]);
        assert_eq!(engine.default_strategy(), Strategy::PreferLocal);
    }

    #[test]
    fn test_from_config() {
        let config = ReconcileConfig {
            default_strategy: "prefer_remote".into(),
            rules: vec![ReconcileRule {
                pattern: "notes.content".into(),
                strategy: "prefer_local".into(),
            }],
        };
        let engine = PolicyEngine::from_config(&config);
        assert_eq!(engine.rules_count(), 1);
        assert_eq!(engine.evaluate(Table::Notes, "content"), Strategy::PreferLocal);
        assert_eq!(engine.evaluate(Table::Notes, "title"), Strategy::PreferRemote);
    }

    #[test]
    fn test_conflict_rule_validate() {
        assert!(rule("notes.*", "prefer_local").validate().is_ok());
        assert!(matches!(
            rule("[invalid", "prefer_local").validate(),
            Err(ConflictError::InvalidPattern { .. })
        ));
        assert!(matches!(
            rule("notes.*", "yolo").validate(),
            Err(ConflictError::InvalidStrategy(_))
        ));
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!(Strategy::parse("prefer_local"), Some(Strategy::PreferLocal));
        assert_eq!(Strategy::parse("prefer_remote"), Some(Strategy::PreferRemote));
        assert_eq!(Strategy::parse("keep_local"), None);
    }
}
