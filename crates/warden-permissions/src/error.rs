//! Configuration errors raised while building a rule set

use crate::pattern::PatternError;

/// A scope's rule list was rejected as a whole.
///
/// `scope` names the rejected scope, e.g. `project` or
/// `agent_override(security-auditor)`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{scope} scope rejected: rule `{rule_id}` has an empty pattern list")]
    EmptyPatterns { scope: String, rule_id: String },

    #[error("{scope} scope rejected: rule `{rule_id}` uses unknown action keyword `{keyword}`")]
    UnknownAction {
        scope: String,
        rule_id: String,
        keyword: String,
    },

    #[error("{scope} scope rejected: rule `{rule_id}` has an invalid pattern: {source}")]
    InvalidPattern {
        scope: String,
        rule_id: String,
        #[source]
        source: PatternError,
    },

    #[error("{scope} scope rejected: rule `{rule_id}` has an invalid condition: {reason}")]
    InvalidCondition {
        scope: String,
        rule_id: String,
        reason: String,
    },

    #[error("{scope} scope rejected: rule id `{rule_id}` is declared more than once")]
    DuplicateRuleId { scope: String, rule_id: String },

    #[error("{scope} scope rejected: {message}")]
    Document { scope: String, message: String },
}

impl ConfigError {
    /// Label of the scope this error rejected
    pub fn scope(&self) -> &str {
        match self {
            ConfigError::EmptyPatterns { scope, .. }
            | ConfigError::UnknownAction { scope, .. }
            | ConfigError::InvalidPattern { scope, .. }
            | ConfigError::InvalidCondition { scope, .. }
            | ConfigError::DuplicateRuleId { scope, .. }
            | ConfigError::Document { scope, .. } => scope,
        }
    }
}
