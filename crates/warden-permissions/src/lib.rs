//! Layered, pattern-based permission evaluation for Warden
//!
//! Rules are declared in four scopes and merged by concatenation. The last
//! rule in merge order whose patterns apply and whose condition holds
//! decides; when nothing applies the request is denied.
//!
//! # Architecture
//!
//! ```text
//! ActionRequest
//!      │
//!      ▼
//! ┌──────────────────────────────┐
//! │ RuleSet::effective_rules     │
//! │                              │
//! │  global   bash * ─────────── │ → Ask
//! │  project  bash git * ─────── │ → Allow
//! │  session  (none)             │
//! │  agent    bash * ─────────── │ → Deny  (last match wins)
//! └──────────────────────────────┘
//!      │
//!      ▼
//! Decision { outcome: Allow/Deny/Ask, matched_rule_id, reason }
//! ```
//!
//! # Example
//!
//! ```rust
//! use warden_permissions::{merge, Action, ActionRequest, Rule, ToolCategory};
//!
//! let merged = merge(
//!     vec![Rule::for_any_target("global-bash", ToolCategory::Bash, Action::Ask)],
//!     vec![Rule::new("git", ToolCategory::Bash, Action::Allow, ["git *"])],
//!     vec![],
//!     [(
//!         "security-auditor".to_string(),
//!         vec![Rule::for_any_target("auditor-bash", ToolCategory::Bash, Action::Deny)],
//!     )],
//! );
//! assert!(merged.errors.is_empty());
//!
//! let request = ActionRequest::new(ToolCategory::Bash, "git status", "executor");
//! assert!(merged.rule_set.evaluate(&request).is_allowed());
//!
//! let request = ActionRequest::new(ToolCategory::Bash, "git status", "security-auditor");
//! assert!(merged.rule_set.evaluate(&request).is_denied());
//! ```

pub mod condition;
pub mod error;
pub mod evaluator;
pub mod pattern;
pub mod request;
pub mod rule;
pub mod store;
pub mod types;

pub use condition::{Condition, SizeRange, TimeWindow};
pub use error::ConfigError;
pub use evaluator::{Decision, DecisionEngine, EvaluationTrace, RuleTrace};
pub use pattern::{expand_path, normalize_path, MatchMode, Pattern, PatternError, PatternList};
pub use request::{ActionRequest, FileMeta};
pub use rule::{CompiledRule, Rule};
pub use store::{agent_scope_label, merge, Merged, PolicyStore, RuleSet, RuleSetBuilder};
pub use types::{Action, Scope, ToolCategory, UnknownAction};

/// Prelude for common imports
pub mod prelude {
    pub use super::evaluator::{Decision, DecisionEngine};
    pub use super::request::ActionRequest;
    pub use super::rule::Rule;
    pub use super::store::{PolicyStore, RuleSet};
    pub use super::types::{Action, Scope, ToolCategory};
}
