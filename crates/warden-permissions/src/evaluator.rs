//! Decision engine
//!
//! Scans the merged rule sequence in order. The last rule whose patterns
//! apply and whose condition holds decides the outcome. When no rule
//! applies the request is denied.

use serde::Serialize;

use crate::pattern::PatternList;
use crate::request::ActionRequest;
use crate::rule::CompiledRule;
use crate::types::{Action, Scope};

/// Outcome of evaluating one action request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    pub outcome: Action,
    /// Id of the rule that decided, if any
    pub matched_rule_id: Option<String>,
    pub matched_scope: Option<Scope>,
    /// Pattern list of the deciding rule
    #[serde(skip)]
    pub pattern_class: Option<PatternList>,
    pub reason: String,
}

impl Decision {
    /// The fail-safe decision when nothing applies
    pub fn default_deny(request: &ActionRequest) -> Self {
        Self {
            outcome: Action::Deny,
            matched_rule_id: None,
            matched_scope: None,
            pattern_class: None,
            reason: format!(
                "no {} rule matched `{}`; denied by default",
                request.tool, request.target
            ),
        }
    }

    /// A decision made by a matching rule
    pub fn from_rule(rule: &CompiledRule) -> Self {
        let reason = match rule.action() {
            Action::Allow => format!("allowed by {} rule `{}`", rule.scope(), rule.id()),
            Action::Deny => format!("denied by {} rule `{}`", rule.scope(), rule.id()),
            Action::Ask => format!(
                "{} rule `{}` requires confirmation",
                rule.scope(),
                rule.id()
            ),
        };

        Self {
            outcome: rule.action(),
            matched_rule_id: Some(rule.id().to_string()),
            matched_scope: Some(rule.scope()),
            pattern_class: Some(rule.patterns().clone()),
            reason,
        }
    }

    /// Check if the outcome allows the operation
    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allow()
    }

    /// Check if the outcome denies the operation
    pub fn is_denied(&self) -> bool {
        self.outcome.is_deny()
    }

    /// Check if the outcome requires asking the user
    pub fn needs_approval(&self) -> bool {
        self.outcome.is_ask()
    }
}

/// How one rule fared during an explained evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleTrace {
    pub rule_id: String,
    pub scope: Scope,
    pub action: Action,
    /// Tool and patterns cover the target
    pub applies: bool,
    /// Condition holds; `None` when it was not checked because the rule did
    /// not apply
    pub condition_held: Option<bool>,
}

/// Full record of an evaluation, for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationTrace {
    pub rules: Vec<RuleTrace>,
    pub decision: Decision,
}

/// Stateless evaluator over a merged rule sequence
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a request against rules given in merge order
    ///
    /// Later rules override earlier ones (last match wins); no rule
    /// matching means Deny.
    pub fn evaluate<'a, I>(&self, request: &ActionRequest, rules: I) -> Decision
    where
        I: IntoIterator<Item = &'a CompiledRule>,
        I::IntoIter: DoubleEndedIterator,
    {
        // Scanning backwards and stopping at the first match is the same as
        // scanning forwards and keeping the last one.
        let matched = rules.into_iter().rev().find(|rule| rule.matches(request));

        let decision = match matched {
            Some(rule) => Decision::from_rule(rule),
            None => Decision::default_deny(request),
        };

        tracing::debug!(
            tool = %request.tool,
            target = %request.target,
            agent = %request.agent,
            outcome = %decision.outcome,
            rule = decision.matched_rule_id.as_deref().unwrap_or("-"),
            "evaluated request"
        );

        decision
    }

    /// Evaluate while recording how every rule fared
    pub fn explain<'a, I>(&self, request: &ActionRequest, rules: I) -> EvaluationTrace
    where
        I: IntoIterator<Item = &'a CompiledRule>,
    {
        let mut last_match = None;
        let mut traces = Vec::new();

        for rule in rules {
            let applies = rule.applies_to(request);
            let condition_held = applies.then(|| rule.condition_holds(request));
            if condition_held == Some(true) {
                last_match = Some(rule);
            }
            traces.push(RuleTrace {
                rule_id: rule.id().to_string(),
                scope: rule.scope(),
                action: rule.action(),
                applies,
                condition_held,
            });
        }

        let decision = match last_match {
            Some(rule) => Decision::from_rule(rule),
            None => Decision::default_deny(request),
        };

        EvaluationTrace {
            rules: traces,
            decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, TimeWindow};
    use crate::rule::Rule;
    use crate::store::merge;
    use crate::types::ToolCategory;
    use chrono::{DateTime, NaiveTime};

    fn compile(rules: Vec<Rule>) -> Vec<CompiledRule> {
        rules
            .into_iter()
            .enumerate()
            .map(|(i, r)| CompiledRule::compile(r, Scope::Project, i).unwrap())
            .collect()
    }

    fn read(target: &str) -> ActionRequest {
        ActionRequest::new(ToolCategory::Read, target, "executor")
    }

    #[test]
    fn test_empty_rules_deny() {
        let decision = DecisionEngine::new().evaluate(&read("any/path"), &[]);
        assert!(decision.is_denied());
        assert!(decision.matched_rule_id.is_none());
        assert!(decision.reason.contains("denied by default"));
    }

    #[test]
    fn test_last_rule_wins() {
        let rules = compile(vec![
            Rule::new("all", ToolCategory::Read, Action::Allow, ["*"]),
            Rule::new("env", ToolCategory::Read, Action::Deny, ["*.env"]),
        ]);
        let engine = DecisionEngine::new();

        let decision = engine.evaluate(&read("notes.env"), &rules);
        assert!(decision.is_denied());
        assert_eq!(decision.matched_rule_id.as_deref(), Some("env"));

        let decision = engine.evaluate(&read("app.ts"), &rules);
        assert!(decision.is_allowed());
        assert_eq!(decision.matched_rule_id.as_deref(), Some("all"));
    }

    #[test]
    fn test_no_specificity_tie_break() {
        // A broad rule declared later beats a narrow rule declared earlier.
        let rules = compile(vec![
            Rule::new("narrow", ToolCategory::Edit, Action::Allow, ["src/lib/mod.rs"]),
            Rule::new("broad", ToolCategory::Edit, Action::Ask, ["**"]),
        ]);
        let request = ActionRequest::new(ToolCategory::Edit, "src/lib/mod.rs", "executor");
        let decision = DecisionEngine::new().evaluate(&request, &rules);
        assert!(decision.needs_approval());
        assert_eq!(decision.matched_rule_id.as_deref(), Some("broad"));
    }

    #[test]
    fn test_failed_condition_falls_through() {
        let window = TimeWindow::new(
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
        );
        let rules = compile(vec![
            Rule::new("base", ToolCategory::Bash, Action::Ask, ["*"]),
            Rule::new("office", ToolCategory::Bash, Action::Allow, ["*"])
                .with_condition(Condition::new().during(window)),
        ]);
        let evening = DateTime::parse_from_rfc3339("2026-10-19T20:00:00+00:00").unwrap();
        let request = ActionRequest::new(ToolCategory::Bash, "make", "executor").at(evening);

        let decision = DecisionEngine::new().evaluate(&request, &rules);
        assert!(decision.needs_approval());
        assert_eq!(decision.matched_rule_id.as_deref(), Some("base"));
    }

    #[test]
    fn test_decision_carries_pattern_class() {
        let rules = compile(vec![Rule::new(
            "npm-run",
            ToolCategory::Bash,
            Action::Ask,
            ["npm run *"],
        )]);
        let request = ActionRequest::new(ToolCategory::Bash, "npm run build", "executor");
        let decision = DecisionEngine::new().evaluate(&request, &rules);

        let class = decision.pattern_class.unwrap();
        assert!(class.applies("npm run lint"));
        assert!(!class.applies("npm test"));
        assert_eq!(decision.matched_scope, Some(Scope::Project));
    }

    #[test]
    fn test_explain_matches_evaluate() {
        let merged = merge(
            vec![Rule::new("g", ToolCategory::Bash, Action::Ask, ["*"])],
            vec![
                Rule::new("git", ToolCategory::Bash, Action::Allow, ["git *"]),
                Rule::new("prod", ToolCategory::Bash, Action::Deny, ["*"])
                    .with_condition(Condition::new().in_environments(["prod"])),
            ],
            vec![],
            Vec::new(),
        );
        let request = ActionRequest::new(ToolCategory::Bash, "git status", "executor")
            .with_environment("dev");

        let engine = DecisionEngine::new();
        let rules: Vec<_> = merged.rule_set.effective_rules("executor").collect();
        let trace = engine.explain(&request, rules.iter().copied());

        assert_eq!(trace.decision, engine.evaluate(&request, rules.iter().copied()));
        assert_eq!(trace.rules.len(), 3);
        assert_eq!(trace.rules[1].condition_held, Some(true));
        assert_eq!(trace.rules[2].condition_held, Some(false));
        assert!(trace.decision.is_allowed());
    }

    #[test]
    fn test_rules_for_other_tools_ignored() {
        let rules = compile(vec![Rule::new("bash", ToolCategory::Bash, Action::Allow, ["*"])]);
        let decision = DecisionEngine::new().evaluate(&read("README.md"), &rules);
        assert!(decision.is_denied());
    }
}
