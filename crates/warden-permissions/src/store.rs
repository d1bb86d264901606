//! Scoped rule storage
//!
//! Rules are declared in four scopes and merged by plain concatenation:
//! global, project, session, then the requesting agent's overrides. Each
//! scope is validated as a unit; a scope with any malformed rule contributes
//! no rules at all.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ConfigError;
use crate::evaluator::{Decision, DecisionEngine};
use crate::request::ActionRequest;
use crate::rule::{CompiledRule, Rule};
use crate::types::Scope;

/// An immutable snapshot of all scoped rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    global: Vec<CompiledRule>,
    project: Vec<CompiledRule>,
    session: Vec<CompiledRule>,
    agents: BTreeMap<String, Vec<CompiledRule>>,
}

impl RuleSet {
    pub fn builder() -> RuleSetBuilder {
        RuleSetBuilder::default()
    }

    /// Rules declared in one scope. `agent` selects the override list for
    /// [`Scope::AgentOverride`] and is ignored otherwise.
    pub fn scope_rules(&self, scope: Scope, agent: Option<&str>) -> &[CompiledRule] {
        match scope {
            Scope::Global => &self.global,
            Scope::Project => &self.project,
            Scope::Session => &self.session,
            Scope::AgentOverride => agent
                .and_then(|name| self.agents.get(name))
                .map(Vec::as_slice)
                .unwrap_or(&[]),
        }
    }

    /// The merged rule sequence for one agent, in precedence order
    pub fn effective_rules<'a>(
        &'a self,
        agent: &str,
    ) -> impl DoubleEndedIterator<Item = &'a CompiledRule> + Clone + 'a {
        let overrides = self.scope_rules(Scope::AgentOverride, Some(agent));
        self.global
            .iter()
            .chain(self.project.iter())
            .chain(self.session.iter())
            .chain(overrides.iter())
    }

    /// Evaluate a request against this snapshot
    pub fn evaluate(&self, request: &ActionRequest) -> Decision {
        DecisionEngine::new().evaluate(request, self.effective_rules(&request.agent))
    }

    /// Agents that carry override rules
    pub fn agents(&self) -> impl Iterator<Item = &str> {
        self.agents.keys().map(String::as_str)
    }

    /// Total number of rules across all scopes
    pub fn len(&self) -> usize {
        self.global.len()
            + self.project.len()
            + self.session.len()
            + self.agents.values().map(Vec::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Assembles a [`RuleSet`] one scope at a time
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    rules: RuleSet,
}

impl RuleSetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global(&mut self, rules: Vec<Rule>) -> Result<(), ConfigError> {
        install(&mut self.rules.global, Scope::Global, rules)
    }

    pub fn project(&mut self, rules: Vec<Rule>) -> Result<(), ConfigError> {
        install(&mut self.rules.project, Scope::Project, rules)
    }

    pub fn session(&mut self, rules: Vec<Rule>) -> Result<(), ConfigError> {
        install(&mut self.rules.session, Scope::Session, rules)
    }

    pub fn agent_override(
        &mut self,
        agent: impl Into<String>,
        rules: Vec<Rule>,
    ) -> Result<(), ConfigError> {
        let agent = agent.into();
        let label = agent_scope_label(&agent);
        let compiled = compile_scope(Scope::AgentOverride, &label, rules);
        // A rejected override list must not leave an earlier one in place.
        self.rules.agents.remove(&agent);
        let compiled = compiled?;
        self.rules.agents.insert(agent, compiled);
        Ok(())
    }

    pub fn build(self) -> RuleSet {
        self.rules
    }
}

fn install(slot: &mut Vec<CompiledRule>, scope: Scope, rules: Vec<Rule>) -> Result<(), ConfigError> {
    match compile_scope(scope, scope.as_str(), rules) {
        Ok(compiled) => {
            *slot = compiled;
            Ok(())
        }
        Err(e) => {
            slot.clear();
            Err(e)
        }
    }
}

/// Scope label used in errors and logs for an agent's overrides
pub fn agent_scope_label(agent: &str) -> String {
    format!("{}({})", Scope::AgentOverride, agent)
}

/// A merged rule set together with the scopes that were rejected
#[derive(Debug, Default)]
pub struct Merged {
    pub rule_set: RuleSet,
    pub errors: Vec<ConfigError>,
}

/// Merge the four scopes into one rule set. Rejected scopes contribute no
/// rules and are reported in [`Merged::errors`].
pub fn merge<A>(global: Vec<Rule>, project: Vec<Rule>, session: Vec<Rule>, agent_overrides: A) -> Merged
where
    A: IntoIterator<Item = (String, Vec<Rule>)>,
{
    let mut builder = RuleSetBuilder::new();
    let mut errors = Vec::new();

    errors.extend(builder.global(global).err());
    errors.extend(builder.project(project).err());
    errors.extend(builder.session(session).err());
    for (agent, rules) in agent_overrides {
        errors.extend(builder.agent_override(agent, rules).err());
    }

    Merged {
        rule_set: builder.build(),
        errors,
    }
}

fn compile_scope(scope: Scope, label: &str, rules: Vec<Rule>) -> Result<Vec<CompiledRule>, ConfigError> {
    let result = try_compile_scope(scope, label, rules);
    match &result {
        Ok(compiled) => tracing::debug!(scope = label, rules = compiled.len(), "compiled scope"),
        Err(e) => tracing::warn!(scope = label, error = %e, "rejected scope"),
    }
    result
}

fn try_compile_scope(
    scope: Scope,
    label: &str,
    rules: Vec<Rule>,
) -> Result<Vec<CompiledRule>, ConfigError> {
    let mut seen = HashSet::new();
    let mut compiled = Vec::with_capacity(rules.len());

    for (order, rule) in rules.into_iter().enumerate() {
        if !seen.insert(rule.id.clone()) {
            return Err(ConfigError::DuplicateRuleId {
                scope: label.to_string(),
                rule_id: rule.id,
            });
        }

        if rule.patterns.is_empty() {
            return Err(ConfigError::EmptyPatterns {
                scope: label.to_string(),
                rule_id: rule.id,
            });
        }

        if let Some(reason) = rule.condition.as_ref().and_then(|c| c.validate().err()) {
            return Err(ConfigError::InvalidCondition {
                scope: label.to_string(),
                rule_id: rule.id,
                reason,
            });
        }

        let rule_id = rule.id.clone();
        let rule = CompiledRule::compile(rule, scope, order).map_err(|source| {
            ConfigError::InvalidPattern {
                scope: label.to_string(),
                rule_id,
                source,
            }
        })?;
        compiled.push(rule);
    }

    Ok(compiled)
}

/// Holds the current rule set and swaps it atomically on reload.
///
/// Readers take an `Arc` snapshot and keep using it even if a reload lands
/// while they evaluate.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    current: Arc<RwLock<Arc<RuleSet>>>,
}

impl PolicyStore {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(rule_set))),
        }
    }

    /// The rule set in effect right now
    pub fn snapshot(&self) -> Arc<RuleSet> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Install a new rule set, returning the previous one
    pub fn replace(&self, rule_set: RuleSet) -> Arc<RuleSet> {
        let next = Arc::new(rule_set);
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(rules = next.len(), "installed new rule set");
        std::mem::replace(&mut *current, next)
    }

    /// Evaluate against the current snapshot
    pub fn evaluate(&self, request: &ActionRequest) -> Decision {
        self.snapshot().evaluate(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::types::{Action, ToolCategory};

    fn bash(id: &str, pattern: &str, action: Action) -> Rule {
        Rule::new(id, ToolCategory::Bash, action, [pattern])
    }

    fn ids<'a>(rules: impl Iterator<Item = &'a CompiledRule>) -> Vec<&'a str> {
        rules.map(CompiledRule::id).collect()
    }

    #[test]
    fn test_merge_is_concatenation() {
        let merged = merge(
            vec![bash("g1", "*", Action::Ask), bash("g2", "ls *", Action::Allow)],
            vec![bash("p1", "git *", Action::Allow)],
            vec![bash("s1", "rm *", Action::Deny)],
            [
                ("auditor".to_string(), vec![bash("a1", "*", Action::Deny)]),
                ("writer".to_string(), vec![bash("w1", "*", Action::Allow)]),
            ],
        );

        assert!(merged.errors.is_empty());
        let rule_set = merged.rule_set;
        assert_eq!(
            ids(rule_set.effective_rules("auditor")),
            vec!["g1", "g2", "p1", "s1", "a1"]
        );
        assert_eq!(
            ids(rule_set.effective_rules("writer")),
            vec!["g1", "g2", "p1", "s1", "w1"]
        );
        assert_eq!(ids(rule_set.effective_rules("other")), vec!["g1", "g2", "p1", "s1"]);
        assert_eq!(rule_set.len(), 6);
        assert_eq!(rule_set.agents().collect::<Vec<_>>(), vec!["auditor", "writer"]);
    }

    #[test]
    fn test_scope_positions_recorded() {
        let merged = merge(
            vec![bash("g1", "*", Action::Ask)],
            vec![bash("p1", "a", Action::Allow), bash("p2", "b", Action::Allow)],
            vec![],
            Vec::new(),
        );
        let rules: Vec<_> = merged.rule_set.effective_rules("x").collect();
        assert_eq!(rules[0].scope(), Scope::Global);
        assert_eq!(rules[2].scope(), Scope::Project);
        assert_eq!(rules[2].declaration_order(), 1);
    }

    #[test]
    fn test_malformed_scope_contributes_nothing() {
        let merged = merge(
            vec![bash("g1", "*", Action::Ask)],
            vec![
                bash("p1", "git *", Action::Allow),
                Rule::new("p2", ToolCategory::Bash, Action::Allow, Vec::<String>::new()),
            ],
            vec![bash("s1", "rm *", Action::Deny)],
            Vec::new(),
        );

        assert_eq!(merged.errors.len(), 1);
        assert!(matches!(
            &merged.errors[0],
            ConfigError::EmptyPatterns { scope, rule_id } if scope == "project" && rule_id == "p2"
        ));
        assert!(merged.rule_set.scope_rules(Scope::Project, None).is_empty());
        assert_eq!(ids(merged.rule_set.effective_rules("x")), vec!["g1", "s1"]);
    }

    #[test]
    fn test_invalid_pattern_rejects_scope() {
        let mut builder = RuleSet::builder();
        let err = builder
            .global(vec![
                bash("ok", "ls", Action::Allow),
                Rule::new("bad", ToolCategory::Read, Action::Allow, ["[unclosed"]),
            ])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
        assert_eq!(err.scope(), "global");
        assert!(builder.build().is_empty());
    }

    #[test]
    fn test_invalid_condition_rejects_scope() {
        let mut builder = RuleSet::builder();
        let rule = bash("sized", "*", Action::Allow)
            .with_condition(Condition::new().with_file_size(Some(100), Some(1)));
        let err = builder.session(vec![rule]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCondition { .. }));
    }

    #[test]
    fn test_duplicate_ids_reject_scope() {
        let mut builder = RuleSet::builder();
        let err = builder
            .project(vec![bash("dup", "a", Action::Allow), bash("dup", "b", Action::Deny)])
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateRuleId { .. }));
    }

    #[test]
    fn test_rejected_agent_override_clears_previous() {
        let mut builder = RuleSet::builder();
        builder
            .agent_override("auditor", vec![bash("a1", "*", Action::Deny)])
            .unwrap();
        let err = builder
            .agent_override(
                "auditor",
                vec![Rule::new("a2", ToolCategory::Bash, Action::Deny, Vec::<String>::new())],
            )
            .unwrap_err();
        assert_eq!(err.scope(), "agent_override(auditor)");

        let rule_set = builder.build();
        assert!(rule_set.scope_rules(Scope::AgentOverride, Some("auditor")).is_empty());
    }

    #[test]
    fn test_policy_store_snapshot_survives_replace() {
        let first = merge(vec![bash("g1", "*", Action::Allow)], vec![], vec![], Vec::new());
        let store = PolicyStore::new(first.rule_set);

        let snapshot = store.snapshot();
        let second = merge(vec![bash("g1", "*", Action::Deny)], vec![], vec![], Vec::new());
        let previous = store.replace(second.rule_set);

        let request = ActionRequest::new(ToolCategory::Bash, "ls", "executor");
        assert!(snapshot.evaluate(&request).outcome.is_allow());
        assert!(previous.evaluate(&request).outcome.is_allow());
        assert!(store.evaluate(&request).outcome.is_deny());
    }
}
