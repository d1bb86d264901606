//! Permission rule definitions
//!
//! A [`Rule`] is the canonical record produced at the configuration
//! boundary. It is compiled into a [`CompiledRule`] once, when it is placed
//! into a scope of a rule set.

use crate::condition::Condition;
use crate::pattern::{MatchMode, PatternError, PatternList};
use crate::request::ActionRequest;
use crate::types::{Action, Scope, ToolCategory};

/// A declarative permission rule
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    /// Tool category this rule governs
    pub tool: ToolCategory,
    pub action: Action,
    /// Ordered glob patterns; `!` negates
    pub patterns: Vec<String>,
    pub condition: Option<Condition>,
    /// Optional comment explaining this rule
    pub description: Option<String>,
}

impl Rule {
    /// Create a new permission rule
    pub fn new<I, S>(id: impl Into<String>, tool: ToolCategory, action: Action, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            tool,
            action,
            patterns: patterns.into_iter().map(Into::into).collect(),
            condition: None,
            description: None,
        }
    }

    /// A rule covering every target of a tool, as written by a bare action keyword
    pub fn for_any_target(id: impl Into<String>, tool: ToolCategory, action: Action) -> Self {
        Self::new(id, tool, action, ["*"])
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A rule with pre-compiled patterns, placed in a scope
#[derive(Debug, Clone)]
pub struct CompiledRule {
    rule: Rule,
    scope: Scope,
    declaration_order: usize,
    patterns: PatternList,
}

impl CompiledRule {
    /// Compile a rule for the given scope position
    pub fn compile(rule: Rule, scope: Scope, declaration_order: usize) -> Result<Self, PatternError> {
        let patterns = PatternList::compile(&rule.patterns, MatchMode::for_tool(&rule.tool))?;

        Ok(Self {
            rule,
            scope,
            declaration_order,
            patterns,
        })
    }

    /// Whether the rule's tool and patterns cover the request's target
    pub fn applies_to(&self, request: &ActionRequest) -> bool {
        self.rule.tool == request.tool && self.patterns.applies(&request.target)
    }

    /// Whether the rule's condition holds for the request
    pub fn condition_holds(&self, request: &ActionRequest) -> bool {
        crate::condition::holds(self.rule.condition.as_ref(), request)
    }

    /// Check both target coverage and condition
    pub fn matches(&self, request: &ActionRequest) -> bool {
        self.applies_to(request) && self.condition_holds(request)
    }

    pub fn id(&self) -> &str {
        &self.rule.id
    }

    pub fn action(&self) -> Action {
        self.rule.action
    }

    pub fn tool(&self) -> &ToolCategory {
        &self.rule.tool
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn declaration_order(&self) -> usize {
        self.declaration_order
    }

    pub fn patterns(&self) -> &PatternList {
        &self.patterns
    }

    /// Get the original rule
    pub fn rule(&self) -> &Rule {
        &self.rule
    }
}
