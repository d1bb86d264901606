//! Approval caching for a session
//!
//! Remembers session-wide approvals so later requests in the same pattern
//! class are allowed without prompting again.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use warden_permissions::{ActionRequest, Decision, PatternList, ToolCategory};

/// Literal identity of a request for caching purposes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApprovalKey {
    pub agent: String,
    pub tool: ToolCategory,
    pub target: String,
}

impl ApprovalKey {
    pub fn for_request(request: &ActionRequest) -> Self {
        Self {
            agent: request.agent.clone(),
            tool: request.tool.clone(),
            target: request.target.clone(),
        }
    }
}

/// A session-wide approval
#[derive(Debug, Clone)]
pub struct CachedApproval {
    pub key: ApprovalKey,
    /// Pattern list of the rule that asked; later targets it applies to are
    /// covered too
    pub pattern_class: Option<PatternList>,
    /// Rule that produced the Ask decision
    pub rule_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedApproval {
    pub fn new(request: &ActionRequest, decision: &Decision) -> Self {
        Self {
            key: ApprovalKey::for_request(request),
            pattern_class: decision.pattern_class.clone(),
            rule_id: decision.matched_rule_id.clone(),
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_ttl(mut self, duration: chrono::Duration) -> Self {
        self.expires_at = Some(self.created_at + duration);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() > exp)
    }

    /// Whether this approval covers `request` as decided by `decision`
    ///
    /// The literal key always counts. Beyond it, the approval only extends to
    /// targets decided by the same rule with the same pattern class.
    pub fn covers(&self, request: &ActionRequest, decision: &Decision) -> bool {
        if self.key.agent != request.agent || self.key.tool != request.tool {
            return false;
        }
        if self.key.target == request.target {
            return true;
        }
        self.rule_id.is_some()
            && self.rule_id == decision.matched_rule_id
            && self.pattern_class == decision.pattern_class
            && self
                .pattern_class
                .as_ref()
                .is_some_and(|class| class.applies(&request.target))
    }

    fn same_class(&self, other: &CachedApproval) -> bool {
        self.key.agent == other.key.agent
            && self.key.tool == other.key.tool
            && self.rule_id == other.rule_id
    }
}

/// Per-session cache of approvals
#[derive(Debug, Default)]
pub struct ApprovalCache {
    session_id: String,
    literal: HashMap<ApprovalKey, CachedApproval>,
    classes: Vec<CachedApproval>,
}

impl ApprovalCache {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            literal: HashMap::new(),
            classes: Vec::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Find an unexpired approval covering `request` under `decision`
    pub fn lookup(&self, request: &ActionRequest, decision: &Decision) -> Option<&CachedApproval> {
        let key = ApprovalKey::for_request(request);
        if let Some(cached) = self.literal.get(&key).filter(|c| !c.is_expired()) {
            return Some(cached);
        }

        self.classes
            .iter()
            .find(|cached| !cached.is_expired() && cached.covers(request, decision))
    }

    /// Remember a session-wide approval
    ///
    /// A newer approval for the same agent, tool and rule replaces the older
    /// class entry.
    pub fn insert(&mut self, approval: CachedApproval) {
        if approval.pattern_class.is_some() {
            self.classes.retain(|existing| !existing.same_class(&approval));
            self.classes.push(approval.clone());
        }
        self.literal.insert(approval.key.clone(), approval);
    }

    pub fn clear_expired(&mut self) {
        self.literal.retain(|_, v| !v.is_expired());
        self.classes.retain(|v| !v.is_expired());
    }

    pub fn clear(&mut self) {
        self.literal.clear();
        self.classes.clear();
    }

    pub fn len(&self) -> usize {
        self.literal.len()
    }

    /// Number of pattern-class entries
    pub fn class_len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.literal.is_empty()
    }
}
