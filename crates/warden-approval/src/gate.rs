//! Interaction gate: turns Ask decisions into a final Allow or Deny
//!
//! Each call to [`InteractionGate::resolve`] is its own awaitable unit. A
//! pending confirmation never blocks other requests; they are evaluated and
//! resolved independently while prompts reach the operator in FIFO order.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use warden_permissions::{Action, ActionRequest, Decision, RuleSet};

use crate::cache::{ApprovalCache, CachedApproval};
use crate::channel::{PromptRequest, PromptSender, ReviewResponse};
use crate::pending::{ApprovalState, FinalOutcome, PendingApproval};

/// Default time an operator has to answer a prompt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Gate settings
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// How long a prompt may stay unanswered before it resolves as timed out
    pub timeout: Duration,
    /// Lifetime of session-wide approvals; `None` keeps them for the whole
    /// session
    pub session_ttl: Option<chrono::Duration>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            session_ttl: None,
        }
    }
}

impl GateConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_session_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }
}

/// How a decision was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: FinalOutcome,
    /// Terminal approval state; `None` when the decision did not ask
    pub state: Option<ApprovalState>,
    /// Id of the approval that was prompted for, if any
    pub approval_id: Option<String>,
    /// Answered from the session cache without prompting
    pub from_cache: bool,
    /// Reason given by the operator when denying
    pub reason: Option<String>,
}

impl Resolution {
    fn direct(outcome: FinalOutcome) -> Self {
        Self {
            outcome,
            state: None,
            approval_id: None,
            from_cache: false,
            reason: None,
        }
    }

    fn terminal(state: ApprovalState, approval_id: Option<String>, reason: Option<String>) -> Self {
        Self {
            outcome: state.outcome().unwrap_or(FinalOutcome::Deny),
            state: Some(state),
            approval_id,
            from_cache: false,
            reason,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.outcome.is_allow()
    }
}

/// Confirmation gate for one session
#[derive(Debug, Clone)]
pub struct InteractionGate {
    inner: Arc<GateInner>,
}

#[derive(Debug)]
struct GateInner {
    prompts: PromptSender,
    config: GateConfig,
    cache: Mutex<ApprovalCache>,
    cancelled: watch::Sender<bool>,
}

impl InteractionGate {
    pub fn new(session_id: impl Into<String>, prompts: PromptSender, config: GateConfig) -> Self {
        let (cancelled, _) = watch::channel(false);
        Self {
            inner: Arc::new(GateInner {
                prompts,
                config,
                cache: Mutex::new(ApprovalCache::new(session_id)),
                cancelled,
            }),
        }
    }

    pub fn session_id(&self) -> String {
        self.cache().session_id().to_string()
    }

    /// Resolve a decision to a final outcome
    pub async fn resolve(&self, decision: &Decision, request: &ActionRequest) -> FinalOutcome {
        self.resolve_detailed(decision, request).await.outcome
    }

    /// Evaluate `request` against `rule_set` and resolve the result
    pub async fn authorize(&self, rule_set: &RuleSet, request: &ActionRequest) -> (Decision, Resolution) {
        let decision = rule_set.evaluate(request);
        let resolution = self.resolve_detailed(&decision, request).await;
        (decision, resolution)
    }

    /// Resolve a decision, reporting the terminal approval state
    ///
    /// Allow and Deny decisions pass straight through. Ask decisions are
    /// answered from the session cache when possible, otherwise the operator
    /// is prompted and the call waits for an answer, the timeout, or the
    /// session being cancelled.
    pub async fn resolve_detailed(&self, decision: &Decision, request: &ActionRequest) -> Resolution {
        match decision.outcome {
            Action::Allow => return Resolution::direct(FinalOutcome::Allow),
            Action::Deny => return Resolution::direct(FinalOutcome::Deny),
            Action::Ask => {}
        }

        if self.is_cancelled() {
            tracing::warn!(target = %request.target, "session cancelled; denying without prompt");
            return Resolution::terminal(ApprovalState::Cancelled, None, None);
        }

        if let Some(cached) = self.cache().lookup(request, decision) {
            tracing::info!(
                tool = %request.tool,
                target = %request.target,
                approved_for = %cached.key.target,
                "allowed by session approval"
            );
            return Resolution {
                from_cache: true,
                ..Resolution::terminal(ApprovalState::ApprovedForSession, None, None)
            };
        }

        let timeout = self.inner.config.timeout;
        let mut pending = PendingApproval::new(request.clone(), decision.clone(), timeout);
        let (state, reason) = if timeout.is_zero() {
            (ApprovalState::TimedOut, None)
        } else {
            self.await_review(&pending).await
        };
        pending.finish(state);

        if state == ApprovalState::ApprovedForSession {
            let mut approval = CachedApproval::new(request, decision);
            if let Some(ttl) = self.inner.config.session_ttl {
                approval = approval.with_ttl(ttl);
            }
            self.cache().insert(approval);
        }

        match state {
            ApprovalState::Approved | ApprovalState::ApprovedForSession => tracing::info!(
                id = %pending.id,
                tool = %request.tool,
                target = %request.target,
                state = %state,
                "approval granted"
            ),
            _ => tracing::warn!(
                id = %pending.id,
                tool = %request.tool,
                target = %request.target,
                state = %state,
                "approval not granted"
            ),
        }

        Resolution::terminal(state, Some(pending.id), reason)
    }

    async fn await_review(&self, pending: &PendingApproval) -> (ApprovalState, Option<String>) {
        let (prompt, response) = PromptRequest::new(pending.clone());
        let prompts = self.inner.prompts.clone();
        let mut cancelled = self.inner.cancelled.subscribe();

        let review = async move {
            prompts.send(prompt).await.ok()?;
            response.await.ok()
        };

        tokio::select! {
            biased;
            _ = cancelled.wait_for(|c| *c) => (ApprovalState::Cancelled, None),
            _ = tokio::time::sleep(self.inner.config.timeout) => (ApprovalState::TimedOut, None),
            response = review => match response {
                Some(ReviewResponse::Approve) => (ApprovalState::Approved, None),
                Some(ReviewResponse::ApproveForSession) => (ApprovalState::ApprovedForSession, None),
                Some(ReviewResponse::Deny { reason }) => (ApprovalState::Denied, reason),
                // Inbox gone or prompt dropped unanswered
                None => (ApprovalState::Cancelled, None),
            },
        }
    }

    /// End the session: outstanding approvals resolve as cancelled and later
    /// Ask decisions are denied without prompting
    pub fn cancel(&self) {
        if !self.inner.cancelled.send_replace(true) {
            tracing::info!(session = %self.session_id(), "session cancelled");
        }
        self.cache().clear();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.borrow()
    }

    /// Number of session-wide approvals currently remembered
    pub fn cached_approvals(&self) -> usize {
        self.cache().len()
    }

    fn cache(&self) -> MutexGuard<'_, ApprovalCache> {
        self.inner.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::approval_channel;
    use warden_permissions::{merge, Rule, ToolCategory};

    fn rule_set() -> RuleSet {
        merge(
            vec![Rule::for_any_target("bash-ask", ToolCategory::Bash, Action::Ask)],
            vec![Rule::new("ls", ToolCategory::Bash, Action::Allow, ["ls*"])],
            vec![Rule::new("rm", ToolCategory::Bash, Action::Deny, ["rm *"])],
            Vec::new(),
        )
        .rule_set
    }

    fn bash(target: &str) -> ActionRequest {
        ActionRequest::new(ToolCategory::Bash, target, "executor")
    }

    #[tokio::test]
    async fn test_allow_and_deny_pass_through() {
        let (sender, mut inbox) = approval_channel(4);
        let gate = InteractionGate::new("s1", sender, GateConfig::default());
        let rules = rule_set();

        let (decision, resolution) = gate.authorize(&rules, &bash("ls -la")).await;
        assert!(decision.is_allowed());
        assert_eq!(resolution.outcome, FinalOutcome::Allow);
        assert_eq!(resolution.state, None);

        let (_, resolution) = gate.authorize(&rules, &bash("rm -rf /")).await;
        assert_eq!(resolution.outcome, FinalOutcome::Deny);

        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_operator_approval() {
        let (sender, mut inbox) = approval_channel(4);
        let gate = InteractionGate::new("s1", sender, GateConfig::default());

        let operator = tokio::spawn(async move {
            let prompt = inbox.recv().await.unwrap();
            assert_eq!(prompt.approval.state(), ApprovalState::Pending);
            assert_eq!(prompt.approval.decision.matched_rule_id.as_deref(), Some("bash-ask"));
            prompt.approve();
        });

        let (_, resolution) = gate.authorize(&rule_set(), &bash("make")).await;
        assert_eq!(resolution.state, Some(ApprovalState::Approved));
        assert!(resolution.is_allowed());
        assert!(resolution.approval_id.is_some());
        // Approved covers this request only.
        assert_eq!(gate.cached_approvals(), 0);
        operator.await.unwrap();
    }

    #[tokio::test]
    async fn test_operator_denial_carries_reason() {
        let (sender, mut inbox) = approval_channel(4);
        let gate = InteractionGate::new("s1", sender, GateConfig::default());

        tokio::spawn(async move {
            let prompt = inbox.recv().await.unwrap();
            prompt.deny(Some("not today".into()));
        });

        let (_, resolution) = gate.authorize(&rule_set(), &bash("make")).await;
        assert_eq!(resolution.state, Some(ApprovalState::Denied));
        assert_eq!(resolution.outcome, FinalOutcome::Deny);
        assert_eq!(resolution.reason.as_deref(), Some("not today"));
    }

    #[tokio::test]
    async fn test_zero_timeout_never_prompts() {
        let (sender, mut inbox) = approval_channel(4);
        let gate = InteractionGate::new("s1", sender, GateConfig::default().with_timeout(Duration::ZERO));

        let (_, resolution) = gate.authorize(&rule_set(), &bash("make")).await;
        assert_eq!(resolution.state, Some(ApprovalState::TimedOut));
        assert_eq!(resolution.outcome, FinalOutcome::Deny);
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_dropped_inbox_cancels() {
        let (sender, inbox) = approval_channel(4);
        drop(inbox);
        let gate = InteractionGate::new("s1", sender, GateConfig::default());

        let (_, resolution) = gate.authorize(&rule_set(), &bash("make")).await;
        assert_eq!(resolution.state, Some(ApprovalState::Cancelled));
        assert_eq!(resolution.outcome, FinalOutcome::Deny);
    }

    #[tokio::test]
    async fn test_cancelled_gate_denies_without_prompt() {
        let (sender, mut inbox) = approval_channel(4);
        let gate = InteractionGate::new("s1", sender, GateConfig::default());
        gate.cancel();
        assert!(gate.is_cancelled());

        let (_, resolution) = gate.authorize(&rule_set(), &bash("make")).await;
        assert_eq!(resolution.state, Some(ApprovalState::Cancelled));
        assert!(resolution.approval_id.is_none());
        assert!(inbox.try_recv().is_none());
    }
}
