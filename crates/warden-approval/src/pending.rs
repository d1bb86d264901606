//! Pending approvals and their lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use warden_permissions::{ActionRequest, Decision};

/// Final answer handed back to the tool-invocation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalOutcome {
    Allow,
    Deny,
}

impl FinalOutcome {
    pub fn is_allow(&self) -> bool {
        matches!(self, FinalOutcome::Allow)
    }
}

/// Lifecycle of a pending approval. Every state except `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    Pending,
    /// Approved for this request only
    Approved,
    /// Approved for the rest of the session, for the matched pattern class
    ApprovedForSession,
    Denied,
    TimedOut,
    Cancelled,
}

impl ApprovalState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalState::Pending)
    }

    /// Outcome for the caller; `None` while still pending.
    ///
    /// Timeouts and cancellations fold into Deny.
    pub fn outcome(&self) -> Option<FinalOutcome> {
        match self {
            ApprovalState::Pending => None,
            ApprovalState::Approved | ApprovalState::ApprovedForSession => Some(FinalOutcome::Allow),
            ApprovalState::Denied | ApprovalState::TimedOut | ApprovalState::Cancelled => {
                Some(FinalOutcome::Deny)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::Pending => "pending",
            ApprovalState::Approved => "approved",
            ApprovalState::ApprovedForSession => "approved_for_session",
            ApprovalState::Denied => "denied",
            ApprovalState::TimedOut => "timed_out",
            ApprovalState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// Durations beyond this are treated as "never" when computing deadlines.
const MAX_TIMEOUT_DAYS: i64 = 365 * 100;

/// An Ask decision waiting for a human answer
#[derive(Debug, Clone)]
pub struct PendingApproval {
    /// Unique request ID
    pub id: String,
    pub request: ActionRequest,
    pub decision: Decision,
    state: ApprovalState,
    pub created_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl PendingApproval {
    pub fn new(request: ActionRequest, decision: Decision, timeout: Duration) -> Self {
        let created_at = Utc::now();
        let timeout = chrono::Duration::from_std(timeout)
            .unwrap_or_else(|_| chrono::Duration::days(MAX_TIMEOUT_DAYS));
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            request,
            decision,
            state: ApprovalState::Pending,
            created_at,
            deadline: created_at + timeout,
        }
    }

    pub fn state(&self) -> ApprovalState {
        self.state
    }

    /// Move to a terminal state. Returns false, leaving the state untouched,
    /// if the approval already finished or `state` is not terminal.
    pub fn finish(&mut self, state: ApprovalState) -> bool {
        if self.state.is_terminal() || !state.is_terminal() {
            return false;
        }
        self.state = state;
        true
    }

    /// Whether the deadline has passed at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}
