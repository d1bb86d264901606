//! Warden Approval - human confirmation for Ask decisions
//!
//! This crate turns the decision engine's Ask outcome into a final Allow or
//! Deny:
//! - Queueing prompts for the operator in arrival order
//! - Awaiting the answer with a timeout
//! - Cancelling outstanding prompts when the session ends
//! - Remembering session-wide approvals per pattern class
//!
//! ```rust,no_run
//! use warden_approval::{approval_channel, GateConfig, InteractionGate};
//! use warden_permissions::{merge, Action, ActionRequest, Rule, ToolCategory};
//!
//! # async fn run() {
//! let (sender, mut inbox) = approval_channel(32);
//! let gate = InteractionGate::new("session-1", sender, GateConfig::default());
//!
//! tokio::spawn(async move {
//!     while let Some(prompt) = inbox.recv().await {
//!         prompt.approve_for_session();
//!     }
//! });
//!
//! let rules = merge(
//!     vec![Rule::new("npm", ToolCategory::Bash, Action::Ask, ["npm run *"])],
//!     vec![],
//!     vec![],
//!     Vec::new(),
//! )
//! .rule_set;
//! let request = ActionRequest::new(ToolCategory::Bash, "npm run build", "executor");
//! let (_decision, resolution) = gate.authorize(&rules, &request).await;
//! assert!(resolution.is_allowed());
//! # }
//! ```

pub mod cache;
pub mod channel;
pub mod gate;
pub mod pending;

pub use cache::{ApprovalCache, ApprovalKey, CachedApproval};
pub use channel::{approval_channel, ApprovalInbox, PromptRequest, PromptSender, ReviewResponse};
pub use gate::{GateConfig, InteractionGate, Resolution, DEFAULT_TIMEOUT};
pub use pending::{ApprovalState, FinalOutcome, PendingApproval};
