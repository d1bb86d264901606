//! Channel between waiting actions and the human operator
//!
//! Gates push [`PromptRequest`]s into a bounded FIFO queue; the operator UI
//! drains it through an [`ApprovalInbox`] and answers each prompt through its
//! one-shot responder.

use tokio::sync::{mpsc, oneshot};

use crate::pending::PendingApproval;

/// The operator's answer to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewResponse {
    /// Allow this request only
    Approve,
    /// Allow this request and anything in the same pattern class for the
    /// rest of the session
    ApproveForSession,
    Deny { reason: Option<String> },
}

impl ReviewResponse {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approve | Self::ApproveForSession)
    }
}

/// A prompt awaiting the operator
pub struct PromptRequest {
    /// Snapshot of the approval, still in the pending state
    pub approval: PendingApproval,
    responder: oneshot::Sender<ReviewResponse>,
}

impl std::fmt::Debug for PromptRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptRequest")
            .field("approval", &self.approval)
            .field("responder", &"<oneshot::Sender>")
            .finish()
    }
}

impl PromptRequest {
    /// Create a prompt together with the receiver its answer arrives on
    pub fn new(approval: PendingApproval) -> (Self, oneshot::Receiver<ReviewResponse>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                approval,
                responder: tx,
            },
            rx,
        )
    }

    /// The waiting action gave up (timed out or its session was cancelled)
    pub fn is_stale(&self) -> bool {
        self.responder.is_closed()
    }

    /// Send an answer. Returns false if nobody is waiting any more.
    pub fn respond(self, response: ReviewResponse) -> bool {
        self.responder.send(response).is_ok()
    }

    pub fn approve(self) -> bool {
        self.respond(ReviewResponse::Approve)
    }

    pub fn approve_for_session(self) -> bool {
        self.respond(ReviewResponse::ApproveForSession)
    }

    pub fn deny(self, reason: Option<String>) -> bool {
        self.respond(ReviewResponse::Deny { reason })
    }
}

/// Sending half, shared by every gate that reports to the same operator
#[derive(Debug, Clone)]
pub struct PromptSender {
    sender: mpsc::Sender<PromptRequest>,
}

impl PromptSender {
    /// Queue a prompt. Fails if the inbox has been dropped.
    pub async fn send(&self, prompt: PromptRequest) -> Result<(), PromptRequest> {
        self.sender.send(prompt).await.map_err(|e| e.0)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Receiving half, held by the operator UI
#[derive(Debug)]
pub struct ApprovalInbox {
    receiver: mpsc::Receiver<PromptRequest>,
}

impl ApprovalInbox {
    /// Receive the next prompt that still has someone waiting on it, in
    /// arrival order
    pub async fn recv(&mut self) -> Option<PromptRequest> {
        loop {
            let prompt = self.receiver.recv().await?;
            if prompt.is_stale() {
                tracing::debug!(id = %prompt.approval.id, "skipping stale approval prompt");
                continue;
            }
            return Some(prompt);
        }
    }

    /// Non-blocking variant of [`ApprovalInbox::recv`]
    pub fn try_recv(&mut self) -> Option<PromptRequest> {
        while let Ok(prompt) = self.receiver.try_recv() {
            if !prompt.is_stale() {
                return Some(prompt);
            }
        }
        None
    }

    /// Prompts waiting in the queue, including any whose caller has given up
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// Create an approval channel pair
pub fn approval_channel(buffer: usize) -> (PromptSender, ApprovalInbox) {
    let (sender, receiver) = mpsc::channel(buffer);
    (PromptSender { sender }, ApprovalInbox { receiver })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warden_permissions::{ActionRequest, Decision, ToolCategory};

    fn approval(target: &str) -> PendingApproval {
        let request = ActionRequest::new(ToolCategory::Bash, target, "executor");
        let decision = Decision::default_deny(&request);
        PendingApproval::new(request, decision, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_prompt_round_trip() {
        let (sender, mut inbox) = approval_channel(10);

        let handle = tokio::spawn(async move {
            if let Some(prompt) = inbox.recv().await {
                assert_eq!(prompt.approval.request.target, "ls");
                assert!(prompt.approve());
            }
        });

        let (prompt, rx) = PromptRequest::new(approval("ls"));
        sender.send(prompt).await.unwrap();
        assert_eq!(rx.await.unwrap(), ReviewResponse::Approve);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_inbox_is_fifo_and_skips_stale() {
        let (sender, mut inbox) = approval_channel(10);

        let (first, first_rx) = PromptRequest::new(approval("first"));
        let (second, second_rx) = PromptRequest::new(approval("second"));
        let (third, _third_rx) = PromptRequest::new(approval("third"));
        sender.send(first).await.unwrap();
        sender.send(second).await.unwrap();
        sender.send(third).await.unwrap();
        assert_eq!(inbox.len(), 3);

        // The second caller gave up before the operator got to it.
        drop(second_rx);

        let prompt = inbox.recv().await.unwrap();
        assert_eq!(prompt.approval.request.target, "first");
        assert!(prompt.deny(Some("no".into())));
        assert_eq!(
            first_rx.await.unwrap(),
            ReviewResponse::Deny {
                reason: Some("no".into())
            }
        );

        let prompt = inbox.recv().await.unwrap();
        assert_eq!(prompt.approval.request.target, "third");
    }

    #[tokio::test]
    async fn test_respond_after_caller_left() {
        let (prompt, rx) = PromptRequest::new(approval("ls"));
        drop(rx);
        assert!(prompt.is_stale());
        assert!(!prompt.approve());
    }

    #[tokio::test]
    async fn test_send_fails_without_inbox() {
        let (sender, inbox) = approval_channel(1);
        drop(inbox);
        assert!(sender.is_closed());

        let (prompt, _rx) = PromptRequest::new(approval("ls"));
        assert!(sender.send(prompt).await.is_err());
    }

    #[test]
    fn test_review_response_checks() {
        assert!(ReviewResponse::Approve.is_approved());
        assert!(ReviewResponse::ApproveForSession.is_approved());
        assert!(!ReviewResponse::Deny { reason: None }.is_approved());
    }
}
