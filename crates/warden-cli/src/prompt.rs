//! Terminal operator: answers approval prompts from stdin

use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use warden_approval::{ApprovalInbox, PromptRequest, ReviewResponse};

/// Answer prompts from stdin until the inbox closes
pub async fn run_terminal_operator(inbox: ApprovalInbox) {
    run_operator(inbox, BufReader::new(tokio::io::stdin())).await;
}

/// Answer prompts from `input`, one line per prompt. Prompts left when the
/// input ends are dropped unanswered.
pub async fn run_operator<R>(mut inbox: ApprovalInbox, input: R)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while let Some(prompt) = inbox.recv().await {
        print_prompt(&prompt);

        match lines.next_line().await {
            Ok(Some(line)) => {
                prompt.respond(parse_answer(&line));
            }
            Ok(None) => {
                tracing::debug!("operator input closed");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to read operator input");
                return;
            }
        }
    }
}

/// `y` approves once, `a` approves for the session, anything else denies
pub fn parse_answer(line: &str) -> ReviewResponse {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ReviewResponse::Approve,
        "a" | "always" => ReviewResponse::ApproveForSession,
        _ => ReviewResponse::Deny {
            reason: Some("denied by operator".to_string()),
        },
    }
}

fn print_prompt(prompt: &PromptRequest) {
    let approval = &prompt.approval;
    eprintln!("{}", "─".repeat(50).dimmed());
    eprintln!("{} {}", "Permission required:".yellow().bold(), approval.request.tool);
    eprintln!("  {}: {}", "Target".cyan(), approval.request.target);
    eprintln!("  {}: {}", "Agent".cyan(), approval.request.agent);
    eprintln!("  {}: {}", "Reason".cyan(), approval.decision.reason.dimmed());
    eprint!("{} ", "Allow? [y]es / [a]lways this session / [n]o:".bold());
}
