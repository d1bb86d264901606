//! Warden - permission checks for agent tool calls

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde::Serialize;
use std::time::Duration;
use warden_approval::{approval_channel, ApprovalState, FinalOutcome, GateConfig, InteractionGate};
use warden_config::{load_rule_set, LoadedPolicy};
use warden_permissions::{
    Action, ActionRequest, CompiledRule, ConfigError, Decision, DecisionEngine, EvaluationTrace,
    FileMeta, Scope, ToolCategory,
};
use warden_telemetry::{init_subscriber, TelemetryConfig};

mod commands;
mod prompt;

use commands::{CheckArgs, Cli, Commands, RulesArgs};

const EXIT_ALLOW: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_DENY: i32 = 2;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_subscriber(
        &TelemetryConfig::default()
            .with_level(&cli.log_level)
            .with_json_output(cli.log_json),
    );

    let result = match &cli.command {
        Commands::Check(args) => run_check(args).await,
        Commands::Rules(args) => run_rules(args).map(|()| EXIT_ALLOW),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
            std::process::exit(EXIT_ERROR);
        }
    }
}

fn load_policy(paths: &warden_config::ConfigPaths) -> LoadedPolicy {
    let loaded = load_rule_set(paths);
    report_rejected_scopes(&loaded.errors);
    loaded
}

fn report_rejected_scopes(errors: &[ConfigError]) {
    for error in errors {
        eprintln!("{}: {}", "Warning".yellow().bold(), error);
    }
}

#[derive(Serialize)]
struct CheckReport<'a> {
    tool: &'a ToolCategory,
    target: &'a str,
    agent: &'a str,
    decision: &'a Decision,
    outcome: FinalOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    approval: Option<ApprovalState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    trace: Option<&'a EvaluationTrace>,
}

async fn run_check(args: &CheckArgs) -> Result<i32> {
    let loaded = load_policy(&args.scopes.paths());
    let request = build_request(args)?;

    let trace = args.explain.then(|| {
        DecisionEngine::new().explain(&request, loaded.rule_set.effective_rules(&args.agent))
    });
    let decision = loaded.rule_set.evaluate(&request);

    let (outcome, approval) = if decision.needs_approval() {
        let (sender, inbox) = approval_channel(1);
        let gate = InteractionGate::new(
            uuid::Uuid::new_v4().to_string(),
            sender,
            GateConfig::default().with_timeout(Duration::from_secs(args.timeout)),
        );
        tokio::spawn(prompt::run_terminal_operator(inbox));

        let resolution = gate.resolve_detailed(&decision, &request).await;
        (resolution.outcome, resolution.state)
    } else if decision.is_allowed() {
        (FinalOutcome::Allow, None)
    } else {
        (FinalOutcome::Deny, None)
    };

    if args.json {
        let report = CheckReport {
            tool: &request.tool,
            target: &request.target,
            agent: &request.agent,
            decision: &decision,
            outcome,
            approval,
            trace: trace.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        if let Some(trace) = &trace {
            print_trace(trace);
        }
        print_decision(&decision, outcome, approval);
    }

    Ok(if outcome.is_allow() { EXIT_ALLOW } else { EXIT_DENY })
}

fn build_request(args: &CheckArgs) -> Result<ActionRequest> {
    let mut request = ActionRequest::new(ToolCategory::from_name(&args.tool), &args.target, &args.agent);

    if let Some(environment) = &args.environment {
        request = request.with_environment(environment);
    }
    if let Some(user) = &args.user {
        request = request.with_user(user);
    }
    match &args.file {
        Some(file) => {
            let meta = FileMeta::from_path(file)
                .with_context(|| format!("Failed to read file metadata: {}", file.display()))?;
            match meta {
                Some(meta) => request = request.with_file_meta(meta),
                None => tracing::warn!(file = %file.display(), "not a regular file; file conditions will not hold"),
            }
        }
        // Read and edit targets are paths relative to the project; use them
        // when they exist.
        None => {
            request = request
                .with_file_meta_from_disk_in(&args.scopes.project)
                .with_context(|| format!("Failed to read file metadata: {}", args.target))?;
        }
    }

    Ok(request)
}

fn outcome_label(action: Action) -> colored::ColoredString {
    match action {
        Action::Allow => "ALLOW".green().bold(),
        Action::Deny => "DENY".red().bold(),
        Action::Ask => "ASK".yellow().bold(),
    }
}

fn print_decision(decision: &Decision, outcome: FinalOutcome, approval: Option<ApprovalState>) {
    println!("{} {}", outcome_label(decision.outcome), decision.reason);

    if let Some(state) = approval {
        let final_label = match outcome {
            FinalOutcome::Allow => "ALLOW".green().bold(),
            FinalOutcome::Deny => "DENY".red().bold(),
        };
        println!("{} approval {}", final_label, state.to_string().dimmed());
    }
}

fn print_trace(trace: &EvaluationTrace) {
    println!("{}", "Rules in merge order:".cyan().bold());
    for (index, rule) in trace.rules.iter().enumerate() {
        let status = match (rule.applies, rule.condition_held) {
            (false, _) => "skip".dimmed(),
            (true, Some(false)) => "condition failed".yellow(),
            (true, _) => "match".green(),
        };
        println!(
            "  {:>3}. [{}] {} {} {}",
            index + 1,
            rule.scope,
            rule.rule_id,
            outcome_label(rule.action),
            status
        );
    }
    println!("{}", "─".repeat(50).dimmed());
}

#[derive(Serialize)]
struct RuleRow<'a> {
    scope: Scope,
    #[serde(skip_serializing_if = "Option::is_none")]
    agent: Option<&'a str>,
    id: &'a str,
    tool: &'a ToolCategory,
    action: Action,
    patterns: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
}

impl<'a> RuleRow<'a> {
    fn new(rule: &'a CompiledRule, agent: Option<&'a str>) -> Self {
        Self {
            scope: rule.scope(),
            agent,
            id: rule.id(),
            tool: rule.tool(),
            action: rule.action(),
            patterns: &rule.rule().patterns,
            description: rule.rule().description.as_deref(),
        }
    }
}

fn run_rules(args: &RulesArgs) -> Result<()> {
    let loaded = load_policy(&args.scopes.paths());
    let rule_set = &loaded.rule_set;

    let rows: Vec<RuleRow<'_>> = match &args.agent {
        Some(agent) => rule_set
            .effective_rules(agent)
            .map(|rule| {
                let owner = (rule.scope() == Scope::AgentOverride).then_some(agent.as_str());
                RuleRow::new(rule, owner)
            })
            .collect(),
        None => {
            let base = [Scope::Global, Scope::Project, Scope::Session]
                .into_iter()
                .flat_map(|scope| rule_set.scope_rules(scope, None))
                .map(|rule| RuleRow::new(rule, None));
            let overrides = rule_set.agents().flat_map(|agent| {
                rule_set
                    .scope_rules(Scope::AgentOverride, Some(agent))
                    .iter()
                    .map(move |rule| RuleRow::new(rule, Some(agent)))
            });
            base.chain(overrides).collect()
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("{}", "No permission rules configured; every request is denied.".dimmed());
        return Ok(());
    }

    for (index, row) in rows.iter().enumerate() {
        let scope = match row.agent {
            Some(agent) => format!("{}({})", row.scope, agent),
            None => row.scope.to_string(),
        };
        println!(
            "{:>3}. {} {} {} {} {}",
            index + 1,
            format!("[{}]", scope).cyan(),
            row.id,
            row.tool.to_string().bold(),
            outcome_label(row.action),
            row.patterns.join(" ")
        );
        if let Some(description) = row.description {
            println!("     {}", description.dimmed());
        }
    }

    Ok(())
}
