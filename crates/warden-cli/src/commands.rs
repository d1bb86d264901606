//! CLI commands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use warden_config::ConfigPaths;

/// Warden - layered permission checks for agent tool calls
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate one action request, prompting when a rule asks
    Check(CheckArgs),

    /// Print the effective rule list in merge order
    Rules(RulesArgs),
}

/// Where to find scope documents
#[derive(Args, Debug)]
pub struct ScopeArgs {
    /// Project root containing `.warden/`
    #[arg(long, default_value = ".")]
    pub project: PathBuf,

    /// Session override document
    #[arg(long)]
    pub session: Option<PathBuf>,
}

impl ScopeArgs {
    pub fn paths(&self) -> ConfigPaths {
        let paths = ConfigPaths::discover(Some(self.project.as_path()));
        match &self.session {
            Some(session) => paths.with_session(session),
            None => paths,
        }
    }
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Tool category (bash, read, edit, or a custom name)
    #[arg(long)]
    pub tool: String,

    /// Command line or file path the tool acts on
    #[arg(long)]
    pub target: String,

    /// Agent making the request
    #[arg(long, default_value = "default")]
    pub agent: String,

    /// Environment tag (e.g. dev, prod)
    #[arg(long = "env")]
    pub environment: Option<String>,

    /// User on whose behalf the agent acts
    #[arg(long)]
    pub user: Option<String>,

    /// File whose size and content feed file conditions
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Seconds to wait for an answer before denying
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Show how every rule fared
    #[arg(long)]
    pub explain: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub scopes: ScopeArgs,
}

#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Include this agent's overrides; without it every agent's overrides
    /// are listed separately
    #[arg(long)]
    pub agent: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub scopes: ScopeArgs,
}
