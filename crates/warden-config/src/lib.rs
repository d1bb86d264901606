//! Permission documents for Warden
//!
//! Reads global, project, session and per-agent documents (JSONC, JSON or
//! YAML), expands their shorthand into canonical rules and merges them into
//! a [`warden_permissions::RuleSet`].

pub mod loader;
pub mod normalize;
pub mod schema;

pub use loader::{
    global_config_dir, load_agent_definition, load_document, load_rule_set, reload, ConfigFormat,
    ConfigPaths, LoadedPolicy, CONFIG_DIR_ENV,
};
pub use normalize::normalize_policies;
pub use schema::{
    AgentDefinition, ConditionDocument, FileSizeDocument, PermissionDocument, RuleDocument,
    TimeWindowDocument, ToolPolicy,
};
