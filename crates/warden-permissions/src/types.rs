//! Permission types and enums
//!
//! Defines the core vocabulary of the permission system: actions, tool
//! categories and the scopes rules are declared in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Action to take when a permission rule applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Allow the operation without asking
    Allow,
    /// Deny the operation
    Deny,
    /// Ask the user for approval
    Ask,
}

impl Action {
    /// Check if this action allows the operation
    pub fn is_allow(&self) -> bool {
        matches!(self, Action::Allow)
    }

    /// Check if this action denies the operation
    pub fn is_deny(&self) -> bool {
        matches!(self, Action::Deny)
    }

    /// Check if this action requires asking the user
    pub fn is_ask(&self) -> bool {
        matches!(self, Action::Ask)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
            Action::Ask => "ask",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a configuration keyword does not name an [`Action`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action keyword `{0}` (expected allow, deny or ask)")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(keyword: &str) -> Result<Self, Self::Err> {
        match keyword.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Action::Allow),
            "deny" => Ok(Action::Deny),
            "ask" => Ok(Action::Ask),
            _ => Err(UnknownAction(keyword.to_string())),
        }
    }
}

/// Tool categories an action request can belong to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolCategory {
    /// Shell command execution
    Bash,
    /// File read operations
    Read,
    /// File write/edit operations
    Edit,
    /// Any other tool, by lowercased name
    Custom(String),
}

impl ToolCategory {
    /// Resolve a tool name (as written in configuration or reported by a
    /// tool layer) to its category.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "bash" | "shell" | "exec" => ToolCategory::Bash,
            "read" | "read_file" | "view" => ToolCategory::Read,
            "edit" | "write" | "write_file" | "multi_edit" => ToolCategory::Edit,
            other => ToolCategory::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ToolCategory::Bash => "bash",
            ToolCategory::Read => "read",
            ToolCategory::Edit => "edit",
            ToolCategory::Custom(name) => name.as_str(),
        }
    }

    /// Whether targets of this category are file paths
    pub fn is_path_based(&self) -> bool {
        matches!(self, ToolCategory::Read | ToolCategory::Edit)
    }
}

impl From<String> for ToolCategory {
    fn from(name: String) -> Self {
        ToolCategory::from_name(&name)
    }
}

impl From<ToolCategory> for String {
    fn from(tool: ToolCategory) -> Self {
        tool.as_str().to_string()
    }
}

impl fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin of a permission rule. Scopes are merged in declaration order of
/// this enum: global rules first, agent overrides last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Project,
    Session,
    AgentOverride,
}

impl Scope {
    /// All scopes in merge order
    pub const ORDER: [Scope; 4] = [
        Scope::Global,
        Scope::Project,
        Scope::Session,
        Scope::AgentOverride,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Global => "global",
            Scope::Project => "project",
            Scope::Session => "session",
            Scope::AgentOverride => "agent_override",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
