//! Document shapes for permission files
//!
//! A tool's policy may be written three ways: a bare action keyword, a map
//! from pattern to action, or an explicit list of rules.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A scope document: global, project or session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PermissionDocument {
    /// Tool category name to policy, in document order
    #[serde(default)]
    pub permissions: IndexMap<String, ToolPolicy>,
}

/// Policy for one tool category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPolicy {
    /// `bash: ask`
    Keyword(String),
    /// `read: { "*": allow, "*.env": deny }`
    Patterns(IndexMap<String, String>),
    /// Explicit rules with ids, descriptions and conditions
    Rules(Vec<RuleDocument>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub patterns: Vec<String>,

    pub action: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<ConditionDocument>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionDocument {
    #[serde(default)]
    pub environments: Vec<String>,

    #[serde(default)]
    pub users: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindowDocument>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<FileSizeDocument>,

    /// Regular expression the file content must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindowDocument {
    /// `HH:MM` or `HH:MM:SS`
    pub start: String,
    pub end: String,
    /// Weekday names (`mon`, `tuesday`, ...); empty means every day
    #[serde(default)]
    pub days: Vec<String>,
}

/// Inclusive size bounds in bytes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSizeDocument {
    #[serde(default)]
    pub min: Option<u64>,
    #[serde(default)]
    pub max: Option<u64>,
}

/// An agent definition file carrying per-agent permission overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub permissions: IndexMap<String, ToolPolicy>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_shapes_from_yaml() {
        let yaml = r#"
permissions:
  bash: ask
  read:
    "*": allow
    "**/*.env": deny
  edit:
    - id: src-edits
      patterns: ["src/**"]
      action: allow
"#;
        let doc: PermissionDocument = serde_yaml_ng::from_str(yaml).unwrap();
        let tools: Vec<_> = doc.permissions.keys().map(String::as_str).collect();
        assert_eq!(tools, ["bash", "read", "edit"]);

        assert_eq!(doc.permissions["bash"], ToolPolicy::Keyword("ask".into()));

        let ToolPolicy::Patterns(read) = &doc.permissions["read"] else {
            panic!("expected pattern map");
        };
        let patterns: Vec<_> = read.keys().map(String::as_str).collect();
        assert_eq!(patterns, ["*", "**/*.env"]);

        let ToolPolicy::Rules(edit) = &doc.permissions["edit"] else {
            panic!("expected rule list");
        };
        assert_eq!(edit[0].id.as_deref(), Some("src-edits"));
        assert!(edit[0].when.is_none());
    }

    #[test]
    fn test_condition_document() {
        let yaml = r#"
- patterns: ["src/**"]
  action: allow
  when:
    environments: [dev]
    time_window: { start: "09:00", end: "17:00", days: [mon, tue] }
    file_size: { max: 1048576 }
    content: "^// SAFE"
"#;
        let rules: Vec<RuleDocument> = serde_yaml_ng::from_str(yaml).unwrap();
        let when = rules[0].when.as_ref().unwrap();
        assert_eq!(when.environments, ["dev"]);
        assert!(when.users.is_empty());
        assert_eq!(when.time_window.as_ref().unwrap().days, ["mon", "tue"]);
        assert_eq!(when.file_size.as_ref().unwrap().max, Some(1048576));
        assert_eq!(when.content.as_deref(), Some("^// SAFE"));
    }

    #[test]
    fn test_unknown_rule_field_rejected() {
        let yaml = r#"
- patterns: ["*"]
  action: allow
  priority: 10
"#;
        assert!(serde_yaml_ng::from_str::<Vec<RuleDocument>>(yaml).is_err());
    }

    #[test]
    fn test_agent_definition_from_json() {
        let json = r#"{
  "name": "security-auditor",
  "permissions": { "bash": "deny" }
}"#;
        let agent: AgentDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(agent.name, "security-auditor");
        assert_eq!(agent.permissions["bash"], ToolPolicy::Keyword("deny".into()));
    }
}
