use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use warden_permissions::{agent_scope_label, ConfigError, PolicyStore, RuleSet, RuleSetBuilder, Scope};

use crate::normalize::normalize_policies;
use crate::schema::{AgentDefinition, PermissionDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Jsonc,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;

        match ext {
            "jsonc" => Some(Self::Jsonc),
            "json" => Some(Self::Json),
            "yml" | "yaml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Overrides the global configuration directory
pub const CONFIG_DIR_ENV: &str = "WARDEN_CONFIG_DIR";

const PERMISSION_CANDIDATES: &[&str] = &[
    "permissions.jsonc",
    "permissions.json",
    "permissions.yml",
    "permissions.yaml",
];

pub fn load_document(path: &Path) -> Result<PermissionDocument> {
    load_file(path)
}

pub fn load_agent_definition(path: &Path) -> Result<AgentDefinition> {
    let agent: AgentDefinition = load_file(path)?;
    if agent.name.trim().is_empty() {
        return Err(anyhow!("Agent definition has an empty name: {}", path.display()));
    }
    Ok(agent)
}

fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let format = ConfigFormat::from_path(path)
        .ok_or_else(|| anyhow!("Unknown config format for: {}", path.display()))?;

    parse_content(&content, format)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

fn parse_content<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> Result<T> {
    match format {
        ConfigFormat::Jsonc => json5::from_str(content).context("Failed to parse JSONC"),
        ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON"),
        ConfigFormat::Yaml => serde_yaml_ng::from_str(content).context("Failed to parse YAML"),
    }
}

/// Global configuration directory: `$WARDEN_CONFIG_DIR`, else
/// `$XDG_CONFIG_HOME/warden`, else `~/.config/warden`
pub fn global_config_dir() -> Option<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    if let Some(xdg) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join("warden"));
    }
    dirs::home_dir().map(|home| home.join(".config").join("warden"))
}

fn find_permission_file(dir: &Path) -> Option<PathBuf> {
    PERMISSION_CANDIDATES
        .iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.is_file())
}

/// Where each scope's document lives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    pub global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub session: Option<PathBuf>,
    /// Directory of agent definition documents
    pub agents_dir: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover scope documents from the global directory and a project root
    pub fn discover(project_root: Option<&Path>) -> Self {
        Self::discover_in(global_config_dir().as_deref(), project_root)
    }

    pub fn discover_in(global_dir: Option<&Path>, project_root: Option<&Path>) -> Self {
        let project_dir = project_root.map(|root| root.join(".warden"));
        Self {
            global: global_dir.and_then(find_permission_file),
            project: project_dir.as_deref().and_then(find_permission_file),
            session: None,
            agents_dir: project_dir
                .map(|dir| dir.join("agents"))
                .filter(|dir| dir.is_dir()),
        }
    }

    pub fn with_session(mut self, path: impl Into<PathBuf>) -> Self {
        self.session = Some(path.into());
        self
    }
}

/// A rule set built from documents, with the scopes that were rejected
#[derive(Debug, Default)]
pub struct LoadedPolicy {
    pub rule_set: RuleSet,
    pub errors: Vec<ConfigError>,
    /// Documents that contributed rules
    pub sources: Vec<PathBuf>,
}

/// Load every scope and merge them. A scope that fails to read, parse or
/// validate contributes no rules; the others still load.
pub fn load_rule_set(paths: &ConfigPaths) -> LoadedPolicy {
    let mut builder = RuleSetBuilder::new();
    let mut errors = Vec::new();
    let mut sources = Vec::new();

    for (scope, path) in [
        (Scope::Global, &paths.global),
        (Scope::Project, &paths.project),
        (Scope::Session, &paths.session),
    ] {
        let Some(path) = path else { continue };
        let label = scope.as_str();

        let result = load_document(path)
            .map_err(|e| document_error(label, &e))
            .and_then(|doc| normalize_policies(label, &doc.permissions))
            .and_then(|rules| match scope {
                Scope::Global => builder.global(rules),
                Scope::Project => builder.project(rules),
                _ => builder.session(rules),
            });

        match result {
            Ok(()) => sources.push(path.clone()),
            Err(e) => errors.push(e),
        }
    }

    if let Some(dir) = &paths.agents_dir {
        for path in agent_files(dir) {
            match load_agent(&mut builder, &path) {
                Ok(()) => sources.push(path),
                Err(e) => errors.push(e),
            }
        }
    }

    for error in &errors {
        tracing::warn!(scope = error.scope(), error = %error, "permission scope not loaded");
    }

    LoadedPolicy {
        rule_set: builder.build(),
        errors,
        sources,
    }
}

fn load_agent(builder: &mut RuleSetBuilder, path: &Path) -> Result<(), ConfigError> {
    let agent = load_agent_definition(path).map_err(|e| {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        document_error(&agent_scope_label(&stem), &e)
    })?;

    let label = agent_scope_label(&agent.name);
    let rules = normalize_policies(&label, &agent.permissions)?;
    builder.agent_override(agent.name, rules)
}

/// Agent documents in file-name order; unreadable directories are skipped
fn agent_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot read agents directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && ConfigFormat::from_path(path).is_some())
        .collect();
    files.sort();
    files
}

fn document_error(scope: &str, error: &anyhow::Error) -> ConfigError {
    ConfigError::Document {
        scope: scope.to_string(),
        message: format!("{error:#}"),
    }
}

/// Reload every scope into `store`. The new rule set replaces the old one
/// even when some scopes were rejected.
pub fn reload(store: &PolicyStore, paths: &ConfigPaths) -> Vec<ConfigError> {
    let loaded = load_rule_set(paths);
    store.replace(loaded.rule_set);
    loaded.errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_format_from_path() {
        assert_eq!(
            ConfigFormat::from_path(Path::new("permissions.jsonc")),
            Some(ConfigFormat::Jsonc)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("permissions.json")),
            Some(ConfigFormat::Json)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("permissions.yml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(
            ConfigFormat::from_path(Path::new("permissions.yaml")),
            Some(ConfigFormat::Yaml)
        );
        assert_eq!(ConfigFormat::from_path(Path::new("permissions.toml")), None);
    }

    #[test]
    fn test_load_jsonc_with_comments() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("permissions.jsonc");
        fs::write(
            &path,
            r#"{
  // Allow reads everywhere
  "permissions": {
    "read": "allow", /* trailing comma is fine */
  }
}"#,
        )
        .unwrap();

        let doc = load_document(&path).unwrap();
        assert_eq!(doc.permissions.len(), 1);
    }

    #[test]
    fn test_load_document_errors_carry_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("permissions.yaml");
        fs::write(&path, "permissions: [unclosed").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(format!("{err:#}").contains("permissions.yaml"));

        let missing = dir.path().join("missing.json");
        assert!(load_document(&missing).is_err());
    }

    #[test]
    fn test_agent_definition_requires_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.yaml");
        fs::write(&path, "name: \"  \"\npermissions:\n  bash: deny\n").unwrap();
        assert!(load_agent_definition(&path).is_err());
    }

    #[test]
    fn test_discover_in_prefers_first_candidate() {
        let global = TempDir::new().unwrap();
        fs::write(global.path().join("permissions.yaml"), "permissions: {}\n").unwrap();
        fs::write(global.path().join("permissions.json"), "{}").unwrap();

        let project = TempDir::new().unwrap();
        let paths = ConfigPaths::discover_in(Some(global.path()), Some(project.path()));
        assert_eq!(paths.global, Some(global.path().join("permissions.json")));
        assert_eq!(paths.project, None);
        assert_eq!(paths.agents_dir, None);
        assert_eq!(paths.session, None);
    }
}
