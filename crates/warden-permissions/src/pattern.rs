//! Glob pattern matching with negation and path expansion
//!
//! A rule carries an ordered list of patterns that is evaluated
//! gitignore-style: positive patterns switch the result on, `!`-prefixed
//! patterns switch it back off, and the last pattern to touch the target wins.

use globset::{GlobBuilder, GlobMatcher};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::types::ToolCategory;

/// Error type for pattern operations
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("pattern `{0}` has nothing to match after the negation marker")]
    EmptyGlob(String),

    #[error("pattern list is empty")]
    EmptyList,

    #[error("path expansion failed: {0}")]
    ExpansionFailed(String),
}

/// How targets are interpreted while matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchMode {
    /// File paths: `*` stops at `/`, `**` crosses directories
    Path,
    /// Command literals and other free-form targets: `*` matches anything
    Command,
}

impl MatchMode {
    pub fn for_tool(tool: &ToolCategory) -> Self {
        if tool.is_path_based() {
            MatchMode::Path
        } else {
            MatchMode::Command
        }
    }

    /// Bring a target into the canonical form patterns are compiled against
    pub fn normalize_target(&self, target: &str) -> String {
        match self {
            MatchMode::Path => {
                let expanded = expand_path(target).unwrap_or_else(|_| target.to_string());
                normalize_path(&expanded)
            }
            MatchMode::Command => target.trim().to_string(),
        }
    }
}

/// A single compiled glob, possibly negated
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Pattern as written, including any `!` marker
    original: String,
    /// Glob after negation stripping and expansion
    glob: String,
    negated: bool,
    /// Path patterns without a `/` also match the final path component
    match_basename: bool,
    matcher: GlobMatcher,
}

impl Pattern {
    /// Compile a pattern for the given match mode
    ///
    /// A leading `!` negates the pattern; `\!` matches a literal `!`.
    /// Path patterns support the following expansions:
    /// - `~/` → User home directory
    /// - `$HOME/` → User home directory
    /// - `$CWD/` → Current working directory
    pub fn new(pattern: &str, mode: MatchMode) -> Result<Self, PatternError> {
        let trimmed = pattern.trim();
        let (negated, body) = if let Some(rest) = trimmed.strip_prefix("\\!") {
            (false, format!("!{rest}"))
        } else if let Some(rest) = trimmed.strip_prefix('!') {
            (true, rest.to_string())
        } else {
            (false, trimmed.to_string())
        };

        if body.is_empty() {
            return Err(PatternError::EmptyGlob(pattern.to_string()));
        }

        let glob = match mode {
            MatchMode::Path => normalize_glob(&expand_path(&body)?),
            MatchMode::Command => body,
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(mode == MatchMode::Path)
            .backslash_escape(true)
            .build()
            .map_err(|source| PatternError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();

        Ok(Self {
            original: pattern.to_string(),
            match_basename: mode == MatchMode::Path && !glob.contains('/'),
            glob,
            negated,
            matcher,
        })
    }

    /// Check whether the un-negated glob matches a normalized target
    pub fn matches(&self, target: &str) -> bool {
        if self.matcher.is_match(target) {
            return true;
        }
        self.match_basename
            && target
                .rsplit('/')
                .next()
                .is_some_and(|name| name != target && self.matcher.is_match(name))
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Get the original pattern string
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Get the glob actually compiled
    pub fn glob(&self) -> &str {
        &self.glob
    }
}

/// An ordered, compiled pattern list evaluated with last-touch-wins negation
#[derive(Debug, Clone)]
pub struct PatternList {
    mode: MatchMode,
    patterns: Arc<[Pattern]>,
}

impl PatternList {
    /// Compile a non-empty list of patterns
    pub fn compile<I, S>(patterns: I, mode: MatchMode) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| Pattern::new(p.as_ref(), mode))
            .collect::<Result<Vec<_>, _>>()?;

        if compiled.is_empty() {
            return Err(PatternError::EmptyList);
        }

        Ok(Self {
            mode,
            patterns: compiled.into(),
        })
    }

    /// Whether the list as a whole applies to `target`
    pub fn applies(&self, target: &str) -> bool {
        self.deciding_pattern(target).is_some()
    }

    /// The positive pattern that left the list matched, if the list applies
    pub fn deciding_pattern(&self, target: &str) -> Option<&Pattern> {
        let target = self.mode.normalize_target(target);
        let mut matched: Option<&Pattern> = None;

        for pattern in self.patterns.iter() {
            if pattern.negated {
                if matched.is_some() && pattern.matches(&target) {
                    matched = None;
                }
            } else if pattern.matches(&target) {
                matched = Some(pattern);
            }
        }

        matched
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Original pattern strings in declaration order
    pub fn sources(&self) -> impl Iterator<Item = &str> + '_ {
        self.patterns.iter().map(Pattern::original)
    }
}

impl PartialEq for PatternList {
    fn eq(&self, other: &Self) -> bool {
        self.mode == other.mode && self.sources().eq(other.sources())
    }
}

impl fmt::Display for PatternList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, source) in self.sources().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(source)?;
        }
        Ok(())
    }
}

/// Expand path variables in a string
///
/// Supported expansions:
/// - `~/` → User home directory
/// - `$HOME/` or `$HOME` → User home directory
/// - `$CWD/` or `$CWD` → Current working directory
pub fn expand_path(path: &str) -> Result<String, PatternError> {
    let mut result = path.to_string();

    if result.starts_with("~/") {
        let home = home_dir()
            .ok_or_else(|| PatternError::ExpansionFailed("could not find home directory".into()))?;
        result = format!("{}{}", home.display(), &result[1..]);
    }

    if result.contains("$HOME") {
        let home = home_dir()
            .ok_or_else(|| PatternError::ExpansionFailed("could not find home directory".into()))?;
        result = result.replace("$HOME", &home.display().to_string());
    }

    if result.contains("$CWD") {
        let cwd = std::env::current_dir()
            .map_err(|e| PatternError::ExpansionFailed(format!("could not get cwd: {}", e)))?;
        result = result.replace("$CWD", &cwd.display().to_string());
    }

    Ok(result)
}

/// Normalize a path for matching
///
/// Normalizes separators, drops empty and `.` segments, and folds `..` into
/// its parent. A `..` that climbs above an absolute root is dropped; above a
/// relative root it is kept, so `src/../../etc` becomes `../etc` and no
/// pattern anchored inside the tree applies to it.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return String::new();
    }

    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

// Backslashes are glob escapes here, so only the prefix and suffix are touched.
fn normalize_glob(glob: &str) -> String {
    let mut result = glob;
    while let Some(rest) = result.strip_prefix("./") {
        result = rest;
    }
    let mut result = result.to_string();
    while result.ends_with('/') && result.len() > 1 {
        result.pop();
    }
    result
}

/// Get the home directory as a PathBuf
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}
