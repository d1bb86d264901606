//! Action requests submitted by the tool-invocation layer

use chrono::{DateTime, FixedOffset, Local};
use std::path::Path;

use crate::types::ToolCategory;

/// Largest file whose content is loaded for content predicates
pub const MAX_CONTENT_BYTES: u64 = 1024 * 1024;

/// Metadata about the file an action targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Size in bytes
    pub size: u64,
    /// UTF-8 content, when it was available and small enough to load
    pub content: Option<String>,
}

impl FileMeta {
    pub fn new(size: u64) -> Self {
        Self {
            size,
            content: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Read metadata (and, for small text files, content) from disk.
    ///
    /// Returns `Ok(None)` when the path does not exist or is not a file.
    pub fn from_path(path: &Path) -> std::io::Result<Option<Self>> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        let size = metadata.len();
        let content = if size <= MAX_CONTENT_BYTES {
            std::fs::read(path)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
        } else {
            None
        };

        Ok(Some(Self { size, content }))
    }
}

/// One action an agent is attempting
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub tool: ToolCategory,
    /// File path or command literal
    pub target: String,
    pub agent: String,
    pub environment: String,
    pub user: String,
    pub timestamp: DateTime<FixedOffset>,
    pub file_meta: Option<FileMeta>,
}

impl ActionRequest {
    /// Create a request stamped with the current local time
    pub fn new(tool: ToolCategory, target: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            tool,
            target: target.into(),
            agent: agent.into(),
            environment: String::new(),
            user: String::new(),
            timestamp: Local::now().fixed_offset(),
            file_meta: None,
        }
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn at(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_file_meta(mut self, meta: FileMeta) -> Self {
        self.file_meta = Some(meta);
        self
    }

    /// Populate `file_meta` from disk for file categories whose target exists
    pub fn with_file_meta_from_disk(self) -> std::io::Result<Self> {
        self.with_file_meta_from_disk_in(Path::new(""))
    }

    /// Like [`ActionRequest::with_file_meta_from_disk`], with relative targets
    /// resolved against `base`
    pub fn with_file_meta_from_disk_in(mut self, base: &Path) -> std::io::Result<Self> {
        if self.tool.is_path_based() {
            self.file_meta = FileMeta::from_path(&base.join(&self.target))?;
        }
        Ok(self)
    }
}
