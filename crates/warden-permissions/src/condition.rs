//! Contextual predicates gating a rule
//!
//! Every present sub-check must hold. Checks that need context the request
//! does not carry (file size, content) fail closed.

use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, Weekday};
use regex::Regex;
use std::collections::BTreeSet;

use crate::request::ActionRequest;

/// Half-open time-of-day window, optionally restricted to certain weekdays.
///
/// When `end < start` the window wraps past midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// Weekdays the window is active on; empty means every day
    pub days: Vec<Weekday>,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            start,
            end,
            days: Vec::new(),
        }
    }

    pub fn on_days(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days = days.into_iter().collect();
        self
    }

    /// Check the wall-clock time of `timestamp` in its own offset
    pub fn contains(&self, timestamp: &DateTime<FixedOffset>) -> bool {
        if !self.days.is_empty() && !self.days.contains(&timestamp.weekday()) {
            return false;
        }

        let time = timestamp.time();
        if self.start < self.end {
            time >= self.start && time < self.end
        } else if self.end < self.start {
            time >= self.start || time < self.end
        } else {
            false
        }
    }
}

/// Inclusive byte-size bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl SizeRange {
    pub fn contains(&self, size: u64) -> bool {
        self.min.map_or(true, |min| size >= min) && self.max.map_or(true, |max| size <= max)
    }

    pub fn is_valid(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }
}

/// Predicate over request context attached to a rule
#[derive(Debug, Clone, Default)]
pub struct Condition {
    /// Environment tags the rule is limited to; empty means any
    pub environments: BTreeSet<String>,
    /// User ids the rule is limited to; empty means any
    pub users: BTreeSet<String>,
    pub time_window: Option<TimeWindow>,
    pub file_size: Option<SizeRange>,
    pub content_pattern: Option<Regex>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_environments<I, S>(mut self, environments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environments = environments.into_iter().map(Into::into).collect();
        self
    }

    pub fn for_users<I, S>(mut self, users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.users = users.into_iter().map(Into::into).collect();
        self
    }

    pub fn during(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    pub fn with_file_size(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.file_size = Some(SizeRange { min, max });
        self
    }

    /// Require file content to match `pattern`
    pub fn with_content_pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        self.content_pattern = Some(Regex::new(pattern)?);
        Ok(self)
    }

    /// Shape problems that make the condition unusable
    pub fn validate(&self) -> Result<(), String> {
        if let Some(range) = &self.file_size {
            if !range.is_valid() {
                return Err(format!(
                    "file size minimum {} exceeds maximum {}",
                    range.min.unwrap_or_default(),
                    range.max.unwrap_or_default()
                ));
            }
        }
        Ok(())
    }

    /// Evaluate the condition against a request
    pub fn holds(&self, request: &ActionRequest) -> bool {
        if !self.environments.is_empty() && !self.environments.contains(&request.environment) {
            return false;
        }

        if !self.users.is_empty() && !self.users.contains(&request.user) {
            return false;
        }

        if let Some(window) = &self.time_window {
            if !window.contains(&request.timestamp) {
                return false;
            }
        }

        if let Some(range) = &self.file_size {
            match &request.file_meta {
                Some(meta) if range.contains(meta.size) => {}
                _ => return false,
            }
        }

        if let Some(pattern) = &self.content_pattern {
            let content = request
                .file_meta
                .as_ref()
                .and_then(|meta| meta.content.as_deref());
            match content {
                Some(content) if pattern.is_match(content) => {}
                _ => return false,
            }
        }

        true
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.environments == other.environments
            && self.users == other.users
            && self.time_window == other.time_window
            && self.file_size == other.file_size
            && self.content_pattern.as_ref().map(Regex::as_str)
                == other.content_pattern.as_ref().map(Regex::as_str)
    }
}

/// Evaluate an optional condition; an absent condition always holds
pub fn holds(condition: Option<&Condition>, request: &ActionRequest) -> bool {
    condition.map_or(true, |c| c.holds(request))
}
