//! Session settings.
//!
//! # Responsibility
//! - Describe tunables of one client session (titles, guards, retries).
//! - Load them from JSON with every field defaulted.
//!
//! # Invariants
//! - A loaded config has passed `SessionConfig::validate`.

use crate::model::note::UNTITLED_NOTE_TITLE;
use crate::store::DEFAULT_EVENT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    /// A field holds a value outside its accepted range.
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read session config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse session config: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid session config `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Backoff schedule for `Unavailable` backend failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 50,
            max_backoff_ms: 1_000,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no backoff.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before attempt `attempt + 1`, doubling from the initial value.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Title given to notes created by `Session::add_note`.
    pub default_note_title: String,
    /// Longest wait for a per-note mutation guard.
    pub mutation_lock_timeout_ms: u64,
    /// Buffered store events per subscriber.
    pub event_capacity: usize,
    pub retry: RetryPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_note_title: UNTITLED_NOTE_TITLE.to_string(),
            mutation_lock_timeout_ms: 5_000,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_note_title.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_note_title",
                reason: "must not be blank",
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be at least 1",
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1",
            });
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid {
                field: "retry.initial_backoff_ms",
                reason: "must not exceed retry.max_backoff_ms",
            });
        }
        Ok(())
    }

    pub fn mutation_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_lock_timeout_ms)
    }
}
