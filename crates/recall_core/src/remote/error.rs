//! Backend failure taxonomy.

use crate::model::ValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure class reported by a remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// Referenced entity does not exist.
    NotFound,
    /// Write would violate a uniqueness constraint.
    Conflict,
    /// Backend could not serve the call right now; safe to retry.
    Unavailable,
    /// Request or response payload is malformed.
    Invalid,
}

impl RemoteErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Invalid => "invalid",
        }
    }

    /// Only transient unavailability is worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl Display for RemoteErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by every `RemoteStore` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// Offending entity, id or field in human-readable form.
    pub detail: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(entity: &str, id: Uuid) -> Self {
        Self::new(RemoteErrorKind::NotFound, format!("{entity} {id}"))
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Conflict, detail)
    }

    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Unavailable, detail)
    }

    pub fn invalid(detail: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Invalid, detail)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == RemoteErrorKind::NotFound
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "remote {}: {}", self.kind, self.detail)
    }
}

impl Error for RemoteError {}

impl From<ValidationError> for RemoteError {
    fn from(value: ValidationError) -> Self {
        Self::invalid(format!("response rejected: {value}"))
    }
}
