//! Action layer: user-visible operations over gateway and store.
//!
//! # Responsibility
//! - Bracket gateway calls and store commits as single logical operations.
//! - Serialize mutations per note id and drop stale list responses.
//! - Retry transient backend failures; surface everything else.
//!
//! # Invariants
//! - A failed action leaves the store exactly as it was.
//! - Deleting an entity that is already gone succeeds silently.

mod folders;
mod guard;
mod notes;
mod retry;
mod session;
mod tags;

pub use session::Session;

use crate::model::note::NoteId;
use crate::model::ValidationError;
use crate::remote::RemoteError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ActionResult<T> = Result<T, ActionError>;

/// Failure surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Input rejected locally; nothing was sent to the backend.
    Validation(ValidationError),
    /// Backend failure after retries were exhausted or not applicable.
    Remote(RemoteError),
    /// Another mutation of the same note held its guard for too long.
    Concurrency { note_id: NoteId, waited_ms: u64 },
}

impl ActionError {
    /// Short stable label for user-facing messages.
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Remote(err) => err.kind.as_str(),
            Self::Concurrency { .. } => "concurrency",
        }
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Remote(err) => write!(f, "{err}"),
            Self::Concurrency { note_id, waited_ms } => write!(
                f,
                "note {note_id} is busy with another change (waited {waited_ms} ms)"
            ),
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Remote(err) => Some(err),
            Self::Concurrency { .. } => None,
        }
    }
}

impl From<ValidationError> for ActionError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RemoteError> for ActionError {
    fn from(value: RemoteError) -> Self {
        Self::Remote(value)
    }
}
