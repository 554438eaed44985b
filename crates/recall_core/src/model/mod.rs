//! Domain model for notes, tags and folders.
//!
//! # Responsibility
//! - Define canonical entity shapes shared by gateway, store and actions.
//! - Provide side-effect free validation predicates for backend responses.
//!
//! # Invariants
//! - Every entity is identified by a stable UUID that is never reused.
//! - `updated_at >= created_at` for every entity.
//! - `Note::folder_id` is authoritative; folder membership is a projection.

pub mod folder;
pub mod note;
pub mod tag;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Local shape violation found before an entity is trusted or sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Entity id is the nil UUID.
    NilId { entity: &'static str },
    /// A required text field is blank after trim.
    BlankField {
        entity: &'static str,
        field: &'static str,
    },
    /// `updated_at` is earlier than `created_at`.
    TimestampOrder {
        entity: &'static str,
        created_at: i64,
        updated_at: i64,
    },
    /// A set-like collection holds the same id twice.
    DuplicateReference {
        entity: &'static str,
        field: &'static str,
        id: uuid::Uuid,
    },
    /// A derived counter disagrees with its source collection.
    CountMismatch {
        entity: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId { entity } => write!(f, "{entity} id must not be nil"),
            Self::BlankField { entity, field } => {
                write!(f, "{entity}.{field} must not be blank")
            }
            Self::TimestampOrder {
                entity,
                created_at,
                updated_at,
            } => write!(
                f,
                "{entity}.updated_at ({updated_at}) is earlier than created_at ({created_at})"
            ),
            Self::DuplicateReference { entity, field, id } => {
                write!(f, "{entity}.{field} contains duplicate id {id}")
            }
            Self::CountMismatch {
                entity,
                expected,
                actual,
            } => write!(
                f,
                "{entity}.note_count is {actual} but note_ids holds {expected} entries"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn check_timestamps(
    entity: &'static str,
    created_at: i64,
    updated_at: i64,
) -> Result<(), ValidationError> {
    if updated_at < created_at {
        return Err(ValidationError::TimestampOrder {
            entity,
            created_at,
            updated_at,
        });
    }
    Ok(())
}

pub(crate) fn check_id(entity: &'static str, id: &uuid::Uuid) -> Result<(), ValidationError> {
    if id.is_nil() {
        return Err(ValidationError::NilId { entity });
    }
    Ok(())
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
