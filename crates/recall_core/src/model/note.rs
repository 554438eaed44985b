//! Note entity.
//!
//! # Invariants
//! - `id` is immutable after creation.
//! - `tag_ids` has set semantics: sorted, no duplicates.
//! - `updated_at` never decreases and is never earlier than `created_at`.

use super::folder::FolderId;
use super::tag::TagId;
use super::{check_id, check_timestamps, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Stable note identifier.
pub type NoteId = Uuid;

/// Title shown for notes whose stored title is blank.
pub const UNTITLED_NOTE_TITLE: &str = "Untitled Note";

/// Cached copy of one backend note.
///
/// `folder_id` and `tag_ids` are explicit optional fields: payloads from the
/// older schema that omit them decode as unfiled and untagged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub content: String,
    pub is_archived: bool,
    pub is_pinned: bool,
    /// Epoch milliseconds.
    pub created_at: i64,
    /// Epoch milliseconds, refreshed by every mutation.
    pub updated_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<FolderId>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

impl Note {
    /// Title to present, falling back to the placeholder when blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED_NOTE_TITLE
        } else {
            self.title.as_str()
        }
    }

    pub fn has_tag(&self, tag_id: TagId) -> bool {
        self.tag_ids.contains(&tag_id)
    }

    /// Returns a copy of this note without `tag_id` in its tag set.
    pub fn without_tag(&self, tag_id: TagId) -> Self {
        let mut next = self.clone();
        next.tag_ids.retain(|id| *id != tag_id);
        next
    }

    /// Whether title or content contains `needle`, ignoring case.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.content.to_lowercase().contains(&needle)
    }
}

/// Validates a note before it is trusted by the store.
pub fn validate_note(note: &Note) -> Result<(), ValidationError> {
    check_id("note", &note.id)?;
    check_timestamps("note", note.created_at, note.updated_at)?;

    let mut seen = HashSet::with_capacity(note.tag_ids.len());
    for tag_id in &note.tag_ids {
        if !seen.insert(*tag_id) {
            return Err(ValidationError::DuplicateReference {
                entity: "note",
                field: "tag_ids",
                id: *tag_id,
            });
        }
    }
    Ok(())
}
