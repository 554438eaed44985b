//! Folder entity and membership projection.
//!
//! Membership is derived from `Note::folder_id`; `note_ids` and `note_count`
//! are computed here and never written independently.

use super::note::{Note, NoteId};
use super::{check_id, check_timestamps, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable folder identifier.
pub type FolderId = Uuid;

/// Folder row as stored by the backend, without derived membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: FolderId,
    pub name: String,
    pub is_archived: bool,
    pub is_pinned: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Folder with its projected member notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    pub is_archived: bool,
    pub is_pinned: bool,
    /// Always equal to `note_ids.len()`.
    pub note_count: usize,
    /// Members in the order they appear in the source note list.
    pub note_ids: Vec<NoteId>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Folder {
    /// Projects membership of `record` from the notes that point at it.
    pub fn project(record: &FolderRecord, notes: &[Note]) -> Self {
        let note_ids: Vec<NoteId> = notes
            .iter()
            .filter(|note| note.folder_id == Some(record.id))
            .map(|note| note.id)
            .collect();
        Self {
            id: record.id,
            name: record.name.clone(),
            is_archived: record.is_archived,
            is_pinned: record.is_pinned,
            note_count: note_ids.len(),
            note_ids,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn contains(&self, note_id: NoteId) -> bool {
        self.note_ids.contains(&note_id)
    }
}

/// Validates a folder record returned by the backend.
pub fn validate_folder_record(record: &FolderRecord) -> Result<(), ValidationError> {
    check_id("folder", &record.id)?;
    if record.name.trim().is_empty() {
        return Err(ValidationError::BlankField {
            entity: "folder",
            field: "name",
        });
    }
    check_timestamps("folder", record.created_at, record.updated_at)
}

/// Validates a projected folder, including the derived counter.
pub fn validate_folder(folder: &Folder) -> Result<(), ValidationError> {
    check_id("folder", &folder.id)?;
    if folder.name.trim().is_empty() {
        return Err(ValidationError::BlankField {
            entity: "folder",
            field: "name",
        });
    }
    if folder.note_count != folder.note_ids.len() {
        return Err(ValidationError::CountMismatch {
            entity: "folder",
            expected: folder.note_ids.len(),
            actual: folder.note_count,
        });
    }
    check_timestamps("folder", folder.created_at, folder.updated_at)
}

/// Trims a folder name; `None` when blank.
pub fn normalize_folder_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
