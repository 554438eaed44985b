//! Validating facade over a `RemoteStore`.
//!
//! # Responsibility
//! - Issue exactly one backend call per method.
//! - Reject malformed responses as `RemoteErrorKind::Invalid`.
//! - Emit one `remote_call` log event per call with duration and status.
//!
//! # Invariants
//! - A blank search query is answered by `get_all_notes`.
//! - No retries, no caching.

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::model::folder::{validate_folder_record, FolderId, FolderRecord};
use crate::model::note::{validate_note, Note, NoteId};
use crate::model::tag::{validate_tag, Tag, TagId};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct Gateway {
    remote: Arc<dyn RemoteStore>,
}

impl Gateway {
    pub fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    pub async fn create_note(&self, title: &str, content: &str) -> RemoteResult<Note> {
        let started_at = Instant::now();
        let result = self
            .remote
            .create_note(title, content)
            .await
            .and_then(checked_note);
        finish("create_note", started_at, result)
    }

    pub async fn get_note(&self, id: NoteId) -> RemoteResult<Note> {
        let started_at = Instant::now();
        let result = self.remote.get_note(id).await.and_then(checked_note);
        finish("get_note", started_at, result)
    }

    pub async fn get_all_notes(&self) -> RemoteResult<Vec<Note>> {
        let started_at = Instant::now();
        let result = self.remote.get_all_notes().await.and_then(checked_notes);
        finish("get_all_notes", started_at, result)
    }

    pub async fn update_note(&self, id: NoteId, title: &str, content: &str) -> RemoteResult<Note> {
        let started_at = Instant::now();
        let result = self
            .remote
            .update_note(id, title, content)
            .await
            .and_then(checked_note)
            .and_then(|note| expect_note_id(note, id));
        finish("update_note", started_at, result)
    }

    pub async fn delete_note(&self, id: NoteId) -> RemoteResult<()> {
        let started_at = Instant::now();
        let result = self.remote.delete_note(id).await;
        finish("delete_note", started_at, result)
    }

    pub async fn search_notes(&self, query: &str) -> RemoteResult<Vec<Note>> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return self.get_all_notes().await;
        }

        let started_at = Instant::now();
        let result = self
            .remote
            .search_notes(trimmed)
            .await
            .and_then(checked_notes);
        finish("search_notes", started_at, result)
    }

    pub async fn set_note_pinned(&self, id: NoteId, pinned: bool) -> RemoteResult<Note> {
        let started_at = Instant::now();
        let result = self
            .remote
            .set_note_pinned(id, pinned)
            .await
            .and_then(checked_note)
            .and_then(|note| expect_note_id(note, id));
        finish("set_note_pinned", started_at, result)
    }

    pub async fn set_note_archived(&self, id: NoteId, archived: bool) -> RemoteResult<Note> {
        let started_at = Instant::now();
        let result = self
            .remote
            .set_note_archived(id, archived)
            .await
            .and_then(checked_note)
            .and_then(|note| expect_note_id(note, id));
        finish("set_note_archived", started_at, result)
    }

    pub async fn move_note_to_folder(
        &self,
        id: NoteId,
        folder_id: Option<FolderId>,
    ) -> RemoteResult<Note> {
        let started_at = Instant::now();
        let result = self
            .remote
            .move_note_to_folder(id, folder_id)
            .await
            .and_then(checked_note)
            .and_then(|note| expect_note_id(note, id));
        finish("move_note_to_folder", started_at, result)
    }

    pub async fn create_tag(&self, name: &str) -> RemoteResult<Tag> {
        let started_at = Instant::now();
        let result = self.remote.create_tag(name).await.and_then(checked_tag);
        finish("create_tag", started_at, result)
    }

    pub async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>> {
        let started_at = Instant::now();
        let result = self.remote.get_all_tags().await.and_then(checked_tags);
        finish("get_all_tags", started_at, result)
    }

    pub async fn rename_tag(&self, id: TagId, name: &str) -> RemoteResult<Tag> {
        let started_at = Instant::now();
        let result = self
            .remote
            .rename_tag(id, name)
            .await
            .and_then(checked_tag)
            .and_then(|tag| {
                if tag.id == id {
                    Ok(tag)
                } else {
                    Err(RemoteError::invalid(format!(
                        "response for tag {id} carried tag {}",
                        tag.id
                    )))
                }
            });
        finish("rename_tag", started_at, result)
    }

    pub async fn delete_tag(&self, id: TagId) -> RemoteResult<()> {
        let started_at = Instant::now();
        let result = self.remote.delete_tag(id).await;
        finish("delete_tag", started_at, result)
    }

    pub async fn add_tag_to_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
        let started_at = Instant::now();
        let result = self.remote.add_tag_to_note(note_id, tag_id).await;
        finish("add_tag_to_note", started_at, result)
    }

    pub async fn remove_tag_from_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
        let started_at = Instant::now();
        let result = self.remote.remove_tag_from_note(note_id, tag_id).await;
        finish("remove_tag_from_note", started_at, result)
    }

    pub async fn get_tags_for_note(&self, note_id: NoteId) -> RemoteResult<Vec<Tag>> {
        let started_at = Instant::now();
        let result = self
            .remote
            .get_tags_for_note(note_id)
            .await
            .and_then(checked_tags);
        finish("get_tags_for_note", started_at, result)
    }

    pub async fn create_folder(&self, name: &str) -> RemoteResult<FolderRecord> {
        let started_at = Instant::now();
        let result = self.remote.create_folder(name).await.and_then(checked_folder);
        finish("create_folder", started_at, result)
    }

    pub async fn get_all_folders(&self) -> RemoteResult<Vec<FolderRecord>> {
        let started_at = Instant::now();
        let result = self.remote.get_all_folders().await.and_then(|folders| {
            folders.into_iter().map(checked_folder).collect()
        });
        finish("get_all_folders", started_at, result)
    }

    pub async fn rename_folder(&self, id: FolderId, name: &str) -> RemoteResult<FolderRecord> {
        let started_at = Instant::now();
        let result = self
            .remote
            .rename_folder(id, name)
            .await
            .and_then(checked_folder);
        finish("rename_folder", started_at, result)
    }

    pub async fn delete_folder(&self, id: FolderId) -> RemoteResult<()> {
        let started_at = Instant::now();
        let result = self.remote.delete_folder(id).await;
        finish("delete_folder", started_at, result)
    }
}

fn finish<T>(op: &'static str, started_at: Instant, result: RemoteResult<T>) -> RemoteResult<T> {
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!(
            "event=remote_call module=gateway op={op} status=ok duration_ms={duration_ms}"
        ),
        Err(err) => warn!(
            "event=remote_call module=gateway op={op} status=error duration_ms={duration_ms} error_kind={} error={}",
            err.kind, err.detail
        ),
    }
    result
}

fn checked_note(note: Note) -> RemoteResult<Note> {
    validate_note(&note)?;
    Ok(note)
}

fn checked_notes(notes: Vec<Note>) -> RemoteResult<Vec<Note>> {
    notes.into_iter().map(checked_note).collect()
}

fn checked_tag(tag: Tag) -> RemoteResult<Tag> {
    validate_tag(&tag)?;
    Ok(tag)
}

fn checked_tags(tags: Vec<Tag>) -> RemoteResult<Vec<Tag>> {
    tags.into_iter().map(checked_tag).collect()
}

fn checked_folder(record: FolderRecord) -> RemoteResult<FolderRecord> {
    validate_folder_record(&record)?;
    Ok(record)
}

fn expect_note_id(note: Note, requested: NoteId) -> RemoteResult<Note> {
    if note.id != requested {
        return Err(RemoteError::invalid(format!(
            "response for note {requested} carried note {}",
            note.id
        )));
    }
    Ok(note)
}
