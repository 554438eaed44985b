//! Remote data gateway and backend implementations.
//!
//! # Responsibility
//! - Define the `RemoteStore` capability: one async call per domain verb.
//! - Validate every entity crossing the boundary before callers see it.
//! - Ship a SQLite production backend and an in-memory fake.
//!
//! # Invariants
//! - Backends never retry; retry policy belongs to the action layer.
//! - Failures are propagated with their original `RemoteErrorKind`.

mod error;
mod gateway;
pub mod memory;
pub mod sqlite;

pub use error::{RemoteError, RemoteErrorKind, RemoteResult};
pub use gateway::Gateway;

use crate::model::folder::{FolderId, FolderRecord};
use crate::model::note::{Note, NoteId};
use crate::model::tag::{Tag, TagId};
use async_trait::async_trait;

/// Asynchronous request/response contract of the persistence backend.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn create_note(&self, title: &str, content: &str) -> RemoteResult<Note>;
    async fn get_note(&self, id: NoteId) -> RemoteResult<Note>;
    async fn get_all_notes(&self) -> RemoteResult<Vec<Note>>;
    async fn update_note(&self, id: NoteId, title: &str, content: &str) -> RemoteResult<Note>;
    async fn delete_note(&self, id: NoteId) -> RemoteResult<()>;
    /// Case-insensitive substring match on title or content.
    async fn search_notes(&self, query: &str) -> RemoteResult<Vec<Note>>;
    async fn set_note_pinned(&self, id: NoteId, pinned: bool) -> RemoteResult<Note>;
    async fn set_note_archived(&self, id: NoteId, archived: bool) -> RemoteResult<Note>;
    async fn move_note_to_folder(
        &self,
        id: NoteId,
        folder_id: Option<FolderId>,
    ) -> RemoteResult<Note>;

    async fn create_tag(&self, name: &str) -> RemoteResult<Tag>;
    async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>>;
    /// Conflict when `name` matches another tag ignoring case.
    async fn rename_tag(&self, id: TagId, name: &str) -> RemoteResult<Tag>;
    async fn delete_tag(&self, id: TagId) -> RemoteResult<()>;
    async fn add_tag_to_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()>;
    async fn remove_tag_from_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()>;
    async fn get_tags_for_note(&self, note_id: NoteId) -> RemoteResult<Vec<Tag>>;

    async fn create_folder(&self, name: &str) -> RemoteResult<FolderRecord>;
    async fn get_all_folders(&self) -> RemoteResult<Vec<FolderRecord>>;
    async fn rename_folder(&self, id: FolderId, name: &str) -> RemoteResult<FolderRecord>;
    async fn delete_folder(&self, id: FolderId) -> RemoteResult<()>;
}
