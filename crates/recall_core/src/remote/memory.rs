//! In-memory `RemoteStore` for tests and demos.
//!
//! Enforces the same invariants as the SQLite backend and adds two test
//! hooks: per-operation (and per-search-query) artificial latency, and a
//! queue of injected failures per operation.
//!
//! Latency is served before the state lock is taken, so slow calls do not
//! serialize unrelated ones.

use super::{RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
use crate::model::folder::{normalize_folder_name, FolderId, FolderRecord};
use crate::model::note::{Note, NoteId};
use crate::model::now_epoch_ms;
use crate::model::tag::{normalize_tag_name, tag_name_key, Tag, TagId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    /// Insertion order; newest last.
    notes: Vec<Note>,
    tags: Vec<Tag>,
    folders: Vec<FolderRecord>,
    /// Last timestamp handed out, keeps the clock monotonic.
    clock: i64,
}

impl MemoryState {
    fn tick(&mut self) -> i64 {
        self.clock = self.clock.max(now_epoch_ms());
        self.clock
    }

    fn note_mut(&mut self, id: NoteId) -> RemoteResult<&mut Note> {
        self.notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| RemoteError::not_found("note", id))
    }

    fn touch(&mut self, id: NoteId) -> RemoteResult<Note> {
        let now = self.tick();
        let note = self.note_mut(id)?;
        note.updated_at = note.updated_at.max(now);
        Ok(note.clone())
    }

    fn ensure_tag(&self, id: TagId) -> RemoteResult<()> {
        if self.tags.iter().any(|tag| tag.id == id) {
            Ok(())
        } else {
            Err(RemoteError::not_found("tag", id))
        }
    }
}

#[derive(Default)]
struct Hooks {
    latency: HashMap<&'static str, Duration>,
    search_latency: HashMap<String, Duration>,
    faults: HashMap<&'static str, VecDeque<RemoteErrorKind>>,
    calls: HashMap<&'static str, usize>,
}

/// Process-local backend fake.
#[derive(Default)]
pub struct InMemoryRemoteStore {
    state: Mutex<MemoryState>,
    hooks: StdMutex<Hooks>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every future call of `op` by `delay`.
    pub fn set_latency(&self, op: &'static str, delay: Duration) {
        self.with_hooks(|hooks| {
            hooks.latency.insert(op, delay);
        });
    }

    /// Delays `search_notes` calls whose trimmed query equals `query`.
    pub fn set_search_latency(&self, query: &str, delay: Duration) {
        self.with_hooks(|hooks| {
            hooks.search_latency.insert(query.trim().to_string(), delay);
        });
    }

    /// Makes the next `times` calls of `op` fail with `kind`.
    pub fn fail_next(&self, op: &'static str, kind: RemoteErrorKind, times: usize) {
        self.with_hooks(|hooks| {
            let queue = hooks.faults.entry(op).or_default();
            queue.extend(std::iter::repeat(kind).take(times));
        });
    }

    /// Number of times `op` was invoked, failed attempts included.
    pub fn call_count(&self, op: &'static str) -> usize {
        self.with_hooks(|hooks| hooks.calls.get(op).copied().unwrap_or(0))
    }

    fn with_hooks<T>(&self, f: impl FnOnce(&mut Hooks) -> T) -> T {
        let mut hooks = self
            .hooks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut hooks)
    }

    async fn enter(&self, op: &'static str, search_query: Option<&str>) -> RemoteResult<()> {
        let (delay, fault) = self.with_hooks(|hooks| {
            *hooks.calls.entry(op).or_insert(0) += 1;
            let delay = search_query
                .and_then(|query| hooks.search_latency.get(query.trim()).copied())
                .or_else(|| hooks.latency.get(op).copied());
            let fault = hooks.faults.get_mut(op).and_then(VecDeque::pop_front);
            (delay, fault)
        });

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match fault {
            Some(kind) => Err(RemoteError::new(kind, format!("injected failure for {op}"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn create_note(&self, title: &str, content: &str) -> RemoteResult<Note> {
        self.enter("create_note", None).await?;
        let mut state = self.state.lock().await;
        let now = state.tick();
        let note = Note {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            is_archived: false,
            is_pinned: false,
            created_at: now,
            updated_at: now,
            folder_id: None,
            tag_ids: Vec::new(),
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn get_note(&self, id: NoteId) -> RemoteResult<Note> {
        self.enter("get_note", None).await?;
        let mut state = self.state.lock().await;
        Ok(state.note_mut(id)?.clone())
    }

    async fn get_all_notes(&self) -> RemoteResult<Vec<Note>> {
        self.enter("get_all_notes", None).await?;
        let state = self.state.lock().await;
        Ok(state.notes.iter().rev().cloned().collect())
    }

    async fn update_note(&self, id: NoteId, title: &str, content: &str) -> RemoteResult<Note> {
        self.enter("update_note", None).await?;
        let mut state = self.state.lock().await;
        let note = state.note_mut(id)?;
        note.title = title.to_string();
        note.content = content.to_string();
        state.touch(id)
    }

    async fn delete_note(&self, id: NoteId) -> RemoteResult<()> {
        self.enter("delete_note", None).await?;
        let mut state = self.state.lock().await;
        let before = state.notes.len();
        state.notes.retain(|note| note.id != id);
        if state.notes.len() == before {
            return Err(RemoteError::not_found("note", id));
        }
        Ok(())
    }

    async fn search_notes(&self, query: &str) -> RemoteResult<Vec<Note>> {
        self.enter("search_notes", Some(query)).await?;
        let needle = query.trim();
        let state = self.state.lock().await;
        let mut hits: Vec<Note> = state
            .notes
            .iter()
            .filter(|note| note.matches_text(needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(hits)
    }

    async fn set_note_pinned(&self, id: NoteId, pinned: bool) -> RemoteResult<Note> {
        self.enter("set_note_pinned", None).await?;
        let mut state = self.state.lock().await;
        state.note_mut(id)?.is_pinned = pinned;
        state.touch(id)
    }

    async fn set_note_archived(&self, id: NoteId, archived: bool) -> RemoteResult<Note> {
        self.enter("set_note_archived", None).await?;
        let mut state = self.state.lock().await;
        state.note_mut(id)?.is_archived = archived;
        state.touch(id)
    }

    async fn move_note_to_folder(
        &self,
        id: NoteId,
        folder_id: Option<FolderId>,
    ) -> RemoteResult<Note> {
        self.enter("move_note_to_folder", None).await?;
        let mut state = self.state.lock().await;
        if let Some(folder_id) = folder_id {
            if !state.folders.iter().any(|folder| folder.id == folder_id) {
                return Err(RemoteError::not_found("folder", folder_id));
            }
        }
        state.note_mut(id)?.folder_id = folder_id;
        state.touch(id)
    }

    async fn create_tag(&self, name: &str) -> RemoteResult<Tag> {
        self.enter("create_tag", None).await?;
        let name = normalize_tag_name(name)
            .ok_or_else(|| RemoteError::invalid("tag name must not be blank"))?;
        let mut state = self.state.lock().await;
        let key = tag_name_key(&name);
        if let Some(existing) = state.tags.iter().find(|tag| tag.key() == key) {
            return Err(RemoteError::conflict(format!(
                "tag name `{name}` collides with existing `{}`",
                existing.name
            )));
        }
        let now = state.tick();
        let tag = Tag {
            id: Uuid::new_v4(),
            name,
            created_at: now,
            updated_at: now,
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>> {
        self.enter("get_all_tags", None).await?;
        let state = self.state.lock().await;
        let mut tags = state.tags.clone();
        tags.sort_by_key(Tag::key);
        Ok(tags)
    }

    async fn rename_tag(&self, id: TagId, name: &str) -> RemoteResult<Tag> {
        self.enter("rename_tag", None).await?;
        let name = normalize_tag_name(name)
            .ok_or_else(|| RemoteError::invalid("tag name must not be blank"))?;
        let mut state = self.state.lock().await;
        state.ensure_tag(id)?;
        let key = tag_name_key(&name);
        if let Some(existing) = state.tags.iter().find(|tag| tag.id != id && tag.key() == key) {
            return Err(RemoteError::conflict(format!(
                "tag name `{name}` collides with existing `{}`",
                existing.name
            )));
        }
        let now = state.tick();
        let tag = state
            .tags
            .iter_mut()
            .find(|tag| tag.id == id)
            .ok_or_else(|| RemoteError::not_found("tag", id))?;
        tag.name = name;
        tag.updated_at = tag.updated_at.max(now);
        Ok(tag.clone())
    }

    async fn delete_tag(&self, id: TagId) -> RemoteResult<()> {
        self.enter("delete_tag", None).await?;
        let mut state = self.state.lock().await;
        state.ensure_tag(id)?;
        state.tags.retain(|tag| tag.id != id);
        for note in &mut state.notes {
            note.tag_ids.retain(|tag_id| *tag_id != id);
        }
        Ok(())
    }

    async fn add_tag_to_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
        self.enter("add_tag_to_note", None).await?;
        let mut state = self.state.lock().await;
        state.ensure_tag(tag_id)?;
        let note = state.note_mut(note_id)?;
        if note.has_tag(tag_id) {
            return Ok(());
        }
        let mut ids: BTreeSet<TagId> = note.tag_ids.iter().copied().collect();
        ids.insert(tag_id);
        note.tag_ids = ids.into_iter().collect();
        state.touch(note_id)?;
        Ok(())
    }

    async fn remove_tag_from_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
        self.enter("remove_tag_from_note", None).await?;
        let mut state = self.state.lock().await;
        state.ensure_tag(tag_id)?;
        let note = state.note_mut(note_id)?;
        if !note.has_tag(tag_id) {
            return Ok(());
        }
        note.tag_ids.retain(|id| *id != tag_id);
        state.touch(note_id)?;
        Ok(())
    }

    async fn get_tags_for_note(&self, note_id: NoteId) -> RemoteResult<Vec<Tag>> {
        self.enter("get_tags_for_note", None).await?;
        let mut state = self.state.lock().await;
        let tag_ids = state.note_mut(note_id)?.tag_ids.clone();
        let mut tags: Vec<Tag> = state
            .tags
            .iter()
            .filter(|tag| tag_ids.contains(&tag.id))
            .cloned()
            .collect();
        tags.sort_by_key(Tag::key);
        Ok(tags)
    }

    async fn create_folder(&self, name: &str) -> RemoteResult<FolderRecord> {
        self.enter("create_folder", None).await?;
        let name = normalize_folder_name(name)
            .ok_or_else(|| RemoteError::invalid("folder name must not be blank"))?;
        let mut state = self.state.lock().await;
        let now = state.tick();
        let folder = FolderRecord {
            id: Uuid::new_v4(),
            name,
            is_archived: false,
            is_pinned: false,
            created_at: now,
            updated_at: now,
        };
        state.folders.push(folder.clone());
        Ok(folder)
    }

    async fn get_all_folders(&self) -> RemoteResult<Vec<FolderRecord>> {
        self.enter("get_all_folders", None).await?;
        let state = self.state.lock().await;
        let mut folders = state.folders.clone();
        folders.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(folders)
    }

    async fn rename_folder(&self, id: FolderId, name: &str) -> RemoteResult<FolderRecord> {
        self.enter("rename_folder", None).await?;
        let name = normalize_folder_name(name)
            .ok_or_else(|| RemoteError::invalid("folder name must not be blank"))?;
        let mut state = self.state.lock().await;
        let now = state.tick();
        let folder = state
            .folders
            .iter_mut()
            .find(|folder| folder.id == id)
            .ok_or_else(|| RemoteError::not_found("folder", id))?;
        folder.name = name;
        folder.updated_at = folder.updated_at.max(now);
        Ok(folder.clone())
    }

    async fn delete_folder(&self, id: FolderId) -> RemoteResult<()> {
        self.enter("delete_folder", None).await?;
        let mut state = self.state.lock().await;
        let before = state.folders.len();
        state.folders.retain(|folder| folder.id != id);
        if state.folders.len() == before {
            return Err(RemoteError::not_found("folder", id));
        }
        let now = state.tick();
        for note in state.notes.iter_mut().filter(|note| note.folder_id == Some(id)) {
            note.folder_id = None;
            note.updated_at = note.updated_at.max(now);
        }
        Ok(())
    }
}
