//! Reactive in-memory cache of backend entities and UI selection.
//!
//! # Responsibility
//! - Hold primitive state: the visible note list, every known note, tags,
//!   folders, selected note id, search query.
//! - Derive the selected note, folder membership and filtered note views.
//! - Broadcast one `StoreEvent` per committed change.
//!
//! # Invariants
//! - Collections are replaced wholesale or rebuilt with map/filter; a stored
//!   entity is never mutated in place.
//! - Neither note list holds two entries with the same id.
//! - `notes` is the visible list and may be narrowed by a search;
//!   `all_notes` is never narrowed and backs every projection.
//! - A deleted tag id never reappears in a cached note.
//! - Reads never notify; only crate-internal commits do.
//! - Only the action layer commits; there is no public mutator.

use crate::model::folder::{Folder, FolderId, FolderRecord};
use crate::model::note::{Note, NoteId};
use crate::model::tag::{Tag, TagId};
use log::trace;
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::broadcast;

/// Default buffer for change events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Change notification emitted after a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreEvent {
    NotesChanged,
    TagsChanged,
    FoldersChanged,
    SelectionChanged,
    SearchQueryChanged,
    /// The derived selected note resolved to a different value.
    SelectedNoteChanged,
}

#[derive(Debug)]
struct StoreState {
    /// Visible list: the last full listing or the last search hits.
    notes: Arc<[Note]>,
    /// Every note known to the session, unaffected by search.
    all_notes: Arc<[Note]>,
    tags: Arc<[Tag]>,
    folders: Arc<[FolderRecord]>,
    selected_note_id: Option<NoteId>,
    search_query: Arc<str>,
    /// Ids of tags deleted in this session; stripped from late note responses.
    deleted_tags: HashSet<TagId>,
}

impl Default for StoreState {
    fn default() -> Self {
        Self {
            notes: Arc::from(Vec::new()),
            all_notes: Arc::from(Vec::new()),
            tags: Arc::from(Vec::new()),
            folders: Arc::from(Vec::new()),
            selected_note_id: None,
            search_query: Arc::from(""),
            deleted_tags: HashSet::new(),
        }
    }
}

impl StoreState {
    fn selected_note(&self) -> Option<Note> {
        let id = self.selected_note_id?;
        self.notes.iter().find(|note| note.id == id).cloned()
    }

    fn scrub(&self, mut note: Note) -> Note {
        if !self.deleted_tags.is_empty() {
            note.tag_ids.retain(|id| !self.deleted_tags.contains(id));
        }
        note
    }

    fn scrub_all(&self, notes: Vec<Note>) -> Arc<[Note]> {
        dedup_by_id(notes.into_iter().map(|note| self.scrub(note)).collect()).into()
    }

    /// Rebuilds both note lists with `f`.
    fn map_notes(&mut self, f: impl Fn(&[Note]) -> Vec<Note>) {
        self.notes = f(&self.notes).into();
        self.all_notes = f(&self.all_notes).into();
    }

    fn filter_all(&self, keep: impl Fn(&Note) -> bool) -> Vec<Note> {
        self.all_notes.iter().filter(|note| keep(note)).cloned().collect()
    }
}

/// Per-session observable state container.
pub struct Store {
    state: RwLock<StoreState>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl Store {
    pub fn new(event_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(event_capacity.max(1));
        Self {
            state: RwLock::new(StoreState::default()),
            events,
        }
    }

    /// Subscribes to change events committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// The visible note list; narrowed while a search is active.
    pub fn notes(&self) -> Arc<[Note]> {
        Arc::clone(&self.read().notes)
    }

    /// Every known note regardless of the active search.
    pub fn all_notes(&self) -> Arc<[Note]> {
        Arc::clone(&self.read().all_notes)
    }

    pub fn tags(&self) -> Arc<[Tag]> {
        Arc::clone(&self.read().tags)
    }

    pub fn folder_records(&self) -> Arc<[FolderRecord]> {
        Arc::clone(&self.read().folders)
    }

    pub fn selected_note_id(&self) -> Option<NoteId> {
        self.read().selected_note_id
    }

    pub fn search_query(&self) -> Arc<str> {
        Arc::clone(&self.read().search_query)
    }

    /// The note whose id equals the selection, if it is visible.
    pub fn selected_note(&self) -> Option<Note> {
        self.read().selected_note()
    }

    pub fn note(&self, id: NoteId) -> Option<Note> {
        let state = self.read();
        state
            .all_notes
            .iter()
            .chain(state.notes.iter())
            .find(|note| note.id == id)
            .cloned()
    }

    /// Folders with membership projected from every known note.
    pub fn folders(&self) -> Vec<Folder> {
        let state = self.read();
        state
            .folders
            .iter()
            .map(|record| Folder::project(record, &state.all_notes))
            .collect()
    }

    pub fn folder(&self, id: FolderId) -> Option<Folder> {
        let state = self.read();
        state
            .folders
            .iter()
            .find(|record| record.id == id)
            .map(|record| Folder::project(record, &state.all_notes))
    }

    /// Cached tags attached to `note_id`, in tag-list order.
    pub fn tags_for_note(&self, note_id: NoteId) -> Vec<Tag> {
        let state = self.read();
        let Some(note) = state.all_notes.iter().find(|note| note.id == note_id) else {
            return Vec::new();
        };
        state
            .tags
            .iter()
            .filter(|tag| note.has_tag(tag.id))
            .cloned()
            .collect()
    }

    /// Known notes filed under `folder_id`; `None` selects unfiled notes.
    pub fn notes_in_folder(&self, folder_id: Option<FolderId>) -> Vec<Note> {
        self.read().filter_all(|note| note.folder_id == folder_id)
    }

    pub fn notes_with_tag(&self, tag_id: TagId) -> Vec<Note> {
        self.read().filter_all(|note| note.has_tag(tag_id))
    }

    pub fn pinned_notes(&self) -> Vec<Note> {
        self.read().filter_all(|note| note.is_pinned)
    }

    pub fn archived_notes(&self) -> Vec<Note> {
        self.read().filter_all(|note| note.is_archived)
    }

    #[cfg(test)]
    pub(crate) fn replace_notes(&self, notes: Vec<Note>) {
        self.replace_notes_if(notes, || true);
    }

    /// Replaces both note lists with a full listing if `is_current` still
    /// holds under the write lock.
    ///
    /// Returns whether the replacement was applied.
    pub(crate) fn replace_notes_if(&self, notes: Vec<Note>, is_current: impl FnOnce() -> bool) -> bool {
        self.commit_if(StoreEvent::NotesChanged, is_current, |state| {
            let next = state.scrub_all(notes);
            state.all_notes = Arc::clone(&next);
            state.notes = next;
        })
    }

    /// Shows `hits` as the visible list if `is_current` still holds. Hits also
    /// refresh their copies in `all_notes`; other known notes are kept.
    pub(crate) fn replace_search_hits_if(
        &self,
        hits: Vec<Note>,
        is_current: impl FnOnce() -> bool,
    ) -> bool {
        self.commit_if(StoreEvent::NotesChanged, is_current, |state| {
            let hits = state.scrub_all(hits);
            let known: HashSet<NoteId> = state.all_notes.iter().map(|note| note.id).collect();
            let mut all: Vec<Note> = state
                .all_notes
                .iter()
                .map(|current| {
                    hits.iter()
                        .find(|hit| hit.id == current.id)
                        .unwrap_or(current)
                        .clone()
                })
                .collect();
            all.extend(hits.iter().filter(|hit| !known.contains(&hit.id)).cloned());
            state.all_notes = all.into();
            state.notes = hits;
        })
    }

    /// Puts `note` first in both lists, dropping any cached copy with the same id.
    pub(crate) fn prepend_note(&self, note: Note) {
        self.commit(StoreEvent::NotesChanged, |state| {
            let note = state.scrub(note);
            state.map_notes(|list| {
                std::iter::once(note.clone())
                    .chain(list.iter().filter(|n| n.id != note.id).cloned())
                    .collect()
            });
        });
    }

    /// Replaces cached entries with the same id; absent entries are ignored.
    pub(crate) fn replace_note(&self, note: Note) {
        self.commit(StoreEvent::NotesChanged, |state| {
            let note = state.scrub(note);
            state.map_notes(|list| {
                list.iter()
                    .map(|current| {
                        if current.id == note.id {
                            note.clone()
                        } else {
                            current.clone()
                        }
                    })
                    .collect()
            });
        });
    }

    /// Drops `id` from both lists and clears the selection if it pointed there.
    pub(crate) fn remove_note(&self, id: NoteId) {
        let selection_cleared = self.commit(StoreEvent::NotesChanged, |state| {
            state.map_notes(|list| list.iter().filter(|n| n.id != id).cloned().collect());
            if state.selected_note_id == Some(id) {
                state.selected_note_id = None;
                true
            } else {
                false
            }
        });
        if selection_cleared {
            self.emit(StoreEvent::SelectionChanged);
        }
    }

    pub(crate) fn select(&self, id: Option<NoteId>) {
        self.commit(StoreEvent::SelectionChanged, |state| {
            state.selected_note_id = id;
        });
    }

    pub(crate) fn set_search_query(&self, query: &str) {
        self.commit(StoreEvent::SearchQueryChanged, |state| {
            state.search_query = Arc::from(query);
        });
    }

    pub(crate) fn replace_tags(&self, tags: Vec<Tag>) {
        self.commit(StoreEvent::TagsChanged, |state| {
            state.tags = tags.into();
        });
    }

    /// Replaces the tag with the same id in place, or appends it.
    pub(crate) fn upsert_tag(&self, tag: Tag) {
        self.commit(StoreEvent::TagsChanged, |state| {
            let mut replaced = false;
            let mut next: Vec<Tag> = state
                .tags
                .iter()
                .map(|current| {
                    if current.id == tag.id {
                        replaced = true;
                        tag.clone()
                    } else {
                        current.clone()
                    }
                })
                .collect();
            if !replaced {
                next.push(tag.clone());
            }
            state.tags = next.into();
        });
    }

    /// Drops the tag and strips it from every cached note in one commit.
    pub(crate) fn remove_tag(&self, id: TagId) {
        self.commit(StoreEvent::TagsChanged, |state| {
            state.deleted_tags.insert(id);
            state.tags = state.tags.iter().filter(|t| t.id != id).cloned().collect::<Vec<_>>().into();
            state.map_notes(|list| {
                list.iter()
                    .map(|note| {
                        if note.has_tag(id) {
                            note.without_tag(id)
                        } else {
                            note.clone()
                        }
                    })
                    .collect()
            });
        });
        self.emit(StoreEvent::NotesChanged);
    }

    pub(crate) fn replace_folders(&self, folders: Vec<FolderRecord>) {
        self.commit(StoreEvent::FoldersChanged, |state| {
            state.folders = folders.into();
        });
    }

    pub(crate) fn upsert_folder(&self, folder: FolderRecord) {
        self.commit(StoreEvent::FoldersChanged, |state| {
            let mut replaced = false;
            let mut next: Vec<FolderRecord> = state
                .folders
                .iter()
                .map(|current| {
                    if current.id == folder.id {
                        replaced = true;
                        folder.clone()
                    } else {
                        current.clone()
                    }
                })
                .collect();
            if !replaced {
                next.push(folder.clone());
            }
            state.folders = next.into();
        });
    }

    /// Drops the folder and unfiles its cached notes in one commit.
    ///
    /// Returns the ids of the notes that were unfiled.
    pub(crate) fn remove_folder(&self, id: FolderId) -> Vec<NoteId> {
        let unfiled = self.commit(StoreEvent::FoldersChanged, |state| {
            let unfiled: Vec<NoteId> = state
                .all_notes
                .iter()
                .filter(|note| note.folder_id == Some(id))
                .map(|note| note.id)
                .collect();
            state.folders = state
                .folders
                .iter()
                .filter(|f| f.id != id)
                .cloned()
                .collect::<Vec<_>>()
                .into();
            state.map_notes(|list| {
                list.iter()
                    .map(|note| {
                        let mut next = note.clone();
                        if next.folder_id == Some(id) {
                            next.folder_id = None;
                        }
                        next
                    })
                    .collect()
            });
            unfiled
        });
        self.emit(StoreEvent::NotesChanged);
        unfiled
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Applies `update` under the write lock, then emits `event` and, when
    /// the derived selected note changed, `SelectedNoteChanged`.
    fn commit<T>(&self, event: StoreEvent, update: impl FnOnce(&mut StoreState) -> T) -> T {
        let (output, selected_changed) = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let before = state.selected_note();
            let output = update(&mut *state);
            (output, before != state.selected_note())
        };
        self.emit(event);
        if selected_changed {
            self.emit(StoreEvent::SelectedNoteChanged);
        }
        output
    }

    /// Like `commit`, but skips the update entirely unless `is_current`
    /// holds once the write lock is taken.
    fn commit_if(
        &self,
        event: StoreEvent,
        is_current: impl FnOnce() -> bool,
        update: impl FnOnce(&mut StoreState),
    ) -> bool {
        let selected_changed = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            if !is_current() {
                return false;
            }
            let before = state.selected_note();
            update(&mut *state);
            before != state.selected_note()
        };
        self.emit(event);
        if selected_changed {
            self.emit(StoreEvent::SelectedNoteChanged);
        }
        true
    }

    fn emit(&self, event: StoreEvent) {
        trace!("event=store_commit module=store change={event:?}");
        // No receivers is fine: nobody is watching yet.
        let _ = self.events.send(event);
    }
}

fn dedup_by_id(notes: Vec<Note>) -> Vec<Note> {
    let mut seen = HashSet::with_capacity(notes.len());
    notes.into_iter().filter(|note| seen.insert(note.id)).collect()
}

#[cfg(test)]
mod tests {
    use super::{Store, StoreEvent};
    use crate::model::folder::FolderRecord;
    use crate::model::note::Note;
    use crate::model::tag::Tag;
    use uuid::Uuid;

    fn note(title: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            is_archived: false,
            is_pinned: false,
            created_at: 1,
            updated_at: 1,
            folder_id: None,
            tag_ids: Vec::new(),
        }
    }

    #[test]
    fn selected_note_tracks_notes_and_selection() {
        let store = Store::default();
        let a = note("a");
        store.replace_notes(vec![a.clone()]);
        assert!(store.selected_note().is_none());

        store.select(Some(a.id));
        assert_eq!(store.selected_note().map(|n| n.id), Some(a.id));

        store.replace_notes(Vec::new());
        assert!(store.selected_note().is_none());
    }

    #[test]
    fn replace_notes_drops_duplicate_ids() {
        let store = Store::default();
        let a = note("a");
        let mut a_again = a.clone();
        a_again.title = "shadow".to_string();
        store.replace_notes(vec![a.clone(), a_again]);
        assert_eq!(store.notes().len(), 1);
        assert_eq!(store.notes()[0].title, "a");
        assert_eq!(store.all_notes().len(), 1);
    }

    #[test]
    fn prepend_replaces_existing_copy() {
        let store = Store::default();
        let a = note("a");
        let b = note("b");
        store.replace_notes(vec![a.clone(), b.clone()]);
        store.prepend_note(b.clone());
        let ids: Vec<_> = store.notes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);
    }

    #[test]
    fn remove_note_clears_matching_selection_and_notifies() {
        let store = Store::default();
        let a = note("a");
        store.replace_notes(vec![a.clone()]);
        store.select(Some(a.id));
        let mut events = store.subscribe();

        store.remove_note(a.id);

        assert!(store.selected_note_id().is_none());
        assert!(store.all_notes().is_empty());
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert!(seen.contains(&StoreEvent::NotesChanged));
        assert!(seen.contains(&StoreEvent::SelectedNoteChanged));
        assert!(seen.contains(&StoreEvent::SelectionChanged));
    }

    #[test]
    fn reads_do_not_emit() {
        let store = Store::default();
        let mut events = store.subscribe();
        let _ = store.notes();
        let _ = store.selected_note();
        let _ = store.folders();
        let _ = store.pinned_notes();
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn snapshots_are_not_affected_by_later_commits() {
        let store = Store::default();
        let a = note("a");
        store.replace_notes(vec![a.clone()]);
        let snapshot = store.notes();

        let mut edited = a.clone();
        edited.title = "edited".to_string();
        store.replace_note(edited);

        assert_eq!(snapshot[0].title, "a");
        assert_eq!(store.notes()[0].title, "edited");
    }

    #[test]
    fn search_hits_narrow_only_the_visible_list() {
        let store = Store::default();
        let folder = FolderRecord {
            id: Uuid::new_v4(),
            name: "f".to_string(),
            is_archived: false,
            is_pinned: false,
            created_at: 1,
            updated_at: 1,
        };
        let mut a = note("a");
        let mut b = note("b");
        a.folder_id = Some(folder.id);
        b.folder_id = Some(folder.id);
        store.replace_folders(vec![folder.clone()]);
        store.replace_notes(vec![a.clone(), b.clone()]);

        let mut fresher_a = a.clone();
        fresher_a.updated_at = 9;
        assert!(store.replace_search_hits_if(vec![fresher_a], || true));

        assert_eq!(store.notes().len(), 1);
        assert_eq!(store.all_notes().len(), 2);
        assert_eq!(store.note(a.id).unwrap().updated_at, 9);
        let projected = store.folder(folder.id).unwrap();
        assert!(projected.contains(a.id) && projected.contains(b.id));
    }

    #[test]
    fn stale_listing_is_not_applied() {
        let store = Store::default();
        let a = note("a");
        store.replace_notes(vec![a.clone()]);
        let mut events = store.subscribe();

        assert!(!store.replace_notes_if(Vec::new(), || false));
        assert!(!store.replace_search_hits_if(Vec::new(), || false));

        assert_eq!(store.notes().len(), 1);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn deleted_tag_is_stripped_from_late_note_copies() {
        let store = Store::default();
        let tag = Tag {
            id: Uuid::new_v4(),
            name: "gone".to_string(),
            created_at: 1,
            updated_at: 1,
        };
        let mut a = note("a");
        store.upsert_tag(tag.clone());
        store.replace_notes(vec![a.clone()]);
        store.remove_tag(tag.id);

        a.tag_ids = vec![tag.id];
        store.replace_note(a.clone());

        assert!(store.note(a.id).unwrap().tag_ids.is_empty());
        assert!(store.notes_with_tag(tag.id).is_empty());
    }

    #[test]
    fn filtered_views_read_every_known_note() {
        let store = Store::default();
        let mut pinned = note("pinned");
        pinned.is_pinned = true;
        let mut archived = note("archived");
        archived.is_archived = true;
        let plain = note("plain");
        store.replace_notes(vec![pinned.clone(), archived.clone(), plain.clone()]);
        assert!(store.replace_search_hits_if(vec![plain.clone()], || true));

        assert_eq!(store.pinned_notes(), vec![pinned]);
        assert_eq!(store.archived_notes(), vec![archived]);
        assert_eq!(store.notes_in_folder(None).len(), 3);
    }
}
