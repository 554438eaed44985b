//! Note actions.
//!
//! # Invariants
//! - Every mutation of an existing note holds that note's guard across the
//!   gateway round trip and the store commit.
//! - Whole-list replacements (`load_notes`, `perform_search`) only commit when
//!   their ticket is still the latest one issued.

use super::session::Listing;
use super::{ActionResult, Session};
use crate::model::folder::FolderId;
use crate::model::note::{Note, NoteId};
use log::{debug, info};

impl Session {
    /// Replaces the cached notes with the backend's full list.
    pub async fn load_notes(&self) -> ActionResult<()> {
        let ticket = self.issue_list_ticket();
        let notes = self
            .retrying("get_all_notes", || self.gateway.get_all_notes())
            .await?;
        self.commit_listing("load_notes", ticket, Listing::Full, notes);
        Ok(())
    }

    /// Creates an empty note, puts it first and selects it.
    pub async fn add_note(&self) -> ActionResult<Note> {
        let title = self.config.default_note_title.as_str();
        let note = self
            .retrying("create_note", || self.gateway.create_note(title, ""))
            .await?;
        self.store.prepend_note(note.clone());
        self.store.select(Some(note.id));
        info!("event=note_add module=service status=ok note_id={}", note.id);
        Ok(note)
    }

    /// Publishes `query`, then shows its results as the visible notes.
    ///
    /// The query is committed before any backend call so observers see it
    /// first. A blank query reloads every note. Other queries narrow only the
    /// visible list; folder membership and filtered views keep reading every
    /// known note. Responses (and failures) of a search that was superseded by
    /// a newer list request are dropped.
    pub async fn perform_search(&self, query: &str) -> ActionResult<()> {
        let ticket = self.issue_list_ticket();
        self.store.set_search_query(query);

        let (listing, result) = if query.trim().is_empty() {
            let result = self
                .retrying("get_all_notes", || self.gateway.get_all_notes())
                .await;
            (Listing::Full, result)
        } else {
            let result = self
                .retrying("search_notes", || self.gateway.search_notes(query))
                .await;
            (Listing::SearchHits, result)
        };

        match result {
            Ok(notes) => {
                self.commit_listing("perform_search", ticket, listing, notes);
                Ok(())
            }
            Err(err) if !self.is_latest_ticket(ticket) => {
                debug!(
                    "event=search_discarded module=service status=stale ticket={ticket} error_kind={}",
                    err.kind
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Persists title and content, then swaps in the backend's copy.
    pub async fn save_current_note(
        &self,
        id: NoteId,
        title: &str,
        content: &str,
    ) -> ActionResult<Note> {
        let _guard = self.lock_note(id).await?;
        let note = self
            .retrying("update_note", || self.gateway.update_note(id, title, content))
            .await?;
        self.store.replace_note(note.clone());
        debug!(
            "event=note_save module=service status=ok note_id={id} updated_at={}",
            note.updated_at
        );
        Ok(note)
    }

    /// Deletes a note; deleting a note that is already gone succeeds.
    pub async fn remove_note(&self, id: NoteId) -> ActionResult<()> {
        let _guard = self.lock_note(id).await?;
        match self
            .retrying("delete_note", || self.gateway.delete_note(id))
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!("event=note_remove module=service status=noop note_id={id}");
            }
            Err(err) => return Err(err.into()),
        }
        self.store.remove_note(id);
        info!("event=note_remove module=service status=ok note_id={id}");
        Ok(())
    }

    /// Changes the selection; `None` clears it.
    pub fn select_note(&self, id: Option<NoteId>) {
        self.store.select(id);
    }

    pub async fn set_note_pinned(&self, id: NoteId, pinned: bool) -> ActionResult<Note> {
        let _guard = self.lock_note(id).await?;
        let note = self
            .retrying("set_note_pinned", || self.gateway.set_note_pinned(id, pinned))
            .await?;
        self.store.replace_note(note.clone());
        Ok(note)
    }

    /// Flips `is_pinned` based on the backend's current value.
    pub async fn toggle_pin(&self, id: NoteId) -> ActionResult<Note> {
        let _guard = self.lock_note(id).await?;
        let current = self
            .retrying("get_note", || self.gateway.get_note(id))
            .await?;
        let note = self
            .retrying("set_note_pinned", || {
                self.gateway.set_note_pinned(id, !current.is_pinned)
            })
            .await?;
        self.store.replace_note(note.clone());
        Ok(note)
    }

    pub async fn set_note_archived(&self, id: NoteId, archived: bool) -> ActionResult<Note> {
        let _guard = self.lock_note(id).await?;
        let note = self
            .retrying("set_note_archived", || {
                self.gateway.set_note_archived(id, archived)
            })
            .await?;
        self.store.replace_note(note.clone());
        Ok(note)
    }

    /// Flips `is_archived` based on the backend's current value.
    pub async fn toggle_archive(&self, id: NoteId) -> ActionResult<Note> {
        let _guard = self.lock_note(id).await?;
        let current = self
            .retrying("get_note", || self.gateway.get_note(id))
            .await?;
        let note = self
            .retrying("set_note_archived", || {
                self.gateway.set_note_archived(id, !current.is_archived)
            })
            .await?;
        self.store.replace_note(note.clone());
        Ok(note)
    }

    /// Files a note under `folder_id`, or unfiles it with `None`.
    pub async fn move_note_to_folder(
        &self,
        id: NoteId,
        folder_id: Option<FolderId>,
    ) -> ActionResult<Note> {
        let _guard = self.lock_note(id).await?;
        let note = self
            .retrying("move_note_to_folder", || {
                self.gateway.move_note_to_folder(id, folder_id)
            })
            .await?;
        self.store.replace_note(note.clone());
        Ok(note)
    }
}
