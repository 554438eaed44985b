//! Tag actions.

use super::{ActionResult, Session};
use crate::model::note::{Note, NoteId};
use crate::model::tag::{normalize_tag_name, Tag, TagId};
use crate::model::ValidationError;
use log::{debug, info};

impl Session {
    pub async fn load_tags(&self) -> ActionResult<()> {
        let tags = self
            .retrying("get_all_tags", || self.gateway.get_all_tags())
            .await?;
        self.store.replace_tags(tags);
        Ok(())
    }

    /// Creates a tag; names collide case-insensitively.
    pub async fn create_tag(&self, name: &str) -> ActionResult<Tag> {
        let name = checked_tag_name(name)?;
        let tag = self
            .retrying("create_tag", || self.gateway.create_tag(&name))
            .await?;
        self.store.upsert_tag(tag.clone());
        info!("event=tag_create module=service status=ok tag_id={}", tag.id);
        Ok(tag)
    }

    /// Renames a tag. Changing only the letter case of its own name is
    /// allowed; colliding with another tag is a `Conflict`.
    pub async fn rename_tag(&self, id: TagId, name: &str) -> ActionResult<Tag> {
        let name = checked_tag_name(name)?;
        let tag = self
            .retrying("rename_tag", || self.gateway.rename_tag(id, &name))
            .await?;
        self.store.upsert_tag(tag.clone());
        info!("event=tag_rename module=service status=ok tag_id={id}");
        Ok(tag)
    }

    /// Deletes a tag and strips it from every cached note.
    pub async fn delete_tag(&self, id: TagId) -> ActionResult<()> {
        match self
            .retrying("delete_tag", || self.gateway.delete_tag(id))
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!("event=tag_delete module=service status=noop tag_id={id}");
            }
            Err(err) => return Err(err.into()),
        }
        self.store.remove_tag(id);
        Ok(())
    }

    /// Links a tag to a note and caches the backend's refreshed note.
    pub async fn tag_note(&self, note_id: NoteId, tag_id: TagId) -> ActionResult<Note> {
        let _guard = self.lock_note(note_id).await?;
        self.retrying("add_tag_to_note", || {
            self.gateway.add_tag_to_note(note_id, tag_id)
        })
        .await?;
        self.refresh_cached_note(note_id).await
    }

    pub async fn untag_note(&self, note_id: NoteId, tag_id: TagId) -> ActionResult<Note> {
        let _guard = self.lock_note(note_id).await?;
        self.retrying("remove_tag_from_note", || {
            self.gateway.remove_tag_from_note(note_id, tag_id)
        })
        .await?;
        self.refresh_cached_note(note_id).await
    }

    /// Backend projection of the tags attached to one note.
    pub async fn tags_for_note(&self, note_id: NoteId) -> ActionResult<Vec<Tag>> {
        Ok(self
            .retrying("get_tags_for_note", || {
                self.gateway.get_tags_for_note(note_id)
            })
            .await?)
    }

    async fn refresh_cached_note(&self, note_id: NoteId) -> ActionResult<Note> {
        let note = self
            .retrying("get_note", || self.gateway.get_note(note_id))
            .await?;
        self.store.replace_note(note.clone());
        Ok(note)
    }
}

fn checked_tag_name(name: &str) -> Result<String, ValidationError> {
    normalize_tag_name(name).ok_or(ValidationError::BlankField {
        entity: "tag",
        field: "name",
    })
}
