//! Folder actions.
//!
//! Membership is never written here: it follows from `Note::folder_id`,
//! which `Session::move_note_to_folder` changes.

use super::{ActionError, ActionResult, Session};
use crate::model::folder::{normalize_folder_name, Folder, FolderId, FolderRecord};
use crate::model::ValidationError;
use log::{debug, info, warn};

impl Session {
    pub async fn load_folders(&self) -> ActionResult<()> {
        let folders = self
            .retrying("get_all_folders", || self.gateway.get_all_folders())
            .await?;
        self.store.replace_folders(folders);
        Ok(())
    }

    pub async fn create_folder(&self, name: &str) -> ActionResult<Folder> {
        let name = checked_folder_name(name)?;
        let record = self
            .retrying("create_folder", || self.gateway.create_folder(&name))
            .await?;
        info!("event=folder_create module=service status=ok folder_id={}", record.id);
        Ok(self.commit_folder(record))
    }

    pub async fn rename_folder(&self, id: FolderId, name: &str) -> ActionResult<Folder> {
        let name = checked_folder_name(name)?;
        let record = self
            .retrying("rename_folder", || self.gateway.rename_folder(id, &name))
            .await?;
        Ok(self.commit_folder(record))
    }

    /// Deletes a folder; its cached notes become unfiled.
    ///
    /// The unfiled notes are then re-read so their cached `updated_at`
    /// matches the backend. A failed re-read keeps the local copy and is
    /// only logged; the delete itself already succeeded.
    pub async fn delete_folder(&self, id: FolderId) -> ActionResult<()> {
        match self
            .retrying("delete_folder", || self.gateway.delete_folder(id))
            .await
        {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {
                debug!("event=folder_delete module=service status=noop folder_id={id}");
            }
            Err(err) => return Err(err.into()),
        }
        let unfiled = self.store.remove_folder(id);
        for note_id in unfiled {
            let refreshed = async {
                let _guard = self.lock_note(note_id).await?;
                let note = self
                    .retrying("get_note", || self.gateway.get_note(note_id))
                    .await?;
                self.store.replace_note(note);
                Ok::<(), ActionError>(())
            };
            if let Err(err) = refreshed.await {
                warn!(
                    "event=folder_delete module=service status=stale_note folder_id={id} note_id={note_id} error_kind={}",
                    err.kind_label()
                );
            }
        }
        Ok(())
    }

    fn commit_folder(&self, record: FolderRecord) -> Folder {
        let notes = self.store.notes();
        let folder = Folder::project(&record, &notes);
        self.store.upsert_folder(record);
        folder
    }
}

fn checked_folder_name(name: &str) -> Result<String, ValidationError> {
    normalize_folder_name(name).ok_or(ValidationError::BlankField {
        entity: "folder",
        field: "name",
    })
}
