//! SQLite-backed `RemoteStore`.
//!
//! # Responsibility
//! - Persist notes, tags and folders in the migrated schema from `crate::db`.
//! - Run blocking SQL on tokio's blocking pool so callers stay async.
//!
//! # Invariants
//! - `updated_at` is written as `MAX(now, updated_at)` and never decreases.
//! - Tag names are unique case-insensitively; spelling is preserved.
//! - Deleting a folder unfiles its notes; deleting a note or tag drops links.

use super::{RemoteError, RemoteErrorKind, RemoteResult, RemoteStore};
use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::model::folder::{normalize_folder_name, FolderId, FolderRecord};
use crate::model::note::{Note, NoteId};
use crate::model::now_epoch_ms;
use crate::model::tag::{normalize_tag_name, tag_name_key, Tag, TagId};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::task::spawn_blocking;
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    is_archived,
    is_pinned,
    folder_id,
    created_at,
    updated_at
FROM notes";

const TAG_SELECT_SQL: &str = "SELECT id, name, created_at, updated_at FROM tags";

const FOLDER_SELECT_SQL: &str =
    "SELECT id, name, is_archived, is_pinned, created_at, updated_at FROM folders";

/// Note backend over one shared SQLite connection.
#[derive(Clone)]
pub struct SqliteRemoteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRemoteStore {
    /// Wraps a connection that already went through `crate::db` bootstrap.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::new(open_db(path)?))
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    async fn run<T, F>(&self, op: &'static str, work: F) -> RemoteResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> RemoteResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| RemoteError::unavailable(format!("{op}: sqlite connection poisoned")))?;
            work(&mut guard)
        })
        .await
        .map_err(|err| RemoteError::unavailable(format!("{op}: blocking task failed: {err}")))?
    }
}

impl From<rusqlite::Error> for RemoteError {
    fn from(value: rusqlite::Error) -> Self {
        let kind = match &value {
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::CannotOpen
                | ErrorCode::DiskFull => RemoteErrorKind::Unavailable,
                ErrorCode::ConstraintViolation => RemoteErrorKind::Conflict,
                _ => RemoteErrorKind::Invalid,
            },
            _ => RemoteErrorKind::Invalid,
        };
        RemoteError::new(kind, format!("sqlite: {value}"))
    }
}

#[async_trait]
impl RemoteStore for SqliteRemoteStore {
    async fn create_note(&self, title: &str, content: &str) -> RemoteResult<Note> {
        let title = title.to_string();
        let content = content.to_string();
        self.run("create_note", move |conn| {
            let id = Uuid::new_v4();
            let now = now_epoch_ms();
            conn.execute(
                "INSERT INTO notes (id, title, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4);",
                params![id.to_string(), title, content, now],
            )?;
            load_note(conn, id)
        })
        .await
    }

    async fn get_note(&self, id: NoteId) -> RemoteResult<Note> {
        self.run("get_note", move |conn| load_note(conn, id)).await
    }

    async fn get_all_notes(&self) -> RemoteResult<Vec<Note>> {
        self.run("get_all_notes", |conn| {
            let sql = format!("{NOTE_SELECT_SQL} ORDER BY created_at DESC, id ASC;");
            query_notes(conn, &sql)
        })
        .await
    }

    async fn update_note(&self, id: NoteId, title: &str, content: &str) -> RemoteResult<Note> {
        let title = title.to_string();
        let content = content.to_string();
        self.run("update_note", move |conn| {
            let changed = conn.execute(
                "UPDATE notes
                 SET title = ?2, content = ?3, updated_at = MAX(?4, updated_at)
                 WHERE id = ?1;",
                params![id.to_string(), title, content, now_epoch_ms()],
            )?;
            if changed == 0 {
                return Err(RemoteError::not_found("note", id));
            }
            load_note(conn, id)
        })
        .await
    }

    async fn delete_note(&self, id: NoteId) -> RemoteResult<()> {
        self.run("delete_note", move |conn| {
            let changed = conn.execute("DELETE FROM notes WHERE id = ?1;", [id.to_string()])?;
            if changed == 0 {
                return Err(RemoteError::not_found("note", id));
            }
            Ok(())
        })
        .await
    }

    async fn search_notes(&self, query: &str) -> RemoteResult<Vec<Note>> {
        // LIKE folds ASCII only, so matching happens on the Rust side.
        let needle = query.trim().to_string();
        self.run("search_notes", move |conn| {
            let sql = format!("{NOTE_SELECT_SQL} ORDER BY updated_at DESC, id ASC;");
            let mut notes = query_notes(conn, &sql)?;
            notes.retain(|note| note.matches_text(&needle));
            Ok(notes)
        })
        .await
    }

    async fn set_note_pinned(&self, id: NoteId, pinned: bool) -> RemoteResult<Note> {
        self.run("set_note_pinned", move |conn| {
            let changed = conn.execute(
                "UPDATE notes SET is_pinned = ?2, updated_at = MAX(?3, updated_at) WHERE id = ?1;",
                params![id.to_string(), pinned, now_epoch_ms()],
            )?;
            if changed == 0 {
                return Err(RemoteError::not_found("note", id));
            }
            load_note(conn, id)
        })
        .await
    }

    async fn set_note_archived(&self, id: NoteId, archived: bool) -> RemoteResult<Note> {
        self.run("set_note_archived", move |conn| {
            let changed = conn.execute(
                "UPDATE notes SET is_archived = ?2, updated_at = MAX(?3, updated_at) WHERE id = ?1;",
                params![id.to_string(), archived, now_epoch_ms()],
            )?;
            if changed == 0 {
                return Err(RemoteError::not_found("note", id));
            }
            load_note(conn, id)
        })
        .await
    }

    async fn move_note_to_folder(
        &self,
        id: NoteId,
        folder_id: Option<FolderId>,
    ) -> RemoteResult<Note> {
        self.run("move_note_to_folder", move |conn| {
            let tx = conn.transaction()?;
            if let Some(folder_id) = folder_id {
                if !row_exists(&tx, "folders", folder_id)? {
                    return Err(RemoteError::not_found("folder", folder_id));
                }
            }
            let changed = tx.execute(
                "UPDATE notes SET folder_id = ?2, updated_at = MAX(?3, updated_at) WHERE id = ?1;",
                params![
                    id.to_string(),
                    folder_id.map(|value| value.to_string()),
                    now_epoch_ms()
                ],
            )?;
            if changed == 0 {
                return Err(RemoteError::not_found("note", id));
            }
            tx.commit()?;
            load_note(conn, id)
        })
        .await
    }

    async fn create_tag(&self, name: &str) -> RemoteResult<Tag> {
        let name = normalize_tag_name(name)
            .ok_or_else(|| RemoteError::invalid("tag name must not be blank"))?;
        self.run("create_tag", move |conn| {
            let tx = conn.transaction()?;
            let key = tag_name_key(&name);
            let existing = {
                let mut stmt = tx.prepare("SELECT name FROM tags;")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                names.into_iter().find(|current| tag_name_key(current) == key)
            };
            if let Some(existing) = existing {
                return Err(RemoteError::conflict(format!(
                    "tag name `{name}` collides with existing `{existing}`"
                )));
            }

            let id = Uuid::new_v4();
            let now = now_epoch_ms();
            tx.execute(
                "INSERT INTO tags (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3);",
                params![id.to_string(), name, now],
            )?;
            tx.commit()?;
            Ok(Tag {
                id,
                name,
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn get_all_tags(&self) -> RemoteResult<Vec<Tag>> {
        self.run("get_all_tags", |conn| {
            let mut stmt = conn.prepare(&format!(
                "{TAG_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC;"
            ))?;
            let mut rows = stmt.query([])?;
            let mut tags = Vec::new();
            while let Some(row) = rows.next()? {
                tags.push(parse_tag_row(row)?);
            }
            Ok(tags)
        })
        .await
    }

    async fn rename_tag(&self, id: TagId, name: &str) -> RemoteResult<Tag> {
        let name = normalize_tag_name(name)
            .ok_or_else(|| RemoteError::invalid("tag name must not be blank"))?;
        self.run("rename_tag", move |conn| {
            let tx = conn.transaction()?;
            if !row_exists(&tx, "tags", id)? {
                return Err(RemoteError::not_found("tag", id));
            }
            let key = tag_name_key(&name);
            let existing = {
                let mut stmt = tx.prepare("SELECT name FROM tags WHERE id <> ?1;")?;
                let names = stmt
                    .query_map([id.to_string()], |row| row.get::<_, String>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                names.into_iter().find(|current| tag_name_key(current) == key)
            };
            if let Some(existing) = existing {
                return Err(RemoteError::conflict(format!(
                    "tag name `{name}` collides with existing `{existing}`"
                )));
            }

            tx.execute(
                "UPDATE tags SET name = ?2, updated_at = MAX(?3, updated_at) WHERE id = ?1;",
                params![id.to_string(), name, now_epoch_ms()],
            )?;
            let tag = tx.query_row(
                &format!("{TAG_SELECT_SQL} WHERE id = ?1;"),
                [id.to_string()],
                |row| Ok(parse_tag_row(row)),
            )??;
            tx.commit()?;
            Ok(tag)
        })
        .await
    }

    async fn delete_tag(&self, id: TagId) -> RemoteResult<()> {
        self.run("delete_tag", move |conn| {
            let changed = conn.execute("DELETE FROM tags WHERE id = ?1;", [id.to_string()])?;
            if changed == 0 {
                return Err(RemoteError::not_found("tag", id));
            }
            Ok(())
        })
        .await
    }

    async fn add_tag_to_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
        self.run("add_tag_to_note", move |conn| {
            let tx = conn.transaction()?;
            ensure_link_targets(&tx, note_id, tag_id)?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO note_tags (note_id, tag_id) VALUES (?1, ?2);",
                params![note_id.to_string(), tag_id.to_string()],
            )?;
            if inserted > 0 {
                touch_note(&tx, note_id)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove_tag_from_note(&self, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
        self.run("remove_tag_from_note", move |conn| {
            let tx = conn.transaction()?;
            ensure_link_targets(&tx, note_id, tag_id)?;
            let removed = tx.execute(
                "DELETE FROM note_tags WHERE note_id = ?1 AND tag_id = ?2;",
                params![note_id.to_string(), tag_id.to_string()],
            )?;
            if removed > 0 {
                touch_note(&tx, note_id)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_tags_for_note(&self, note_id: NoteId) -> RemoteResult<Vec<Tag>> {
        self.run("get_tags_for_note", move |conn| {
            if !row_exists(conn, "notes", note_id)? {
                return Err(RemoteError::not_found("note", note_id));
            }
            let mut stmt = conn.prepare(
                "SELECT t.id, t.name, t.created_at, t.updated_at
                 FROM note_tags nt
                 INNER JOIN tags t ON t.id = nt.tag_id
                 WHERE nt.note_id = ?1
                 ORDER BY t.name COLLATE NOCASE ASC;",
            )?;
            let mut rows = stmt.query([note_id.to_string()])?;
            let mut tags = Vec::new();
            while let Some(row) = rows.next()? {
                tags.push(parse_tag_row(row)?);
            }
            Ok(tags)
        })
        .await
    }

    async fn create_folder(&self, name: &str) -> RemoteResult<FolderRecord> {
        let name = normalize_folder_name(name)
            .ok_or_else(|| RemoteError::invalid("folder name must not be blank"))?;
        self.run("create_folder", move |conn| {
            let id = Uuid::new_v4();
            let now = now_epoch_ms();
            conn.execute(
                "INSERT INTO folders (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?3);",
                params![id.to_string(), name, now],
            )?;
            load_folder(conn, id)
        })
        .await
    }

    async fn get_all_folders(&self) -> RemoteResult<Vec<FolderRecord>> {
        self.run("get_all_folders", |conn| {
            let mut stmt = conn.prepare(&format!(
                "{FOLDER_SELECT_SQL} ORDER BY name COLLATE NOCASE ASC, id ASC;"
            ))?;
            let mut rows = stmt.query([])?;
            let mut folders = Vec::new();
            while let Some(row) = rows.next()? {
                folders.push(parse_folder_row(row)?);
            }
            Ok(folders)
        })
        .await
    }

    async fn rename_folder(&self, id: FolderId, name: &str) -> RemoteResult<FolderRecord> {
        let name = normalize_folder_name(name)
            .ok_or_else(|| RemoteError::invalid("folder name must not be blank"))?;
        self.run("rename_folder", move |conn| {
            let changed = conn.execute(
                "UPDATE folders SET name = ?2, updated_at = MAX(?3, updated_at) WHERE id = ?1;",
                params![id.to_string(), name, now_epoch_ms()],
            )?;
            if changed == 0 {
                return Err(RemoteError::not_found("folder", id));
            }
            load_folder(conn, id)
        })
        .await
    }

    async fn delete_folder(&self, id: FolderId) -> RemoteResult<()> {
        self.run("delete_folder", move |conn| {
            let tx = conn.transaction()?;
            let id_text = id.to_string();
            tx.execute(
                "UPDATE notes SET folder_id = NULL, updated_at = MAX(?2, updated_at)
                 WHERE folder_id = ?1;",
                params![id_text, now_epoch_ms()],
            )?;
            let changed = tx.execute("DELETE FROM folders WHERE id = ?1;", [id_text.as_str()])?;
            if changed == 0 {
                return Err(RemoteError::not_found("folder", id));
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn load_note(conn: &Connection, id: NoteId) -> RemoteResult<Note> {
    let mut note = conn
        .query_row(
            &format!("{NOTE_SELECT_SQL} WHERE id = ?1;"),
            [id.to_string()],
            |row| Ok(parse_note_row(row)),
        )
        .optional()?
        .ok_or_else(|| RemoteError::not_found("note", id))??;

    let mut stmt =
        conn.prepare("SELECT tag_id FROM note_tags WHERE note_id = ?1 ORDER BY tag_id;")?;
    let mut rows = stmt.query([id.to_string()])?;
    while let Some(row) = rows.next()? {
        note.tag_ids.push(parse_uuid(&row.get::<_, String>(0)?)?);
    }
    Ok(note)
}

/// Runs a whole-table note listing and attaches every tag link.
fn query_notes(conn: &Connection, sql: &str) -> RemoteResult<Vec<Note>> {
    let mut links = load_tag_links(conn)?;
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        let mut note = parse_note_row(row)?;
        note.tag_ids = links.remove(&note.id).unwrap_or_default();
        notes.push(note);
    }
    Ok(notes)
}

fn load_tag_links(conn: &Connection) -> RemoteResult<HashMap<NoteId, Vec<TagId>>> {
    let mut stmt = conn.prepare("SELECT note_id, tag_id FROM note_tags ORDER BY note_id, tag_id;")?;
    let mut rows = stmt.query([])?;
    let mut links: HashMap<NoteId, Vec<TagId>> = HashMap::new();
    while let Some(row) = rows.next()? {
        let note_id = parse_uuid(&row.get::<_, String>(0)?)?;
        let tag_id = parse_uuid(&row.get::<_, String>(1)?)?;
        links.entry(note_id).or_default().push(tag_id);
    }
    Ok(links)
}

fn parse_note_row(row: &Row<'_>) -> RemoteResult<Note> {
    let folder_id = row
        .get::<_, Option<String>>("folder_id")?
        .map(|value| parse_uuid(&value))
        .transpose()?;
    Ok(Note {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        title: row.get("title")?,
        content: row.get("content")?,
        is_archived: row.get("is_archived")?,
        is_pinned: row.get("is_pinned")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        folder_id,
        tag_ids: Vec::new(),
    })
}

fn parse_tag_row(row: &Row<'_>) -> RemoteResult<Tag> {
    Ok(Tag {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn load_folder(conn: &Connection, id: FolderId) -> RemoteResult<FolderRecord> {
    conn.query_row(
        &format!("{FOLDER_SELECT_SQL} WHERE id = ?1;"),
        [id.to_string()],
        |row| Ok(parse_folder_row(row)),
    )
    .optional()?
    .ok_or_else(|| RemoteError::not_found("folder", id))?
}

fn parse_folder_row(row: &Row<'_>) -> RemoteResult<FolderRecord> {
    Ok(FolderRecord {
        id: parse_uuid(&row.get::<_, String>("id")?)?,
        name: row.get("name")?,
        is_archived: row.get("is_archived")?,
        is_pinned: row.get("is_pinned")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_link_targets(conn: &Connection, note_id: NoteId, tag_id: TagId) -> RemoteResult<()> {
    if !row_exists(conn, "notes", note_id)? {
        return Err(RemoteError::not_found("note", note_id));
    }
    if !row_exists(conn, "tags", tag_id)? {
        return Err(RemoteError::not_found("tag", tag_id));
    }
    Ok(())
}

fn touch_note(conn: &Connection, id: NoteId) -> RemoteResult<()> {
    conn.execute(
        "UPDATE notes SET updated_at = MAX(?2, updated_at) WHERE id = ?1;",
        params![id.to_string(), now_epoch_ms()],
    )?;
    Ok(())
}

fn row_exists(conn: &Connection, table: &'static str, id: Uuid) -> RemoteResult<bool> {
    let exists: i64 = conn.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1);"),
        [id.to_string()],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_uuid(value: &str) -> RemoteResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RemoteError::invalid(format!("invalid uuid value `{value}` in note database")))
}
