use recall_core::db::migrations::latest_version;
use recall_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::{params, Connection};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "folders");
    assert_table_exists(&conn, "notes");
    assert_table_exists(&conn, "tags");
    assert_table_exists(&conn, "note_tags");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recall.db");

    let conn_first = open_db(&path).unwrap();
    insert_note(&conn_first, "n-1", 10, 10);
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_updated_at_before_created_at() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO notes (id, created_at, updated_at) VALUES ('n-1', 20, 10);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn tag_names_are_unique_ignoring_case() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO tags (id, name, created_at, updated_at) VALUES ('t-1', 'Work', 1, 1);",
        [],
    )
    .unwrap();
    let result = conn.execute(
        "INSERT INTO tags (id, name, created_at, updated_at) VALUES ('t-2', 'WORK', 1, 1);",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn deleting_folder_or_tag_detaches_notes() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO folders (id, name, created_at, updated_at) VALUES ('f-1', 'Inbox', 1, 1);",
        [],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO tags (id, name, created_at, updated_at) VALUES ('t-1', 'work', 1, 1);",
        [],
    )
    .unwrap();
    insert_note(&conn, "n-1", 1, 1);
    conn.execute("UPDATE notes SET folder_id = 'f-1' WHERE id = 'n-1';", [])
        .unwrap();
    conn.execute(
        "INSERT INTO note_tags (note_id, tag_id) VALUES ('n-1', 't-1');",
        [],
    )
    .unwrap();

    conn.execute("DELETE FROM folders WHERE id = 'f-1';", []).unwrap();
    conn.execute("DELETE FROM tags WHERE id = 't-1';", []).unwrap();

    let folder_id: Option<String> = conn
        .query_row("SELECT folder_id FROM notes WHERE id = 'n-1';", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(folder_id, None);
    let links: i64 = conn
        .query_row("SELECT COUNT(*) FROM note_tags;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(links, 0);
}

fn insert_note(conn: &Connection, id: &str, created_at: i64, updated_at: i64) {
    conn.execute(
        "INSERT INTO notes (id, title, content, created_at, updated_at) VALUES (?1, 'title', 'body', ?2, ?3);",
        params![id, created_at, updated_at],
    )
    .unwrap();
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
