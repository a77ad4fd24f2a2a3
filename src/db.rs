use chrono::{DateTime, Utc};
use rusqlite::{types::Type, Connection, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

pub type DbConnection = Arc<Mutex<Connection>>;

pub fn establish_connection(path: &str) -> Result<DbConnection> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "foreign_keys", true)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS folders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            parent_id TEXT,
            FOREIGN KEY (owner_id) REFERENCES users (id),
            FOREIGN KEY (parent_id) REFERENCES folders (id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            owner_id TEXT NOT NULL,
            parent_id TEXT,
            content TEXT NOT NULL DEFAULT '',
            share_code TEXT UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (owner_id) REFERENCES users (id),
            FOREIGN KEY (parent_id) REFERENCES folders (id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS document_editors (
            document_id TEXT NOT NULL,
            user_id TEXT NOT NULL,
            PRIMARY KEY (document_id, user_id),
            FOREIGN KEY (document_id) REFERENCES documents (id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users (id)
        )",
        [],
    )?;

    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn uuid_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn optional_uuid_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        Uuid::parse_str(&raw).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

pub(crate) fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err)))
}

pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
