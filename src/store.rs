use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use uuid::Uuid;

use crate::db::{
    is_unique_violation, optional_uuid_column, timestamp_column, uuid_column, DbConnection,
};
use crate::error::{AppError, Result};
use crate::models::{Document, Folder, FolderContent, DEFAULT_DOCUMENT_NAME};
use crate::users::find_by_email_in;
use crate::validation::DocumentName;

pub const SHARE_CODE_LEN: usize = 12;
const SHARE_CODE_ATTEMPTS: usize = 5;

const DOCUMENT_COLUMNS: &str =
    "id, name, owner_id, parent_id, content, share_code, created_at, updated_at";

pub fn generate_share_code() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(SHARE_CODE_LEN)
        .map(char::from)
        .collect()
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        owner: uuid_column(row, 2)?,
        parent_folder: optional_uuid_column(row, 3)?,
        content: row.get(4)?,
        share_code: row.get(5)?,
        editor_ids: Vec::new(),
        created_at: timestamp_column(row, 6)?,
        updated_at: timestamp_column(row, 7)?,
    })
}

fn editors_of(conn: &Connection, document_id: Uuid) -> rusqlite::Result<Vec<Uuid>> {
    let mut stmt = conn.prepare(
        "SELECT user_id FROM document_editors WHERE document_id = ? ORDER BY user_id",
    )?;
    let editors = stmt.query_map([document_id.to_string()], |row| uuid_column(row, 0))?;
    editors.collect()
}

fn with_editors(conn: &Connection, mut document: Document) -> rusqlite::Result<Document> {
    document.editor_ids = editors_of(conn, document.id)?;
    Ok(document)
}

fn query_documents(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<Document>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, document_from_row)?;
    rows.map(|document| with_editors(conn, document?)).collect()
}

fn load_document(conn: &Connection, id: Uuid) -> Result<Document> {
    let document = conn
        .query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"),
            [id.to_string()],
            document_from_row,
        )
        .optional()?
        .ok_or_else(file_not_found)?;

    Ok(with_editors(conn, document)?)
}

fn file_not_found() -> AppError {
    AppError::NotFound("File not found".to_string())
}

pub async fn create_document(conn: &DbConnection, owner: Uuid) -> Result<Document> {
    let now = Utc::now();
    let document = Document {
        id: Uuid::new_v4(),
        name: DEFAULT_DOCUMENT_NAME.to_string(),
        owner,
        parent_folder: None,
        content: String::new(),
        share_code: None,
        editor_ids: Vec::new(),
        created_at: now,
        updated_at: now,
    };

    conn.lock().await.execute(
        "INSERT INTO documents (id, name, owner_id, parent_id, content, share_code, created_at, updated_at) VALUES (?, ?, ?, NULL, ?, NULL, ?, ?)",
        params![
            document.id.to_string(),
            document.name,
            owner.to_string(),
            document.content,
            now.to_rfc3339(),
            now.to_rfc3339()
        ],
    )?;

    Ok(document)
}

/// Fetches a document regardless of who asks; callers gate access themselves.
pub async fn get_document(conn: &DbConnection, id: Uuid) -> Result<Document> {
    load_document(&*conn.lock().await, id)
}

/// Replaces the whole content. Without `expected_updated_at` the last write
/// wins; with it, the write only lands if nobody saved in between.
pub async fn update_content(
    conn: &DbConnection,
    id: Uuid,
    content: &str,
    expected_updated_at: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>> {
    let conn = conn.lock().await;

    let current: String = conn
        .query_row(
            "SELECT updated_at FROM documents WHERE id = ?",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(file_not_found)?;

    if let Some(expected) = expected_updated_at {
        let current = DateTime::parse_from_rfc3339(&current)
            .map_err(|err| AppError::Internal(format!("stored timestamp: {err}")))?;
        if current != expected {
            return Err(AppError::Conflict(
                "File was modified by someone else".to_string(),
            ));
        }
    }

    let now = Utc::now();
    conn.execute(
        "UPDATE documents SET content = ?, updated_at = ? WHERE id = ?",
        params![content, now.to_rfc3339(), id.to_string()],
    )?;

    Ok(now)
}

pub async fn rename_document(conn: &DbConnection, id: Uuid, name: &DocumentName) -> Result<()> {
    let updated = conn.lock().await.execute(
        "UPDATE documents SET name = ?, updated_at = ? WHERE id = ?",
        params![name.as_str(), Utc::now().to_rfc3339(), id.to_string()],
    )?;

    if updated == 0 {
        return Err(file_not_found());
    }
    Ok(())
}

/// Assigns a fresh code, replacing any previous one.
pub async fn mint_share_code(conn: &DbConnection, id: Uuid) -> Result<Document> {
    let conn = conn.lock().await;

    for _ in 0..SHARE_CODE_ATTEMPTS {
        let code = generate_share_code();
        let result = conn.execute(
            "UPDATE documents SET share_code = ?, updated_at = ? WHERE id = ?",
            params![code, Utc::now().to_rfc3339(), id.to_string()],
        );

        match result {
            Ok(0) => return Err(file_not_found()),
            Ok(_) => return load_document(&conn, id),
            Err(err) if is_unique_violation(&err) => {
                tracing::warn!(document_id = %id, "share code collision, retrying");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Internal(
        "could not generate a unique share code".to_string(),
    ))
}

pub async fn resolve_share_code(conn: &DbConnection, code: &str) -> Result<Document> {
    let conn = conn.lock().await;
    let document = conn
        .query_row(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE share_code = ?"),
            [code],
            document_from_row,
        )
        .optional()?
        .ok_or_else(file_not_found)?;

    Ok(with_editors(&conn, document)?)
}

/// Adds the recipient to the editors. Granting twice, or granting the owner,
/// changes nothing.
pub async fn grant_edit_access(
    conn: &DbConnection,
    id: Uuid,
    recipient_email: &str,
) -> Result<Document> {
    let conn = conn.lock().await;

    let document = load_document(&conn, id)?;
    let recipient = find_by_email_in(&conn, recipient_email)?
        .ok_or_else(|| AppError::NotFound("Recipient not found".to_string()))?;

    if recipient.id == document.owner {
        return Ok(document);
    }

    conn.execute(
        "INSERT OR IGNORE INTO document_editors (document_id, user_id) VALUES (?, ?)",
        params![id.to_string(), recipient.id.to_string()],
    )?;

    load_document(&conn, id)
}

pub async fn delete_document(conn: &DbConnection, id: Uuid) -> Result<()> {
    let deleted = conn
        .lock()
        .await
        .execute("DELETE FROM documents WHERE id = ?", [id.to_string()])?;

    if deleted == 0 {
        return Err(file_not_found());
    }
    Ok(())
}

/// Owned documents and documents shared for editing, as two disjoint lists.
pub async fn folder_content(conn: &DbConnection, user: Uuid) -> Result<FolderContent> {
    let conn = conn.lock().await;
    let user = user.to_string();

    let folders = {
        let mut stmt = conn.prepare(
            "SELECT id, name, owner_id, parent_id FROM folders WHERE owner_id = ? ORDER BY name",
        )?;
        let rows = stmt.query_map([&user], |row| {
            Ok(Folder {
                id: uuid_column(row, 0)?,
                name: row.get(1)?,
                owner: uuid_column(row, 2)?,
                parent: optional_uuid_column(row, 3)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let owned = query_documents(
        &conn,
        &format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE owner_id = ? ORDER BY created_at DESC"
        ),
        [&user],
    )?;

    let shared = query_documents(
        &conn,
        &format!(
            "SELECT {} FROM documents d JOIN document_editors e ON e.document_id = d.id WHERE e.user_id = ? ORDER BY d.created_at DESC",
            prefixed_columns("d")
        ),
        [&user],
    )?;

    let (files, files_with_edit_right) = merge_listing(owned, shared);
    Ok(FolderContent {
        folders,
        files,
        files_with_edit_right,
    })
}

fn prefixed_columns(alias: &str) -> String {
    DOCUMENT_COLUMNS
        .split(", ")
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Drops any shared entry that is already listed as owned, or listed twice.
fn merge_listing(owned: Vec<Document>, shared: Vec<Document>) -> (Vec<Document>, Vec<Document>) {
    let mut seen: HashSet<Uuid> = owned.iter().map(|document| document.id).collect();
    let shared = shared
        .into_iter()
        .filter(|document| seen.insert(document.id))
        .collect();
    (owned, shared)
}
