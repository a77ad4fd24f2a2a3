use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{is_unique_violation, timestamp_column, uuid_column, DbConnection};
use crate::error::{AppError, Result};
use crate::models::User;

const USER_COLUMNS: &str = "id, email, username, password_hash, created_at, updated_at";

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, 0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        password_hash: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
        updated_at: timestamp_column(row, 5)?,
    })
}

pub(crate) fn find_by_email_in(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"),
        [email],
        user_from_row,
    )
    .optional()
}

pub async fn create_user(
    conn: &DbConnection,
    email: &str,
    username: Option<&str>,
    password_hash: &str,
) -> Result<User> {
    let conn = conn.lock().await;

    if find_by_email_in(&conn, email)?.is_some() {
        return Err(already_exists(email));
    }

    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        username: username.map(str::to_string),
        password_hash: password_hash.to_string(),
        created_at: now,
        updated_at: now,
    };

    conn.execute(
        "INSERT INTO users (id, email, username, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        params![
            user.id.to_string(),
            user.email,
            user.username,
            user.password_hash,
            now.to_rfc3339(),
            now.to_rfc3339()
        ],
    )
    .map_err(|err| {
        if is_unique_violation(&err) {
            already_exists(email)
        } else {
            err.into()
        }
    })?;

    Ok(user)
}

pub async fn find_by_email(conn: &DbConnection, email: &str) -> Result<Option<User>> {
    Ok(find_by_email_in(&*conn.lock().await, email)?)
}

fn already_exists(email: &str) -> AppError {
    AppError::AlreadyExists(format!("User {email} already exists"))
}
