use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_DOCUMENT_NAME: &str = "untitled";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub parent_folder: Option<Uuid>,
    /// Serialized rich-text markup, replaced wholesale on every save.
    pub content: String,
    pub share_code: Option<String>,
    /// Users granted write access. Never contains the owner.
    pub editor_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What an unauthenticated share-code holder gets to see.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDocument {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for SharedDocument {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            name: document.name,
            content: document.content,
            updated_at: document.updated_at,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub owner: Uuid,
    pub parent: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderContent {
    pub folders: Vec<Folder>,
    pub files: Vec<Document>,
    pub files_with_edit_right: Vec<Document>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResponse {
    pub file: Document,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            updated_at: None,
        }
    }
}
