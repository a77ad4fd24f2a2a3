use crate::access::{self, Action};
use crate::auth::{hash_password, verify_password, AuthUser};
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::models::{
    Ack, AuthToken, Document, FileResponse, FolderContent, SharedDocument, User,
};
use crate::validation::{document_name, normalize_email, validate_registration};
use crate::{store, users, AppState};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct RegisterUser {
    email: Option<String>,
    password: Option<String>,
    username: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginUser {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContent {
    content: Option<String>,
    expected_updated_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct RenameFile {
    name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GiveAccess {
    recipient_email: Option<String>,
}

pub async fn register_user(
    State(state): State<AppState>,
    ApiJson(user_data): ApiJson<RegisterUser>,
) -> Result<Json<User>> {
    let email = normalize_email(user_data.email.as_deref().unwrap_or_default());
    let password = user_data.password.as_deref().unwrap_or_default().trim();
    validate_registration(&email, password)?;

    if users::find_by_email(&state.db, &email).await?.is_some() {
        tracing::info!(%email, "registration for existing email");
        return Err(AppError::AlreadyExists(format!("User {email} already exists")));
    }

    let username = user_data
        .username
        .as_deref()
        .map(str::trim)
        .filter(|username| !username.is_empty());
    let password_hash = hash_password(password, state.password_cost)?;
    let user = users::create_user(&state.db, &email, username, &password_hash).await?;

    tracing::info!(user_id = %user.id, "registered user");
    Ok(Json(user))
}

pub async fn login_user(
    State(state): State<AppState>,
    ApiJson(login_data): ApiJson<LoginUser>,
) -> Result<Json<AuthToken>> {
    let email = normalize_email(login_data.email.as_deref().unwrap_or_default());
    let password = login_data.password.as_deref().unwrap_or_default().trim();

    let user = users::find_by_email(&state.db, &email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(password, &user.password_hash) {
        tracing::warn!(user_id = %user.id, "login with wrong password");
        return Err(AppError::Authentication("Invalid credentials".to_string()));
    }

    let token = state.tokens.issue(user.id, user.username.as_deref())?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(AuthToken { token }))
}

pub async fn folder_content(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<FolderContent>> {
    Ok(Json(store::folder_content(&state.db, user.id).await?))
}

pub async fn new_file(State(state): State<AppState>, user: AuthUser) -> Result<Json<Document>> {
    let document = store::create_document(&state.db, user.id).await?;
    tracing::info!(document_id = %document.id, user_id = %user.id, "created document");
    Ok(Json(document))
}

pub async fn get_file(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<FileResponse>> {
    let file = store::get_document(&state.db, id).await?;
    access::require(&file, user.id, Action::Read)?;
    Ok(Json(FileResponse { file }))
}

pub async fn update_file(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<UpdateContent>,
) -> Result<Json<Ack>> {
    let content = update
        .content
        .ok_or_else(|| AppError::InvalidArgument("Content is required".to_string()))?;

    let file = store::get_document(&state.db, id).await?;
    access::require(&file, user.id, Action::Write)?;

    let updated_at =
        store::update_content(&state.db, id, &content, update.expected_updated_at).await?;
    Ok(Json(Ack {
        message: "File saved".to_string(),
        updated_at: Some(updated_at),
    }))
}

pub async fn delete_file(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Ack>> {
    let file = store::get_document(&state.db, id).await?;
    access::require(&file, user.id, Action::Delete)?;

    store::delete_document(&state.db, id).await?;
    tracing::info!(document_id = %id, user_id = %user.id, "deleted document");
    Ok(Json(Ack::new("File deleted")))
}

pub async fn rename_file(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(rename): ApiJson<RenameFile>,
) -> Result<Json<Ack>> {
    let name = document_name(rename.name.as_deref())?;

    let file = store::get_document(&state.db, id).await?;
    access::require(&file, user.id, Action::Rename)?;

    store::rename_document(&state.db, id, &name).await?;
    Ok(Json(Ack::new("File renamed")))
}

pub async fn create_share_code(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<FileResponse>> {
    let file = store::get_document(&state.db, id).await?;
    access::require(&file, user.id, Action::MintShareCode)?;

    let file = store::mint_share_code(&state.db, id).await?;
    tracing::info!(document_id = %id, "minted share code");
    Ok(Json(FileResponse { file }))
}

/// Unauthenticated, read-only.
pub async fn view_file_with_code(
    State(state): State<AppState>,
    ApiPath(code): ApiPath<String>,
) -> Result<Json<SharedDocument>> {
    let file = store::resolve_share_code(&state.db, &code).await?;
    Ok(Json(file.into()))
}

pub async fn give_access_to_file(
    State(state): State<AppState>,
    user: AuthUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(grant): ApiJson<GiveAccess>,
) -> Result<Json<Document>> {
    let recipient_email = grant
        .recipient_email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty())
        .ok_or_else(|| AppError::InvalidArgument("Recipient email is required".to_string()))?;

    let file = store::get_document(&state.db, id).await?;
    access::require(&file, user.id, Action::GrantEditAccess)?;

    let file = store::grant_edit_access(&state.db, id, &recipient_email).await?;
    tracing::info!(document_id = %id, "granted edit access");
    Ok(Json(file))
}
