//! Typed HTTP client for the document API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::autosave::DocumentSink;
use crate::models::{
    Ack, AuthToken, Document, FileResponse, FolderContent, SharedDocument, User,
};
use crate::session::{SessionState, SessionWatcher};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("not logged in")]
    NotLoggedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Api { status, .. } => StatusCode::from_u16(*status).ok(),
            ClientError::Http(err) => err.status(),
            ClientError::NotLoggedIn => None,
        }
    }
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionWatcher,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session: SessionWatcher::new(),
        }
    }

    pub fn session(&self) -> &SessionWatcher {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}/api/user{}", self.base_url, path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let token = self.session.token().ok_or(ClientError::NotLoggedIn)?;
        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorMessage>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string(),
        };
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<User, ClientError> {
        let body = json!({ "email": email, "password": password, "username": username });
        Self::send(self.request(Method::POST, "/register").json(&body)).await
    }

    /// Logs in and arms the session watcher with the new token.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionState, ClientError> {
        let body = json!({ "email": email, "password": password });
        let AuthToken { token } =
            Self::send(self.request(Method::POST, "/login").json(&body)).await?;
        Ok(self.session.login(token))
    }

    pub fn logout(&self) {
        self.session.logout();
    }

    pub async fn folder_content(&self) -> Result<FolderContent, ClientError> {
        Self::send(self.authed(Method::GET, "/foldercontent")?).await
    }

    pub async fn new_file(&self) -> Result<Document, ClientError> {
        Self::send(self.authed(Method::POST, "/newfile")?).await
    }

    pub async fn file(&self, id: Uuid) -> Result<Document, ClientError> {
        let FileResponse { file } = Self::send(self.authed(Method::GET, &format!("/file/{id}"))?).await?;
        Ok(file)
    }

    pub async fn save_file(&self, id: Uuid, content: &str) -> Result<Ack, ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/file/{id}"))?
            .json(&json!({ "content": content }));
        Self::send(request).await
    }

    pub async fn delete_file(&self, id: Uuid) -> Result<Ack, ClientError> {
        Self::send(self.authed(Method::DELETE, &format!("/file/{id}"))?).await
    }

    pub async fn rename_file(&self, id: Uuid, name: &str) -> Result<Ack, ClientError> {
        let request = self
            .authed(Method::PUT, &format!("/renamefile/{id}"))?
            .json(&json!({ "name": name }));
        Self::send(request).await
    }

    pub async fn create_share_code(&self, id: Uuid) -> Result<Document, ClientError> {
        let FileResponse { file } =
            Self::send(self.authed(Method::PUT, &format!("/createsharecode/{id}"))?).await?;
        Ok(file)
    }

    /// Needs no login.
    pub async fn view_file_with_code(&self, code: &str) -> Result<SharedDocument, ClientError> {
        Self::send(self.request(Method::GET, &format!("/viewfilewithcode/{code}"))).await
    }

    pub async fn give_access_to_file(
        &self,
        id: Uuid,
        recipient_email: &str,
    ) -> Result<Document, ClientError> {
        let request = self
            .authed(Method::POST, &format!("/giveAccessToFile/{id}"))?
            .json(&json!({ "recipientEmail": recipient_email }));
        Self::send(request).await
    }
}

#[async_trait]
impl DocumentSink for ApiClient {
    async fn persist(&self, document_id: Uuid, content: String) -> Result<(), ClientError> {
        self.save_file(document_id, &content).await.map(|_| ())
    }
}
