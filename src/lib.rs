pub mod access;
pub mod auth;
pub mod autosave;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod session;
pub mod store;
pub mod users;
pub mod validation;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenManager;
use crate::config::Config;
use crate::db::DbConnection;

#[derive(Clone)]
pub struct AppState {
    pub db: DbConnection,
    pub tokens: Arc<TokenManager>,
    pub password_cost: u32,
}

impl AppState {
    pub fn new(db: DbConnection, config: &Config) -> Self {
        Self {
            db,
            tokens: Arc::new(TokenManager::new(&config.secret)),
            password_cost: config.bcrypt_cost,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/user/register", post(handlers::register_user))
        .route("/api/user/login", post(handlers::login_user))
        .route("/api/user/foldercontent", get(handlers::folder_content))
        .route("/api/user/newfile", post(handlers::new_file))
        .route(
            "/api/user/file/:id",
            get(handlers::get_file)
                .put(handlers::update_file)
                .delete(handlers::delete_file),
        )
        .route("/api/user/renamefile/:id", put(handlers::rename_file))
        .route("/api/user/createsharecode/:id", put(handlers::create_share_code))
        .route(
            "/api/user/viewfilewithcode/:code",
            get(handlers::view_file_with_code),
        )
        .route(
            "/api/user/giveAccessToFile/:id",
            post(handlers::give_access_to_file),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Allows browser calls from a single development origin.
pub fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = HeaderValue::from_str(origin).ok()?;
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(tower_http::cors::Any)
            .allow_headers(tower_http::cors::Any),
    )
}
