use sharedocs::{config::Config, cors_layer, db, router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(%err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let conn = match db::establish_connection(&config.database_path) {
        Ok(conn) => conn,
        Err(err) => {
            tracing::error!(%err, path = %config.database_path, "failed to open database");
            std::process::exit(1);
        }
    };

    let mut app = router(AppState::new(conn, &config));
    if let Some(origin) = config.cors_origin.as_deref() {
        match cors_layer(origin) {
            Some(cors) => app = app.layer(cors),
            None => tracing::warn!(%origin, "ignoring invalid CORS origin"),
        }
    }

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(%err, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %config.bind_addr, "server running");
    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!(%err, "server stopped");
        std::process::exit(1);
    }
}
