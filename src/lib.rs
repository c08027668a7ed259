pub mod auth;
pub mod config;
pub mod constants;
pub mod csrf;
pub mod database;
pub mod models;
pub mod pages;
pub mod sync_log;
pub mod utils;

use std::sync::Arc;

use axum::{
    Router,
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use time::Duration;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::Key};

use crate::config::Config;
use crate::constants::SESSION_NAME;

// Re-export types at crate root for convenient importing
pub use crate::database::{ConnectionManager, Database, DatabaseError};
pub use crate::sync_log::SyncLogger;

/// Application state shared across all request handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Owner of the one database connection
    pub db: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let db = ConnectionManager::from_config(&config.database);
        Self {
            config: Arc::new(config),
            db: Arc::new(db),
        }
    }

    /// The shared connection, opened on first use.
    pub async fn db(&self) -> Result<&Database, (StatusCode, String)> {
        self.db.instance().await.map_err(|_| utils::db_unavailable())
    }
}

/// Builds the full application: routes, CSRF enforcement, sessions, tracing.
pub fn app(state: AppState, store: MemoryStore) -> anyhow::Result<Router> {
    let security = &state.config.security;
    let session_key = Key::try_from(security.session_secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid session secret: {}", e))?;

    let session_layer = SessionManagerLayer::new(store)
        .with_secure(state.config.server.secure_cookies)
        .with_name(SESSION_NAME)
        .with_expiry(Expiry::OnInactivity(Duration::days(
            security.session_expiry_days,
        )))
        .with_signed(session_key);

    Ok(Router::new()
        .route("/", get(pages::home))
        .route("/health", get(pages::health))
        .route("/admin", get(pages::dashboard))
        .route("/admin/login", get(pages::login_page).post(auth::login))
        .route("/admin/logout", post(auth::logout))
        .route("/admin/me", get(auth::me))
        .route("/admin/sync-log", get(pages::sync_log))
        // Runs inside the session layer, before any handler.
        .layer(middleware::from_fn(csrf::require_csrf))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
