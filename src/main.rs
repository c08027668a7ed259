use tower_sessions::MemoryStore;
use tracing_subscriber::EnvFilter;

use flipnstrip_server::{AppState, app, auth, config::Config};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load and validate configuration (also loads .env)
    let config = Config::from_env().map_err(|e| format!("Configuration error: {}", e))?;
    let bind_address = config.bind_address();

    let app_state = AppState::new(config);

    // Open the database up front so a bad path fails at startup
    let db = app_state
        .db()
        .await
        .map_err(|(_, msg)| format!("Failed to initialize database: {}", msg))?;

    if let (Ok(username), Ok(password)) = (
        std::env::var("ADMIN_BOOTSTRAP_USERNAME"),
        std::env::var("ADMIN_BOOTSTRAP_PASSWORD"),
    ) {
        let created = auth::bootstrap_admin(db, &username, &password)
            .await
            .map_err(|(_, msg)| format!("Failed to create bootstrap admin: {}", msg))?;
        if !created {
            tracing::info!(username = %username, "bootstrap admin already exists");
        }
    }

    // TODO: swap MemoryStore for a persistent session store so admin logins
    // survive restarts
    let store = MemoryStore::default();
    let router = app(app_state, store).map_err(|e| format!("{:#}", e))?;

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", bind_address, e))?;

    tracing::info!("Server running on http://{}", bind_address);

    axum::serve(listener, router)
        .await
        .map_err(|e| format!("Server error: {}", e))?;

    Ok(())
}
