#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use flipnstrip_server::{AppState, app, auth, config::Config};
use tower::util::ServiceExt;
use tower_sessions::MemoryStore;

pub const TEST_SESSION_SECRET: &str =
    "test_secret_key_at_least_64_chars_long_test_secret_key_at_least_64_";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    // Dropped with the app
    pub temp_dir: tempfile::TempDir,
}

pub fn test_config(temp_dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.database.path = temp_dir.path().join("data").join("flipnstrip.db");
    config.ebay.sync_log_path = temp_dir.path().join("logs").join("ebay_sync.log");
    config.security.session_secret = TEST_SESSION_SECRET.to_string();
    config.site.name = "Flip and Strip Test".to_string();
    config
}

pub async fn setup_test_app() -> anyhow::Result<TestApp> {
    let temp_dir = tempfile::tempdir()?;
    let config = test_config(&temp_dir);
    config.validate()?;

    let state = AppState::new(config);
    let router = app(state.clone(), MemoryStore::default())?;

    Ok(TestApp {
        router,
        state,
        temp_dir,
    })
}

pub async fn create_test_admin(
    state: &AppState,
    username: &str,
    password: &str,
) -> anyhow::Result<String> {
    let db = state
        .db()
        .await
        .map_err(|(_, msg)| anyhow::anyhow!("Failed to open database: {}", msg))?;
    let admin = auth::create_admin(db, username, password)
        .await
        .map_err(|(_, msg)| anyhow::anyhow!("Failed to create test admin: {}", msg))?;
    Ok(admin.id)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// `name=value` part of the session cookie, if the response set one.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all("set-cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(flipnstrip_server::constants::SESSION_NAME))
            .and_then(|v| v.split(';').next())
            .map(|v| v.to_string())
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get("location").and_then(|v| v.to_str().ok())
    }
}

async fn send(app: &Router, request: Request<Body>) -> anyhow::Result<TestResponse> {
    let response = app
        .clone()
        .oneshot(request)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute request: {}", e))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?;

    Ok(TestResponse {
        status,
        headers,
        body: String::from_utf8(body.to_vec())?,
    })
}

pub async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> anyhow::Result<TestResponse> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    send(app, builder.body(Body::empty())?).await
}

pub async fn post_form(
    app: &Router,
    uri: &str,
    cookie: Option<&str>,
    fields: &[(&str, &str)],
) -> anyhow::Result<TestResponse> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let body = serde_urlencoded::to_string(fields)?;
    send(app, builder.body(Body::from(body))?).await
}

/// Pulls the hidden `csrf_token` value out of a rendered form.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    let marker = r#"name="csrf_token" value=""#;
    let start = html.find(marker)? + marker.len();
    let end = html[start..].find('"')?;
    Some(html[start..start + end].to_string())
}

/// Loads the login page and returns `(session cookie, csrf token)`.
pub async fn fetch_login_form(app: &Router) -> anyhow::Result<(String, String)> {
    let response = get(app, "/admin/login", None).await?;
    anyhow::ensure!(response.status == StatusCode::OK, "login page returned {}", response.status);
    let cookie = response
        .session_cookie()
        .ok_or_else(|| anyhow::anyhow!("No session cookie in response"))?;
    let token = extract_csrf_token(&response.body)
        .ok_or_else(|| anyhow::anyhow!("No csrf token in login form"))?;
    Ok((cookie, token))
}

/// Full login; returns the post-login session cookie.
pub async fn login_admin(app: &Router, username: &str, password: &str) -> anyhow::Result<String> {
    let (cookie, token) = fetch_login_form(app).await?;
    let response = post_form(
        app,
        "/admin/login",
        Some(&cookie),
        &[
            ("csrf_token", token.as_str()),
            ("username", username),
            ("password", password),
        ],
    )
    .await?;
    anyhow::ensure!(
        response.status == StatusCode::SEE_OTHER,
        "login returned {}: {}",
        response.status,
        response.body
    );
    Ok(response.session_cookie().unwrap_or(cookie))
}
