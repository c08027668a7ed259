//! Bare server-rendered pages. Styling and scripts live with the theme,
//! these only carry the session data and form fields through.

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse},
};
use tower_sessions::Session;

use crate::auth::get_current_admin;
use crate::constants::*;
use crate::csrf::token_field;
use crate::models::HealthResponse;
use crate::sync_log::read_tail;
use crate::utils::{db_error_with_context, escape_html};
use crate::AppState;

fn layout(title: &str, site_name: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>{} | {}</title></head>\n<body>\n{}\n</body>\n</html>\n",
        escape_html(title),
        escape_html(site_name),
        body
    )
}

pub async fn home(State(app_state): State<AppState>) -> Html<String> {
    let site = &app_state.config.site;
    let body = format!(
        "<header><h1>{}</h1><p>{}</p></header>",
        escape_html(&site.name),
        escape_html(&site.tagline)
    );
    Html(layout("Home", &site.name, &body))
}

pub async fn login_page(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>, (StatusCode, String)> {
    let field = token_field(&session).await?;
    let body = format!(
        concat!(
            "<h1>Admin Login</h1>\n",
            "<form method=\"post\" action=\"/admin/login\">\n",
            "{}\n",
            "<input type=\"text\" name=\"username\" required>\n",
            "<input type=\"password\" name=\"password\" required>\n",
            "<button type=\"submit\">Log in</button>\n",
            "</form>"
        ),
        field
    );
    Ok(Html(layout("Admin Login", &app_state.config.site.name, &body)))
}

pub async fn dashboard(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<Html<String>, (StatusCode, String)> {
    let admin = get_current_admin(&session).await?;
    let field = token_field(&session).await?;
    let body = format!(
        concat!(
            "<nav><span>Signed in as {}</span>\n",
            "<a href=\"/admin/sync-log\">eBay sync log</a>\n",
            "<form method=\"post\" action=\"/admin/logout\">{}<button type=\"submit\">Log out</button></form>\n",
            "</nav>\n",
            "<h1>Dashboard</h1>"
        ),
        escape_html(&admin.username),
        field
    );
    Ok(Html(layout("Dashboard", &app_state.config.site.name, &body)))
}

pub async fn sync_log(
    State(app_state): State<AppState>,
    session: Session,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    get_current_admin(&session).await?;

    let path = &app_state.config.ebay.sync_log_path;
    let lines = read_tail(path, SYNC_LOG_TAIL_LINES).await.map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "failed to read sync log");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to read sync log".to_string(),
        )
    })?;

    let mut body = lines.join("\n");
    if !body.is_empty() {
        body.push('\n');
    }
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body))
}

pub async fn health(
    State(app_state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, String)> {
    let db = app_state.db().await?;
    let conn = db.read().await;
    conn.query("SELECT 1", ())
        .await
        .map_err(|_| db_error_with_context("health check failed"))?;
    Ok(Json(HealthResponse { status: "ok" }))
}
