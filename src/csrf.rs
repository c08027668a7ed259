//! Per-session anti-forgery tokens.
//!
//! A session gets one token the first time a form asks for it and keeps it
//! until the session is flushed. State-changing requests on protected routes
//! must echo it back in the `csrf_token` form field.

use axum::{
    body::Body,
    extract::Request,
    http::{Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use constant_time_eq::constant_time_eq;
use password_hash::rand_core::{OsRng, RngCore};
use thiserror::Error;
use tower_sessions::Session;

use crate::constants::*;

#[derive(Debug, Error)]
pub enum CsrfError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl From<CsrfError> for (StatusCode, String) {
    fn from(e: CsrfError) -> Self {
        tracing::error!(error = %e, "csrf token unavailable");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            ERR_INVALID_SESSION.to_string(),
        )
    }
}

/// A failed token check. Always rendered as a bare 403.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsrfRejection;

impl IntoResponse for CsrfRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::FORBIDDEN,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            CSRF_ERROR_BODY,
        )
            .into_response()
    }
}

fn new_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Returns the session's token, creating and storing one if there is none.
pub async fn generate_token(session: &Session) -> Result<String, CsrfError> {
    if let Some(token) = session.get::<String>(SESSION_KEY_CSRF_TOKEN).await? {
        return Ok(token);
    }

    let token = new_token();
    session.insert(SESSION_KEY_CSRF_TOKEN, &token).await?;
    Ok(token)
}

pub async fn get_token(session: &Session) -> Result<String, CsrfError> {
    generate_token(session).await
}

/// Fails closed: no stored token, or a session that cannot be read, never
/// validates.
pub async fn validate_token(session: &Session, candidate: &str) -> bool {
    let stored = match session.get::<String>(SESSION_KEY_CSRF_TOKEN).await {
        Ok(Some(token)) => token,
        Ok(None) => return false,
        Err(e) => {
            tracing::warn!(error = %e, "could not read csrf token from session");
            return false;
        }
    };

    !candidate.is_empty() && constant_time_eq(candidate.as_bytes(), stored.as_bytes())
}

/// Hidden form input carrying the current token.
pub async fn token_field(session: &Session) -> Result<String, CsrfError> {
    let token = get_token(session).await?;
    Ok(format!(
        r#"<input type="hidden" name="{}" value="{}">"#,
        CSRF_FIELD_NAME,
        escape_html_attr(&token)
    ))
}

/// Checks a submitted form value. A missing field counts as an empty one.
pub async fn validate_request(
    session: &Session,
    submitted: Option<&str>,
) -> Result<(), CsrfRejection> {
    if validate_token(session, submitted.unwrap_or_default()).await {
        Ok(())
    } else {
        Err(CsrfRejection)
    }
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn form_token(body: &[u8]) -> Option<String> {
    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(name, _)| name == CSRF_FIELD_NAME)
        .map(|(_, value)| value)
}

/// Middleware enforcing the token on every state-changing request.
///
/// On failure the 403 is returned directly and nothing behind this layer
/// runs. On success the buffered body is handed on unchanged.
pub async fn require_csrf(session: Session, request: Request, next: Next) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_FORM_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "unreadable form body, rejecting");
            return CsrfRejection.into_response();
        }
    };

    let submitted = form_token(&bytes);
    if let Err(rejection) = validate_request(&session, submitted.as_deref()).await {
        tracing::warn!(method = %parts.method, uri = %parts.uri, "csrf validation failed");
        return rejection.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Escapes text for use inside a double- or single-quoted HTML attribute.
pub fn escape_html_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
