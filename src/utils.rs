use axum::http::StatusCode;

use crate::constants::*;

pub fn db_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_DATABASE_OPERATION.to_string(),
    )
}

pub fn db_error_with_context(context: &str) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Database error: {}", context),
    )
}

pub fn db_unavailable() -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        ERR_DATABASE_UNAVAILABLE.to_string(),
    )
}

pub fn session_error() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ERR_INVALID_SESSION.to_string(),
    )
}

pub fn validate_string_length(
    value: &str,
    field_name: &str,
    max_length: usize,
) -> Result<(), (StatusCode, String)> {
    if value.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} cannot be empty", field_name),
        ));
    }
    if value.len() > max_length {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("{} must be less than {} characters", field_name, max_length),
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), (StatusCode, String)> {
    validate_string_length(username, "Username", MAX_USERNAME_LENGTH)?;
    if username.trim().len() < MIN_USERNAME_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Username must be at least {} characters",
                MIN_USERNAME_LENGTH
            ),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), (StatusCode, String)> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err((
            StatusCode::BAD_REQUEST,
            format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            ),
        ));
    }
    Ok(())
}

/// Escapes text for an HTML element body.
pub fn escape_html(value: &str) -> String {
    crate::csrf::escape_html_attr(value)
}
