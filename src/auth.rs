use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    Form, Json,
    extract::State,
    http::StatusCode,
    response::Redirect,
};
use password_hash::rand_core::OsRng;
use tower_sessions::Session;
use uuid::Uuid;

use crate::constants::*;
use crate::database::Database;
use crate::models::{AdminUser, LoginForm, PublicAdmin};
use crate::utils::{
    db_error, db_error_with_context, session_error, validate_password, validate_username,
};
use crate::AppState;

pub fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

pub async fn find_admin_by_username(
    db: &Database,
    username: &str,
) -> Result<Option<AdminUser>, (StatusCode, String)> {
    let conn = db.read().await;
    let mut rows = conn
        .query(
            "SELECT id, username, password_hash FROM admin_users WHERE username = ?",
            [username],
        )
        .await
        .map_err(|_| db_error_with_context("failed to query admin"))?;

    let Some(row) = rows.next().await.map_err(|_| db_error())? else {
        return Ok(None);
    };

    Ok(Some(AdminUser {
        id: row
            .get(0)
            .map_err(|_| db_error_with_context("invalid admin data"))?,
        username: row
            .get(1)
            .map_err(|_| db_error_with_context("invalid admin data"))?,
        password_hash: row
            .get(2)
            .map_err(|_| db_error_with_context("invalid admin data"))?,
    }))
}

pub async fn create_admin(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<PublicAdmin, (StatusCode, String)> {
    validate_username(username)?;
    validate_password(password)?;
    let username = username.trim();

    if find_admin_by_username(db, username).await?.is_some() {
        return Err((
            StatusCode::CONFLICT,
            "Admin username already exists".to_string(),
        ));
    }

    let password_hash = hash_password(password)?;
    let id = Uuid::new_v4().to_string();

    insert_admin(db, &id, username, &password_hash).await?;

    tracing::info!(username, "admin account created");

    Ok(PublicAdmin {
        id,
        username: username.to_string(),
    })
}

/// A concurrent create can pass the lookup above; the UNIQUE index still
/// decides, and losing that race is the same 409.
async fn insert_admin(
    db: &Database,
    id: &str,
    username: &str,
    password_hash: &str,
) -> Result<(), (StatusCode, String)> {
    let conn = db.write().await;
    conn.execute(
        "INSERT INTO admin_users (id, username, password_hash) VALUES (?, ?, ?)",
        (id, username, password_hash),
    )
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed: admin_users.username") {
            (
                StatusCode::CONFLICT,
                "Admin username already exists".to_string(),
            )
        } else {
            db_error_with_context("admin creation failed")
        }
    })?;
    Ok(())
}

/// Creates the startup admin unless that username already exists.
/// Returns whether an account was created.
pub async fn bootstrap_admin(
    db: &Database,
    username: &str,
    password: &str,
) -> Result<bool, (StatusCode, String)> {
    if find_admin_by_username(db, username.trim()).await?.is_some() {
        return Ok(false);
    }
    create_admin(db, username, password).await?;
    Ok(true)
}

pub async fn get_current_admin(session: &Session) -> Result<PublicAdmin, (StatusCode, String)> {
    let username: Option<String> = session
        .get(SESSION_KEY_ADMIN_USERNAME)
        .await
        .map_err(|_| session_error())?;
    let id: Option<String> = session
        .get(SESSION_KEY_ADMIN_ID)
        .await
        .map_err(|_| session_error())?;

    match (id, username) {
        (Some(id), Some(username)) => Ok(PublicAdmin { id, username }),
        _ => Err((StatusCode::UNAUTHORIZED, ERR_UNAUTHORIZED.to_string())),
    }
}

pub async fn login(
    State(app_state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Result<Redirect, (StatusCode, String)> {
    let db = app_state.db().await?;
    let username = form.username.trim();

    let admin = find_admin_by_username(db, username).await?;
    let Some(admin) = admin.filter(|a| verify_password(&form.password, &a.password_hash)) else {
        tracing::warn!(username, "failed admin login");
        return Err((
            StatusCode::UNAUTHORIZED,
            ERR_INVALID_CREDENTIALS.to_string(),
        ));
    };

    // New session id on privilege change; stored data, including the CSRF
    // token, carries over.
    session.cycle_id().await.map_err(|_| session_error())?;
    session
        .insert(SESSION_KEY_ADMIN_USERNAME, &admin.username)
        .await
        .map_err(|_| session_error())?;
    session
        .insert(SESSION_KEY_ADMIN_ID, &admin.id)
        .await
        .map_err(|_| session_error())?;

    tracing::info!(username = %admin.username, "admin logged in");
    Ok(Redirect::to("/admin"))
}

pub async fn logout(session: Session) -> Result<Redirect, (StatusCode, String)> {
    session.flush().await.map_err(|_| session_error())?;
    Ok(Redirect::to("/admin/login"))
}

pub async fn me(session: Session) -> Result<Json<PublicAdmin>, (StatusCode, String)> {
    let admin = get_current_admin(&session).await?;
    Ok(Json(admin))
}
