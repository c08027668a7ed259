mod common;

use axum::http::StatusCode;
use common::{
    create_test_admin, extract_csrf_token, fetch_login_form, get, login_admin, post_form,
    setup_test_app,
};
use flipnstrip_server::constants::CSRF_ERROR_BODY;

#[tokio::test]
async fn login_page_issues_session_token() {
    let test_app = setup_test_app().await.expect("setup failed");

    let (cookie, token) = fetch_login_form(&test_app.router)
        .await
        .expect("login form");

    assert!(cookie.starts_with("flipnstrip_session="));
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[tokio::test]
async fn token_is_reused_for_the_same_session() {
    let test_app = setup_test_app().await.expect("setup failed");
    let (cookie, token) = fetch_login_form(&test_app.router).await.unwrap();

    let again = get(&test_app.router, "/admin/login", Some(&cookie))
        .await
        .unwrap();
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(extract_csrf_token(&again.body), Some(token));
}

#[tokio::test]
async fn new_sessions_get_new_tokens() {
    let test_app = setup_test_app().await.expect("setup failed");
    let (_, first) = fetch_login_form(&test_app.router).await.unwrap();
    let (_, second) = fetch_login_form(&test_app.router).await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn post_without_token_is_forbidden() {
    let test_app = setup_test_app().await.expect("setup failed");
    create_test_admin(&test_app.state, "manager", "password123")
        .await
        .unwrap();
    let (cookie, _) = fetch_login_form(&test_app.router).await.unwrap();

    let missing = post_form(
        &test_app.router,
        "/admin/login",
        Some(&cookie),
        &[("username", "manager"), ("password", "password123")],
    )
    .await
    .unwrap();

    let empty = post_form(
        &test_app.router,
        "/admin/login",
        Some(&cookie),
        &[
            ("csrf_token", ""),
            ("username", "manager"),
            ("password", "password123"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(missing.status, StatusCode::FORBIDDEN);
    assert_eq!(missing.body, CSRF_ERROR_BODY);
    assert_eq!(empty.status, missing.status);
    assert_eq!(empty.body, missing.body);
}

#[tokio::test]
async fn altered_token_is_forbidden() {
    let test_app = setup_test_app().await.expect("setup failed");
    create_test_admin(&test_app.state, "manager", "password123")
        .await
        .unwrap();
    let (cookie, token) = fetch_login_form(&test_app.router).await.unwrap();

    let mut altered = token.clone();
    let last = altered.pop().unwrap();
    altered.push(if last == '0' { '1' } else { '0' });

    let response = post_form(
        &test_app.router,
        "/admin/login",
        Some(&cookie),
        &[
            ("csrf_token", altered.as_str()),
            ("username", "manager"),
            ("password", "password123"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.body, CSRF_ERROR_BODY);
}

#[tokio::test]
async fn token_without_its_session_is_forbidden() {
    let test_app = setup_test_app().await.expect("setup failed");
    let (_, token) = fetch_login_form(&test_app.router).await.unwrap();
    let (other_cookie, _) = fetch_login_form(&test_app.router).await.unwrap();

    let no_session = post_form(
        &test_app.router,
        "/admin/logout",
        None,
        &[("csrf_token", token.as_str())],
    )
    .await
    .unwrap();
    assert_eq!(no_session.status, StatusCode::FORBIDDEN);

    let wrong_session = post_form(
        &test_app.router,
        "/admin/logout",
        Some(&other_cookie),
        &[("csrf_token", token.as_str())],
    )
    .await
    .unwrap();
    assert_eq!(wrong_session.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn valid_token_reaches_the_handler() {
    let test_app = setup_test_app().await.expect("setup failed");
    let (cookie, token) = fetch_login_form(&test_app.router).await.unwrap();

    // No such admin: the handler runs and rejects the credentials.
    let response = post_form(
        &test_app.router,
        "/admin/login",
        Some(&cookie),
        &[
            ("csrf_token", token.as_str()),
            ("username", "nobody"),
            ("password", "password123"),
        ],
    )
    .await
    .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_ne!(response.body, CSRF_ERROR_BODY);
}

#[tokio::test]
async fn rejected_logout_keeps_the_session() {
    let test_app = setup_test_app().await.expect("setup failed");
    create_test_admin(&test_app.state, "manager", "password123")
        .await
        .unwrap();
    let cookie = login_admin(&test_app.router, "manager", "password123")
        .await
        .unwrap();

    let response = post_form(&test_app.router, "/admin/logout", Some(&cookie), &[])
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let me = get(&test_app.router, "/admin/me", Some(&cookie)).await.unwrap();
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn safe_methods_need_no_token() {
    let test_app = setup_test_app().await.expect("setup failed");

    let home = get(&test_app.router, "/", None).await.unwrap();
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.body.contains("Flip and Strip Test"));

    let health = get(&test_app.router, "/health", None).await.unwrap();
    assert_eq!(health.status, StatusCode::OK);
}
