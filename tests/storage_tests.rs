//! Storage failures while handling a request are reported as 400.

mod common;

use axum::http::StatusCode;
use common::*;
use typoteka::jwt::TokenIdentity;

#[tokio::test]
async fn test_broken_table_is_bad_request() {
    let (test, path) = file_test_app().await;
    let article_id = seed_article(&test.db, "Article", "2024-01-01T00:00:00Z", &[]).await;

    let response = send(&test.app, get("/api/comments", None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    drop_table(&path, "comments").await;

    let (status, body) = send_json(&test.app, get("/api/comments", None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string());

    let (status, _) = send_json(&test.app, get(&format!("/api/articles/{}", article_id), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    remove_db_file(&path);
}

#[tokio::test]
async fn test_session_lookup_failure_is_bad_request_without_cookies() {
    let (test, path) = file_test_app().await;
    let account_id = seed_account(&test.db, "broken@example.com", "hash", false).await;
    let pair = test
        .jwt
        .issue(TokenIdentity {
            account_id,
            is_admin: false,
        })
        .unwrap();

    drop_table(&path, "accounts").await;

    let cookie = format!("accessToken={}", pair.access_token);
    let response = send(&test.app, get("/api/user/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());

    remove_db_file(&path);
}
