#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use tower::ServiceExt;
use typoteka::{
    ServerConfig, create_app,
    db::{Database, NewAccount, NewArticle},
    jwt::{TokenIdentity, TokenIssuer},
    rate_limit::RateLimitConfig,
};

pub const JWT_SECRET: &[u8] = b"integration-test-secret-0123456789abcdef";

/// A router plus handles on the state behind it.
pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub jwt: TokenIssuer,
}

/// Tokens issued for a seeded account, with the refresh JTI already stored.
pub struct TestSession {
    pub account_id: i64,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_jti: String,
}

impl TestSession {
    /// Cookie header carrying both tokens.
    pub fn cookies(&self) -> String {
        format!(
            "accessToken={}; refreshToken={}",
            self.access_token, self.refresh_token
        )
    }

    pub fn access_only(&self) -> String {
        format!("accessToken={}", self.access_token)
    }

    pub fn refresh_only(&self) -> String {
        format!("refreshToken={}", self.refresh_token)
    }
}

/// Create a test app with rate limits high enough to never trigger.
pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

/// Create a test app after letting the caller adjust the configuration.
pub async fn test_app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let mut config = ServerConfig::new(db.clone(), JWT_SECRET);
    config.rate_limits = RateLimitConfig::new(1000, 1000, false);
    configure(&mut config);

    let jwt = TokenIssuer::with_durations(
        &config.jwt_secret,
        config.access_token_secs,
        config.refresh_token_secs,
    );
    TestApp {
        app: create_app(&config),
        db,
        jwt,
    }
}

/// Create a test app backed by a temporary database file, so a second
/// connection can alter the schema underneath it.
pub async fn file_test_app() -> (TestApp, PathBuf) {
    let path = std::env::temp_dir().join(format!("typoteka-test-{}.db", uuid::Uuid::new_v4()));
    let db = Database::open(&path.to_string_lossy())
        .await
        .expect("Failed to open test database file");
    let config = ServerConfig::new(db.clone(), JWT_SECRET);
    let jwt = TokenIssuer::new(JWT_SECRET);
    (
        TestApp {
            app: create_app(&config),
            db,
            jwt,
        },
        path,
    )
}

/// Drop a table through a separate connection to the database file.
pub async fn drop_table(path: &Path, table: &str) {
    let pool = SqlitePool::connect(&format!("sqlite:{}", path.display()))
        .await
        .expect("Failed to connect to test database file");
    sqlx::query(&format!("DROP TABLE {}", table))
        .execute(&pool)
        .await
        .expect("Failed to drop table");
    pool.close().await;
}

pub fn remove_db_file(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
    }
}

/// Insert an account directly. Pass a real password hash when the test logs in.
pub async fn seed_account(db: &Database, email: &str, password_hash: &str, is_admin: bool) -> i64 {
    db.accounts()
        .create(&NewAccount {
            email,
            password_hash,
            firstname: "Test",
            lastname: "Account",
            avatar: None,
            is_admin,
        })
        .await
        .expect("Failed to seed account")
}

/// Seed an account and issue it a session without going through login.
pub async fn authenticated(test: &TestApp, email: &str, is_admin: bool) -> TestSession {
    let account_id = seed_account(&test.db, email, "not-a-real-hash", is_admin).await;
    session_for(test, account_id, is_admin).await
}

pub async fn session_for(test: &TestApp, account_id: i64, is_admin: bool) -> TestSession {
    let pair = test
        .jwt
        .issue(TokenIdentity {
            account_id,
            is_admin,
        })
        .expect("Failed to issue tokens");
    test.db
        .tokens()
        .create(
            &pair.refresh_jti,
            account_id,
            pair.issued_at,
            pair.refresh_expires_at,
        )
        .await
        .expect("Failed to store refresh token");

    TestSession {
        account_id,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        refresh_jti: pair.refresh_jti,
    }
}

pub async fn seed_category(db: &Database, title: &str) -> i64 {
    db.categories()
        .create(title)
        .await
        .expect("Failed to seed category")
}

/// Insert an article. Titles shorter than the API minimum are fine here.
pub async fn seed_article(db: &Database, title: &str, date: &str, categories: &[i64]) -> i64 {
    db.articles()
        .create(&NewArticle {
            title: title.to_string(),
            image: None,
            announce: "An announce that is comfortably long enough".to_string(),
            text: Some("Body text".to_string()),
            date: date.to_string(),
            categories: categories.to_vec(),
        })
        .await
        .expect("Failed to seed article")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("Request failed")
}

pub fn get(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_empty(uri: &str, cookies: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, cookies: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookies) = cookies {
        builder = builder.header("cookie", cookies);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// Send a request and return the status with the parsed JSON body.
pub async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = send(app, request).await;
    let status = response.status();
    (status, body_json(response).await)
}

/// Extract Set-Cookie headers from a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .collect()
}

/// Value of a cookie set by the response, if any.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|c| {
        let rest = c.strip_prefix(&prefix)?;
        Some(rest.split(';').next().unwrap_or_default().to_string())
    })
}

/// Whether the response clears the named cookie.
pub fn clears_cookie(cookies: &[String], name: &str) -> bool {
    let prefix = format!("{}=;", name);
    cookies
        .iter()
        .any(|c| c.starts_with(&prefix) && c.contains("Max-Age=0"))
}

/// Names of the fields reported in `errorMessages`.
pub fn error_fields(body: &Value) -> Vec<String> {
    body["errorMessages"]
        .as_object()
        .map(|fields| fields.keys().cloned().collect())
        .unwrap_or_default()
}
