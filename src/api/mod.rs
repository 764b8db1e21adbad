mod articles;
mod categories;
mod comments;
mod error;
pub mod messages;
mod users;
mod validation;

use axum::{Router, middleware};
use std::sync::Arc;

use crate::auth::{SessionBackend, session_pipeline};
use crate::db::Database;
use crate::jwt::TokenIssuer;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;

/// Create the API router. Every route runs inside the session pipeline.
pub fn create_api_router(
    db: Database,
    jwt: Arc<TokenIssuer>,
    secure_cookies: bool,
    no_signup: bool,
    rate_limits: RateLimitConfig,
) -> Router {
    let users_state = users::UsersState {
        db: db.clone(),
        jwt: jwt.clone(),
        no_signup,
    };

    let articles_state = articles::ArticlesState { db: db.clone() };
    let categories_state = categories::CategoriesState { db: db.clone() };
    let comments_state = comments::CommentsState { db: db.clone() };

    let session_backend = SessionBackend {
        db,
        jwt,
        secure_cookies,
    };

    Router::new()
        .nest("/user", users::router(users_state, rate_limits))
        .nest("/articles", articles::router(articles_state))
        .nest("/categories", categories::router(categories_state))
        .nest("/comments", comments::router(comments_state))
        .layer(middleware::from_fn_with_state(
            session_backend,
            session_pipeline,
        ))
}
