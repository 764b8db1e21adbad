//! Comment API endpoints.
//!
//! - GET `/` - Newest comments, optionally for one article (`articleId`, `limit`)
//! - POST `/` - Comment on an article as the current account
//! - DELETE `/{id}` - Remove a comment (admin)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::error::{ApiError, ResultExt, ValidJson, ValidQuery, parse_id};
use super::messages;
use crate::auth::{AdminOnly, AnyRole, Auth};
use crate::db::Database;

#[derive(Clone)]
pub struct CommentsState {
    pub db: Database,
}

pub fn router(state: CommentsState) -> Router {
    Router::new()
        .route("/", get(list_comments).post(create_comment))
        .route("/{id}", delete(delete_comment))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    article_id: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct CreateCommentRequest {
    article_id: i64,
    #[serde(default)]
    #[validate(length(min = 1, max = 1000, message = "Comment must be 1 to 1000 characters"))]
    text: String,
}

async fn ensure_article(db: &Database, article_id: i64) -> Result<(), ApiError> {
    let exists = db
        .articles()
        .exists(article_id)
        .await
        .db_err("Failed to check article")?;
    if exists {
        Ok(())
    } else {
        Err(ApiError::bad_request(messages::UNKNOWN_ARTICLE))
    }
}

async fn list_comments(
    State(state): State<CommentsState>,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(article_id) = query.article_id {
        ensure_article(&state.db, article_id).await?;
    }

    let comments = state
        .db
        .comments()
        .list(query.article_id, query.limit)
        .await
        .db_err("Failed to list comments")?;

    Ok(Json(comments))
}

async fn create_comment(
    State(state): State<CommentsState>,
    auth: Auth<AnyRole>,
    ValidJson(req): ValidJson<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_article(&state.db, req.article_id).await?;

    let comment = state
        .db
        .comments()
        .create(req.article_id, auth.id(), &req.text)
        .await
        .db_err("Failed to create comment")?;

    info!(
        comment_id = comment.id,
        article_id = req.article_id,
        account_id = auth.id(),
        "Created comment"
    );
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn delete_comment(
    State(state): State<CommentsState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let deleted = state
        .db
        .comments()
        .delete(id)
        .await
        .db_err("Failed to delete comment")?;
    if !deleted {
        return Err(ApiError::bad_request(messages::COMMENT_NOT_FOUND));
    }

    info!(comment_id = id, admin_id = auth.id(), "Deleted comment");
    Ok(StatusCode::NO_CONTENT)
}
