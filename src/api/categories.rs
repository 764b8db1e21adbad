//! Category API endpoints.
//!
//! - GET `/` - List categories with article counts (`minArticleCount`)
//! - POST `/` - Create a category (admin)

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::error::{ApiError, ResultExt, ValidJson, ValidQuery};
use super::messages;
use crate::auth::{AdminOnly, Auth};
use crate::db::{Category, Database, is_unique_violation};

#[derive(Clone)]
pub struct CategoriesState {
    pub db: Database,
}

pub fn router(state: CategoriesState) -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[validate(range(min = 0, message = "Minimum article count cannot be negative"))]
    min_article_count: Option<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
struct CreateCategoryRequest {
    #[serde(default)]
    #[validate(length(min = 5, max = 30, message = "Category title must be 5 to 30 characters"))]
    title: String,
}

async fn list_categories(
    State(state): State<CategoriesState>,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state
        .db
        .categories()
        .list(query.min_article_count)
        .await
        .db_err("Failed to list categories")?;

    Ok(Json(categories))
}

async fn create_category(
    State(state): State<CategoriesState>,
    auth: Auth<AdminOnly>,
    ValidJson(req): ValidJson<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = match state.db.categories().create(&req.title).await {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::field("title", messages::CATEGORY_TAKEN));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create category", e)),
    };

    info!(category_id = id, admin_id = auth.id(), "Created category");
    Ok((
        StatusCode::CREATED,
        Json(Category {
            id,
            title: req.title,
        }),
    ))
}
