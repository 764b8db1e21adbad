//! Article API endpoints.
//!
//! - GET `/` - Page through articles (`page`, `limit`, `category`, `sort`, `minCommentCount`)
//! - GET `/search` - Articles whose title contains `title`
//! - GET `/{id}` - One article
//! - POST `/` - Create an article (admin)
//! - PUT `/{id}` - Partially update an article (admin)
//! - DELETE `/{id}` - Delete an article with its comments (admin)

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::error::{ApiError, ResultExt, ValidJson, ValidQuery, parse_id};
use super::messages;
use super::validation::{image_file, iso_date, normalize_date};
use crate::auth::{AdminOnly, Auth};
use crate::db::{Article, ArticleFilter, ArticleSort, ArticleUpdate, Database, NewArticle};

/// Articles per page when `limit` is not given.
pub const DEFAULT_PAGE_SIZE: i64 = 8;

#[derive(Clone)]
pub struct ArticlesState {
    pub db: Database,
}

pub fn router(state: ArticlesState) -> Router {
    Router::new()
        .route("/", get(list_articles).post(create_article))
        .route("/search", get(search_articles))
        .route(
            "/{id}",
            get(get_article).put(update_article).delete(delete_article),
        )
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    limit: Option<i64>,
    category: Option<i64>,
    sort: Option<ArticleSort>,
    #[validate(range(min = 0, message = "Minimum comment count cannot be negative"))]
    min_comment_count: Option<i64>,
}

#[derive(Serialize)]
struct ArticlePage {
    list: Vec<Article>,
    length: i64,
}

#[derive(Debug, Deserialize, Validate)]
struct SearchQuery {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
struct CreateArticleRequest {
    #[serde(default)]
    #[validate(length(min = 30, max = 250, message = "Title must be 30 to 250 characters"))]
    title: String,
    #[validate(custom(function = "image_file", message = "Only jpg and png images are allowed"))]
    image: Option<String>,
    #[serde(default)]
    #[validate(length(min = 30, max = 250, message = "Announce must be 30 to 250 characters"))]
    announce: String,
    #[validate(length(max = 1000, message = "Text must be at most 1000 characters"))]
    text: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "iso_date", message = "Enter the date in ISO 8601 format"))]
    date: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Select at least one category"))]
    categories: Vec<i64>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
struct UpdateArticleRequest {
    #[validate(length(min = 30, max = 250, message = "Title must be 30 to 250 characters"))]
    title: Option<String>,
    #[validate(custom(function = "image_file", message = "Only jpg and png images are allowed"))]
    image: Option<String>,
    #[validate(length(min = 30, max = 250, message = "Announce must be 30 to 250 characters"))]
    announce: Option<String>,
    #[validate(length(max = 1000, message = "Text must be at most 1000 characters"))]
    text: Option<String>,
    #[validate(custom(function = "iso_date", message = "Enter the date in ISO 8601 format"))]
    date: Option<String>,
    #[validate(length(min = 1, message = "Select at least one category"))]
    categories: Option<Vec<i64>>,
}

fn normalized(date: &str) -> Result<String, ApiError> {
    normalize_date(date).ok_or_else(|| ApiError::field("date", messages::DATE_FORMAT))
}

async fn check_categories(db: &Database, categories: &[i64]) -> Result<(), ApiError> {
    let exist = db
        .categories()
        .all_exist(categories)
        .await
        .db_err("Failed to check categories")?;
    if exist {
        Ok(())
    } else {
        Err(ApiError::field("categories", messages::UNKNOWN_CATEGORY))
    }
}

async fn load(db: &Database, id: i64) -> Result<Article, ApiError> {
    db.articles()
        .get(id)
        .await
        .db_err("Failed to get article")?
        .ok_or_else(|| ApiError::not_found(messages::ARTICLE_NOT_FOUND))
}

async fn list_articles(
    State(state): State<ArticlesState>,
    ValidQuery(query): ValidQuery<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let page = query.page.unwrap_or(1);

    let filter = ArticleFilter {
        category: query.category,
        min_comment_count: query.min_comment_count,
        sort: query.sort.unwrap_or_default(),
        limit,
        offset: (page - 1).saturating_mul(limit),
    };

    let (list, length) = state
        .db
        .articles()
        .list(&filter)
        .await
        .db_err("Failed to list articles")?;

    Ok(Json(ArticlePage { list, length }))
}

async fn search_articles(
    State(state): State<ArticlesState>,
    ValidQuery(query): ValidQuery<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let title = query.title.trim();
    if title.is_empty() {
        return Ok(Json(Vec::<Article>::new()));
    }

    let articles = state
        .db
        .articles()
        .search_by_title(title)
        .await
        .db_err("Failed to search articles")?;

    Ok(Json(articles))
}

async fn get_article(
    State(state): State<ArticlesState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(load(&state.db, id).await?))
}

async fn create_article(
    State(state): State<ArticlesState>,
    auth: Auth<AdminOnly>,
    ValidJson(req): ValidJson<CreateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    check_categories(&state.db, &req.categories).await?;

    let article = NewArticle {
        date: normalized(&req.date)?,
        title: req.title,
        image: req.image.filter(|i| !i.is_empty()),
        announce: req.announce,
        text: req.text,
        categories: req.categories,
    };

    let id = state
        .db
        .articles()
        .create(&article)
        .await
        .db_err("Failed to create article")?;

    info!(article_id = id, admin_id = auth.id(), "Created article");
    Ok((StatusCode::CREATED, Json(load(&state.db, id).await?)))
}

async fn update_article(
    State(state): State<ArticlesState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
    ValidJson(req): ValidJson<UpdateArticleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    if let Some(categories) = &req.categories {
        check_categories(&state.db, categories).await?;
    }
    let date = req.date.as_deref().map(normalized).transpose()?;

    let update = ArticleUpdate {
        title: req.title,
        image: req.image,
        announce: req.announce,
        text: req.text,
        date,
        categories: req.categories,
    };

    let updated = state
        .db
        .articles()
        .update(id, &update)
        .await
        .db_err("Failed to update article")?;
    if !updated {
        return Err(ApiError::bad_request(messages::ARTICLE_NOT_FOUND));
    }

    info!(article_id = id, admin_id = auth.id(), "Updated article");
    Ok(Json(load(&state.db, id).await?))
}

async fn delete_article(
    State(state): State<ArticlesState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let deleted = state
        .db
        .articles()
        .delete(id)
        .await
        .db_err("Failed to delete article")?;
    if !deleted {
        return Err(ApiError::bad_request(messages::ARTICLE_NOT_FOUND));
    }

    info!(article_id = id, admin_id = auth.id(), "Deleted article");
    Ok(StatusCode::NO_CONTENT)
}
