//! Article storage, including category links and derived comment counts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::QueryBuilder;
use sqlx::sqlite::{Sqlite, SqlitePool};

use super::Category;

#[derive(Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

/// An article with its categories and comment count.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub announce: String,
    pub text: Option<String>,
    pub date: String,
    pub categories: Vec<Category>,
    pub comment_count: i64,
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    title: String,
    image: Option<String>,
    announce: String,
    text: Option<String>,
    date: String,
    comment_count: i64,
}

impl ArticleRow {
    fn into_article(self, categories: Vec<Category>) -> Article {
        Article {
            id: self.id,
            title: self.title,
            image: self.image,
            announce: self.announce,
            text: self.text,
            date: self.date,
            categories,
            comment_count: self.comment_count,
        }
    }
}

/// A validated article ready to be stored.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub image: Option<String>,
    pub announce: String,
    pub text: Option<String>,
    pub date: String,
    pub categories: Vec<i64>,
}

/// A partial update. `None` leaves the stored value untouched and an empty
/// image removes the stored one.
#[derive(Debug, Clone, Default)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub image: Option<String>,
    pub announce: Option<String>,
    pub text: Option<String>,
    pub date: Option<String>,
    pub categories: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArticleSort {
    /// Newest first
    #[default]
    Date,
    /// Most commented first, ties broken by date
    CommentCount,
}

#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub category: Option<i64>,
    pub min_comment_count: Option<i64>,
    pub sort: ArticleSort,
    pub limit: i64,
    pub offset: i64,
}

const SELECT_ARTICLE: &str = "SELECT a.id, a.title, a.image, a.announce, a.text, a.date,
    (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id) AS comment_count
    FROM articles a";

fn push_filters(query: &mut QueryBuilder<'_, Sqlite>, filter: &ArticleFilter) {
    query.push(" WHERE 1 = 1");
    if let Some(category) = filter.category {
        query
            .push(" AND EXISTS (SELECT 1 FROM article_categories ac WHERE ac.article_id = a.id AND ac.category_id = ")
            .push_bind(category)
            .push(")");
    }
    if let Some(min) = filter.min_comment_count {
        query
            .push(" AND (SELECT COUNT(*) FROM comments c WHERE c.article_id = a.id) >= ")
            .push_bind(min);
    }
}

/// Escape `%`, `_` and the escape character itself for a LIKE pattern.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

async fn link_categories(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    article_id: i64,
    categories: &[i64],
) -> Result<(), sqlx::Error> {
    let mut unique = categories.to_vec();
    unique.sort_unstable();
    unique.dedup();
    if unique.is_empty() {
        return Ok(());
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO article_categories (article_id, category_id) ");
    query.push_values(unique, |mut row, category_id| {
        row.push_bind(article_id).push_bind(category_id);
    });
    query.build().execute(&mut **tx).await?;
    Ok(())
}

impl ArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an article and link it to its categories. Returns the article ID.
    pub async fn create(&self, article: &NewArticle) -> Result<i64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO articles (title, image, announce, text, date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&article.title)
        .bind(&article.image)
        .bind(&article.announce)
        .bind(&article.text)
        .bind(&article.date)
        .execute(&mut *tx)
        .await?;
        let id = result.last_insert_rowid();

        link_categories(&mut tx, id, &article.categories).await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Article>, sqlx::Error> {
        let row: Option<ArticleRow> = sqlx::query_as(&format!("{} WHERE a.id = ?", SELECT_ARTICLE))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.attach_categories(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    pub async fn exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// List one page of articles matching the filter.
    /// Returns the page and the total number of matching articles.
    pub async fn list(&self, filter: &ArticleFilter) -> Result<(Vec<Article>, i64), sqlx::Error> {
        let mut count_query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM articles a");
        push_filters(&mut count_query, filter);
        let total: (i64,) = count_query.build_query_as().fetch_one(&self.pool).await?;

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_ARTICLE);
        push_filters(&mut query, filter);
        match filter.sort {
            ArticleSort::Date => query.push(" ORDER BY a.date DESC, a.id DESC"),
            ArticleSort::CommentCount => {
                query.push(" ORDER BY comment_count DESC, a.date DESC, a.id DESC")
            }
        };
        query
            .push(" LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let rows: Vec<ArticleRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let articles = self.attach_categories(rows).await?;
        Ok((articles, total.0))
    }

    /// Articles whose title contains `title`, newest first.
    pub async fn search_by_title(&self, title: &str) -> Result<Vec<Article>, sqlx::Error> {
        let pattern = format!("%{}%", escape_like(title));
        let rows: Vec<ArticleRow> = sqlx::query_as(&format!(
            "{} WHERE a.title LIKE ? ESCAPE '\\' ORDER BY a.date DESC, a.id DESC",
            SELECT_ARTICLE
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;
        self.attach_categories(rows).await
    }

    /// Apply a partial update. Returns false if the article does not exist.
    pub async fn update(&self, id: i64, update: &ArticleUpdate) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE articles SET
                title = COALESCE(?, title),
                image = CASE WHEN ? IS NULL THEN image ELSE NULLIF(?, '') END,
                announce = COALESCE(?, announce),
                text = COALESCE(?, text),
                date = COALESCE(?, date),
                updated_at = datetime('now')
             WHERE id = ?",
        )
        .bind(&update.title)
        .bind(&update.image)
        .bind(&update.image)
        .bind(&update.announce)
        .bind(&update.text)
        .bind(&update.date)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(categories) = &update.categories {
            sqlx::query("DELETE FROM article_categories WHERE article_id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_categories(&mut tx, id, categories).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Delete an article. Comments and category links cascade.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn attach_categories(&self, rows: Vec<ArticleRow>) -> Result<Vec<Article>, sqlx::Error> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT ac.article_id, c.id, c.title FROM article_categories ac
             JOIN categories c ON c.id = ac.category_id
             WHERE ac.article_id IN (",
        );
        let mut separated = query.separated(", ");
        for row in &rows {
            separated.push_bind(row.id);
        }
        separated.push_unseparated(") ORDER BY c.title COLLATE NOCASE ASC");

        let links: Vec<(i64, i64, String)> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut by_article: HashMap<i64, Vec<Category>> = HashMap::new();
        for (article_id, id, title) in links {
            by_article
                .entry(article_id)
                .or_default()
                .push(Category { id, title });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let categories = by_article.remove(&row.id).unwrap_or_default();
                row.into_article(categories)
            })
            .collect())
    }
}
