//! Category storage.

use serde::Serialize;
use sqlx::QueryBuilder;
use sqlx::sqlite::{Sqlite, SqlitePool};

#[derive(Clone)]
pub struct CategoryStore {
    pool: SqlitePool,
}

/// A category as attached to an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: i64,
    pub title: String,
}

/// A category with the number of articles filed under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: i64,
    pub title: String,
    pub article_count: i64,
}

impl CategoryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a category. Titles are unique ignoring case.
    pub async fn create(&self, title: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO categories (title) VALUES (?)")
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    /// List categories ordered by title, optionally only those with at least
    /// `min_article_count` articles.
    pub async fn list(
        &self,
        min_article_count: Option<i64>,
    ) -> Result<Vec<CategorySummary>, sqlx::Error> {
        sqlx::query_as(
            "SELECT c.id, c.title, COUNT(ac.article_id) AS article_count
             FROM categories c
             LEFT JOIN article_categories ac ON ac.category_id = c.id
             GROUP BY c.id
             HAVING COUNT(ac.article_id) >= ?
             ORDER BY c.title COLLATE NOCASE ASC",
        )
        .bind(min_article_count.unwrap_or(0))
        .fetch_all(&self.pool)
        .await
    }

    /// Whether every id in `ids` names an existing category.
    /// An empty slice is never valid.
    pub async fn all_exist(&self, ids: &[i64]) -> Result<bool, sqlx::Error> {
        let mut unique = ids.to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.is_empty() {
            return Ok(false);
        }

        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM categories WHERE id IN (");
        let mut separated = query.separated(", ");
        for id in &unique {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let count: (i64,) = query.build_query_as().fetch_one(&self.pool).await?;
        Ok(count.0 == unique.len() as i64)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_create_category() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db.categories().create("Travel").await.unwrap();

        let categories = db.categories().list(None).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, id);
        assert_eq!(categories[0].title, "Travel");
    }

    #[tokio::test]
    async fn test_list_ordered_with_zero_counts() {
        let db = Database::open(":memory:").await.unwrap();
        db.categories().create("Music").await.unwrap();
        db.categories().create("cinema").await.unwrap();

        let list = db.categories().list(None).await.unwrap();
        let titles: Vec<&str> = list.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["cinema", "Music"]);
        assert!(list.iter().all(|c| c.article_count == 0));

        assert!(db.categories().list(Some(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_exist() {
        let db = Database::open(":memory:").await.unwrap();
        let a = db.categories().create("Books").await.unwrap();
        let b = db.categories().create("Games").await.unwrap();

        assert!(db.categories().all_exist(&[a, b]).await.unwrap());
        assert!(db.categories().all_exist(&[a, a]).await.unwrap());
        assert!(!db.categories().all_exist(&[a, b + 100]).await.unwrap());
        assert!(!db.categories().all_exist(&[]).await.unwrap());
    }
}
