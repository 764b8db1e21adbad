//! Comment storage.

use serde::Serialize;
use sqlx::sqlite::SqlitePool;

use super::AccountSummary;

#[derive(Clone)]
pub struct CommentStore {
    pool: SqlitePool,
}

/// A stored comment. `account_id` is `None` once the author is deleted.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub date: String,
    pub account_id: Option<i64>,
    pub article_id: i64,
}

/// A comment joined with its author's public profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithAuthor {
    pub id: i64,
    pub text: String,
    pub date: String,
    pub article_id: i64,
    #[serde(rename = "account")]
    pub author: Option<AccountSummary>,
}

#[derive(sqlx::FromRow)]
struct CommentAuthorRow {
    id: i64,
    text: String,
    date: String,
    article_id: i64,
    account_id: Option<i64>,
    email: Option<String>,
    firstname: Option<String>,
    lastname: Option<String>,
    avatar: Option<String>,
    is_admin: Option<i32>,
}

impl From<CommentAuthorRow> for CommentWithAuthor {
    fn from(row: CommentAuthorRow) -> Self {
        let author = match (row.account_id, row.email, row.firstname, row.lastname) {
            (Some(id), Some(email), Some(firstname), Some(lastname)) => Some(AccountSummary {
                id,
                email,
                firstname,
                lastname,
                avatar: row.avatar,
                is_admin: row.is_admin.unwrap_or(0) != 0,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            text: row.text,
            date: row.date,
            article_id: row.article_id,
            author,
        }
    }
}

impl CommentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a comment on an article. The date is assigned by the database.
    pub async fn create(
        &self,
        article_id: i64,
        account_id: i64,
        text: &str,
    ) -> Result<Comment, sqlx::Error> {
        sqlx::query_as(
            "INSERT INTO comments (text, account_id, article_id) VALUES (?, ?, ?)
             RETURNING id, text, date, account_id, article_id",
        )
        .bind(text)
        .bind(account_id)
        .bind(article_id)
        .fetch_one(&self.pool)
        .await
    }

    /// List comments newest first, optionally for one article and capped at `limit`.
    pub async fn list(
        &self,
        article_id: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<CommentWithAuthor>, sqlx::Error> {
        // SQLite treats a negative LIMIT as "no limit"
        let rows: Vec<CommentAuthorRow> = sqlx::query_as(
            "SELECT c.id, c.text, c.date, c.article_id, c.account_id,
                    a.email, a.firstname, a.lastname, a.avatar, a.is_admin
             FROM comments c
             LEFT JOIN accounts a ON a.id = c.account_id
             WHERE (?1 IS NULL OR c.article_id = ?1)
             ORDER BY c.date DESC, c.id DESC
             LIMIT ?2",
        )
        .bind(article_id)
        .bind(limit.unwrap_or(-1))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(CommentWithAuthor::from).collect())
    }

    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
