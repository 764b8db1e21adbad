//! Refresh token storage for rotation and revocation.
//!
//! Only refresh tokens are stored. Access tokens are stateless and short-lived.

use chrono::DateTime;
use sqlx::sqlite::SqlitePool;

/// A persisted refresh token record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    pub id: i64,
    pub jti: String,
    pub account_id: i64,
    pub issued_at: String,
    pub expires_at: String,
    pub created_at: String,
}

pub struct TokenStore {
    pool: SqlitePool,
}

impl TokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a newly issued refresh token.
    pub async fn create(
        &self,
        jti: &str,
        account_id: i64,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO refresh_tokens (jti, account_id, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(jti)
        .bind(account_id)
        .bind(timestamp_to_datetime(issued_at))
        .bind(timestamp_to_datetime(expires_at))
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_jti(&self, jti: &str) -> Result<Option<RefreshToken>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, jti, account_id, issued_at, expires_at, created_at FROM refresh_tokens WHERE jti = ?",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await
    }

    /// Replace one refresh token with another in a single transaction.
    /// Returns false (and stores nothing) if the old token was already gone.
    pub async fn rotate(
        &self,
        old_jti: &str,
        new_jti: &str,
        account_id: i64,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE jti = ? AND account_id = ?")
            .bind(old_jti)
            .bind(account_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if deleted == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO refresh_tokens (jti, account_id, issued_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(new_jti)
        .bind(account_id)
        .bind(timestamp_to_datetime(issued_at))
        .bind(timestamp_to_datetime(expires_at))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Delete a token by its JWT ID (revoke).
    pub async fn delete_by_jti(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE jti = ?")
            .bind(jti)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete all expired tokens.
    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < datetime('now')")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn count_by_account(&self, account_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens WHERE account_id = ?")
                .bind(account_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count.0)
    }
}

/// Format a Unix timestamp the way SQLite's `datetime()` does, so stored
/// expiries compare correctly against `datetime('now')`.
fn timestamp_to_datetime(timestamp: u64) -> String {
    DateTime::from_timestamp(timestamp as i64, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, NewAccount};

    #[test]
    fn test_timestamp_to_datetime() {
        // 2024-01-15 12:30:45 UTC
        assert_eq!(timestamp_to_datetime(1705321845), "2024-01-15 12:30:45");
        assert_eq!(timestamp_to_datetime(0), "1970-01-01 00:00:00");
    }

    async fn db_with_account() -> (Database, i64) {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .accounts()
            .create(&NewAccount {
                email: "token@example.com",
                password_hash: "hash",
                firstname: "Token",
                lastname: "Owner",
                avatar: None,
                is_admin: false,
            })
            .await
            .unwrap();
        (db, id)
    }

    #[tokio::test]
    async fn test_rotate_replaces_token() {
        let (db, account_id) = db_with_account().await;
        db.tokens()
            .create("old", account_id, 1_700_000_000, 4_000_000_000)
            .await
            .unwrap();

        let rotated = db
            .tokens()
            .rotate("old", "new", account_id, 1_700_000_100, 4_000_000_100)
            .await
            .unwrap();

        assert!(rotated);
        assert!(db.tokens().get_by_jti("old").await.unwrap().is_none());
        let new = db.tokens().get_by_jti("new").await.unwrap().unwrap();
        assert_eq!(new.account_id, account_id);
    }

    #[tokio::test]
    async fn test_rotate_unknown_token_stores_nothing() {
        let (db, account_id) = db_with_account().await;

        let rotated = db
            .tokens()
            .rotate("missing", "new", account_id, 1_700_000_000, 4_000_000_000)
            .await
            .unwrap();

        assert!(!rotated);
        assert!(db.tokens().get_by_jti("new").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let (db, account_id) = db_with_account().await;
        db.tokens()
            .create("expired", account_id, 1_000, 2_000)
            .await
            .unwrap();
        db.tokens()
            .create("live", account_id, 1_700_000_000, 4_000_000_000)
            .await
            .unwrap();

        assert_eq!(db.tokens().delete_expired().await.unwrap(), 1);
        assert_eq!(db.tokens().count_by_account(account_id).await.unwrap(), 1);
    }
}
