use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct AccountStore {
    pool: SqlitePool,
}

/// A stored account, including the password hash.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub firstname: String,
    pub lastname: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: i64,
    email: String,
    password_hash: String,
    firstname: String,
    lastname: String,
    avatar: Option<String>,
    is_admin: i32,
    created_at: String,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            password_hash: row.password_hash,
            firstname: row.firstname,
            lastname: row.lastname,
            avatar: row.avatar,
            is_admin: row.is_admin != 0,
            created_at: row.created_at,
        }
    }
}

/// Public view of an account. Never exposes the password hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: i64,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub avatar: Option<String>,
    pub is_admin: bool,
}

impl From<&Account> for AccountSummary {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            firstname: account.firstname.clone(),
            lastname: account.lastname.clone(),
            avatar: account.avatar.clone(),
            is_admin: account.is_admin,
        }
    }
}

/// Fields required to create an account.
#[derive(Debug, Clone)]
pub struct NewAccount<'a> {
    pub email: &'a str,
    pub password_hash: &'a str,
    pub firstname: &'a str,
    pub lastname: &'a str,
    pub avatar: Option<&'a str>,
    pub is_admin: bool,
}

const SELECT_ACCOUNT: &str =
    "SELECT id, email, password_hash, firstname, lastname, avatar, is_admin, created_at FROM accounts";

impl AccountStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create an account. Returns the account ID.
    /// Fails with a unique violation if the email is taken.
    pub async fn create(&self, account: &NewAccount<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO accounts (email, password_hash, firstname, lastname, avatar, is_admin) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(account.email)
        .bind(account.password_hash)
        .bind(account.firstname)
        .bind(account.lastname)
        .bind(account.avatar)
        .bind(account.is_admin)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> = sqlx::query_as(&format!("{} WHERE id = ?", SELECT_ACCOUNT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    /// Get an account by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>, sqlx::Error> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("{} WHERE email = ?", SELECT_ACCOUNT))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Account::from))
    }

    pub async fn is_email_taken(&self, email: &str) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Grant or revoke the admin flag.
    pub async fn set_admin(&self, id: i64, is_admin: bool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE accounts SET is_admin = ? WHERE id = ?")
            .bind(is_admin)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete an account. Refresh tokens cascade, comments keep a NULL author.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::{Database, is_unique_violation};

    use super::*;

    fn new_account<'a>(email: &'a str) -> NewAccount<'a> {
        NewAccount {
            email,
            password_hash: "$argon2id$stub",
            firstname: "Ivan",
            lastname: "Petrov",
            avatar: Some("avatar.png"),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_account() {
        let db = Database::open(":memory:").await.unwrap();

        let id = db
            .accounts()
            .create(&new_account("ivan@example.com"))
            .await
            .unwrap();

        let account = db.accounts().get_by_id(id).await.unwrap().unwrap();
        assert_eq!(account.email, "ivan@example.com");
        assert_eq!(account.firstname, "Ivan");
        assert_eq!(account.avatar.as_deref(), Some("avatar.png"));
        assert!(!account.is_admin);

        let by_email = db
            .accounts()
            .get_by_email("IVAN@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, id);
    }

    #[tokio::test]
    async fn test_duplicate_email_fails() {
        let db = Database::open(":memory:").await.unwrap();

        db.accounts()
            .create(&new_account("dup@example.com"))
            .await
            .unwrap();
        let err = db
            .accounts()
            .create(&new_account("Dup@Example.com"))
            .await
            .unwrap_err();

        assert!(is_unique_violation(&err));
        assert!(db.accounts().is_email_taken("dup@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_admin() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .accounts()
            .create(&new_account("boss@example.com"))
            .await
            .unwrap();

        assert!(db.accounts().set_admin(id, true).await.unwrap());
        assert!(db.accounts().get_by_id(id).await.unwrap().unwrap().is_admin);
    }

    #[tokio::test]
    async fn test_delete_account() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .accounts()
            .create(&new_account("gone@example.com"))
            .await
            .unwrap();

        assert!(db.accounts().delete(id).await.unwrap());
        assert!(!db.accounts().delete(id).await.unwrap());
        assert!(db.accounts().get_by_id(id).await.unwrap().is_none());
    }
}
