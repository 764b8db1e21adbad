//! CLI argument parsing, validation, and startup helpers.

use crate::ServerConfig;
use crate::auth::hash_password;
use crate::db::{Database, NewAccount};
use crate::jwt::{DEFAULT_ACCESS_TOKEN_SECS, DEFAULT_REFRESH_TOKEN_SECS};
use crate::rate_limit::{DEFAULT_LOGIN_PER_MINUTE, DEFAULT_SIGNUP_PER_MINUTE, RateLimitConfig};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ADMIN_PASSWORD_LENGTH: usize = 6;

#[derive(clap::ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "Typoteka", about = "Blog platform JSON backend")]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "TYPOTEKA_PORT", default_value = "3000")]
    pub port: u16,

    /// Path to SQLite database file
    #[arg(short, long, env = "TYPOTEKA_DATABASE", default_value = "typoteka.db")]
    pub database: String,

    /// Path to file containing JWT secret. Prefer using JWT_SECRET env var instead
    #[arg(long)]
    pub jwt_secret_file: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, env = "TYPOTEKA_ACCESS_TOKEN_SECS", default_value_t = DEFAULT_ACCESS_TOKEN_SECS)]
    pub access_token_secs: u64,

    /// Refresh token lifetime in seconds
    #[arg(long, env = "TYPOTEKA_REFRESH_TOKEN_SECS", default_value_t = DEFAULT_REFRESH_TOKEN_SECS)]
    pub refresh_token_secs: u64,

    /// Set the Secure flag on cookies (enable when served over HTTPS)
    #[arg(long, env = "TYPOTEKA_SECURE_COOKIES")]
    pub secure_cookies: bool,

    /// Disable new account signups (admin creation via --create-admin still works)
    #[arg(long, env = "TYPOTEKA_NO_SIGNUP")]
    pub no_signup: bool,

    /// Key rate limits by the first X-Forwarded-For address (only behind a trusted proxy)
    #[arg(long, env = "TYPOTEKA_TRUST_PROXY")]
    pub trust_proxy: bool,

    /// Login attempts allowed per minute per client IP
    #[arg(long, env = "TYPOTEKA_LOGIN_RATE_LIMIT", default_value_t = DEFAULT_LOGIN_PER_MINUTE)]
    pub login_rate_limit: u32,

    /// Signups allowed per minute per client IP
    #[arg(long, env = "TYPOTEKA_SIGNUP_RATE_LIMIT", default_value_t = DEFAULT_SIGNUP_PER_MINUTE)]
    pub signup_rate_limit: u32,

    /// Create (or promote) an admin account on startup. Password comes from ADMIN_PASSWORD
    #[arg(long, requires = "admin_email")]
    pub create_admin: bool,

    /// Email of the admin account for --create-admin
    #[arg(long, env = "TYPOTEKA_ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    /// Log output format
    #[arg(short, long, default_value = "pretty")]
    pub log_format: LogFormat,
}

/// Initialize logging based on the specified format.
/// The filter comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging(format: &LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

/// Read a secret from an environment variable and remove it from the environment.
fn take_env_secret(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    // SAFETY: We're single-threaded at this point during startup,
    // and no other code is reading this environment variable.
    unsafe { std::env::remove_var(name) };
    Some(value)
}

/// Load JWT secret from environment variable or file.
/// Returns None and logs an error if the secret cannot be loaded.
pub fn load_jwt_secret(jwt_secret_file: Option<&str>) -> Option<String> {
    let secret = if let Some(secret) = take_env_secret("JWT_SECRET") {
        secret
    } else if let Some(path) = jwt_secret_file {
        match std::fs::read_to_string(path) {
            Ok(content) => content.trim().to_string(),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to read JWT secret file");
                return None;
            }
        }
    } else {
        error!(
            "JWT secret is required. Set JWT_SECRET environment variable (recommended) or use --jwt-secret-file"
        );
        return None;
    };

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        error!(
            "JWT secret is shorter than {} characters. Use a longer secret",
            MIN_JWT_SECRET_LENGTH
        );
        return None;
    }

    Some(secret)
}

/// Handle the --create-admin flag: promote an existing account with the email,
/// or create a new admin account using the password in ADMIN_PASSWORD.
/// Returns false and logs an error on failure.
pub async fn handle_create_admin(db: &Database, email: &str) -> bool {
    let existing = match db.accounts().get_by_email(email).await {
        Ok(existing) => existing,
        Err(e) => {
            error!(error = %e, "Failed to check for existing account");
            return false;
        }
    };

    if let Some(account) = existing {
        if account.is_admin {
            info!(email = %email, "Admin account already exists");
            return true;
        }
        return match db.accounts().set_admin(account.id, true).await {
            Ok(_) => {
                info!(email = %email, account_id = account.id, "Promoted account to admin");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to promote account");
                false
            }
        };
    }

    let Some(password) = take_env_secret("ADMIN_PASSWORD") else {
        error!("ADMIN_PASSWORD is required to create a new admin account");
        return false;
    };
    if password.chars().count() < MIN_ADMIN_PASSWORD_LENGTH {
        error!(
            "ADMIN_PASSWORD is shorter than {} characters",
            MIN_ADMIN_PASSWORD_LENGTH
        );
        return false;
    }

    let password_hash = match hash_password(&password) {
        Ok(hash) => hash,
        Err(e) => {
            error!(error = %e, "Failed to hash admin password");
            return false;
        }
    };

    match db
        .accounts()
        .create(&NewAccount {
            email,
            password_hash: &password_hash,
            firstname: "Admin",
            lastname: "Admin",
            avatar: None,
            is_admin: true,
        })
        .await
    {
        Ok(id) => {
            info!(email = %email, account_id = id, "Admin account created");
            true
        }
        Err(e) => {
            error!(error = %e, "Failed to create admin account");
            false
        }
    }
}

/// Build ServerConfig from validated arguments.
pub fn build_config(args: &Args, db: Database, jwt_secret: String) -> ServerConfig {
    ServerConfig {
        db,
        jwt_secret: jwt_secret.into_bytes(),
        access_token_secs: args.access_token_secs,
        refresh_token_secs: args.refresh_token_secs,
        secure_cookies: args.secure_cookies,
        no_signup: args.no_signup,
        rate_limits: RateLimitConfig::new(
            args.login_rate_limit,
            args.signup_rate_limit,
            args.trust_proxy,
        ),
    }
}

/// Open the database, logging errors if it fails.
pub async fn open_database(path: &str) -> Option<Database> {
    match Database::open(path).await {
        Ok(db) => {
            info!(path = %path, "Database opened");
            Some(db)
        }
        Err(e) => {
            error!(path = %path, error = %e, "Failed to open database");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["typoteka"]).unwrap();
        assert_eq!(args.access_token_secs, DEFAULT_ACCESS_TOKEN_SECS);
        assert_eq!(args.refresh_token_secs, DEFAULT_REFRESH_TOKEN_SECS);
        assert!(!args.create_admin);
    }

    #[test]
    fn test_create_admin_requires_email() {
        assert!(Args::try_parse_from(["typoteka", "--create-admin"]).is_err());
        let args = Args::try_parse_from([
            "typoteka",
            "--create-admin",
            "--admin-email",
            "admin@example.com",
        ])
        .unwrap();
        assert_eq!(args.admin_email.as_deref(), Some("admin@example.com"));
    }

    #[tokio::test]
    async fn test_create_admin_promotes_existing_account() {
        let db = Database::open(":memory:").await.unwrap();
        let id = db
            .accounts()
            .create(&NewAccount {
                email: "editor@example.com",
                password_hash: "hash",
                firstname: "Eve",
                lastname: "Editor",
                avatar: None,
                is_admin: false,
            })
            .await
            .unwrap();

        assert!(handle_create_admin(&db, "editor@example.com").await);
        assert!(db.accounts().get_by_id(id).await.unwrap().unwrap().is_admin);
    }
}
