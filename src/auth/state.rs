//! Authentication state traits and macro.

use std::sync::Arc;

use crate::db::Database;
use crate::jwt::TokenIssuer;

/// Trait for state types that provide database and token access for authentication.
pub trait HasAuthBackend {
    fn jwt(&self) -> &TokenIssuer;
    fn db(&self) -> &Database;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `jwt: Arc<TokenIssuer>`
/// - `db: Database`
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub jwt: Arc<TokenIssuer>,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn jwt(&self) -> &$crate::jwt::TokenIssuer {
                &self.jwt
            }
            fn db(&self) -> &$crate::db::Database {
                &self.db
            }
        }
    };
}

/// State for the session pipeline middleware.
#[derive(Clone)]
pub struct SessionBackend {
    pub db: Database,
    pub jwt: Arc<TokenIssuer>,
    pub secure_cookies: bool,
}

crate::impl_has_auth_backend!(SessionBackend);
