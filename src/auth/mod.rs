//! JWT authentication with role-based access control.
//!
//! Dual-token system carried in cookies: short-lived access tokens
//! (stateless) and long-lived refresh tokens (database-tracked, rotated on
//! every refresh). Access tokens are never refreshed implicitly.

mod cookie;
mod errors;
mod extractors;
mod ip;
mod password;
mod session;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieUpdate, REFRESH_COOKIE_NAME, TokenCookies, clear_cookies,
    get_cookie, write_cookies,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, Auth, RoleConstraint};
pub use ip::{HasHeadersAndExtensions, UNKNOWN_CLIENT, extract_client_ip};
pub use password::{PasswordError, hash_password, verify_password};
pub use session::{Session, resolve_session, session_pipeline};
pub use state::{HasAuthBackend, SessionBackend};
pub use types::AuthenticatedAccount;
