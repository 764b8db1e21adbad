//! The per-request session pipeline.
//!
//! Every API request passes through four ordered stages:
//!
//! 1. cookie parsing: the `Cookie` header becomes a [`TokenCookies`] extension.
//! 2. session resolution: the access token becomes a [`Session`] extension.
//!    This stage never fails the request on its own.
//! 3. handler: extractors turn the `Session` into an account or a 401/403.
//! 4. cookie writing: a [`CookieUpdate`] left in the response extensions by
//!    the handler is applied to the response headers.
//!
//! Expired access tokens are never refreshed inline. Clients call the
//! refresh endpoint explicitly.

use std::convert::Infallible;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use super::cookie::{CookieUpdate, TokenCookies, clear_cookies, write_cookies};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::{HasAuthBackend, SessionBackend};
use super::types::AuthenticatedAccount;
use crate::jwt::TokenError;

/// Outcome of session resolution for one request.
#[derive(Debug, Clone)]
pub enum Session {
    /// No usable access token was presented
    Unauthenticated,
    Authenticated(AuthenticatedAccount),
    /// An access token was presented but cannot be honoured
    Rejected(AuthErrorKind),
}

impl Session {
    /// The session stored by the pipeline. Requests that bypassed the
    /// pipeline are unauthenticated.
    pub fn from_parts(parts: &Parts) -> Self {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .unwrap_or(Session::Unauthenticated)
    }

    /// The authenticated account, or the error explaining why there is none.
    pub fn into_account(self) -> Result<AuthenticatedAccount, ApiAuthError> {
        match self {
            Session::Authenticated(account) => Ok(account),
            Session::Unauthenticated => Err(AuthErrorKind::NotAuthenticated.into()),
            Session::Rejected(kind) => Err(kind.into()),
        }
    }
}

/// Resolve the session from the presented access token.
pub async fn resolve_session<S>(state: &S, cookies: &TokenCookies) -> Session
where
    S: HasAuthBackend + Sync,
{
    let Some(token) = cookies.access() else {
        return Session::Unauthenticated;
    };

    let claims = match state.jwt().verify_access(token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => return Session::Rejected(AuthErrorKind::AccessTokenExpired),
        Err(e) => {
            debug!(error = %e, "Rejected access token");
            return Session::Rejected(AuthErrorKind::InvalidToken);
        }
    };

    match state.db().accounts().get_by_id(claims.sub).await {
        Ok(Some(account)) => Session::Authenticated(AuthenticatedAccount { claims, account }),
        Ok(None) => {
            debug!(account_id = claims.sub, "Access token for a deleted account");
            Session::Rejected(AuthErrorKind::AccountNotFound)
        }
        Err(e) => {
            error!(error = %e, "Failed to load account for session");
            Session::Rejected(AuthErrorKind::DatabaseError)
        }
    }
}

/// Middleware running the session pipeline around every API handler.
pub async fn session_pipeline(
    State(backend): State<SessionBackend>,
    mut request: Request,
    next: Next,
) -> Response {
    let cookies = TokenCookies::from_headers(request.headers());
    let session = resolve_session(&backend, &cookies).await;

    request.extensions_mut().insert(cookies);
    request.extensions_mut().insert(session);

    let mut response = next.run(request).await;

    match response.extensions_mut().remove::<CookieUpdate>() {
        Some(CookieUpdate::Issue(pair)) => {
            write_cookies(response.headers_mut(), &pair, backend.secure_cookies)
        }
        Some(CookieUpdate::Clear) => clear_cookies(response.headers_mut(), backend.secure_cookies),
        None => {}
    }

    response
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session::from_parts(parts))
    }
}

impl<S> FromRequestParts<S> for TokenCookies
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(match parts.extensions.get::<TokenCookies>() {
            Some(cookies) => cookies.clone(),
            None => TokenCookies::from_headers(&parts.headers),
        })
    }
}
