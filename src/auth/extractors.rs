//! Axum extractors for authorization.
//!
//! These read the [`Session`] resolved by the session pipeline; they never
//! look at cookies or tokens themselves.

use std::marker::PhantomData;
use std::ops::Deref;

use axum::{extract::FromRequestParts, http::request::Parts};

use super::errors::{ApiAuthError, AuthErrorKind};
use super::session::Session;
use super::types::AuthenticatedAccount;

/// A role requirement checked against the authenticated account.
pub trait RoleConstraint: Send + Sync + 'static {
    fn allows(account: &AuthenticatedAccount) -> bool;
}

/// Any authenticated account.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    fn allows(_account: &AuthenticatedAccount) -> bool {
        true
    }
}

/// Only accounts with the admin flag.
pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    fn allows(account: &AuthenticatedAccount) -> bool {
        account.is_admin()
    }
}

/// Extractor for endpoints that require an authenticated account with a role.
///
/// No session yields 401; a rejected session yields its own status; an
/// account without the role yields 403.
pub struct Auth<R: RoleConstraint> {
    pub user: AuthenticatedAccount,
    _role: PhantomData<R>,
}

impl<R: RoleConstraint> Deref for Auth<R> {
    type Target = AuthenticatedAccount;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl<S, R> FromRequestParts<S> for Auth<R>
where
    S: Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = Session::from_parts(parts).into_account()?;

        if !R::allows(&user) {
            tracing::debug!(account_id = user.id(), "Account lacks the required role");
            return Err(AuthErrorKind::InsufficientRole.into());
        }

        Ok(Auth {
            user,
            _role: PhantomData,
        })
    }
}
