//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request could not be authenticated or authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    NotAuthenticated,
    AccessTokenExpired,
    AccountNotFound,
    InvalidToken,
    InsufficientRole,
    DatabaseError,
}

/// API authentication error. Renders as JSON and leaves cookies untouched.
#[derive(Debug)]
pub struct ApiAuthError {
    kind: AuthErrorKind,
}

impl ApiAuthError {
    pub fn new(kind: AuthErrorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            AuthErrorKind::NotAuthenticated
            | AuthErrorKind::AccessTokenExpired
            | AuthErrorKind::AccountNotFound => StatusCode::UNAUTHORIZED,
            AuthErrorKind::InvalidToken | AuthErrorKind::InsufficientRole => StatusCode::FORBIDDEN,
            AuthErrorKind::DatabaseError => StatusCode::BAD_REQUEST,
        }
    }

    pub fn message(&self) -> &'static str {
        match self.kind {
            AuthErrorKind::NotAuthenticated => "Not authenticated",
            AuthErrorKind::AccessTokenExpired => "Access token has expired",
            AuthErrorKind::AccountNotFound => "Account not found",
            AuthErrorKind::InvalidToken => "Invalid access token",
            AuthErrorKind::InsufficientRole => "Insufficient permissions",
            AuthErrorKind::DatabaseError => "The request could not be completed",
        }
    }
}

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self::new(kind)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    message: &'static str,
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(ErrorResponse {
                message: self.message(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let status = |kind| ApiAuthError::new(kind).status_code();
        assert_eq!(status(AuthErrorKind::NotAuthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthErrorKind::AccessTokenExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthErrorKind::AccountNotFound), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthErrorKind::InvalidToken), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthErrorKind::InsufficientRole), StatusCode::FORBIDDEN);
        assert_eq!(status(AuthErrorKind::DatabaseError), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_error_response_sets_no_cookies() {
        let response = ApiAuthError::new(AuthErrorKind::InvalidToken).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(
            response
                .headers()
                .get(axum::http::header::SET_COOKIE)
                .is_none()
        );
    }
}
