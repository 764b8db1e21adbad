//! Account and session endpoints.
//!
//! - POST `/` - Register a new account
//! - POST `/login` - Check credentials and issue both token cookies
//! - POST `/refresh` - Rotate the refresh token and re-issue both cookies
//! - POST `/logout` - Revoke the refresh token and clear both cookies
//! - GET `/me` - Current account
//! - DELETE `/{id}` - Delete an account (admin)

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use validator::Validate;

use super::error::{ApiError, ResultExt, ValidJson, parse_id};
use super::messages;
use super::validation::{image_file, letters_only};
use crate::auth::{
    AdminOnly, AnyRole, Auth, CookieUpdate, HasAuthBackend, Session, TokenCookies,
    hash_password, verify_password,
};
use crate::db::{Account, AccountSummary, Database, NewAccount, is_unique_violation};
use crate::jwt::{TokenIdentity, TokenIssuer, TokenPair};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_signup};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<TokenIssuer>,
    pub no_signup: bool,
}

crate::impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState, limits: RateLimitConfig) -> Router {
    let signup = Router::new()
        .route("/", post(register))
        .route_layer(middleware::from_fn_with_state(limits.clone(), rate_limit_signup));
    let login = Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(limits, rate_limit_login));

    Router::new()
        .merge(signup)
        .merge(login)
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/{id}", delete(delete_account))
        .with_state(state)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RegisterRequest {
    #[serde(default)]
    #[validate(
        length(min = 1, max = 50, message = "First name must be 1 to 50 characters"),
        custom(function = "letters_only", message = "First name may only contain letters")
    )]
    firstname: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 50, message = "Last name must be 1 to 50 characters"),
        custom(function = "letters_only", message = "Last name may only contain letters")
    )]
    lastname: String,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 100, message = "Email must be 1 to 100 characters"),
        email(message = "Enter a valid email address")
    )]
    email: String,
    #[validate(
        length(max = 100, message = "Avatar file name must be at most 100 characters"),
        custom(function = "image_file", message = "Only jpg and png images are allowed")
    )]
    avatar: Option<String>,
    #[serde(default)]
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Repeat the password"))]
    repeated_password: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "Email is required"))]
    email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Password is required"))]
    password: String,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
}

/// Issue a token pair for an account and persist its refresh token.
async fn issue_session<S: HasAuthBackend>(
    state: &S,
    account: &Account,
) -> Result<TokenPair, ApiError> {
    let pair = issue_pair(state, account)?;
    state
        .db()
        .tokens()
        .create(
            &pair.refresh_jti,
            account.id,
            pair.issued_at,
            pair.refresh_expires_at,
        )
        .await
        .db_err("Failed to store refresh token")?;
    Ok(pair)
}

fn issue_pair<S: HasAuthBackend>(state: &S, account: &Account) -> Result<TokenPair, ApiError> {
    state
        .jwt()
        .issue(TokenIdentity {
            account_id: account.id,
            is_admin: account.is_admin,
        })
        .map_err(|e| {
            error!(error = %e, account_id = account.id, "Failed to issue tokens");
            ApiError::internal("Failed to issue tokens")
        })
}

async fn register(
    State(state): State<UsersState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if state.no_signup {
        return Err(ApiError::forbidden(messages::SIGNUP_DISABLED));
    }

    if req.password != req.repeated_password {
        return Err(ApiError::field("repeatedPassword", "Passwords do not match"));
    }

    if state
        .db
        .accounts()
        .is_email_taken(&req.email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::field("email", messages::EMAIL_TAKEN));
    }

    let password_hash = hash_password(&req.password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::internal("Failed to create account")
    })?;

    let avatar = req.avatar.as_deref().filter(|a| !a.is_empty());
    let id = match state
        .db
        .accounts()
        .create(&NewAccount {
            email: &req.email,
            password_hash: &password_hash,
            firstname: &req.firstname,
            lastname: &req.lastname,
            avatar,
            is_admin: false,
        })
        .await
    {
        Ok(id) => id,
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::field("email", messages::EMAIL_TAKEN));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create account", e)),
    };

    let account = state
        .db
        .accounts()
        .get_by_id(id)
        .await
        .db_err("Failed to load account")?
        .ok_or_else(|| ApiError::internal("Account vanished after creation"))?;

    info!(account_id = id, "Registered account");
    Ok(Json(AccountSummary::from(&account)))
}

async fn login(
    State(state): State<UsersState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .db
        .accounts()
        .get_by_email(&req.email)
        .await
        .db_err("Failed to look up account")?
        .ok_or_else(|| ApiError::unauthorized(messages::INVALID_CREDENTIALS))?;

    let matches = verify_password(&req.password, &account.password_hash).map_err(|e| {
        error!(error = %e, account_id = account.id, "Unreadable password hash");
        ApiError::internal("Failed to verify password")
    })?;
    if !matches {
        debug!(account_id = account.id, "Wrong password");
        return Err(ApiError::unauthorized(messages::INVALID_CREDENTIALS));
    }

    let pair = issue_session(&state, &account).await?;

    info!(account_id = account.id, "Logged in");
    Ok((
        Extension(CookieUpdate::Issue(pair)),
        Json(AccountSummary::from(&account)),
    ))
}

/// Exchange a refresh token for a new pair. The presented token is revoked.
async fn refresh(
    State(state): State<UsersState>,
    cookies: TokenCookies,
) -> Result<impl IntoResponse, ApiError> {
    let token = cookies
        .refresh()
        .ok_or_else(|| ApiError::bad_request(messages::REFRESH_TOKEN_REQUIRED))?;

    let claims = state.jwt.verify_refresh(token).map_err(|e| {
        debug!(error = %e, "Rejected refresh token");
        ApiError::not_found(messages::REFRESH_TOKEN_NOT_FOUND)
    })?;

    let account = state
        .db
        .accounts()
        .get_by_id(claims.sub)
        .await
        .db_err("Failed to look up account")?
        .ok_or_else(|| ApiError::not_found(messages::REFRESH_TOKEN_NOT_FOUND))?;

    let pair = issue_pair(&state, &account)?;
    let rotated = state
        .db
        .tokens()
        .rotate(
            &claims.jti,
            &pair.refresh_jti,
            account.id,
            pair.issued_at,
            pair.refresh_expires_at,
        )
        .await
        .db_err("Failed to rotate refresh token")?;
    if !rotated {
        debug!(account_id = account.id, "Refresh token already revoked");
        return Err(ApiError::not_found(messages::REFRESH_TOKEN_NOT_FOUND));
    }

    Ok((
        Extension(CookieUpdate::Issue(pair)),
        Json(SuccessResponse { success: true }),
    ))
}

/// Requires a present refresh cookie and a valid access token, checked in that order.
async fn logout(
    State(state): State<UsersState>,
    cookies: TokenCookies,
    session: Session,
) -> Result<impl IntoResponse, ApiError> {
    let refresh_token = cookies
        .refresh()
        .ok_or_else(|| ApiError::bad_request(messages::REFRESH_TOKEN_REQUIRED))?;
    let user = session.into_account()?;

    match state.jwt.verify_refresh(refresh_token) {
        Ok(claims) if claims.sub == user.id() => {
            state
                .db
                .tokens()
                .delete_by_jti(&claims.jti)
                .await
                .db_err("Failed to revoke refresh token")?;
        }
        Ok(_) => debug!(
            account_id = user.id(),
            "Refresh token belongs to another account"
        ),
        Err(e) => debug!(error = %e, "Unverifiable refresh token at logout"),
    }

    info!(account_id = user.id(), "Logged out");
    Ok((StatusCode::NO_CONTENT, Extension(CookieUpdate::Clear)))
}

async fn me(auth: Auth<AnyRole>) -> impl IntoResponse {
    Json(auth.summary())
}

async fn delete_account(
    State(state): State<UsersState>,
    auth: Auth<AdminOnly>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;

    let deleted = state
        .db
        .accounts()
        .delete(id)
        .await
        .db_err("Failed to delete account")?;
    if !deleted {
        return Err(ApiError::not_found(messages::ACCOUNT_NOT_FOUND));
    }

    info!(account_id = id, admin_id = auth.id(), "Deleted account");
    Ok(StatusCode::NO_CONTENT)
}
