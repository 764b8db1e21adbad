//! Rate limiting for authentication endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down
//! credential guessing and signup spam.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{num::NonZeroU32, sync::Arc};
use tracing::warn;

use crate::api::ApiError;
use crate::auth::extract_client_ip;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Default login attempts per minute per IP.
pub const DEFAULT_LOGIN_PER_MINUTE: u32 = 10;

/// Default signups per minute per IP.
pub const DEFAULT_SIGNUP_PER_MINUTE: u32 = 3;

/// Rate limiting configuration for authentication endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    pub login: Arc<IpLimiter>,
    pub signup: Arc<IpLimiter>,
    /// Key clients by `X-Forwarded-For` instead of the socket address
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Create limiters allowing the given number of requests per minute per IP.
    /// Zero quotas are raised to one.
    pub fn new(login_per_minute: u32, signup_per_minute: u32, trust_proxy: bool) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(Quota::per_minute(non_zero(
                login_per_minute,
            )))),
            signup: Arc::new(RateLimiter::keyed(Quota::per_minute(non_zero(
                signup_per_minute,
            )))),
            trust_proxy,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LOGIN_PER_MINUTE, DEFAULT_SIGNUP_PER_MINUTE, false)
    }
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

fn check(limiter: &IpLimiter, request: &Request, trust_proxy: bool, endpoint: &str) -> bool {
    let ip = extract_client_ip(request, trust_proxy);
    match limiter.check_key(&ip) {
        Ok(_) => true,
        Err(_) => {
            warn!(ip = %ip, endpoint, "Rate limit exceeded");
            false
        }
    }
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    if check(&config.login, &request, config.trust_proxy, "login") {
        next.run(request).await
    } else {
        ApiError::too_many_requests(crate::api::messages::TOO_MANY_REQUESTS).into_response()
    }
}

/// Middleware for rate limiting account creation.
pub async fn rate_limit_signup(
    State(config): State<RateLimitConfig>,
    request: Request,
    next: Next,
) -> Response {
    if check(&config.signup, &request, config.trust_proxy, "signup") {
        next.run(request).await
    } else {
        ApiError::too_many_requests(crate::api::messages::TOO_MANY_REQUESTS).into_response()
    }
}
