//! Cookie transport for the access/refresh token pair.

use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};

use crate::jwt::TokenPair;

/// Cookie name for the access token (short-lived).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token (long-lived).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
/// A cookie sent with an empty value is returned as `Some("")`.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_header) = cookie_header.to_str() else {
            continue;
        };
        for part in cookie_header.split(';') {
            let part = part.trim();
            if let Some((key, value)) = part.split_once('=') {
                if key.trim() == name {
                    return Some(value.trim());
                }
            }
        }
    }
    None
}

/// The token cookies presented with a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCookies {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenCookies {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            access_token: get_cookie(headers, ACCESS_COOKIE_NAME).map(str::to_owned),
            refresh_token: get_cookie(headers, REFRESH_COOKIE_NAME).map(str::to_owned),
        }
    }

    /// The access token, treating an empty cookie as absent.
    pub fn access(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// The refresh token, treating an empty cookie as absent.
    pub fn refresh(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

/// Cookie change requested by a handler, applied by the session pipeline
/// after the handler has run.
#[derive(Debug, Clone)]
pub enum CookieUpdate {
    Issue(TokenPair),
    Clear,
}

fn http_date(timestamp: u64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp as i64, 0)
        .unwrap_or_default()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn build_cookie(name: &str, value: &str, expires_at: u64, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Expires={}; Max-Age={}{}",
        name,
        value,
        http_date(expires_at),
        max_age,
        secure
    )
}

fn append(headers: &mut HeaderMap, cookie: String) {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Refusing to write invalid cookie header"),
    }
}

/// Set both token cookies, each expiring with its token.
pub fn write_cookies(headers: &mut HeaderMap, pair: &TokenPair, secure: bool) {
    append(
        headers,
        build_cookie(
            ACCESS_COOKIE_NAME,
            &pair.access_token,
            pair.issued_at + pair.access_duration,
            pair.access_duration,
            secure,
        ),
    );
    append(
        headers,
        build_cookie(
            REFRESH_COOKIE_NAME,
            &pair.refresh_token,
            pair.refresh_expires_at,
            pair.refresh_duration,
            secure,
        ),
    );
}

/// Overwrite both token cookies with empty values that expired at the epoch.
pub fn clear_cookies(headers: &mut HeaderMap, secure: bool) {
    append(headers, build_cookie(ACCESS_COOKIE_NAME, "", 0, 0, secure));
    append(headers, build_cookie(REFRESH_COOKIE_NAME, "", 0, 0, secure));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_cookies(headers: &HeaderMap) -> Vec<String> {
        headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    fn pair() -> TokenPair {
        TokenPair {
            access_token: "access.jwt".to_string(),
            access_duration: 300,
            refresh_token: "refresh.jwt".to_string(),
            refresh_duration: 1_209_600,
            refresh_jti: "jti".to_string(),
            issued_at: 1_705_321_845,
            refresh_expires_at: 1_705_321_845 + 1_209_600,
        }
    }

    #[test]
    fn test_get_cookie_multiple() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("foo=bar; accessToken=abc123; refreshToken=xyz789"),
        );

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
        assert_eq!(get_cookie(&headers, "refreshToken"), Some("xyz789"));
        assert_eq!(get_cookie(&headers, "foo"), Some("bar"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_get_cookie_with_spaces() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("  accessToken = abc123  ; foo=bar"),
        );

        assert_eq!(get_cookie(&headers, "accessToken"), Some("abc123"));
    }

    #[test]
    fn test_get_cookie_no_header() {
        assert_eq!(get_cookie(&HeaderMap::new(), "accessToken"), None);
    }

    #[test]
    fn test_empty_cookie_is_present_but_unusable() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("refreshToken="));

        let cookies = TokenCookies::from_headers(&headers);
        assert_eq!(cookies.refresh_token.as_deref(), Some(""));
        assert_eq!(cookies.refresh(), None);
        assert_eq!(cookies.access_token, None);
    }

    #[test]
    fn test_write_cookies() {
        let mut headers = HeaderMap::new();
        write_cookies(&mut headers, &pair(), false);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        assert_eq!(
            cookies[0],
            "accessToken=access.jwt; HttpOnly; SameSite=Strict; Path=/; Expires=Mon, 15 Jan 2024 12:35:45 GMT; Max-Age=300"
        );
        assert!(cookies[1].starts_with("refreshToken=refresh.jwt; HttpOnly;"));
        assert!(cookies[1].contains("Max-Age=1209600"));
        assert!(!cookies[1].contains("Secure"));
    }

    #[test]
    fn test_clear_cookies() {
        let mut headers = HeaderMap::new();
        clear_cookies(&mut headers, true);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        for (cookie, name) in cookies.iter().zip(["accessToken", "refreshToken"]) {
            assert!(cookie.starts_with(&format!("{}=;", name)));
            assert!(cookie.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
            assert!(cookie.contains("Max-Age=0"));
            assert!(cookie.ends_with("; Secure"));
        }
    }
}
