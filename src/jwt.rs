//! JWT token issuing and verification.
//!
//! Access tokens are short-lived and stateless. Refresh tokens carry a JTI
//! that is persisted so a refresh token can be rotated and revoked.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Token type for distinguishing access vs refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (account id)
    pub sub: i64,
    /// Admin flag at issue time
    pub admin: bool,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    /// JWT ID, persisted for rotation and revocation
    pub jti: String,
    /// Subject (account id)
    pub sub: i64,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: u64,
    pub exp: u64,
}

/// Default access token lifetime: 5 minutes
pub const DEFAULT_ACCESS_TOKEN_SECS: u64 = 5 * 60;

/// Default refresh token lifetime: 2 weeks
pub const DEFAULT_REFRESH_TOKEN_SECS: u64 = 14 * 24 * 60 * 60;

/// The identity a token pair is issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenIdentity {
    pub account_id: i64,
    pub is_admin: bool,
}

/// A freshly issued access/refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// Access token lifetime in seconds
    pub access_duration: u64,
    pub refresh_token: String,
    /// Refresh token lifetime in seconds
    pub refresh_duration: u64,
    /// JTI of the refresh token (stored in the database)
    pub refresh_jti: String,
    /// Issued at timestamp (Unix seconds)
    pub issued_at: u64,
    /// Refresh token expiration timestamp (Unix seconds)
    pub refresh_expires_at: u64,
}

/// Errors that can occur while issuing or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Signature is fine but the token is past its expiry
    #[error("token has expired")]
    Expired,
    /// Not a JWT at all (bad encoding, bad JSON, missing claims)
    #[error("token is malformed")]
    Malformed,
    /// Bad signature, wrong token type or any other rejected claim
    #[error("token is invalid")]
    Invalid,
    #[error("failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("system time error")]
    Time,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => TokenError::Malformed,
            _ => TokenError::Invalid,
        }
    }
}

/// Signs and verifies tokens with a shared HMAC secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_duration: u64,
    refresh_duration: u64,
}

fn now_secs() -> Result<u64, TokenError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| TokenError::Time)?
        .as_secs())
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

impl TokenIssuer {
    /// Create an issuer with the default token lifetimes.
    pub fn new(secret: &[u8]) -> Self {
        Self::with_durations(secret, DEFAULT_ACCESS_TOKEN_SECS, DEFAULT_REFRESH_TOKEN_SECS)
    }

    pub fn with_durations(secret: &[u8], access_duration: u64, refresh_duration: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            access_duration,
            refresh_duration,
        }
    }

    /// Issue a new access/refresh token pair for an account.
    pub fn issue(&self, identity: TokenIdentity) -> Result<TokenPair, TokenError> {
        let now = now_secs()?;

        let access_claims = AccessClaims {
            sub: identity.account_id,
            admin: identity.is_admin,
            token_type: TokenType::Access,
            iat: now,
            exp: now + self.access_duration,
        };
        let access_token =
            jsonwebtoken::encode(&Header::default(), &access_claims, &self.encoding_key)
                .map_err(TokenError::Encoding)?;

        let jti = uuid::Uuid::new_v4().to_string();
        let refresh_expires_at = now + self.refresh_duration;
        let refresh_claims = RefreshClaims {
            jti: jti.clone(),
            sub: identity.account_id,
            token_type: TokenType::Refresh,
            iat: now,
            exp: refresh_expires_at,
        };
        let refresh_token =
            jsonwebtoken::encode(&Header::default(), &refresh_claims, &self.encoding_key)
                .map_err(TokenError::Encoding)?;

        Ok(TokenPair {
            access_token,
            access_duration: self.access_duration,
            refresh_token,
            refresh_duration: self.refresh_duration,
            refresh_jti: jti,
            issued_at: now,
            refresh_expires_at,
        })
    }

    /// Verify and decode an access token.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, TokenError> {
        let data = jsonwebtoken::decode::<AccessClaims>(token, &self.decoding_key, &validation())?;

        if data.claims.token_type != TokenType::Access {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }

    /// Verify and decode a refresh token.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, TokenError> {
        let data =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.decoding_key, &validation())?;

        if data.claims.token_type != TokenType::Refresh {
            return Err(TokenError::Invalid);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-key-for-testing-only!";

    fn identity(admin: bool) -> TokenIdentity {
        TokenIdentity {
            account_id: 42,
            is_admin: admin,
        }
    }

    #[test]
    fn test_issue_and_verify_pair() {
        let issuer = TokenIssuer::new(SECRET);
        let pair = issuer.issue(identity(false)).unwrap();

        assert_eq!(pair.access_duration, DEFAULT_ACCESS_TOKEN_SECS);
        assert_eq!(pair.refresh_duration, DEFAULT_REFRESH_TOKEN_SECS);
        assert_eq!(
            pair.refresh_expires_at,
            pair.issued_at + DEFAULT_REFRESH_TOKEN_SECS
        );

        let access = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.sub, 42);
        assert!(!access.admin);
        assert_eq!(access.token_type, TokenType::Access);

        let refresh = issuer.verify_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.sub, 42);
        assert_eq!(refresh.jti, pair.refresh_jti);
        assert_eq!(refresh.token_type, TokenType::Refresh);
    }

    #[test]
    fn test_admin_flag_in_access_token() {
        let issuer = TokenIssuer::new(SECRET);
        let pair = issuer.issue(identity(true)).unwrap();
        assert!(issuer.verify_access(&pair.access_token).unwrap().admin);
    }

    #[test]
    fn test_custom_durations() {
        let issuer = TokenIssuer::with_durations(SECRET, 60, 3600);
        let pair = issuer.issue(identity(false)).unwrap();
        assert_eq!(pair.access_duration, 60);
        assert_eq!(pair.refresh_duration, 3600);

        let access = issuer.verify_access(&pair.access_token).unwrap();
        assert_eq!(access.exp - access.iat, 60);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let issuer = TokenIssuer::new(SECRET);
        let pair = issuer.issue(identity(false)).unwrap();

        assert!(matches!(
            issuer.verify_refresh(&pair.access_token),
            Err(TokenError::Invalid | TokenError::Malformed)
        ));
        assert!(matches!(
            issuer.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid | TokenError::Malformed)
        ));
    }

    #[test]
    fn test_garbage_is_malformed() {
        let issuer = TokenIssuer::new(SECRET);
        assert!(matches!(
            issuer.verify_access("not-exist-token"),
            Err(TokenError::Malformed)
        ));
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let issuer = TokenIssuer::new(SECRET);
        let other = TokenIssuer::new(b"another-secret-key-for-testing!!");
        let pair = issuer.issue(identity(false)).unwrap();

        assert!(matches!(
            other.verify_access(&pair.access_token),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_expired_token() {
        let now = now_secs().unwrap();
        let claims = AccessClaims {
            sub: 42,
            admin: false,
            token_type: TokenType::Access,
            iat: now - 100,
            exp: now - 50,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        let issuer = TokenIssuer::new(SECRET);
        assert!(matches!(
            issuer.verify_access(&token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn test_unique_jti_per_pair() {
        let issuer = TokenIssuer::new(SECRET);
        let first = issuer.issue(identity(false)).unwrap();
        let second = issuer.issue(identity(false)).unwrap();
        assert_ne!(first.refresh_jti, second.refresh_jti);
    }
}
