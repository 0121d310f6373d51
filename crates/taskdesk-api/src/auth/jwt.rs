//! Session token issuance and verification
//!
//! Tokens are HS256 JWTs carrying the username as subject plus issue and
//! expiry timestamps. Validity is decided entirely by signature, expiry and
//! absence from the revocation store; nothing about issued tokens is stored.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use taskdesk_core::config::{AuthConfig, ConfigError, MIN_SECRET_LEN};
use thiserror::Error;
use uuid::Uuid;

/// Claims embedded in every session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Token issuer
    pub iss: String,
    /// Subject - the username
    pub sub: String,
    /// Unique token identifier, keeps tokens issued in the same second distinct
    pub jti: String,
    /// Issued at timestamp (Unix epoch seconds)
    pub iat: u64,
    /// Expiration timestamp (Unix epoch seconds)
    pub exp: u64,
}

/// Token issuance and verification errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Failed to encode token: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Process-wide HMAC key material
///
/// Built once from the configured secret and shared read-only by issuance
/// and verification.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKey([REDACTED])")
    }
}

/// Seconds since the Unix epoch
pub fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}

/// Encodes and verifies session tokens
#[derive(Debug, Clone)]
pub struct TokenCodec {
    key: SigningKey,
    issuer: String,
    session_ttl: Duration,
}

impl TokenCodec {
    pub fn new(key: SigningKey, issuer: impl Into<String>, session_ttl: Duration) -> Self {
        Self {
            key,
            issuer: issuer.into(),
            session_ttl,
        }
    }

    /// Build the process codec from validated auth configuration
    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let secret = config
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("TASKDESK_JWT_SECRET".to_string()))?;

        if secret.expose().len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "TASKDESK_JWT_SECRET".to_string(),
                value: format!("secret shorter than {MIN_SECRET_LEN} bytes"),
            });
        }

        Ok(Self::new(
            SigningKey::from_secret(secret.expose().as_bytes()),
            config.issuer.clone(),
            Duration::from_secs(config.token_ttl_secs),
        ))
    }

    /// Lifetime of tokens issued by [`TokenCodec::issue_session`]
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Issue a token for `subject` with the configured session lifetime
    pub fn issue_session(&self, subject: &str) -> Result<String, TokenError> {
        self.issue(subject, self.session_ttl)
    }

    /// Issue a token for `subject` valid for `ttl` from now
    pub fn issue(&self, subject: &str, ttl: Duration) -> Result<String, TokenError> {
        self.issue_at(subject, ttl, unix_now()?)
    }

    /// Issue a token as if the current time were `now`
    pub fn issue_at(&self, subject: &str, ttl: Duration, now: u64) -> Result<String, TokenError> {
        let claims = Claims {
            iss: self.issuer.clone(),
            sub: subject.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now.saturating_add(ttl.as_secs()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.key.encoding)
            .map_err(TokenError::Encoding)
    }

    /// Verify a token against the signing key and the current time
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now()?)
    }

    /// Verify a token as if the current time were `now`
    ///
    /// A token is expired once `now >= exp`; no leeway is applied.
    pub fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let claims = self.decode_signed(token)?;

        if now >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Expiry of a token this codec signed, whether or not it has passed
    ///
    /// Returns `None` for anything that does not carry a valid signature, so
    /// a caller can never pick the lifetime of a revocation entry.
    pub fn signed_expiry(&self, token: &str) -> Option<u64> {
        self.decode_signed(token).ok().map(|claims| claims.exp)
    }

    /// Check signature, issuer and required claims but not expiry
    fn decode_signed(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation.validate_exp = false;
        validation.leeway = 0;

        decode::<Claims>(token, &self.key.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })
    }
}
