//! Authentication service layer
//!
//! Registration, login, token authentication and logout. Persistence goes
//! through the `UserStore` trait and revocation through `RevocationStore`,
//! so the service itself holds no per-session state.

use super::jwt::{unix_now, Claims, TokenCodec, TokenError};
use super::password::{hash_password_with_config, verify_password, PasswordConfig, PasswordError};
use super::revocation::{RevocationError, RevocationStore};
use std::sync::Arc;
use taskdesk_core::{CoreError, Credential, NewCredential, UserStore};
use thiserror::Error;

/// Authentication failures
///
/// The variant is for diagnostics and audit only. Every credential or token
/// failure reaches the client as the same unauthorized response.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    Expired,

    #[error("Token has been revoked")]
    Revoked,

    #[error("No credential for username")]
    NotFound,

    #[error("Password does not match")]
    InvalidCredentials,

    #[error("User already exists: {0}")]
    AlreadyExists(String),

    #[error("Revocation lookup failed: {0}")]
    RevocationUnavailable(#[from] RevocationError),

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Short label used for metrics and audit records
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Malformed => "malformed",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "expired",
            AuthError::Revoked => "revoked",
            AuthError::NotFound => "not_found",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AlreadyExists(_) => "already_exists",
            AuthError::RevocationUnavailable(_) => "revocation_unavailable",
            AuthError::Internal(_) => "internal",
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => AuthError::Malformed,
            TokenError::InvalidSignature => AuthError::InvalidSignature,
            TokenError::Expired => AuthError::Expired,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AlreadyExists(username) => AuthError::AlreadyExists(username),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

/// Authentication service
pub struct AuthService {
    users: Arc<dyn UserStore>,
    codec: Arc<TokenCodec>,
    revocations: Arc<dyn RevocationStore>,
    password_config: PasswordConfig,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        codec: Arc<TokenCodec>,
        revocations: Arc<dyn RevocationStore>,
        password_config: PasswordConfig,
    ) -> Self {
        Self {
            users,
            codec,
            revocations,
            password_config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn revocations(&self) -> &Arc<dyn RevocationStore> {
        &self.revocations
    }

    /// Register a new user
    ///
    /// Usernames are matched exactly (case-sensitive). The store enforces
    /// uniqueness too, so a concurrent registration of the same name that
    /// slips past the lookup still fails with `AlreadyExists`.
    pub async fn register(&self, username: &str, password: &str) -> Result<Credential, AuthError> {
        if self.users.find_user_by_username(username).await?.is_some() {
            return Err(AuthError::AlreadyExists(username.to_string()));
        }

        let password_hash = self.hash(password).await?;

        let credential = self
            .users
            .save_user(NewCredential {
                username: username.to_string(),
                password_hash,
            })
            .await?;

        tracing::debug!(user_id = credential.id, "Stored new credential");
        Ok(credential)
    }

    /// Check a username/password pair and issue a session token
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let credential = self
            .users
            .find_user_by_username(username)
            .await?
            .ok_or(AuthError::NotFound)?;

        if !self.verify(password, &credential.password_hash).await? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(self.codec.issue_session(&credential.username)?)
    }

    /// Decide whether a presented bearer token authenticates its subject
    ///
    /// Revocation is checked before the signature.
    pub async fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        if self.revocations.is_revoked(token).await? {
            return Err(AuthError::Revoked);
        }

        Ok(self.codec.verify(token)?)
    }

    /// Make sure `token` can never authenticate again
    ///
    /// Succeeds for absent, malformed, expired, and already revoked tokens.
    /// A token we signed is kept until its own expiry. Anything else is kept
    /// for one session lifetime from now, since its claims are attacker
    /// controlled.
    pub async fn logout(&self, token: Option<&str>) -> Result<(), AuthError> {
        let Some(token) = token else {
            return Ok(());
        };

        let expires_at = match self.codec.signed_expiry(token) {
            Some(exp) => exp,
            None => unix_now()?.saturating_add(self.codec.session_ttl().as_secs()),
        };

        self.revocations.revoke(token, expires_at).await?;
        Ok(())
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_string();
        let config = self.password_config.clone();

        tokio::task::spawn_blocking(move || hash_password_with_config(&password, &config))
            .await
            .map_err(|e| AuthError::Internal(format!("Password hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task failed: {e}")))?
            .map_err(AuthError::from)
    }
}
