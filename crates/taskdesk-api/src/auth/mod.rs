//! Authentication module
//!
//! Stateless bearer-token authentication:
//! - Token issuance and verification (HS256 JWT)
//! - Revocation store with periodic expiry sweep
//! - Password hashing with Argon2id
//! - Credential service for registration, login and logout
//! - Middleware that attaches an explicit caller identity to requests

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod revocation;
pub mod service;

pub use jwt::{Claims, SigningKey, TokenCodec, TokenError};
pub use middleware::{authenticate, bearer_token, require_identity, AuthenticatedIdentity};
pub use password::{
    hash_password, hash_password_with_config, verify_password, PasswordConfig, PasswordError,
};
pub use revocation::{
    spawn_revocation_sweeper, InMemoryRevocationStore, PgRevocationStore, RevocationError,
    RevocationStore,
};
pub use service::{AuthError, AuthService};
