//! Revoked token storage
//!
//! A revoked token stays blocked until its own expiry passes, after which the
//! entry is useless and the sweeper drops it. Two backends are provided:
//! a process-local map for single-instance deployments, and a PostgreSQL table
//! shared by every instance behind a load balancer.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use super::jwt::unix_now;

/// Revocation store errors
#[derive(Debug, Error)]
pub enum RevocationError {
    #[error("Revocation store unavailable: {0}")]
    Backend(String),
}

/// Set of revoked token strings
///
/// Implementations must be linearizable: once `revoke` returns, every
/// subsequent `is_revoked` call for the same token returns true until
/// `expires_at` has passed.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Block `token` until `expires_at` (Unix seconds). Idempotent.
    async fn revoke(&self, token: &str, expires_at: u64) -> Result<(), RevocationError>;

    /// Membership test
    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError>;

    /// Drop entries whose expiry is at or before `now`; returns how many were removed
    async fn purge_expired(&self, now: u64) -> Result<usize, RevocationError>;

    /// Number of entries currently held
    async fn len(&self) -> Result<usize, RevocationError>;
}

// ============================================================================
// In-memory backend
// ============================================================================

/// Process-local revocation set
///
/// Keyed by the raw token string; the value is the token's expiry.
#[derive(Debug, Default)]
pub struct InMemoryRevocationStore {
    entries: Mutex<HashMap<String, u64>>,
}

impl InMemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        // Every critical section leaves the map consistent, so a poisoned
        // lock still guards valid data.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RevocationStore for InMemoryRevocationStore {
    async fn revoke(&self, token: &str, expires_at: u64) -> Result<(), RevocationError> {
        let mut entries = self.entries();
        let entry = entries.entry(token.to_string()).or_insert(expires_at);
        *entry = (*entry).max(expires_at);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        Ok(self.entries().contains_key(token))
    }

    async fn purge_expired(&self, now: u64) -> Result<usize, RevocationError> {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize, RevocationError> {
        Ok(self.entries().len())
    }
}

// ============================================================================
// PostgreSQL backend
// ============================================================================

/// Revocation set shared through PostgreSQL
///
/// Tokens are stored as SHA-256 digests so the table never holds a usable
/// credential.
#[derive(Clone)]
pub struct PgRevocationStore {
    pool: PgPool,
}

impl PgRevocationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the revocation table if it does not exist
    pub async fn migrate(&self) -> Result<(), RevocationError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS revoked_tokens (
                token_hash TEXT PRIMARY KEY,
                expires_at BIGINT NOT NULL,
                revoked_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RevocationError::Backend(format!("Failed to create revoked_tokens: {e}")))?;

        Ok(())
    }
}

/// Hash a token for storage (SHA-256, hex)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn to_db_time(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}

#[async_trait]
impl RevocationStore for PgRevocationStore {
    async fn revoke(&self, token: &str, expires_at: u64) -> Result<(), RevocationError> {
        sqlx::query(
            "INSERT INTO revoked_tokens (token_hash, expires_at) VALUES ($1, $2) \
             ON CONFLICT (token_hash) DO UPDATE \
             SET expires_at = GREATEST(revoked_tokens.expires_at, EXCLUDED.expires_at)",
        )
        .bind(hash_token(token))
        .bind(to_db_time(expires_at))
        .execute(&self.pool)
        .await
        .map_err(|e| RevocationError::Backend(format!("Failed to revoke token: {e}")))?;

        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM revoked_tokens WHERE token_hash = $1",
        )
        .bind(hash_token(token))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RevocationError::Backend(format!("Failed to check revocation: {e}")))?;

        Ok(count > 0)
    }

    async fn purge_expired(&self, now: u64) -> Result<usize, RevocationError> {
        let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at <= $1")
            .bind(to_db_time(now))
            .execute(&self.pool)
            .await
            .map_err(|e| RevocationError::Backend(format!("Failed to purge revocations: {e}")))?;

        Ok(result.rows_affected() as usize)
    }

    async fn len(&self) -> Result<usize, RevocationError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM revoked_tokens")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RevocationError::Backend(format!("Failed to count revocations: {e}")))?;

        Ok(count.max(0) as usize)
    }
}

// ============================================================================
// Sweeper
// ============================================================================

/// Run one sweep and report the number of entries left
pub async fn sweep_once(store: &dyn RevocationStore) -> Result<usize, RevocationError> {
    let now = unix_now().map_err(|e| RevocationError::Backend(e.to_string()))?;
    let purged = store.purge_expired(now).await?;
    if purged > 0 {
        tracing::debug!(purged, "Evicted expired revocation entries");
    }
    store.len().await
}

/// Spawn a background task that periodically evicts expired entries
///
/// `on_sweep` receives the number of entries remaining after each sweep.
pub fn spawn_revocation_sweeper<F>(
    store: Arc<dyn RevocationStore>,
    interval: Duration,
    on_sweep: F,
) -> JoinHandle<()>
where
    F: Fn(usize) + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match sweep_once(store.as_ref()).await {
                Ok(remaining) => on_sweep(remaining),
                Err(e) => tracing::warn!(error = %e, "Revocation sweep failed"),
            }
        }
    })
}
