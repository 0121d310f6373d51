//! Application state management
//!
//! Author: hephaex@gmail.com

use crate::auth::password::PasswordConfig;
use crate::auth::revocation::{InMemoryRevocationStore, RevocationStore};
use crate::auth::{AuthService, TokenCodec};
use crate::metrics::ApiMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use taskdesk_core::config::AppConfig;
use taskdesk_core::{InMemoryStore, TaskStore, UserStore};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Registration, login, token checks and logout
    pub auth: AuthService,
    /// Credential lookup, also used to resolve task ownership
    pub users: Arc<dyn UserStore>,
    /// Task persistence
    pub tasks: Arc<dyn TaskStore>,
    /// Prometheus metrics
    pub metrics: ApiMetrics,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Wire the state from already-constructed stores
    pub fn new(
        config: AppConfig,
        codec: Arc<TokenCodec>,
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        revocations: Arc<dyn RevocationStore>,
    ) -> prometheus::Result<Self> {
        let password_config = PasswordConfig::from(&config.auth);
        let auth = AuthService::new(users.clone(), codec, revocations, password_config);

        Ok(Self {
            config,
            auth,
            users,
            tasks,
            metrics: ApiMetrics::new()?,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        })
    }

    /// State backed entirely by process memory
    pub fn in_memory(config: AppConfig, codec: Arc<TokenCodec>) -> prometheus::Result<Self> {
        let store = Arc::new(InMemoryStore::new());
        Self::new(
            config,
            codec,
            store.clone(),
            store,
            Arc::new(InMemoryRevocationStore::new()),
        )
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }
}
