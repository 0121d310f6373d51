//! taskdesk core - Domain models, store traits, and shared types
//!
//! This crate defines the core abstractions used throughout taskdesk:
//! - User credentials and tasks
//! - Common error types
//! - Store traits consumed by the API layer (`UserStore`, `TaskStore`)
//! - In-memory and PostgreSQL store implementations
//! - Configuration management

pub mod config;
pub mod memory;
pub mod postgres;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, RevocationBackend,
    ServerConfig,
};
pub use memory::InMemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for store and domain operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================================================
// Users
// ============================================================================

/// Stored user credential
///
/// Only the password hash is ever kept; plaintext passwords never reach a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
}

/// Credential that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub username: String,
    pub password_hash: String,
}

/// User lookup and persistence
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Find a user by exact (case-sensitive) username
    async fn find_user_by_username(&self, username: &str) -> Result<Option<Credential>>;

    /// Persist a new user
    ///
    /// Fails with `CoreError::AlreadyExists` if the username is taken.
    async fn save_user(&self, credential: NewCredential) -> Result<Credential>;
}

// ============================================================================
// Tasks
// ============================================================================

/// A task owned by a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Check whether the task belongs to the given user
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// Fields for a task that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub user_id: i64,
}

/// Ordering for task listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskSort {
    #[default]
    Id,
    Title,
}

impl TaskSort {
    /// Parse a `sortBy` query value; anything other than "title" sorts by id
    pub fn from_param(param: &str) -> Self {
        if param.eq_ignore_ascii_case("title") {
            TaskSort::Title
        } else {
            TaskSort::Id
        }
    }
}

/// Task persistence
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// List every task owned by a user in the given order
    async fn list_by_owner(&self, user_id: i64, sort: TaskSort) -> Result<Vec<Task>>;

    /// List a user's tasks with the given completion state, ordered by id
    async fn list_by_owner_and_completed(&self, user_id: i64, completed: bool)
        -> Result<Vec<Task>>;

    /// Get a task by ID regardless of owner
    async fn get_task(&self, id: i64) -> Result<Option<Task>>;

    /// Create a task
    async fn create_task(&self, task: NewTask) -> Result<Task>;

    /// Replace a stored task's mutable fields
    async fn update_task(&self, task: &Task) -> Result<Task>;

    /// Delete a task by ID
    async fn delete_task(&self, id: i64) -> Result<()>;
}
