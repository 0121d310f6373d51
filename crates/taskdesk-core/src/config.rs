//! taskdesk configuration management
//!
//! Handles configuration from environment variables and TOML files with
//! sensible defaults for development. The token signing secret has no default
//! and must always be injected from outside the binary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Minimum signing secret length in bytes (HS256 key size)
pub const MIN_SECRET_LEN: usize = 32;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Token and session configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("API_PORT") {
            config.server.port = parse_var("API_PORT", port)?;
        }

        // PostgreSQL
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database.url = Some(url);
        }

        // Auth
        if let Ok(secret) = std::env::var("TASKDESK_JWT_SECRET") {
            config.auth.jwt_secret = Some(Secret::new(secret));
        }
        if let Ok(ttl) = std::env::var("TASKDESK_TOKEN_TTL_SECS") {
            config.auth.token_ttl_secs = parse_var("TASKDESK_TOKEN_TTL_SECS", ttl)?;
        }
        if let Ok(issuer) = std::env::var("TASKDESK_JWT_ISSUER") {
            config.auth.issuer = issuer;
        }
        if let Ok(backend) = std::env::var("TASKDESK_REVOCATION_BACKEND") {
            config.auth.revocation_backend = backend.parse()?;
        }
        if let Ok(secs) = std::env::var("TASKDESK_REVOCATION_SWEEP_SECS") {
            config.auth.revocation_sweep_secs = parse_var("TASKDESK_REVOCATION_SWEEP_SECS", secs)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.logging.json_format = parse_var("LOG_JSON", json)?;
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;

        if env_config.server.host != ServerConfig::default().host {
            self.server.host = env_config.server.host;
        }
        if env_config.server.port != ServerConfig::default().port {
            self.server.port = env_config.server.port;
        }
        if env_config.database.url.is_some() {
            self.database.url = env_config.database.url;
        }

        let default_auth = AuthConfig::default();
        if env_config.auth.token_ttl_secs != default_auth.token_ttl_secs {
            self.auth.token_ttl_secs = env_config.auth.token_ttl_secs;
        }
        if env_config.auth.issuer != default_auth.issuer {
            self.auth.issuer = env_config.auth.issuer;
        }
        if env_config.auth.revocation_backend != default_auth.revocation_backend {
            self.auth.revocation_backend = env_config.auth.revocation_backend;
        }
        if env_config.auth.revocation_sweep_secs != default_auth.revocation_sweep_secs {
            self.auth.revocation_sweep_secs = env_config.auth.revocation_sweep_secs;
        }

        // Always use env for sensitive values
        if env_config.auth.jwt_secret.is_some() {
            self.auth.jwt_secret = env_config.auth.jwt_secret;
        }

        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }
        if env_config.logging.json_format {
            self.logging.json_format = true;
        }

        Ok(self)
    }

    /// Check cross-field requirements before the server starts
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self
            .auth
            .jwt_secret
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequired("TASKDESK_JWT_SECRET".to_string()))?;

        if secret.expose().len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "TASKDESK_JWT_SECRET".to_string(),
                value: format!("secret shorter than {MIN_SECRET_LEN} bytes"),
            });
        }

        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TASKDESK_TOKEN_TTL_SECS".to_string(),
                value: "0".to_string(),
            });
        }

        if self.auth.revocation_backend == RevocationBackend::Postgres
            && self.database.url.is_none()
        {
            return Err(ConfigError::MissingRequired(
                "DATABASE_URL (required by the postgres revocation backend)".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Database connection configuration
///
/// Without a URL the server keeps users and tasks in process memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
        }
    }
}

/// Where revoked tokens are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RevocationBackend {
    /// Process-local set; only valid for single-instance deployments
    #[default]
    Memory,
    /// Shared table visible to every instance
    Postgres,
}

impl std::str::FromStr for RevocationBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(ConfigError::InvalidValue {
                key: "TASKDESK_REVOCATION_BACKEND".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Token and session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret; must be identical on every instance
    pub jwt_secret: Option<Secret>,

    /// Session token lifetime in seconds (default: 3600 = 1 hour)
    pub token_ttl_secs: u64,

    /// Token issuer identifier
    pub issuer: String,

    /// Revocation store backend
    pub revocation_backend: RevocationBackend,

    /// Interval between sweeps of expired revocation entries
    pub revocation_sweep_secs: u64,

    /// Argon2 memory cost in KiB
    pub password_memory_kib: u32,

    /// Argon2 iterations
    pub password_iterations: u32,

    /// Argon2 parallelism
    pub password_parallelism: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_ttl_secs: 3600,
            issuer: "taskdesk".to_string(),
            revocation_backend: RevocationBackend::Memory,
            revocation_sweep_secs: 60,
            password_memory_kib: 65536, // 64 MB
            password_iterations: 3,
            password_parallelism: 4,
        }
    }
}

/// A configuration value that must never be printed
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([REDACTED])")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
