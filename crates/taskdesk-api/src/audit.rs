//! Security audit logging for authentication events
//!
//! Every event is logged at INFO level with the "audit" target so it can be
//! filtered and routed separately from application logs. Events carry the
//! detailed failure reason that is deliberately withheld from HTTP clients.
//! Passwords and token strings are never part of an event.
//!
//! # Example
//!
//! ```ignore
//! use taskdesk_api::audit::{audit_log, AuditEvent};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     username: "alice".to_string(),
//!     ip_address: Some("192.168.1.1".to_string()),
//!     user_agent: None,
//! });
//! ```
//!
//! Author: hephaex@gmail.com

use axum::http::{header, HeaderMap};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Security audit events for authentication and authorization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user login
    LoginSuccess {
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed login attempt
    LoginFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Successful user registration
    RegistrationSuccess {
        username: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Failed registration attempt
    RegistrationFailure {
        username: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Token revoked through logout
    Logout {
        /// Subject of the revoked token, when it still verified
        username: Option<String>,
        ip_address: Option<String>,
    },

    /// Bearer token rejected by the authentication middleware
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authenticated user tried to touch another user's resource
    AccessDenied {
        username: String,
        resource: String,
        ip_address: Option<String>,
    },
}

impl AuditEvent {
    fn message(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::Logout { .. } => "User logout",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccessDenied { .. } => "Access denied",
        }
    }
}

/// Log a security audit event with structured fields
///
/// The whole event is attached as a JSON field for log aggregators, with the
/// most common keys repeated as first-class tracing fields.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let message = event.message();

    match event {
        AuditEvent::LoginSuccess {
            username,
            ip_address,
            ..
        }
        | AuditEvent::RegistrationSuccess {
            username,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::LoginFailure {
            username,
            reason,
            ip_address,
            ..
        }
        | AuditEvent::RegistrationFailure {
            username,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                reason = %reason,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::Logout {
            username,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = ?username,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::InvalidToken {
            reason, ip_address, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reason = %reason,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::AccessDenied {
            username,
            resource,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                username = %username,
                resource = %resource,
                ip_address = ?ip_address,
                "{message}"
            );
        }
    }
}

/// Extract the client IP address from proxy headers
///
/// Checks X-Forwarded-For (first hop) and then X-Real-IP.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(first_ip) = headers
        .get("x-forwarded-for")
        .and_then(|xff| xff.to_str().ok())
        .and_then(|xff| xff.split(',').next())
    {
        return Some(first_ip.trim().to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|ip| ip.to_str().ok())
        .map(|ip| ip.to_string())
}

/// Extract the user agent from request headers
pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|ua| ua.to_str().ok())
        .map(|s| s.to_string())
}
