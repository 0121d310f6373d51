//! Authentication API handlers
//!
//! Author: hephaex@gmail.com

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::auth::{bearer_token, AuthError, AuthenticatedIdentity};
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

/// Username and password, used by both registration and login
///
/// No complexity policy is applied; only empty values are refused.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CredentialsRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Current user response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub username: String,
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "User registered successfully", body = String, content_type = "text/plain"),
        (status = 400, description = "Empty username or password", body = crate::error::ApiError),
        (status = 409, description = "User already exists", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    match state.auth.register(&request.username, &request.password).await {
        Ok(_) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                username: request.username,
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Ok("User registered successfully")
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                username: request.username,
                reason: e.reason().to_string(),
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Err(e.into())
        }
    }
}

/// Login with username and password
///
/// Returns the raw session token as the response body.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Session token", body = String, content_type = "text/plain"),
        (status = 400, description = "Empty username or password", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    match state.auth.login(&request.username, &request.password).await {
        Ok(token) => {
            audit_log(&AuditEvent::LoginSuccess {
                username: request.username,
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Ok(token)
        }
        Err(e) => {
            if matches!(e, AuthError::NotFound | AuthError::InvalidCredentials) {
                state.metrics.record_auth_rejection(e.reason());
            }
            audit_log(&AuditEvent::LoginFailure {
                username: request.username,
                reason: e.reason().to_string(),
                ip_address: extract_ip_address(&headers),
                user_agent: extract_user_agent(&headers),
            });
            Err(e.into())
        }
    }
}

/// Logout current session
///
/// Revokes the presented bearer token. Succeeds whether the token is valid,
/// expired, already revoked or missing.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out successfully", body = String, content_type = "text/plain"),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = bearer_token(&headers);
    let username = token
        .and_then(|t| state.auth.codec().verify(t).ok())
        .map(|claims| claims.sub);

    state
        .auth
        .logout(token)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to revoke token: {e}")))?;

    if token.is_some() {
        audit_log(&AuditEvent::Logout {
            username,
            ip_address: extract_ip_address(&headers),
        });
    }

    Ok("Logged out successfully")
}

/// Get the authenticated username
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = MeResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(identity: AuthenticatedIdentity) -> Json<MeResponse> {
    Json(MeResponse {
        username: identity.username,
    })
}
