/// Authentication middleware for API routes
///
/// `authenticate` runs on every API request. A request without a bearer
/// token passes through untouched; a request with one either gains an
/// `AuthenticatedIdentity` in its extensions or is rejected with 401.
/// `require_identity` is the path policy for protected routes, and handlers
/// take the identity as an explicit `AuthenticatedIdentity` argument.
use super::service::AuthError;
use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::fmt;
use std::sync::Arc;

/// Caller identity attached to a request after its token verified
///
/// Lives only as long as the request.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    /// Token subject
    pub username: String,
    /// The bearer token that authenticated this request
    pub token: String,
}

impl fmt::Debug for AuthenticatedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedIdentity")
            .field("username", &self.username)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedIdentity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        AppError::from(self).into_response()
    }
}

/// Token carried by a `Bearer ` authorization header
///
/// The scheme prefix is case-sensitive. Non-UTF-8 headers and other schemes
/// count as no token at all.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Authentication middleware
///
/// 1. No bearer token: continue without an identity
/// 2. Token revoked: 401
/// 3. Token fails verification: 401
/// 4. Otherwise attach `AuthenticatedIdentity` and continue
///
/// A revocation store failure also rejects the request.
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use taskdesk_api::auth::middleware::authenticate;
///
/// let app = Router::new()
///     .route("/api/auth/me", get(me_handler))
///     .layer(middleware::from_fn_with_state(state.clone(), authenticate))
///     .with_state(state);
/// ```
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return Ok(next.run(request).await);
    };

    match state.auth.authenticate(&token).await {
        Ok(claims) => {
            request.extensions_mut().insert(AuthenticatedIdentity {
                username: claims.sub,
                token,
            });
            Ok(next.run(request).await)
        }
        Err(e) => {
            if let AuthError::RevocationUnavailable(ref cause) = e {
                tracing::error!(error = %cause, "Revocation lookup failed, rejecting request");
            }

            state.metrics.record_auth_rejection(e.reason());
            audit_log(&AuditEvent::InvalidToken {
                reason: e.reason().to_string(),
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            Err(e)
        }
    }
}

/// Path policy for protected routes: reject requests without an identity
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if request.extensions().get::<AuthenticatedIdentity>().is_none() {
        state.metrics.record_auth_rejection("missing_token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{SigningKey, TokenCodec};
    use axum::{http::StatusCode, middleware, routing::get, Router};
    use std::time::Duration;
    use taskdesk_core::config::AppConfig;
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        let codec = TokenCodec::new(
            SigningKey::from_secret(b"middleware-test-secret-0123456789abc"),
            "taskdesk",
            Duration::from_secs(3600),
        );
        Arc::new(AppState::in_memory(AppConfig::default(), Arc::new(codec)).unwrap())
    }

    async fn whoami(identity: Option<AuthenticatedIdentity>) -> String {
        identity
            .map(|id| id.username)
            .unwrap_or_else(|| "anonymous".to_string())
    }

    async fn protected(identity: AuthenticatedIdentity) -> String {
        identity.username
    }

    fn app(state: Arc<AppState>) -> Router {
        let protected_routes = Router::new()
            .route("/protected", get(protected))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_identity,
            ));

        Router::new()
            .route("/open", get(whoami))
            .merge(protected_routes)
            .layer(middleware::from_fn_with_state(state.clone(), authenticate))
            .with_state(state)
    }

    fn request(uri: &str, authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert(header::AUTHORIZATION, "bearer abc.def".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwdw==".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_no_header_passes_through_without_identity() {
        let response = app(test_state())
            .oneshot(request("/open", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_other_scheme_passes_through_without_identity() {
        let response = app(test_state())
            .oneshot(request("/open", Some("Basic dXNlcjpwdw==")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_valid_token_attaches_identity() {
        let state = test_state();
        let token = state.auth.codec().issue_session("alice").unwrap();

        let response = app(state)
            .oneshot(request("/protected", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "alice");
    }

    #[tokio::test]
    async fn test_invalid_token_rejected_even_on_open_route() {
        let response = app(test_state())
            .oneshot(request("/open", Some("Bearer not-a-token")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_revoked_token_rejected() {
        let state = test_state();
        let token = state.auth.codec().issue_session("alice").unwrap();
        state.auth.logout(Some(&token)).await.unwrap();

        let response = app(state)
            .oneshot(request("/protected", Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_requires_identity() {
        let response = app(test_state())
            .oneshot(request("/protected", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rejections_are_counted_by_reason() {
        let state = test_state();
        let expired = state
            .auth
            .codec()
            .issue_at("alice", Duration::from_secs(1), 1_000)
            .unwrap();

        let response = app(state.clone())
            .oneshot(request("/open", Some(&format!("Bearer {expired}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let metrics = state.metrics.render().unwrap();
        assert!(metrics.contains("taskdesk_auth_rejections_total{reason=\"expired\"} 1"));
    }

    #[test]
    fn test_identity_debug_hides_token() {
        let identity = AuthenticatedIdentity {
            username: "alice".to_string(),
            token: "secret.token.value".to_string(),
        };
        let debug = format!("{identity:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("secret.token.value"));
    }
}
