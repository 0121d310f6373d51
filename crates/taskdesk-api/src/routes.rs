//! API route definitions
//!
//! Author: hephaex@gmail.com

use crate::auth::middleware::{authenticate, require_identity};
use crate::handlers::{auth, tasks};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;

/// Create the `/api` routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no identity required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler));

    // Protected routes (identity required)
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .route("/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route(
            "/tasks/:id",
            get(tasks::get_task)
                .put(tasks::update_task)
                .delete(tasks::delete_task),
        )
        .route("/tasks/:id/status", patch(tasks::update_task_status))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_identity,
        ));

    // Logout must succeed for revoked and expired tokens, so it reads the
    // bearer header itself instead of going through `authenticate`.
    let session_routes = Router::new().route("/auth/logout", post(auth::logout_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(state, authenticate))
        .merge(session_routes)
}
