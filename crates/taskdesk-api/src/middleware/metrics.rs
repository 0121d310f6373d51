//! Metrics tracking middleware
//!
//! Records request count, status code and latency per route.
//!
//! Author: hephaex@gmail.com

use crate::state::AppState;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use std::time::Instant;

/// Label for requests that matched no route
const UNMATCHED: &str = "unmatched";

/// Metrics tracking middleware
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let endpoint = endpoint_label(&request);

    let response = next.run(request).await;

    state
        .metrics
        .record_request(&endpoint, response.status().as_u16(), start.elapsed());

    response
}

/// Route template such as `/api/tasks/:id`
///
/// Labels come only from the router's own templates, so clients cannot
/// create new series by inventing paths.
fn endpoint_label(request: &Request) -> String {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED.to_string())
}
