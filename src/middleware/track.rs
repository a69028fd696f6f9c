use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use std::sync::Arc;

use super::tracker::VisitorTracker;

/// `axum::middleware::from_fn_with_state` flavour of [`super::VisitorTrackerLayer`].
pub async fn track_visitor(
    State(tracker): State<Arc<VisitorTracker>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    tracker.track(&request);
    next.run(request).await
}
