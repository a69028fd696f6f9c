use axum::http::Request;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use super::tracker::VisitorTracker;

/// Layer that records a visitor point for every request passing through.
#[derive(Clone)]
pub struct VisitorTrackerLayer {
    tracker: Arc<VisitorTracker>,
}

impl VisitorTrackerLayer {
    pub fn new(tracker: Arc<VisitorTracker>) -> Self {
        Self { tracker }
    }

    pub fn tracker(&self) -> &Arc<VisitorTracker> {
        &self.tracker
    }
}

impl<S> Layer<S> for VisitorTrackerLayer {
    type Service = TrackVisitors<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TrackVisitors {
            inner,
            tracker: Arc::clone(&self.tracker),
        }
    }
}

/// Service produced by [`VisitorTrackerLayer`]. Responses and errors of the
/// inner service pass through unchanged.
#[derive(Clone)]
pub struct TrackVisitors<S> {
    inner: S,
    tracker: Arc<VisitorTracker>,
}

impl<S, B> Service<Request<B>> for TrackVisitors<S>
where
    S: Service<Request<B>>,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        self.tracker.track(&request);
        self.inner.call(request)
    }
}
