//! Request-path integration
//!
//! [`VisitorTrackerLayer`] wraps any `tower::Service` over `http::Request`.
//! [`track_visitor`] does the same for `axum::middleware::from_fn_with_state`.
//! Both record the visit first and then call the next service exactly once
//! with the untouched request.

pub mod layer;
pub mod track;
pub mod tracker;

pub use layer::{TrackVisitors, VisitorTrackerLayer};
pub use track::track_visitor;
pub use tracker::VisitorTracker;
