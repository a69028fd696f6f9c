use async_trait::async_trait;

use super::point::Point;

/// Write side of a time-series backend.
///
/// Submission is fire-and-forget: implementations buffer the point and return
/// immediately. Delivery failures are handled (logged, dropped) inside the
/// implementation and never reach the caller.
#[async_trait]
pub trait MetricsWriter: Send + Sync {
    /// Enqueue a point for delivery. Must not block.
    fn write_point(&self, point: Point);

    /// Flush whatever is buffered and stop background work.
    async fn close(&self);
}
