//! Visitor record to backend point conversion and submission

use std::sync::Arc;

use crate::config::{TrackerConfig, WriterConfig};
use crate::error::TrackerResult;
use crate::influx::{InfluxWriter, MetricsWriter, Point};
use crate::visitor::VisitorRecord;

pub const MEASUREMENT: &str = "visitor_tracking";
pub const VISIT_COUNT_FIELD: &str = "visit_count";

impl From<&VisitorRecord> for Point {
    fn from(record: &VisitorRecord) -> Self {
        Point::new(MEASUREMENT, record.timestamp)
            .tag("domain", record.domain.as_str())
            .tag("path", record.path.as_str())
            .tag("ip_hash", record.ip_hash.as_str())
            .tag("user_agent", record.user_agent.as_str())
            .field(VISIT_COUNT_FIELD, 1i64)
    }
}

/// Hands visitor records to the shared backend writer.
#[derive(Clone)]
pub struct Recorder {
    writer: Arc<dyn MetricsWriter>,
}

impl Recorder {
    pub fn new(writer: Arc<dyn MetricsWriter>) -> Self {
        Self { writer }
    }

    /// Build an [`InfluxWriter`] from config. Fails when the token or org is
    /// missing.
    pub fn connect(config: &TrackerConfig, writer: &WriterConfig) -> TrackerResult<Self> {
        let writer = InfluxWriter::new(config, writer)?;
        Ok(Self::new(Arc::new(writer)))
    }

    /// Submit one visit. Returns as soon as the point is enqueued.
    pub fn record(&self, record: &VisitorRecord) {
        self.writer.write_point(Point::from(record));
    }

    /// Flush and stop the underlying writer.
    pub async fn close(&self) {
        self.writer.close().await;
    }
}
