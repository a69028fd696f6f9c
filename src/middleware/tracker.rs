use axum::http::Request;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{error, warn};

use crate::config::{TrackerConfig, WriterConfig};
use crate::error::TrackerResult;
use crate::influx::MetricsWriter;
use crate::recorder::Recorder;
use crate::visitor::{VisitorExtractor, VisitorRecord};

/// Extractor and recorder bundled for sharing across requests.
#[derive(Clone)]
pub struct VisitorTracker {
    extractor: VisitorExtractor,
    recorder: Recorder,
}

impl VisitorTracker {
    /// Fails when the token or org is missing; never returns a partially
    /// usable tracker.
    pub fn new(config: &TrackerConfig, writer: Arc<dyn MetricsWriter>) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, Recorder::new(writer)))
    }

    /// Construct with the buffered InfluxDB writer. Requires a Tokio runtime.
    pub fn connect(config: &TrackerConfig, writer: &WriterConfig) -> TrackerResult<Self> {
        let recorder = Recorder::connect(config, writer)?;
        Ok(Self::from_parts(config, recorder))
    }

    fn from_parts(config: &TrackerConfig, recorder: Recorder) -> Self {
        if config.uses_default_salt() {
            warn!("hash_salt is left at its default value; visitor IP hashes are not secret");
        }

        Self {
            extractor: VisitorExtractor::new(&config.hash_salt),
            recorder,
        }
    }

    pub fn extractor(&self) -> &VisitorExtractor {
        &self.extractor
    }

    /// Extract and submit a visit for `request`.
    ///
    /// Panics from extraction or the writer are caught and logged here so the
    /// caller can always forward the request.
    pub fn track<B>(&self, request: &Request<B>) -> Option<VisitorRecord> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let record = self.extractor.extract(request);
            self.recorder.record(&record);
            record
        }));

        match outcome {
            Ok(record) => Some(record),
            Err(payload) => {
                error!(
                    path = %request.uri().path(),
                    panic = panic_message(payload.as_ref()),
                    "Visitor tracking panicked, request forwarded untracked"
                );
                None
            }
        }
    }

    /// Flush buffered points and stop the writer.
    pub async fn shutdown(&self) {
        self.recorder.close().await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
