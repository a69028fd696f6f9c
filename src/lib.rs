pub mod config;
pub mod error;
pub mod influx;
pub mod middleware;
pub mod recorder;
pub mod visitor;

pub use crate::config::{Settings, TrackerConfig, WriterConfig};
pub use error::TrackerError;
pub use middleware::{track_visitor, VisitorTracker, VisitorTrackerLayer};
pub use visitor::VisitorRecord;
