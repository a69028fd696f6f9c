//! InfluxDB v2 write path
//!
//! [`Point`] models a single measurement, [`MetricsWriter`] is the seam the
//! recorder submits through, and [`InfluxWriter`] is the buffered HTTP
//! implementation used in production.

pub mod point;
pub mod trait_def;
pub mod writer;

pub use point::{FieldValue, Point};
pub use trait_def::MetricsWriter;
pub use writer::{InfluxWriter, WriteClient, WriteError};
