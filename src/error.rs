use thiserror::Error;

/// Errors raised while constructing the tracker. Per-request failures are
/// never surfaced.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("influxdb_token is required")]
    MissingToken,
    #[error("influxdb_org is required")]
    MissingOrg,
    #[error("invalid influxdb_url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("failed to build InfluxDB HTTP client")]
    HttpClient(#[source] reqwest::Error),
}

pub type TrackerResult<T> = Result<T, TrackerError>;
