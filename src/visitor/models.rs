//! Data models for visitor tracking

use chrono::{DateTime, Utc};

/// A single observed request, with the client address replaced by its
/// salted hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitorRecord {
    /// Lowercase hex SHA-256 of the client address and salt
    pub ip_hash: String,

    /// When the request was observed
    pub timestamp: DateTime<Utc>,

    /// Host the request targeted, as presented by the client
    pub domain: String,

    /// URI path, without query string
    pub path: String,

    /// Raw `User-Agent` value, empty when absent
    pub user_agent: String,
}
