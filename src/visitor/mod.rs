//! Visitor record extraction
//!
//! Turns an inbound request into a [`VisitorRecord`]: the client address is
//! resolved from forwarding headers, hashed with a process-wide salt, and
//! stamped with the observation time. Extraction never fails.

pub mod extractor;
pub mod ip_extractor;
pub mod models;

pub use extractor::VisitorExtractor;
pub use ip_extractor::resolve_client_addr;
pub use models::VisitorRecord;
