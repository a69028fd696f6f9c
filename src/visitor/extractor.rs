use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::sync::Arc;

use super::ip_extractor::{header_value, resolve_client_addr};
use super::models::VisitorRecord;

/// Builds visitor records from requests.
///
/// Holds only the immutable salt, so one instance is shared by every
/// concurrent request.
#[derive(Clone)]
pub struct VisitorExtractor {
    salt: Arc<str>,
}

impl VisitorExtractor {
    pub fn new(salt: &str) -> Self {
        Self {
            salt: Arc::from(salt),
        }
    }

    /// Hash a client address with the configured salt.
    ///
    /// The digest is SHA-256 over the raw bytes of `addr` followed by the
    /// salt, rendered as 64 lowercase hex characters. Equal inputs always
    /// produce equal hashes so visitors can be de-duplicated downstream.
    pub fn hash_ip(&self, addr: impl AsRef<[u8]>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(addr.as_ref());
        hasher.update(self.salt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Extract a record from a request. Missing data degrades to empty
    /// strings; this never fails.
    pub fn extract<B>(&self, request: &Request<B>) -> VisitorRecord {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let client_addr = resolve_client_addr(request.headers(), remote_addr);

        VisitorRecord {
            ip_hash: self.hash_ip(&client_addr),
            timestamp: Utc::now(),
            domain: request_host(request),
            path: request.uri().path().to_string(),
            user_agent: header_value(request.headers(), header::USER_AGENT.as_str())
                .unwrap_or_default(),
        }
    }
}

/// Host header, or the URI authority for HTTP/2 style requests.
fn request_host<B>(request: &Request<B>) -> String {
    header_value(request.headers(), header::HOST.as_str())
        .filter(|host| !host.is_empty())
        .or_else(|| request.uri().authority().map(|a| a.as_str().to_string()))
        .unwrap_or_default()
}
