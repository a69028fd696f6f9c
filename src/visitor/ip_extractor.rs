//! Client address resolution from forwarding headers
//!
//! Headers are consulted in a fixed order and the first non-empty one wins:
//! - `X-Forwarded-For`, verbatim (a multi-hop chain is kept whole)
//! - `X-Real-Ip`
//! - `Cf-Connecting-Ip`
//!
//! When none is set the transport remote address is used as `ip:port`.
//! Nothing is parsed, normalized or decoded: the raw header bytes are only
//! ever hashed, and existing hashes downstream depend on this exact input.

use axum::http::{HeaderMap, HeaderValue};
use std::net::SocketAddr;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";
pub const CF_CONNECTING_IP: &str = "cf-connecting-ip";

const CLIENT_ADDR_HEADERS: [&str; 3] = [X_FORWARDED_FOR, X_REAL_IP, CF_CONNECTING_IP];

/// Resolve the best-effort originating client address as raw bytes.
///
/// Returns an empty buffer when no header is set and the host did not
/// supply a remote address.
pub fn resolve_client_addr(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Vec<u8> {
    CLIENT_ADDR_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .map(HeaderValue::as_bytes)
        .find(|value| !value.is_empty())
        .map(<[u8]>::to_vec)
        .or_else(|| remote_addr.map(|addr| addr.to_string().into_bytes()))
        .unwrap_or_default()
}

/// First value of `name` as text, decoded lossily so opaque bytes never drop
/// a tag.
pub(crate) fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).map(decode_header)
}

pub(crate) fn decode_header(value: &HeaderValue) -> String {
    String::from_utf8_lossy(value.as_bytes()).into_owned()
}
