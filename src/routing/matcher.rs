//! Route matching conditions.
//!
//! # Design Decisions
//! - Host matching is case-insensitive and ignores the port
//! - Path matching is case-sensitive
//! - No condition = always matches (wildcard)
//! - No regex

use axum::http::{header, Request};

/// A single condition a request must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Host header equals this value (stored lowercase).
    Host(String),
    /// Request path starts with this prefix.
    PathPrefix(String),
}

impl Matcher {
    pub fn host(host: impl Into<String>) -> Self {
        Matcher::Host(host.into().to_lowercase())
    }

    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        Matcher::PathPrefix(prefix.into())
    }

    pub fn matches<B>(&self, req: &Request<B>) -> bool {
        match self {
            Matcher::Host(expected) => request_host(req)
                .map(|h| h.eq_ignore_ascii_case(expected))
                .unwrap_or(false),
            Matcher::PathPrefix(prefix) => req.uri().path().starts_with(prefix.as_str()),
        }
    }
}

/// Host of the request without the port, from the Host header or the URI.
fn request_host<B>(req: &Request<B>) -> Option<&str> {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())?;
    if raw.ends_with(']') {
        return Some(raw);
    }
    Some(raw.rsplit_once(':').map(|(host, _)| host).unwrap_or(raw))
}
