//! Input validation for upstream calls
//!
//! Provides SSRF protection for configured upstream base URLs and checks
//! for the `owner`/`name` path segments interpolated into registry URLs.

use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Longest accepted owner or model name
pub const MAX_SEGMENT_LENGTH: usize = 100;

/// Security-related errors
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("URL scheme '{0}' is not allowed, only HTTPS is permitted")]
    InvalidScheme(String),

    #[error("Host '{0}' is blocked: internal/private IP addresses are not allowed")]
    BlockedHost(String),

    #[error("URL must have a host")]
    MissingHost,

    #[error("Invalid model path segment '{0}'")]
    InvalidSegment(String),
}

/// Hostnames that never make sense as an upstream API
const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "ip6-localhost",
    "ip6-loopback",
    // Cloud metadata services
    "metadata.google.internal",
    "metadata.goog",
];

/// Validate a configured upstream base URL
///
/// With `allow_insecure` unset, only HTTPS URLs pointing at public hosts
/// pass. Setting it admits plain HTTP, loopback and private addresses, which
/// is what local mocks and tests need. Link-local addresses (cloud metadata
/// endpoints) are rejected either way.
pub fn validate_upstream_url(url_str: &str, allow_insecure: bool) -> Result<Url, SecurityError> {
    let url = Url::parse(url_str)?;

    match url.scheme() {
        "https" => {}
        "http" if allow_insecure => {}
        scheme => return Err(SecurityError::InvalidScheme(scheme.to_string())),
    }

    let host = url.host_str().ok_or(SecurityError::MissingHost)?;
    let bare_host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = bare_host.parse::<IpAddr>() {
        if is_link_local(&ip) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }
        if !allow_insecure && (ip.is_loopback() || is_private_ip(&ip)) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }
    } else if !allow_insecure {
        let host_lower = host.to_lowercase();
        for blocked in BLOCKED_HOSTNAMES {
            if host_lower == *blocked || host_lower.ends_with(&format!(".{}", blocked)) {
                return Err(SecurityError::BlockedHost(host.to_string()));
            }
        }
    }

    Ok(url)
}

/// Validate an owner or model name taken from a request path
///
/// Registry identifiers are made of ASCII letters, digits, `-`, `_` and `.`.
pub fn validate_model_segment(segment: &str) -> Result<&str, SecurityError> {
    let well_formed = !segment.is_empty()
        && segment.len() <= MAX_SEGMENT_LENGTH
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if well_formed {
        Ok(segment)
    } else {
        Err(SecurityError::InvalidSegment(segment.to_string()))
    }
}

/// RFC 1918, carrier-grade NAT, "this network" and IPv6 unique local ranges
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_private() || (octets[0] == 100 && (octets[1] & 0xC0) == 64) || octets[0] == 0
        }
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// 169.254.0.0/16 and fe80::/10
fn is_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.octets()[0] == 169 && v4.octets()[1] == 254,
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}
