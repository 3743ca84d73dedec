//! Visitor fingerprinting
//!
//! Collapses `(client IP, user agent)` into an opaque SHA-256 digest so that
//! unique-visitor counts never require persisting a raw IP. The hash is
//! deterministic per visitor and not reversible.

use sha2::{Digest, Sha256};

/// Derive the stable visitor hash for a request.
///
/// Returns `None` when no client IP is available: a fingerprint without any
/// stable identity source is not meaningful. The user agent participates in
/// the digest but is optional.
pub fn visitor_hash(ip: Option<&str>, user_agent: Option<&str>) -> Option<String> {
    let ip = match ip {
        Some(ip) if !ip.is_empty() => ip,
        _ => return None,
    };

    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hasher.update(b"|");
    hasher.update(user_agent.unwrap_or("").as_bytes());

    Some(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_without_ip() {
        assert_eq!(visitor_hash(None, Some("Mozilla/5.0")), None);
        assert_eq!(visitor_hash(None, None), None);
        assert_eq!(visitor_hash(Some(""), Some("Mozilla/5.0")), None);
    }

    #[test]
    fn test_deterministic() {
        let a = visitor_hash(Some("192.168.1.100"), Some("Mozilla/5.0"));
        let b = visitor_hash(Some("192.168.1.100"), Some("Mozilla/5.0"));
        assert!(a.is_some());
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_length() {
        let hash = visitor_hash(Some("203.0.113.7"), None).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_ip_changes_hash() {
        let a = visitor_hash(Some("192.168.1.100"), Some("Mozilla/5.0"));
        let b = visitor_hash(Some("192.168.1.101"), Some("Mozilla/5.0"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_user_agent_changes_hash() {
        let a = visitor_hash(Some("192.168.1.100"), Some("Mozilla/5.0"));
        let b = visitor_hash(Some("192.168.1.100"), Some("Chrome/120.0"));
        let c = visitor_hash(Some("192.168.1.100"), None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }
}
