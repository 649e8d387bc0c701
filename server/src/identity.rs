// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright 2025 The codgate authors.

//! Visitor identity: which block keys apply to a request.
//!
//! A visitor is recognised by up to three independent keys: the client IP,
//! the cookie identifier we issued, and a client-computed fingerprint. Each
//! raw value is normalised and validated here so that nothing attacker
//! shaped reaches the store unchecked.

use std::fmt;
use std::net::IpAddr;

use percent_encoding::percent_decode_str;

pub const MIN_COOKIE_ID_LEN: usize = 6;
pub const MAX_COOKIE_ID_LEN: usize = 128;
pub const MIN_FINGERPRINT_LEN: usize = 10;
pub const MAX_FINGERPRINT_LEN: usize = 512;

/// Dimension a block key belongs to. Declaration order is lookup priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlockKind {
    Ip,
    Cookie,
    Fingerprint,
}

impl BlockKind {
    /// Wire and storage tag. Tags never contain ':'.
    pub fn tag(self) -> &'static str {
        match self {
            BlockKind::Ip => "ip",
            BlockKind::Cookie => "cid",
            BlockKind::Fingerprint => "fp",
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A namespaced block key.
///
/// The storage form is `tag ":" value`. Because no tag contains ':', the
/// first ':' always ends the tag, so two different keys can never share a
/// storage form even when the value itself contains ':' (IPv6).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockKey {
    kind: BlockKind,
    value: String,
}

impl BlockKey {
    pub fn new(kind: BlockKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn ip(addr: IpAddr) -> Self {
        Self::new(BlockKind::Ip, normalize_ip(addr).to_string())
    }

    pub fn kind(&self) -> BlockKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.kind.tag(), self.value)
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.tag(), self.value)
    }
}

/// Validated identity of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub ip: Option<IpAddr>,
    pub cookie_id: Option<String>,
    pub fingerprint: Option<String>,
}

impl Identity {
    /// Keys in lookup priority order: ip, cookie, fingerprint.
    pub fn keys(&self) -> Vec<BlockKey> {
        let mut keys = Vec::with_capacity(3);
        if let Some(ip) = self.ip {
            keys.push(BlockKey::ip(ip));
        }
        if let Some(cid) = &self.cookie_id {
            keys.push(BlockKey::new(BlockKind::Cookie, cid.as_str()));
        }
        if let Some(fp) = &self.fingerprint {
            keys.push(BlockKey::new(BlockKind::Fingerprint, fp.as_str()));
        }
        keys
    }

    pub fn is_empty(&self) -> bool {
        self.ip.is_none() && self.cookie_id.is_none() && self.fingerprint.is_none()
    }
}

/// Folds IPv4-mapped IPv6 (`::ffff:a.b.c.d`) back to plain IPv4.
pub fn normalize_ip(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
        v4 => v4,
    }
}

/// Parses one address as it appears in `X-Forwarded-For`. Bracketed IPv6
/// (`[2001:db8::1]`) is accepted.
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    let raw = raw
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(raw);
    raw.parse::<IpAddr>().ok().map(normalize_ip)
}

/// Lowercase hex, 6..=128 characters. Rejects anything that could smuggle a
/// separator or whitespace into a store key.
pub fn is_valid_cookie_id(value: &str) -> bool {
    (MIN_COOKIE_ID_LEN..=MAX_COOKIE_ID_LEN).contains(&value.len())
        && value.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

pub fn is_valid_fingerprint(value: &str) -> bool {
    (MIN_FINGERPRINT_LEN..=MAX_FINGERPRINT_LEN).contains(&value.chars().count())
}

/// Value of cookie `name` from a `Cookie:` header. The first occurrence
/// wins; values are percent-decoded.
pub fn parse_cookie_header(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| percent_decode_str(v.trim()).decode_utf8_lossy().into_owned())
}

/// Turns raw request inputs into an [`Identity`].
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    trust_forwarded_for: bool,
}

impl IdentityResolver {
    /// `trust_forwarded_for` should only be set behind a reverse proxy that
    /// overwrites `X-Forwarded-For`.
    pub fn new(trust_forwarded_for: bool) -> Self {
        Self { trust_forwarded_for }
    }

    pub fn resolve(
        &self,
        peer: Option<IpAddr>,
        forwarded_for: Option<&str>,
        cookie_id: Option<&str>,
        fingerprint: Option<&str>,
    ) -> Identity {
        Identity {
            ip: self.client_ip(peer, forwarded_for),
            cookie_id: cookie_id.filter(|c| is_valid_cookie_id(c)).map(str::to_owned),
            fingerprint: fingerprint.filter(|f| is_valid_fingerprint(f)).map(str::to_owned),
        }
    }

    fn client_ip(&self, peer: Option<IpAddr>, forwarded_for: Option<&str>) -> Option<IpAddr> {
        let forwarded = forwarded_for
            .filter(|_| self.trust_forwarded_for)
            .and_then(|h| h.split(',').next())
            .and_then(parse_ip);
        forwarded.or_else(|| peer.map(normalize_ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn v4(a: u8, b: u8, c: u8, d: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(a, b, c, d))
    }

    #[test]
    fn forwarded_for_wins_when_trusted() {
        let resolver = IdentityResolver::new(true);
        let id = resolver.resolve(Some(v4(10, 0, 0, 1)), Some("203.0.113.7, 10.0.0.1"), None, None);
        assert_eq!(id.ip, Some(v4(203, 0, 113, 7)));
    }

    #[test]
    fn forwarded_for_ignored_when_untrusted() {
        let resolver = IdentityResolver::new(false);
        let id = resolver.resolve(Some(v4(10, 0, 0, 1)), Some("203.0.113.7"), None, None);
        assert_eq!(id.ip, Some(v4(10, 0, 0, 1)));
    }

    #[test]
    fn garbage_forwarded_for_falls_back_to_peer() {
        let resolver = IdentityResolver::new(true);
        let id = resolver.resolve(Some(v4(10, 0, 0, 1)), Some("unknown"), None, None);
        assert_eq!(id.ip, Some(v4(10, 0, 0, 1)));

        let id = resolver.resolve(None, Some("unknown"), None, None);
        assert_eq!(id.ip, None);
    }

    #[test]
    fn mapped_ipv6_becomes_ipv4() {
        let mapped = IpAddr::V6(Ipv4Addr::new(1, 2, 3, 4).to_ipv6_mapped());
        let resolver = IdentityResolver::new(true);
        assert_eq!(resolver.resolve(Some(mapped), None, None, None).ip, Some(v4(1, 2, 3, 4)));
        assert_eq!(parse_ip("::ffff:1.2.3.4"), Some(v4(1, 2, 3, 4)));
        assert_eq!(BlockKey::ip(mapped), BlockKey::ip(v4(1, 2, 3, 4)));

        let native = IpAddr::V6(Ipv6Addr::LOCALHOST);
        assert_eq!(normalize_ip(native), native);
        assert_eq!(parse_ip("[2001:db8::1]"), "2001:db8::1".parse().ok());
    }

    #[test]
    fn cookie_ids_must_be_lowercase_hex() {
        assert!(is_valid_cookie_id("abc123"));
        assert!(is_valid_cookie_id(&"f".repeat(32)));
        assert!(!is_valid_cookie_id("abc12"));
        assert!(!is_valid_cookie_id("ABC123"));
        assert!(!is_valid_cookie_id("abc123:ip"));
        assert!(!is_valid_cookie_id("abc 123"));
        assert!(!is_valid_cookie_id(&"a".repeat(MAX_COOKIE_ID_LEN + 1)));
    }

    #[test]
    fn short_fingerprints_are_dropped() {
        let resolver = IdentityResolver::new(true);
        assert_eq!(resolver.resolve(None, None, None, Some("short")).fingerprint, None);
        assert_eq!(
            resolver.resolve(None, None, None, Some("0123456789")).fingerprint.as_deref(),
            Some("0123456789")
        );
        let huge = "x".repeat(MAX_FINGERPRINT_LEN + 1);
        assert_eq!(resolver.resolve(None, None, None, Some(&huge)).fingerprint, None);
    }

    #[test]
    fn keys_come_out_in_priority_order() {
        let id = Identity {
            ip: Some(v4(1, 2, 3, 4)),
            cookie_id: Some("abc123".into()),
            fingerprint: Some("fingerprint-xyz".into()),
        };
        let keys: Vec<String> = id.keys().iter().map(BlockKey::storage_key).collect();
        assert_eq!(keys, ["ip:1.2.3.4", "cid:abc123", "fp:fingerprint-xyz"]);
        assert!(Identity::default().is_empty());
        assert!(Identity::default().keys().is_empty());
    }

    #[test]
    fn namespaces_never_collide() {
        let ip = BlockKey::new(BlockKind::Ip, "1234567890");
        let fp = BlockKey::new(BlockKind::Fingerprint, "1234567890");
        assert_ne!(ip, fp);
        assert_ne!(ip.storage_key(), fp.storage_key());

        let v6 = BlockKey::ip("2001:db8::1".parse().unwrap());
        assert_eq!(v6.storage_key(), "ip:2001:db8::1");
        let colon_cookie = BlockKey::new(BlockKind::Cookie, "ip:2001:db8::1");
        assert_ne!(v6.storage_key(), colon_cookie.storage_key());
    }

    #[test]
    fn cookie_header_parsing() {
        let header = "theme=dark; codgate_cid=abc123%64; other=1; codgate_cid=second";
        assert_eq!(parse_cookie_header(header, "codgate_cid").as_deref(), Some("abc123d"));
        assert_eq!(parse_cookie_header(header, "missing"), None);
        assert_eq!(parse_cookie_header("", "codgate_cid"), None);
        assert_eq!(parse_cookie_header("a=b=c", "a").as_deref(), Some("b=c"));
    }
}
