//! Cache key derivation.
//!
//! # Responsibilities
//! - Describe the routing-relevant parts of a request ([`RequestDescriptor`])
//! - Hold caller-supplied route values ([`RouteValues`])
//! - Derive stable, namespaced digests for both
//!
//! # Design Decisions
//! - Mapping inputs are canonicalized by sorting keys, recursively
//! - Every value is written with a type tag and a length prefix
//! - SHA-256 so keys stay collision-free in a shared store
//! - Match and resolve keys carry different prefixes and digest domains

use std::collections::HashMap;
use std::fmt;

use axum::http::{header, Request};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::cache::error::CacheError;

const KEY_PREFIX: &str = "route-cache";

/// Which of the two cache key spaces a key belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Match,
    Resolve,
}

impl KeyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Match => "match",
            KeyKind::Resolve => "resolve",
        }
    }

    fn domain(&self) -> &'static [u8] {
        match self {
            KeyKind::Match => b"route-cache/match/v1\0",
            KeyKind::Resolve => b"route-cache/resolve/v1\0",
        }
    }
}

/// A derived cache key, e.g. `route-cache:match:9f86d0...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    kind: KeyKind,
    key: String,
}

impl CacheKey {
    fn from_canonical(kind: KeyKind, canonical: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(kind.domain());
        hasher.update(canonical);
        let digest = hex::encode(hasher.finalize());

        Self {
            kind,
            key: format!("{}:{}:{}", KEY_PREFIX, kind.as_str(), digest),
        }
    }

    #[inline]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// The routing-relevant subset of an inbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    path: String,
    host: Option<String>,
    method: Option<String>,
}

impl RequestDescriptor {
    /// Create a descriptor for a path. Host and method are unset.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: None,
            method: None,
        }
    }

    /// Set the host. Hosts are compared case-insensitively and any port is
    /// stripped.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = Some(strip_port(&host).to_ascii_lowercase());
        self
    }

    /// Set the request method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into().to_ascii_uppercase());
        self
    }

    /// Build a descriptor from an HTTP request.
    ///
    /// The host comes from the `Host` header, falling back to the URI
    /// authority; any port is stripped.
    pub fn from_request<B>(req: &Request<B>) -> Self {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .or_else(|| req.uri().host());

        let mut descriptor = Self::new(req.uri().path()).with_method(req.method().as_str());
        if let Some(host) = host {
            descriptor = descriptor.with_host(host);
        }
        descriptor
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Derive the Match Key.
    ///
    /// A single trailing slash is ignored, as it is when matching.
    pub fn cache_key(&self) -> Result<CacheKey, CacheError> {
        if self.path.is_empty() {
            return Err(CacheError::InvalidInput("request path is empty".into()));
        }
        if !self.path.starts_with('/') {
            return Err(CacheError::InvalidInput(format!(
                "request path must start with '/': {:?}",
                self.path
            )));
        }

        let path = match self.path.strip_suffix('/') {
            Some(trimmed) if !trimmed.is_empty() => trimmed,
            _ => self.path.as_str(),
        };

        let mut buf = Vec::with_capacity(path.len() + 32);
        write_str(&mut buf, path);
        write_opt_str(&mut buf, self.host.as_deref());
        write_opt_str(&mut buf, self.method.as_deref());

        Ok(CacheKey::from_canonical(KeyKind::Match, &buf))
    }
}

/// Route parameters supplied by a caller that wants a URI.
///
/// Insertion order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteValues {
    values: HashMap<String, Value>,
}

impl RouteValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any earlier value for the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Builder-style [`RouteValues::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Derive the Resolve Key.
    pub fn cache_key(&self) -> Result<CacheKey, CacheError> {
        if self.values.keys().any(|k| k.is_empty()) {
            return Err(CacheError::InvalidInput(
                "route value with an empty parameter name".into(),
            ));
        }

        let mut entries: Vec<(&String, &Value)> = self.values.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        let mut buf = Vec::with_capacity(64);
        write_len(&mut buf, entries.len());
        for (name, value) in entries {
            write_str(&mut buf, name);
            write_value(&mut buf, value);
        }

        Ok(CacheKey::from_canonical(KeyKind::Resolve, &buf))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RouteValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn write_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u64).to_be_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_len(buf, s.len());
    buf.extend_from_slice(s.as_bytes());
}

fn write_opt_str(buf: &mut Vec<u8>, s: Option<&str>) {
    match s {
        Some(s) => {
            buf.push(1);
            write_str(buf, s);
        }
        None => buf.push(0),
    }
}

fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(b'n'),
        Value::Bool(b) => {
            buf.push(b'b');
            buf.push(u8::from(*b));
        }
        Value::Number(n) => {
            buf.push(b'd');
            write_str(buf, &n.to_string());
        }
        Value::String(s) => {
            buf.push(b's');
            write_str(buf, s);
        }
        Value::Array(items) => {
            buf.push(b'a');
            write_len(buf, items.len());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Object(map) => {
            buf.push(b'o');
            let mut fields: Vec<(&String, &Value)> = map.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            write_len(buf, fields.len());
            for (name, item) in fields {
                write_str(buf, name);
                write_value(buf, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_key_ignores_insertion_order() {
        let a = RouteValues::new()
            .with("controller", "blog")
            .with("action", "show")
            .with("slug", "hello");
        let b = RouteValues::new()
            .with("slug", "hello")
            .with("controller", "blog")
            .with("action", "show");

        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());
    }

    #[test]
    fn test_nested_objects_are_canonicalized() {
        let a = RouteValues::new().with("filter", json!({"tag": "rust", "year": 2020}));
        let b = RouteValues::new().with("filter", json!({"year": 2020, "tag": "rust"}));
        assert_eq!(a.cache_key().unwrap(), b.cache_key().unwrap());

        let c = RouteValues::new().with("filter", json!({"year": "2020", "tag": "rust"}));
        assert_ne!(a.cache_key().unwrap(), c.cache_key().unwrap());
    }

    #[test]
    fn test_values_are_type_tagged() {
        let number = RouteValues::new().with("page", 2);
        let string = RouteValues::new().with("page", "2");
        assert_ne!(number.cache_key().unwrap(), string.cache_key().unwrap());
    }

    #[test]
    fn test_match_key_depends_on_host_and_method() {
        let plain = RequestDescriptor::new("/blog").cache_key().unwrap();
        let host = RequestDescriptor::new("/blog").with_host("EXAMPLE.com").cache_key().unwrap();
        let host_lower = RequestDescriptor::new("/blog").with_host("example.com").cache_key().unwrap();
        let get = RequestDescriptor::new("/blog").with_method("get").cache_key().unwrap();

        assert_ne!(plain, host);
        assert_ne!(plain, get);
        assert_eq!(host, host_lower);
    }

    #[test]
    fn test_trailing_slash_shares_a_key() {
        let bare = RequestDescriptor::new("/blog/hello").cache_key().unwrap();
        let slashed = RequestDescriptor::new("/blog/hello/").cache_key().unwrap();
        assert_eq!(bare, slashed);

        let root = RequestDescriptor::new("/").cache_key().unwrap();
        assert_ne!(root, bare);
    }

    #[test]
    fn test_host_port_is_stripped() {
        let plain = RequestDescriptor::new("/").with_host("example.com");
        let with_port = RequestDescriptor::new("/").with_host("Example.com:8080");

        assert_eq!(with_port.host(), Some("example.com"));
        assert_eq!(plain.cache_key().unwrap(), with_port.cache_key().unwrap());
        assert_eq!(RequestDescriptor::new("/").with_host("[::1]:443").host(), Some("[::1]"));
    }

    #[test]
    fn test_key_spaces_are_disjoint() {
        let m = RequestDescriptor::new("/").cache_key().unwrap();
        let r = RouteValues::new().cache_key().unwrap();

        assert_eq!(m.kind(), KeyKind::Match);
        assert_eq!(r.kind(), KeyKind::Resolve);
        assert!(m.as_str().starts_with("route-cache:match:"));
        assert!(r.as_str().starts_with("route-cache:resolve:"));
        assert_ne!(m.as_str(), r.as_str());
    }

    #[test]
    fn test_invalid_input_is_rejected() {
        assert!(matches!(
            RequestDescriptor::new("").cache_key(),
            Err(CacheError::InvalidInput(_))
        ));
        assert!(matches!(
            RequestDescriptor::new("blog/hello").cache_key(),
            Err(CacheError::InvalidInput(_))
        ));
        assert!(matches!(
            RouteValues::new().with("", "x").cache_key(),
            Err(CacheError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_descriptor_from_request() {
        let req = Request::builder()
            .method("get")
            .uri("http://ignored.test/blog/2020/hello?page=2")
            .header("Host", "Example.COM:8080")
            .body(())
            .unwrap();

        let d = RequestDescriptor::from_request(&req);
        assert_eq!(d.path(), "/blog/2020/hello");
        assert_eq!(d.host(), Some("example.com"));
        assert_eq!(d.method(), Some("GET"));
    }
}
