//! Route matching logic.
//!
//! # Responsibilities
//! - Match host (exact match, case-insensitive)
//! - Match request method
//! - Match and expand URI patterns (`/blog/{year}/{slug}`)
//! - Combine conditions with AND semantics
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - Empty condition = always matches (wildcard)
//! - No regex; patterns are compared segment by segment

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::cache::key::RequestDescriptor;

/// Trait for matching request descriptors against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &RequestDescriptor) -> bool;
}

/// Matches the request host.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: String,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            expected_host: host.into().to_lowercase(),
        }
    }
}

impl Matcher for HostMatcher {
    fn matches(&self, req: &RequestDescriptor) -> bool {
        req.host()
            .map(|h| h.eq_ignore_ascii_case(&self.expected_host))
            .unwrap_or(false)
    }
}

/// Matches one of a set of request methods.
///
/// A descriptor without a method is accepted.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<String>,
}

impl MethodMatcher {
    pub fn new<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            methods: methods.into_iter().map(|m| m.into().to_uppercase()).collect(),
        }
    }
}

impl Matcher for MethodMatcher {
    fn matches(&self, req: &RequestDescriptor) -> bool {
        match req.method() {
            Some(method) => self.methods.iter().any(|m| m == method),
            None => true,
        }
    }
}

/// Combines multiple matchers with AND semantics.
#[derive(Debug, Default)]
pub struct AndMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AndMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }
}

impl Matcher for AndMatcher {
    fn matches(&self, req: &RequestDescriptor) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// A single segment of a URI pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Static(String),
    Param(String),
}

/// Errors found while parsing a URI pattern.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("pattern must start with '/': {0:?}")]
    MissingLeadingSlash(String),
    #[error("empty segment in pattern {0:?}")]
    EmptySegment(String),
    #[error("malformed placeholder {segment:?} in pattern {pattern:?}")]
    MalformedPlaceholder { pattern: String, segment: String },
    #[error("placeholder {name:?} appears twice in pattern {pattern:?}")]
    DuplicatePlaceholder { pattern: String, name: String },
}

/// A compiled URI pattern such as `/blog/{year}/{slug}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriPattern {
    source: String,
    segments: Vec<Segment>,
}

impl UriPattern {
    /// Parse a pattern. `/` alone is the root pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| PatternError::MissingLeadingSlash(pattern.to_string()))?;

        let mut segments = Vec::new();
        let mut seen = HashSet::new();
        if !rest.is_empty() {
            for raw in rest.split('/') {
                if raw.is_empty() {
                    return Err(PatternError::EmptySegment(pattern.to_string()));
                }
                let segment = match raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
                    Some(name) => {
                        if name.is_empty() || name.contains(is_brace) {
                            return Err(PatternError::MalformedPlaceholder {
                                pattern: pattern.to_string(),
                                segment: raw.to_string(),
                            });
                        }
                        if !seen.insert(name.to_string()) {
                            return Err(PatternError::DuplicatePlaceholder {
                                pattern: pattern.to_string(),
                                name: name.to_string(),
                            });
                        }
                        Segment::Param(name.to_string())
                    }
                    None if raw.contains(is_brace) => {
                        return Err(PatternError::MalformedPlaceholder {
                            pattern: pattern.to_string(),
                            segment: raw.to_string(),
                        });
                    }
                    None => Segment::Static(raw.to_string()),
                };
                segments.push(segment);
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names of the placeholders, in pattern order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Static(_) => None,
        })
    }

    pub fn has_param(&self, name: &str) -> bool {
        self.params().any(|p| p == name)
    }

    /// Match a request path, returning the captured placeholder values.
    ///
    /// A single trailing slash on the path is ignored.
    pub fn match_path(&self, path: &str) -> Option<Map<String, Value>> {
        let rest = path.strip_prefix('/')?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captured = Map::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(expected) if expected == part => {}
                Segment::Static(_) => return None,
                Segment::Param(_) if part.is_empty() => return None,
                Segment::Param(name) => {
                    captured.insert(name.clone(), Value::String(part.to_string()));
                }
            }
        }
        Some(captured)
    }

    /// Expand the pattern using `lookup` for placeholder values.
    ///
    /// Returns `Ok(None)` when a placeholder has no value or its value would
    /// not stay a single segment (empty, or containing `/`, `?` or `#`), and
    /// `Err(name)` when a value is not a scalar.
    pub fn expand<'a, F>(&self, lookup: F) -> Result<Option<String>, String>
    where
        F: Fn(&str) -> Option<&'a Value>,
    {
        let mut path = String::with_capacity(self.source.len());
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Static(s) => path.push_str(s),
                Segment::Param(name) => {
                    let Some(value) = lookup(name) else {
                        return Ok(None);
                    };
                    match scalar_to_segment(value) {
                        Some(s) if is_segment(&s) => path.push_str(&s),
                        Some(_) => return Ok(None),
                        None => return Err(name.clone()),
                    }
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        Ok(Some(path))
    }
}

impl fmt::Display for UriPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_segment(s: &str) -> bool {
    !s.is_empty() && !s.contains(|c| matches!(c, '/' | '?' | '#'))
}

fn is_brace(c: char) -> bool {
    c == '{' || c == '}'
}

fn scalar_to_segment(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
