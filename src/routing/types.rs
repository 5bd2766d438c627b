//! Routing outcomes and errors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::cache::error::CacheError;

/// Outcome of matching a request against the route table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchResult {
    /// A route matched; `params` holds its defaults overlaid with the
    /// values captured from the path.
    Matched {
        route: String,
        params: Map<String, Value>,
    },
    /// Matching ran and no route accepted the request.
    NoMatch,
}

impl MatchResult {
    pub fn matched(route: impl Into<String>, params: Map<String, Value>) -> Self {
        MatchResult::Matched {
            route: route.into(),
            params,
        }
    }

    /// Name of the matched route, if any.
    pub fn route_name(&self) -> Option<&str> {
        match self {
            MatchResult::Matched { route, .. } => Some(route),
            MatchResult::NoMatch => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchResult::Matched { .. })
    }
}

/// Outcome of resolving route values to a URI path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "path", rename_all = "snake_case")]
pub enum ResolvedPath {
    Path(String),
    /// Resolution ran and no route could produce a path.
    Unresolvable,
}

/// Errors raised while matching or resolving.
///
/// A routing error is never cached.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A path parameter was given a value that cannot be placed in a URI.
    #[error("route {route}: parameter {name} must be a string, number or bool")]
    UnsupportedValue { route: String, name: String },

    /// The cache rejected the input outright.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
