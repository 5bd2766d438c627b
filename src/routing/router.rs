//! Route lookup and reverse resolution.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the matching route for a request
//! - Resolve route values back to a URI path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ordered by priority, ties keep configuration order
//! - Explicit NoMatch / Unresolvable rather than silent defaults

use serde_json::{Map, Value};

use crate::cache::key::{RequestDescriptor, RouteValues};
use crate::config::RouteConfig;
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, MethodMatcher, PatternError, UriPattern};
use crate::routing::types::{MatchResult, ResolvedPath, RoutingError};

/// The capability interface shared by real routers and caching decorators.
pub trait Router: Send + Sync + 'static {
    /// Find the route matching `request`.
    fn find_match_results(&self, request: &RequestDescriptor) -> Result<MatchResult, RoutingError>;

    /// Build the URI path for `values`.
    fn resolve(&self, values: &RouteValues) -> Result<ResolvedPath, RoutingError>;
}

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    name: String,
    pattern: UriPattern,
    defaults: Map<String, Value>,
    conditions: AndMatcher,
    priority: u32,
}

impl Route {
    pub fn new(name: impl Into<String>, pattern: UriPattern) -> Self {
        Self {
            name: name.into(),
            pattern,
            defaults: Map::new(),
            conditions: AndMatcher::default(),
            priority: 0,
        }
    }

    /// Compile a route from its configuration.
    pub fn from_config(config: &RouteConfig) -> Result<Self, PatternError> {
        let pattern = UriPattern::parse(&config.uri_pattern)?;

        let mut conditions: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(host) = &config.host {
            conditions.push(Box::new(HostMatcher::new(host.clone())));
        }
        if !config.methods.is_empty() {
            conditions.push(Box::new(MethodMatcher::new(config.methods.iter().cloned())));
        }

        Ok(Self {
            name: config.name.clone(),
            pattern,
            defaults: config.defaults.clone(),
            conditions: AndMatcher::new(conditions),
            priority: config.priority,
        })
    }

    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &UriPattern {
        &self.pattern
    }

    fn try_match(&self, request: &RequestDescriptor) -> Option<Map<String, Value>> {
        if !self.conditions.matches(request) {
            return None;
        }
        let captured = self.pattern.match_path(request.path())?;

        let mut params = self.defaults.clone();
        params.extend(captured);
        Some(params)
    }

    fn try_resolve(&self, values: &RouteValues) -> Result<Option<String>, RoutingError> {
        // Every supplied value must be consumed by the pattern or a default.
        if values
            .names()
            .any(|name| !self.pattern.has_param(name) && !self.defaults.contains_key(name))
        {
            return Ok(None);
        }

        // Defaults that are not placeholders pin the route's identity.
        for (name, default) in &self.defaults {
            if self.pattern.has_param(name) {
                continue;
            }
            if let Some(given) = values.get(name) {
                if given != default {
                    return Ok(None);
                }
            }
        }

        self.pattern
            .expand(|name| values.get(name).or_else(|| self.defaults.get(name)))
            .map_err(|name| RoutingError::UnsupportedValue {
                route: self.name.clone(),
                name,
            })
    }
}

/// An immutable, priority-ordered set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        // Stable sort keeps configuration order for equal priorities.
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    /// Compile every configured route.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, PatternError> {
        let routes = configs
            .iter()
            .map(Route::from_config)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(routes))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }
}

impl Router for RouteTable {
    fn find_match_results(&self, request: &RequestDescriptor) -> Result<MatchResult, RoutingError> {
        for route in &self.routes {
            if let Some(params) = route.try_match(request) {
                return Ok(MatchResult::matched(route.name.clone(), params));
            }
        }
        Ok(MatchResult::NoMatch)
    }

    fn resolve(&self, values: &RouteValues) -> Result<ResolvedPath, RoutingError> {
        for route in &self.routes {
            if let Some(path) = route.try_resolve(values)? {
                return Ok(ResolvedPath::Path(path));
            }
        }
        Ok(ResolvedPath::Unresolvable)
    }
}
