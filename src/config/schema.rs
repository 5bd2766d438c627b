//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the route
//! cache. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Cache behaviour and backing-store settings.
    pub cache: CacheConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,

    /// Route definitions, matched in priority order.
    pub routes: Vec<RouteConfig>,
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on every backing-store call, in milliseconds.
    pub timeout_ms: u64,

    /// Maximum number of entries held by the in-memory store.
    pub max_entries: usize,

    /// Optional snapshot file loaded at start-up and written on shutdown.
    pub persistence_path: Option<String>,
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 50,
            max_entries: 10_000,
            persistence_path: None,
        }
    }
}

/// Route configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging and match results.
    pub name: String,

    /// URI pattern, e.g. `/blog/{year}/{slug}`.
    pub uri_pattern: String,

    /// Host to match (exact match, case-insensitive).
    #[serde(default)]
    pub host: Option<String>,

    /// Accepted request methods. Empty accepts any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Values merged into match results and used to select a route on
    /// resolve.
    #[serde(default)]
    pub defaults: Map<String, Value>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
