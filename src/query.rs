//! Line-oriented query protocol used by `route-cache serve`.
//!
//! ```text
//! match /blog/2020/hello host=example.com method=GET
//! resolve controller=blog action=show slug=hello
//! stats
//! clear
//! ```
//!
//! Every query is answered with one JSON object on one line.

use serde_json::{json, Value};
use thiserror::Error;

use crate::cache::{CacheBackend, CachingRouter, RequestDescriptor, RouteValues};
use crate::routing::Router;

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Match(RequestDescriptor),
    Resolve(RouteValues),
    Stats,
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("empty query")]
    Empty,
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    #[error("match needs a path")]
    MissingPath,
    #[error("expected name=value, got {0:?}")]
    MalformedPair(String),
    #[error("unknown match option {0:?}")]
    UnknownOption(String),
}

/// Parse `name=value`. Values that read as JSON (`2020`, `true`, `{"a":1}`)
/// keep their type; anything else is a string.
pub fn parse_route_value(pair: &str) -> Result<(String, Value), QueryError> {
    let (name, raw) = pair
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| QueryError::MalformedPair(pair.to_string()))?;

    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

impl Query {
    pub fn parse(line: &str) -> Result<Self, QueryError> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(QueryError::Empty)?;

        match command {
            "match" => {
                let path = words.next().ok_or(QueryError::MissingPath)?;
                let mut request = RequestDescriptor::new(path);
                for word in words {
                    let (name, value) = word
                        .split_once('=')
                        .ok_or_else(|| QueryError::MalformedPair(word.to_string()))?;
                    request = match name {
                        "host" => request.with_host(value),
                        "method" => request.with_method(value),
                        other => return Err(QueryError::UnknownOption(other.to_string())),
                    };
                }
                Ok(Query::Match(request))
            }
            "resolve" => {
                let values = words
                    .map(parse_route_value)
                    .collect::<Result<RouteValues, _>>()?;
                Ok(Query::Resolve(values))
            }
            "stats" => Ok(Query::Stats),
            "clear" => Ok(Query::Clear),
            other => Err(QueryError::UnknownCommand(other.to_string())),
        }
    }
}

/// Run a query and render the reply.
pub async fn execute<R: Router, B: CacheBackend>(router: &CachingRouter<R, B>, query: &Query) -> Value {
    match query {
        Query::Match(request) => match router.route(request).await {
            Ok(result) => json!({ "ok": true, "result": result }),
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        },
        Query::Resolve(values) => match router.resolve(values).await {
            Ok(path) => json!({ "ok": true, "result": path }),
            Err(e) => json!({ "ok": false, "error": e.to_string() }),
        },
        Query::Stats => json!({ "ok": true, "stats": router.cache().stats() }),
        Query::Clear => {
            router.cache().clear().await;
            json!({ "ok": true })
        }
    }
}

/// Parse and run one input line.
pub async fn handle_line<R: Router, B: CacheBackend>(router: &CachingRouter<R, B>, line: &str) -> Value {
    match Query::parse(line) {
        Ok(query) => execute(router, &query).await,
        Err(e) => json!({ "ok": false, "error": e.to_string() }),
    }
}
