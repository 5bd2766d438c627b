//! Route resolution cache CLI.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!   query line    │  ┌─────────┐    ┌───────────────┐    ┌────────────┐  │
//!  ───────────────┼─▶│  query  │───▶│ CachingRouter │───▶│ RouteTable │  │
//!                 │  │ parser  │    │               │    │ (ArcSwap)  │  │
//!                 │  └─────────┘    └───────┬───────┘    └────────────┘  │
//!                 │                         │                            │
//!                 │                         ▼                            │
//!                 │                 ┌───────────────┐    ┌────────────┐  │
//!                 │                 │  RouteCache   │───▶│  Memory    │  │
//!                 │                 │ (timeouts)    │    │  Backend   │  │
//!                 │                 └───────────────┘    └────────────┘  │
//!                 │                                                      │
//!                 │   config watcher ──▶ reload(table) ──▶ cache.clear   │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use route_cache::cache::{CachingRouter, MemoryBackend, RequestDescriptor, RouteCache, RouteValues};
use route_cache::config::watcher::ConfigWatcher;
use route_cache::config::{load_config, AppConfig};
use route_cache::lifecycle::signals::shutdown_on_ctrl_c;
use route_cache::lifecycle::Shutdown;
use route_cache::observability::{logging, metrics};
use route_cache::query::{self, parse_route_value};
use route_cache::routing::RouteTable;

type Pipeline = CachingRouter<RouteTable, MemoryBackend>;

#[derive(Parser)]
#[command(name = "route-cache")]
#[command(about = "Cached route matching and URI resolution", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "route-cache.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and list the routes
    Check,
    /// Match a request path against the routes
    Match {
        path: String,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        method: Option<String>,
    },
    /// Resolve name=value pairs to a URI path
    Resolve {
        #[arg(value_parser = parse_pair)]
        values: Vec<(String, Value)>,
    },
    /// Answer queries from stdin, reloading routes when the config changes
    Serve,
}

fn parse_pair(pair: &str) -> Result<(String, Value), String> {
    parse_route_value(pair).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(&config.observability);
    tracing::info!(config = ?cli.config, routes = config.routes.len(), "Configuration loaded");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    match cli.command {
        Commands::Check => {
            let table = RouteTable::from_config(&config.routes)?;
            for route in table.routes() {
                println!("{:<24} {}", route.name(), route.pattern());
            }
            println!("{} route(s), configuration OK", table.len());
        }
        Commands::Match { path, host, method } => {
            let pipeline = build_pipeline(&config)?;
            let mut request = RequestDescriptor::new(path);
            if let Some(host) = host {
                request = request.with_host(host);
            }
            if let Some(method) = method {
                request = request.with_method(method);
            }
            let result = pipeline.route(&request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            save_snapshot(&pipeline);
        }
        Commands::Resolve { values } => {
            let pipeline = build_pipeline(&config)?;
            let values: RouteValues = values.into_iter().collect();
            let path = pipeline.resolve(&values).await?;
            println!("{}", serde_json::to_string_pretty(&path)?);
            save_snapshot(&pipeline);
        }
        Commands::Serve => serve(&cli.config, &config).await?,
    }

    Ok(())
}

fn build_pipeline(config: &AppConfig) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let backend = Arc::new(MemoryBackend::from_config(&config.cache)?);
    let cache = RouteCache::from_config(backend, &config.cache);
    let table = RouteTable::from_config(&config.routes)?;
    Ok(CachingRouter::new(table, cache))
}

fn save_snapshot(pipeline: &Pipeline) {
    if let Err(e) = pipeline.cache().backend().save_to_file() {
        tracing::error!(error = %e, "Failed to save route cache snapshot");
    }
}

async fn serve(path: &Path, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Arc::new(build_pipeline(config)?);
    let shutdown = Arc::new(Shutdown::new());

    // Keep the watcher alive for the whole session.
    let (watcher, mut updates) = ConfigWatcher::new(path, config);
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
            None
        }
    };

    let reload_pipeline = Arc::clone(&pipeline);
    let mut reload_shutdown = shutdown.subscribe();
    let reloader = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(new_config) = updates.recv() => {
                    match RouteTable::from_config(&new_config.routes) {
                        Ok(table) => reload_pipeline.reload(table).await,
                        Err(e) => tracing::error!(error = %e, "Rejected reloaded routes"),
                    }
                }
                _ = reload_shutdown.recv() => break,
            }
        }
    });

    let signal_shutdown = Arc::clone(&shutdown);
    tokio::spawn(async move {
        shutdown_on_ctrl_c(&signal_shutdown).await;
    });

    tracing::info!("Serving queries from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut stop = shutdown.subscribe();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => {
                    let reply = query::handle_line(&*pipeline, &line).await;
                    stdout.write_all(format!("{}\n", reply).as_bytes()).await?;
                    stdout.flush().await?;
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to read query");
                    break;
                }
            },
            _ = stop.recv() => break,
        }
    }

    shutdown.trigger();
    let _ = reloader.await;
    save_snapshot(&pipeline);

    tracing::info!("Shutdown complete");
    Ok(())
}
