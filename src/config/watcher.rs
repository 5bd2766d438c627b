//! Configuration file watcher for hot route reload.
//!
//! # Data Flow
//! ```text
//! notify event (watcher thread)
//!     → unit signal over mpsc
//!     → debounce task (tokio): wait for the burst to go quiet
//!     → load_config + validate
//!     → forward only if `routes` differ from the last forwarded set
//! ```
//!
//! # Design Decisions
//! - Editors emit several events per save; one reload per burst
//! - Edits outside `[[routes]]` never reach the reloader, so they never
//!   flush the route cache
//! - Invalid or half-written files are logged and skipped

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{AppConfig, RouteConfig};

/// Quiet period that ends a burst of file events.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Watches the configuration file and reports route changes.
pub struct ConfigWatcher {
    path: PathBuf,
    routes: Vec<RouteConfig>,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Create a watcher for `path`, whose routes are currently `live`.
    ///
    /// Returns the watcher and a receiver for configurations whose routes
    /// changed.
    pub fn new(path: &Path, live: &AppConfig) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                routes: live.routes.clone(),
                debounce: DEFAULT_DEBOUNCE,
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a Tokio runtime.
    ///
    /// The returned handle must be kept alive for as long as updates are
    /// wanted; dropping it also stops the debounce task.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");

        tokio::spawn(self.forward_changes(event_rx));
        Ok(watcher)
    }

    async fn forward_changes(mut self, mut events: mpsc::UnboundedReceiver<()>) {
        while events.recv().await.is_some() {
            // Swallow the rest of the burst
            loop {
                match tokio::time::timeout(self.debounce, events.recv()).await {
                    Ok(Some(())) => continue,
                    Ok(None) => return,
                    Err(_) => break,
                }
            }

            let config = match load_config(&self.path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to reload config, keeping current routes");
                    continue;
                }
            };

            if config.routes == self.routes {
                tracing::debug!("Config changed but routes did not, ignoring");
                continue;
            }

            tracing::info!(routes = config.routes.len(), "Route configuration changed");
            self.routes = config.routes.clone();
            if self.update_tx.send(config).is_err() {
                return;
            }
        }
    }
}
