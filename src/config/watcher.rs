//! Config file watcher for interceptor hot reload.
//!
//! Editors usually emit several events per save (truncate, write, rename),
//! so a reload is only published when the file text actually changed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{parse_config, ConfigError};
use crate::config::schema::AppConfig;

/// Publishes validated configs whenever the watched file changes.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<AppConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for new configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<AppConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// The returned watcher must be kept alive for updates to flow.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let reloader = Reloader::new(self.path.clone(), self.update_tx);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_reload_event(&event.kind) => reloader.reload(),
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

fn is_reload_event(kind: &EventKind) -> bool {
    kind.is_modify() || kind.is_create()
}

/// Outcome of one reload attempt.
#[derive(Debug)]
enum Reload {
    Published,
    Unchanged,
    Rejected(ConfigError),
}

struct Reloader {
    path: PathBuf,
    tx: mpsc::UnboundedSender<AppConfig>,
    last: Mutex<Option<String>>,
}

impl Reloader {
    fn new(path: PathBuf, tx: mpsc::UnboundedSender<AppConfig>) -> Self {
        // Seed with the boot-time contents so the first no-op save is skipped.
        let last = std::fs::read_to_string(&path).ok();
        Self {
            path,
            tx,
            last: Mutex::new(last),
        }
    }

    fn reload(&self) {
        match self.try_reload() {
            Reload::Published => tracing::info!(path = %self.path.display(), "Config reloaded"),
            Reload::Unchanged => tracing::debug!(path = %self.path.display(), "Config unchanged, skipping reload"),
            Reload::Rejected(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current interceptors")
            }
        }
    }

    fn try_reload(&self) -> Reload {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => return Reload::Rejected(e.into()),
        };

        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.as_deref() == Some(text.as_str()) {
            return Reload::Unchanged;
        }

        match parse_config(&text) {
            Ok(config) => {
                *last = Some(text);
                let _ = self.tx.send(config);
                Reload::Published
            }
            Err(e) => Reload::Rejected(e),
        }
    }
}
