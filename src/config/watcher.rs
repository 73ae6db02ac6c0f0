//! Configuration file watcher for hot reload.
//!
//! Watches the parent directory rather than the file itself, so editors
//! that save by writing a temp file and renaming it are still seen. Only
//! configurations that parse, validate and differ from the last one sent
//! are forwarded.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::HostConfig;

pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<HostConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for validated configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HostConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let mut reloader = Reloader::new(self.path.clone(), self.update_tx);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create();
                    let ours = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if relevant && ours {
                        reloader.reload();
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&directory, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

/// Loads the file and forwards it if it changed.
struct Reloader {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<HostConfig>,
    last_sent: Option<HostConfig>,
}

impl Reloader {
    fn new(path: PathBuf, update_tx: mpsc::UnboundedSender<HostConfig>) -> Self {
        Self {
            path,
            update_tx,
            last_sent: None,
        }
    }

    /// Returns `true` if a new configuration was forwarded.
    fn reload(&mut self) -> bool {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
                return false;
            }
        };
        if self.last_sent.as_ref() == Some(&config) {
            tracing::debug!(path = ?self.path, "Config unchanged, skipping reload");
            return false;
        }
        tracing::info!(path = ?self.path, "Config file change detected, reloading");
        self.last_sent = Some(config.clone());
        self.update_tx.send(config).is_ok()
    }
}
