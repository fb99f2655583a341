//! Config file watcher feeding backend list reloads.
//!
//! Every write to the file is re-parsed and validated. A config is forwarded
//! only when its backend list differs from the last one forwarded, since the
//! list is the only part a running balancer picks up.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::ProxyConfig;

pub struct ConfigWatcher {
    path: PathBuf,
    poll_interval: Duration,
    current_backends: Vec<String>,
    update_tx: mpsc::UnboundedSender<ProxyConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for changed configs.
    /// `current_backends` is the list the balancer was started with.
    pub fn new(
        path: &Path,
        poll_interval: Duration,
        current_backends: Vec<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ProxyConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            poll_interval,
            current_backends,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            poll_interval,
            mut current_backends,
            update_tx,
        } = self;
        let reload_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    return;
                }

                match load_config(&reload_path) {
                    Ok(config) if config.balancer.backends == current_backends => {
                        tracing::debug!("Config rewritten with an unchanged backend list");
                    }
                    Ok(config) => {
                        tracing::info!(
                            backends = config.balancer.backends.len(),
                            "Backend list changed on disk"
                        );
                        current_backends = config.balancer.backends.clone();
                        let _ = update_tx.send(config);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Ignoring invalid config; keeping current backends");
                    }
                }
            },
            Config::default().with_poll_interval(poll_interval),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %path.display(), "Config watcher started");
        Ok(watcher)
    }
}
