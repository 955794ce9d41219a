//! Daemon assembly and main loop.
//!
//! Ties the scanner, watcher, and converter together: the watcher starts
//! first, the startup scan then drains the existing backlog, and after that
//! watcher events feed the queue until an interrupt arrives.

use crate::convert::{self, Converter};
use crate::report::Reporter;
use crate::scan::scan_tree;
use crate::stability::wait_until_stable;
use crate::startup::{run_startup_checks, StartupError};
use crate::stats::{collect_system_stats, new_shared_stats, now_unix_ms, SharedStats};
use crate::status_server::run_status_server;
use crate::watch::{spawn_watcher, WatchError};
use mkv2mp4_config::{Config, ConfigError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Error type for daemon operations
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Startup check failed
    #[error("Startup check failed: {0}")]
    Startup(#[from] StartupError),

    /// Filesystem watcher could not be set up
    #[error("Watcher error: {0}")]
    Watch(#[from] WatchError),

    /// The watch root does not exist or is not a directory
    #[error("watch root is not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Daemon state containing all runtime components
pub struct Daemon {
    config: Config,
    root: PathBuf,
    stats: SharedStats,
    converter: Arc<Converter>,
    queue_depth: Arc<AtomicUsize>,
}

impl Daemon {
    /// Initialize the daemon, verifying external tools are present.
    pub fn new(
        config: Config,
        root: PathBuf,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, DaemonError> {
        run_startup_checks()?;
        Self::build(config, root, reporter)
    }

    /// Initialize the daemon without tool checks.
    ///
    /// Useful for testing and for hosts where ffmpeg lives outside PATH.
    pub fn new_without_checks(
        config: Config,
        root: PathBuf,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, DaemonError> {
        Self::build(config, root, reporter)
    }

    fn build(
        config: Config,
        root: PathBuf,
        reporter: Arc<dyn Reporter>,
    ) -> Result<Self, DaemonError> {
        if !root.is_dir() {
            return Err(DaemonError::InvalidRoot(root));
        }
        let stats = new_shared_stats();
        let converter = Arc::new(Converter::new(
            config.encoding.clone(),
            reporter,
            stats.clone(),
        ));
        Ok(Self {
            config,
            root,
            stats,
            converter,
            queue_depth: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Get the shared statistics
    pub fn stats(&self) -> SharedStats {
        self.stats.clone()
    }

    /// The directory tree being watched
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start the status HTTP server if enabled in config.
    pub fn start_status_server(&self) -> Option<tokio::task::JoinHandle<()>> {
        if !self.config.status.enabled {
            return None;
        }
        let stats = self.stats.clone();
        let port = self.config.status.port;
        Some(tokio::spawn(async move {
            if let Err(e) = run_status_server(stats, port).await {
                tracing::error!(error = %e, "status server error");
            }
        }))
    }

    /// Start the statistics update task.
    ///
    /// Periodically refreshes system load, queue depth, and the snapshot
    /// timestamp in the shared state.
    pub fn start_stats_updater(&self) -> tokio::task::JoinHandle<()> {
        let stats = self.stats.clone();
        let queue_depth = self.queue_depth.clone();
        tokio::spawn(async move {
            loop {
                let system = collect_system_stats();
                {
                    let mut snapshot = stats.write().await;
                    snapshot.system = system;
                    snapshot.queue_len = queue_depth.load(Ordering::SeqCst);
                    snapshot.timestamp_unix_ms = now_unix_ms();
                }
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        })
    }

    /// Run the daemon main loop until interrupted.
    ///
    /// On Ctrl+C the in-flight encode is killed (its child process dies with
    /// the dropped future) and its temp file is removed; the source file of
    /// the interrupted attempt stays untouched.
    pub async fn run(&self) -> Result<(), DaemonError> {
        tokio::select! {
            result = self.run_inner() => result,
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "ctrl-c handler failed");
                }
                tracing::info!("interrupt received, shutting down");
                self.cleanup_interrupted().await;
                Ok(())
            }
        }
    }

    /// Run the daemon with the stats updater and optional status server.
    pub async fn run_with_server(&self) -> Result<(), DaemonError> {
        let _updater_handle = self.start_stats_updater();
        let _server_handle = self.start_status_server();
        self.run().await
    }

    async fn run_inner(&self) -> Result<(), DaemonError> {
        // Watcher first: anything arriving during the backlog drain queues
        // up and is handled afterwards. A file converted by the backlog pass
        // and queued again is skipped on the second look.
        let (tx, mut rx) = mpsc::channel(self.config.watch.queue_capacity);
        let _watcher = spawn_watcher(&self.root, tx, self.queue_depth.clone())?;

        // Files already on disk are complete; convert them without settling.
        let backlog = scan_tree(&self.root);
        if !backlog.is_empty() {
            tracing::info!(count = backlog.len(), "converting existing files");
        }
        for path in &backlog {
            self.converter.handle(path).await;
        }

        tracing::info!("waiting for new files");
        while let Some(path) = rx.recv().await {
            self.dec_queue_depth();
            self.convert_when_stable(&path).await;
        }

        Ok(())
    }

    /// Wait out in-progress writes, then convert.
    async fn convert_when_stable(&self, path: &Path) {
        let interval = Duration::from_secs(self.config.watch.settle_secs);
        let max_checks = self.config.watch.settle_max_checks;
        if let Err(e) = wait_until_stable(path, interval, max_checks).await {
            tracing::info!(path = %path.display(), error = %e, "file vanished while settling");
            let mut stats = self.stats.write().await;
            stats.skipped += 1;
            return;
        }
        self.converter.handle(path).await;
    }

    fn dec_queue_depth(&self) {
        let _ = self
            .queue_depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(v.saturating_sub(1))
            });
    }

    /// Remove the temp file of an attempt cut short by an interrupt.
    async fn cleanup_interrupted(&self) {
        let current = { self.stats.read().await.current.clone() };
        if let Some(attempt) = current {
            let source = PathBuf::from(&attempt.source_path);
            let temp = convert::temp_path(&convert::output_path(&source));
            if temp.exists() {
                let _ = std::fs::remove_file(&temp);
                tracing::info!(path = %temp.display(), "removed in-flight temp file");
            }
        }
    }
}
