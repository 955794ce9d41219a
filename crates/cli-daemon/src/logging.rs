//! Logging setup for the converter binary.
//!
//! Log lines go to stderr and to a daily-rotated file under the watched
//! tree's `logs/` directory, keeping stdout free for the progress display.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber.
///
/// `RUST_LOG` overrides the default `info` filter. When the log directory
/// cannot be set up, logging falls back to stderr only. The returned guard
/// flushes the file writer and must stay alive for the life of the program.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(true)
        .with_target(false);

    match file_writer(log_dir) {
        Ok((writer, guard)) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stderr_layer)
                .init();
            tracing::warn!(
                error = %e,
                log_dir = %log_dir.display(),
                "file logging unavailable"
            );
            None
        }
    }
}

fn file_writer(log_dir: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("mkv2mp4")
        .filename_suffix("log")
        .build(log_dir)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    Ok(tracing_appender::non_blocking(appender))
}
