//! Filesystem watcher feeding the conversion queue.
//!
//! A [`notify`] watcher observes the tree recursively and forwards candidate
//! paths into a bounded channel. Event filtering is a pure function so it can
//! be tested without touching the filesystem.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::scan;

/// Errors from setting up the filesystem watcher.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to create filesystem watcher: {0}")]
    CreateFailed(#[source] notify::Error),

    #[error("failed to watch {path}: {source}")]
    WatchFailed {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Extracts conversion candidates from a filesystem event.
///
/// Only create and modify events are considered; a file moved into the tree
/// surfaces as either kind depending on the platform. Paths are filtered
/// through the same classification the startup scan uses, so outputs and
/// in-progress temp files never feed back into the queue.
pub fn relevant_paths(event: &notify::Event) -> Vec<PathBuf> {
    if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter(|p| scan::is_candidate(p))
        .cloned()
        .collect()
}

/// Starts watching `root` recursively, forwarding candidates into `tx`.
///
/// The returned watcher must be kept alive by the caller; dropping it stops
/// event delivery. `queue_depth` is incremented for every queued path and is
/// decremented by the consumer, so it reflects paths waiting in the channel.
///
/// The callback runs on the watcher's own thread. When the channel is full,
/// `blocking_send` stalls that thread until the consumer catches up.
pub fn spawn_watcher(
    root: &Path,
    tx: mpsc::Sender<PathBuf>,
    queue_depth: Arc<AtomicUsize>,
) -> Result<RecommendedWatcher, WatchError> {
    let mut watcher = notify::recommended_watcher(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                for path in relevant_paths(&event) {
                    tracing::debug!(path = %path.display(), "watcher queued candidate");
                    if tx.blocking_send(path).is_ok() {
                        queue_depth.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            Err(e) => {
                tracing::warn!("watch error: {e}");
            }
        },
    )
    .map_err(WatchError::CreateFailed)?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .map_err(|source| WatchError::WatchFailed {
            path: root.to_path_buf(),
            source,
        })?;

    tracing::info!(root = %root.display(), "watching directory tree");
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, paths: &[&str]) -> notify::Event {
        let mut ev = notify::Event::new(kind);
        for p in paths {
            ev = ev.add_path(PathBuf::from(p));
        }
        ev
    }

    #[test]
    fn test_create_event_yields_candidate() {
        let ev = event(EventKind::Create(CreateKind::File), &["/media/movie.mkv"]);
        assert_eq!(relevant_paths(&ev), vec![PathBuf::from("/media/movie.mkv")]);
    }

    #[test]
    fn test_modify_event_yields_candidate() {
        let ev = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Any)),
            &["/media/movie.mkv"],
        );
        assert_eq!(relevant_paths(&ev), vec![PathBuf::from("/media/movie.mkv")]);
    }

    #[test]
    fn test_remove_and_access_events_ignored() {
        let removed = event(EventKind::Remove(RemoveKind::File), &["/media/movie.mkv"]);
        assert!(relevant_paths(&removed).is_empty());

        let accessed = event(EventKind::Access(AccessKind::Any), &["/media/movie.mkv"]);
        assert!(relevant_paths(&accessed).is_empty());
    }

    #[test]
    fn test_derived_artifacts_filtered_out() {
        let ev = event(
            EventKind::Create(CreateKind::File),
            &["/media/movie.mp4", "/media/movie.temp.mp4", "/media/show.temp.mkv"],
        );
        assert!(relevant_paths(&ev).is_empty());
    }

    #[test]
    fn test_mixed_paths_keep_only_candidates() {
        let ev = event(
            EventKind::Create(CreateKind::File),
            &["/media/a.mkv", "/media/b.mp4", "/media/c.mkv"],
        );
        assert_eq!(
            relevant_paths(&ev),
            vec![PathBuf::from("/media/a.mkv"), PathBuf::from("/media/c.mkv")]
        );
    }

    #[tokio::test]
    async fn test_watcher_delivers_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let (tx, mut rx) = mpsc::channel(16);
        let depth = Arc::new(AtomicUsize::new(0));

        let _watcher = spawn_watcher(root, tx, depth.clone()).unwrap();

        let file_path = root.join("incoming.mkv");
        let write_path = file_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut f = std::fs::File::create(&write_path).unwrap();
            f.write_all(b"matroska").unwrap();
        })
        .await
        .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("watcher should deliver an event")
            .expect("channel should stay open");
        assert_eq!(received, file_path);
        assert!(depth.load(Ordering::SeqCst) >= 1);
    }
}
