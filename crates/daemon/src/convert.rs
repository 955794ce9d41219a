//! Conversion pipeline for a single source file.
//!
//! Runs probe, plan, encode, verify, publish for one attempt at a time,
//! updating shared statistics at each stage and reporting through the
//! [`Reporter`] seam. The encoder writes to a temp path; the source file is
//! removed only after the verified output has been moved into place.

use crate::encode::{build_ffmpeg_command, run_encoder, EncodeError};
use crate::plan;
use crate::probe::{inspect, ProbeError};
use crate::progress::ProgressTracker;
use crate::publish::{publish_output, PublishError};
use crate::report::Reporter;
use crate::scan;
use crate::stats::{AttemptStats, SharedStats};
use mkv2mp4_config::EncodeTargets;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Error type for conversion attempts
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Media inspection failed
    #[error("Probe failed: {0}")]
    Probe(#[from] ProbeError),

    /// Encoding failed
    #[error("Encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// Moving the output into place failed
    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    /// Filesystem error outside the named stages
    #[error("IO error: {0}")]
    Unexpected(#[from] std::io::Error),
}

/// Attempt state representing the current stage in the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    /// Inspecting the source with ffprobe
    Probing,
    /// Deriving encoder settings from the probe result
    Planning,
    /// Encoder running, temp file being written
    Encoding,
    /// Checking the encoder left a usable file
    Verifying,
    /// Moving the temp file to its final path
    Publishing,
    /// Attempt finished, source removed
    Completed,
    /// Attempt failed
    Failed(String),
}

impl AttemptState {
    /// Convert state to string for statistics
    pub fn as_str(&self) -> &str {
        match self {
            AttemptState::Probing => "probing",
            AttemptState::Planning => "planning",
            AttemptState::Encoding => "encoding",
            AttemptState::Verifying => "verifying",
            AttemptState::Publishing => "publishing",
            AttemptState::Completed => "completed",
            AttemptState::Failed(_) => "failed",
        }
    }
}

/// One source file moving through the pipeline
#[derive(Debug, Clone)]
pub struct ConversionAttempt {
    /// Unique attempt identifier
    pub id: Uuid,
    /// Path to the source container
    pub source: PathBuf,
    /// Final output path, next to the source
    pub output: PathBuf,
    /// In-progress encoder output
    pub temp_output: PathBuf,
    /// Current state of the attempt
    pub state: AttemptState,
}

impl ConversionAttempt {
    /// Create a new attempt with derived output and temp paths
    pub fn new(source: PathBuf) -> Self {
        let output = output_path(&source);
        let temp_output = temp_path(&output);
        Self {
            id: Uuid::new_v4(),
            source,
            output,
            temp_output,
            state: AttemptState::Probing,
        }
    }

    fn to_stats(&self) -> AttemptStats {
        AttemptStats {
            id: self.id.to_string(),
            source_path: self.source.to_string_lossy().to_string(),
            stage: self.state.as_str().to_string(),
        }
    }
}

/// Derive the final output path for a source file.
pub fn output_path(source: &Path) -> PathBuf {
    source.with_extension(scan::OUTPUT_EXTENSION)
}

/// Derive the in-progress temp path for an output path.
///
/// `movie.mp4` becomes `movie.temp.mp4`. The infix keeps the scanner and
/// watcher from picking the half-written file back up.
pub fn temp_path(output: &Path) -> PathBuf {
    output.with_extension("temp.mp4")
}

/// Summary of a published conversion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub original_bytes: u64,
    pub final_bytes: u64,
}

impl ConversionReport {
    /// Size reduction as a percentage of the original size.
    ///
    /// Negative when the output grew; zero when the original size is unknown.
    pub fn reduction_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.final_bytes as f64 / self.original_bytes as f64) * 100.0
    }
}

/// How one queued path ended up
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Output published and source removed
    Completed(ConversionReport),
    /// Nothing to do for this path
    Skipped { reason: String },
    /// Pipeline error; the source is left untouched
    Failed(ConvertError),
}

/// Drives queued paths through the conversion pipeline, one at a time.
pub struct Converter {
    targets: EncodeTargets,
    reporter: Arc<dyn Reporter>,
    stats: SharedStats,
}

impl Converter {
    pub fn new(targets: EncodeTargets, reporter: Arc<dyn Reporter>, stats: SharedStats) -> Self {
        Self {
            targets,
            reporter,
            stats,
        }
    }

    /// Process one queued path end to end.
    ///
    /// Paths that are not candidates (wrong extension, our own artifacts) or
    /// that disappeared since queuing are skipped. Failures clean up the
    /// temp file and leave the source in place for a later retry.
    pub async fn handle(&self, source: &Path) -> AttemptOutcome {
        if !scan::is_candidate(source) {
            let reason = "not a conversion candidate".to_string();
            tracing::debug!(path = %source.display(), reason = %reason, "skipping");
            self.record_skip().await;
            return AttemptOutcome::Skipped { reason };
        }

        if tokio::fs::metadata(source).await.is_err() {
            let reason = "source disappeared before processing".to_string();
            tracing::info!(path = %source.display(), reason = %reason, "skipping");
            self.record_skip().await;
            return AttemptOutcome::Skipped { reason };
        }

        let mut attempt = ConversionAttempt::new(source.to_path_buf());
        tracing::info!(
            id = %attempt.id,
            source = %attempt.source.display(),
            "conversion started"
        );

        match self.run_attempt(&mut attempt).await {
            Ok(report) => {
                attempt.state = AttemptState::Completed;
                self.record_completed(&report).await;
                self.reporter.attempt_completed(&report);
                tracing::info!(
                    id = %attempt.id,
                    output = %report.output.display(),
                    reduction_percent = report.reduction_percent(),
                    "conversion completed"
                );
                AttemptOutcome::Completed(report)
            }
            Err(error) => {
                attempt.state = AttemptState::Failed(error.to_string());
                // The temp file is the only artifact a failed attempt can leave.
                let _ = std::fs::remove_file(&attempt.temp_output);
                self.record_failed().await;
                self.reporter.attempt_failed(&attempt.source, &error);
                tracing::error!(
                    id = %attempt.id,
                    source = %attempt.source.display(),
                    error = %error,
                    "conversion failed"
                );
                AttemptOutcome::Failed(error)
            }
        }
    }

    /// The pipeline proper. Any error propagates to [`handle`], which owns
    /// cleanup and accounting.
    async fn run_attempt(
        &self,
        attempt: &mut ConversionAttempt,
    ) -> Result<ConversionReport, ConvertError> {
        self.set_stage(attempt, AttemptState::Probing).await;
        let info = inspect(&attempt.source).await?;

        self.set_stage(attempt, AttemptState::Planning).await;
        let plan = plan::plan(&info, &self.targets);
        self.reporter
            .attempt_started(&attempt.source, &info, &plan, &self.targets);

        // ffprobe occasionally reports no size; fall back to the filesystem.
        let original_bytes = if info.size_bytes > 0 {
            info.size_bytes
        } else {
            tokio::fs::metadata(&attempt.source).await?.len()
        };

        self.set_stage(attempt, AttemptState::Encoding).await;
        let command =
            build_ffmpeg_command(&attempt.source, &attempt.temp_output, &plan, &self.targets);
        let sink = self.reporter.progress_sink(info.duration_secs);
        let mut tracker = ProgressTracker::new(info.duration_secs, sink);
        let encode_result = run_encoder(command, &mut tracker).await;
        tracker.close();
        encode_result?;

        self.set_stage(attempt, AttemptState::Verifying).await;
        let final_bytes = verify_output(&attempt.temp_output)?;

        self.set_stage(attempt, AttemptState::Publishing).await;
        publish_output(&attempt.temp_output, &attempt.output)?;

        // The source goes away only once the verified output is in place.
        std::fs::remove_file(&attempt.source)?;

        Ok(ConversionReport {
            source: attempt.source.clone(),
            output: attempt.output.clone(),
            original_bytes,
            final_bytes,
        })
    }

    async fn set_stage(&self, attempt: &mut ConversionAttempt, state: AttemptState) {
        attempt.state = state;
        let mut stats = self.stats.write().await;
        stats.current = Some(attempt.to_stats());
    }

    async fn record_completed(&self, report: &ConversionReport) {
        let mut stats = self.stats.write().await;
        stats.current = None;
        stats.completed += 1;
        stats.original_bytes_total += report.original_bytes;
        stats.converted_bytes_total += report.final_bytes;
    }

    async fn record_failed(&self) {
        let mut stats = self.stats.write().await;
        stats.current = None;
        stats.failed += 1;
    }

    async fn record_skip(&self) {
        let mut stats = self.stats.write().await;
        stats.skipped += 1;
    }
}

/// Confirm the encoder left a non-empty file at the temp path.
///
/// A zero-byte file is deleted on the spot so a later retry starts clean.
pub fn verify_output(temp_path: &Path) -> Result<u64, ConvertError> {
    match std::fs::metadata(temp_path) {
        Ok(metadata) => {
            let len = metadata.len();
            if len == 0 {
                let _ = std::fs::remove_file(temp_path);
                return Err(ConvertError::Encode(EncodeError::EmptyOutput));
            }
            Ok(len)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ConvertError::Encode(EncodeError::MissingOutput))
        }
        Err(e) => Err(ConvertError::Unexpected(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullReporter;
    use crate::stats::new_shared_stats;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn test_converter(stats: SharedStats) -> Converter {
        Converter::new(EncodeTargets::default(), Arc::new(NullReporter), stats)
    }

    #[test]
    fn test_output_path_replaces_extension() {
        assert_eq!(
            output_path(Path::new("/media/movie.mkv")),
            PathBuf::from("/media/movie.mp4")
        );
        // Dots in the stem stay put
        assert_eq!(
            output_path(Path::new("/media/movie.2024.mkv")),
            PathBuf::from("/media/movie.2024.mp4")
        );
    }

    #[test]
    fn test_temp_path_carries_marker() {
        let temp = temp_path(Path::new("/media/movie.mp4"));
        assert_eq!(temp, PathBuf::from("/media/movie.temp.mp4"));
        // The scanner must treat the temp file as our own artifact.
        assert!(scan::is_derived_artifact(&temp));
    }

    #[test]
    fn test_attempt_paths_derived_from_source() {
        let attempt = ConversionAttempt::new(PathBuf::from("/media/show.mkv"));
        assert_eq!(attempt.output, PathBuf::from("/media/show.mp4"));
        assert_eq!(attempt.temp_output, PathBuf::from("/media/show.temp.mp4"));
        assert_eq!(attempt.state, AttemptState::Probing);
    }

    #[test]
    fn test_attempt_state_as_str() {
        assert_eq!(AttemptState::Probing.as_str(), "probing");
        assert_eq!(AttemptState::Planning.as_str(), "planning");
        assert_eq!(AttemptState::Encoding.as_str(), "encoding");
        assert_eq!(AttemptState::Verifying.as_str(), "verifying");
        assert_eq!(AttemptState::Publishing.as_str(), "publishing");
        assert_eq!(AttemptState::Completed.as_str(), "completed");
        assert_eq!(AttemptState::Failed("boom".to_string()).as_str(), "failed");
    }

    #[test]
    fn test_report_reduction_percent() {
        let report = ConversionReport {
            source: PathBuf::from("/media/a.mkv"),
            output: PathBuf::from("/media/a.mp4"),
            original_bytes: 1000,
            final_bytes: 250,
        };
        assert!((report.reduction_percent() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_reduction_negative_when_output_grew() {
        let report = ConversionReport {
            source: PathBuf::from("/media/a.mkv"),
            output: PathBuf::from("/media/a.mp4"),
            original_bytes: 1000,
            final_bytes: 1500,
        };
        assert!((report.reduction_percent() + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_report_reduction_zero_for_unknown_original() {
        let report = ConversionReport {
            source: PathBuf::from("/media/a.mkv"),
            output: PathBuf::from("/media/a.mp4"),
            original_bytes: 0,
            final_bytes: 500,
        };
        assert_eq!(report.reduction_percent(), 0.0);
    }

    #[test]
    fn test_verify_output_accepts_nonempty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movie.temp.mp4");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"mp4 bytes").unwrap();

        assert_eq!(verify_output(&path).unwrap(), 9);
        assert!(path.exists());
    }

    #[test]
    fn test_verify_output_deletes_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movie.temp.mp4");
        File::create(&path).unwrap();

        let err = verify_output(&path).unwrap_err();
        assert!(matches!(err, ConvertError::Encode(EncodeError::EmptyOutput)));
        assert!(!path.exists());
    }

    #[test]
    fn test_verify_output_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("never-written.temp.mp4");

        let err = verify_output(&path).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::Encode(EncodeError::MissingOutput)
        ));
    }

    #[tokio::test]
    async fn test_handle_skips_non_candidate() {
        let stats = new_shared_stats();
        let converter = test_converter(stats.clone());

        let outcome = converter.handle(Path::new("/media/notes.txt")).await;
        assert!(matches!(outcome, AttemptOutcome::Skipped { .. }));

        let snapshot = stats.read().await;
        assert_eq!(snapshot.skipped, 1);
        assert_eq!(snapshot.failed, 0);
    }

    #[tokio::test]
    async fn test_handle_skips_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let ghost = temp_dir.path().join("ghost.mkv");
        let stats = new_shared_stats();
        let converter = test_converter(stats.clone());

        let outcome = converter.handle(&ghost).await;
        match outcome {
            AttemptOutcome::Skipped { reason } => {
                assert!(reason.contains("disappeared"));
            }
            other => panic!("expected skip, got {:?}", other),
        }

        assert_eq!(stats.read().await.skipped, 1);
    }

    // A source that is not real media fails at the probe stage whether or
    // not ffprobe is installed; either way the counters and cleanup agree.
    #[tokio::test]
    async fn test_handle_failure_updates_stats_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("garbage.mkv");
        let mut file = File::create(&source).unwrap();
        file.write_all(b"not actually matroska").unwrap();
        drop(file);

        let stats = new_shared_stats();
        let converter = test_converter(stats.clone());

        let outcome = converter.handle(&source).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(_)));

        let snapshot = stats.read().await;
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.completed, 0);
        assert!(snapshot.current.is_none());

        // Source stays for a retry; no temp file is left behind.
        assert!(source.exists());
        assert!(!temp_dir.path().join("garbage.temp.mp4").exists());
    }
}
