//! User-facing console reporting
//!
//! One reporter is constructed at process start and handed to the
//! orchestrator; all human-readable output (per-file summary blocks and the
//! progress bar) flows through it, keeping the core free of globals.

use crate::convert::{ConversionReport, ConvertError};
use crate::plan::EncodePlan;
use crate::probe::MediaInfo;
use crate::progress::ProgressSink;
use indicatif::{ProgressBar, ProgressStyle};
use mkv2mp4_config::EncodeTargets;
use std::path::{Path, PathBuf};

/// Console/UI reporting seam for the orchestrator
pub trait Reporter: Send + Sync {
    /// Called after probing and planning, before the encoder starts
    fn attempt_started(
        &self,
        source: &Path,
        info: &MediaInfo,
        plan: &EncodePlan,
        targets: &EncodeTargets,
    );

    /// Progress sink for one attempt of the given duration
    fn progress_sink(&self, total_secs: f64) -> Box<dyn ProgressSink>;

    fn attempt_completed(&self, report: &ConversionReport);

    fn attempt_failed(&self, source: &Path, error: &ConvertError);
}

/// Seconds to "HH:MM:SS"
pub fn format_hms(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Prints per-file blocks and drives an indicatif bar
///
/// Paths are shown relative to the watched root where possible.
pub struct ConsoleReporter {
    root: PathBuf,
}

impl ConsoleReporter {
    pub fn new(root: PathBuf) -> Self {
        ConsoleReporter { root }
    }

    fn rel<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

impl Reporter for ConsoleReporter {
    fn attempt_started(
        &self,
        source: &Path,
        info: &MediaInfo,
        plan: &EncodePlan,
        targets: &EncodeTargets,
    ) {
        println!("\nProcessing: {}", self.rel(source).display());
        println!("Current Resolution: {}", info.resolution());
        if plan.downscale {
            println!("Target Resolution: {}x{}", plan.width, plan.height);
        }
        println!("File Size: {}", format_mb(info.size_bytes));
        println!("Duration: {}", format_hms(info.duration_secs));
        println!("Encoding Settings:");
        if plan.reencode_video {
            print!(
                "  Video: libx264 | Preset: {} | CRF: {} | Profile: {}",
                targets.preset, targets.crf, targets.profile
            );
            if let Some(tune) = targets.tune {
                print!(" | Tune: {}", tune);
            }
            println!();
            if let (Some(maxrate), Some(bufsize)) = (plan.maxrate, plan.bufsize) {
                println!("  Max Bitrate: {} | Buffer Size: {}", maxrate, bufsize);
            }
        } else {
            println!("  Video: stream copy (already within target resolution)");
        }
        println!("  Audio: aac 128k");
    }

    fn progress_sink(&self, _total_secs: f64) -> Box<dyn ProgressSink> {
        let bar = ProgressBar::new(100);
        if let Ok(style) =
            ProgressStyle::with_template("Converting: {percent:>3}%|{bar:40}| [{elapsed_precise}]")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        Box::new(BarSink { bar })
    }

    fn attempt_completed(&self, report: &ConversionReport) {
        println!("\n\u{2713} Completed: {}", self.rel(&report.output).display());
        println!("Original Size: {}", format_mb(report.original_bytes));
        println!("Final Size: {}", format_mb(report.final_bytes));
        println!("Size Reduction: {:.1}%", report.reduction_percent());
    }

    fn attempt_failed(&self, source: &Path, error: &ConvertError) {
        println!("\n\u{2717} Failed: {}: {}", self.rel(source).display(), error);
    }
}

struct BarSink {
    bar: ProgressBar,
}

impl ProgressSink for BarSink {
    fn publish(&mut self, percent: f64) {
        self.bar.set_position(percent.round() as u64);
    }

    fn finished(&mut self) {
        self.bar.finish();
    }
}

/// Reports nothing; for tests and quiet embedding
pub struct NullReporter;

impl Reporter for NullReporter {
    fn attempt_started(
        &self,
        _source: &Path,
        _info: &MediaInfo,
        _plan: &EncodePlan,
        _targets: &EncodeTargets,
    ) {
    }

    fn progress_sink(&self, _total_secs: f64) -> Box<dyn ProgressSink> {
        Box::new(NullSink)
    }

    fn attempt_completed(&self, _report: &ConversionReport) {}

    fn attempt_failed(&self, _source: &Path, _error: &ConvertError) {}
}

struct NullSink;

impl ProgressSink for NullSink {
    fn publish(&mut self, _percent: f64) {}

    fn finished(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(59.9), "00:00:59");
        assert_eq!(format_hms(61.0), "00:01:01");
        assert_eq!(format_hms(3661.0), "01:01:01");
        assert_eq!(format_hms(-5.0), "00:00:00");
    }

    #[test]
    fn test_format_mb_two_decimals() {
        assert_eq!(format_mb(1024 * 1024), "1.00 MB");
        assert_eq!(format_mb(1536 * 1024), "1.50 MB");
        assert_eq!(format_mb(0), "0.00 MB");
    }

    #[test]
    fn test_console_paths_shown_relative_to_root() {
        let reporter = ConsoleReporter::new(PathBuf::from("/media/incoming"));
        assert_eq!(
            reporter.rel(Path::new("/media/incoming/shows/ep1.mkv")),
            Path::new("shows/ep1.mkv")
        );
        // Paths outside the root are shown as-is
        assert_eq!(
            reporter.rel(Path::new("/elsewhere/ep1.mkv")),
            Path::new("/elsewhere/ep1.mkv")
        );
    }

    #[test]
    fn test_null_reporter_sink_accepts_updates() {
        let reporter = NullReporter;
        let mut sink = reporter.progress_sink(100.0);
        sink.publish(50.0);
        sink.finished();
    }
}
