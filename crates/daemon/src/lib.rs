//! MKV to MP4 conversion daemon
//!
//! Background service that watches a directory tree for MKV files and
//! converts each one to a streaming-ready MP4, deleting the source after the
//! verified output is in place.

pub mod convert;
pub mod daemon;
pub mod encode;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod publish;
pub mod report;
pub mod scan;
pub mod stability;
pub mod startup;
pub mod stats;
pub mod status_server;
pub mod watch;

pub use mkv2mp4_config as config;
pub use mkv2mp4_config::Config;

pub use convert::{
    output_path, temp_path, AttemptOutcome, AttemptState, ConversionAttempt, ConversionReport,
    ConvertError, Converter,
};
pub use daemon::{Daemon, DaemonError};
pub use encode::{build_ffmpeg_command, run_encoder, EncodeError};
pub use plan::{plan, recommended_bitrate, EncodePlan};
pub use probe::{inspect, MediaInfo, ProbeError};
pub use progress::{parse_progress_line, progress_percent, ProgressSink, ProgressTracker};
pub use publish::{publish_output, PublishError};
pub use report::{ConsoleReporter, NullReporter, Reporter};
pub use scan::{is_candidate, is_derived_artifact, is_input_file, scan_tree};
pub use stability::{check_stability, compare_sizes, wait_until_stable, StabilityResult};
pub use startup::{
    check_ffmpeg_available, check_ffprobe_available, parse_ffmpeg_version, run_startup_checks,
    StartupError,
};
pub use stats::{
    collect_system_stats, new_shared_stats, AttemptStats, SharedStats, StatsSnapshot, SystemStats,
};
pub use status_server::{create_status_router, run_status_server, ServerError};
pub use watch::{relevant_paths, spawn_watcher, WatchError};
