//! Source media inspection via ffprobe

use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

/// Errors from media inspection
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("ffprobe failed: {0}")]
    FfprobeFailed(String),
    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),
    #[error("no video stream found")]
    NoVideoStream,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata for one source file, captured once per conversion attempt
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Container duration in seconds; 0.0 when the container does not say
    pub duration_secs: f64,
    /// Container size in bytes; 0 when the container does not say
    pub size_bytes: u64,
}

impl MediaInfo {
    /// "WxH" form used in logs and console output
    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Raw ffprobe JSON structures (internal)
mod ffprobe_json {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct FfprobeOutput {
        #[serde(default)]
        pub streams: Vec<Stream>,
        pub format: Option<Format>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Stream {
        pub codec_type: Option<String>,
        pub width: Option<u32>,
        pub height: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Format {
        pub duration: Option<String>,
        pub size: Option<String>,
    }
}

/// Inspect a media file with ffprobe
///
/// Runs `ffprobe -v quiet -print_format json -show_format -show_streams`
/// and extracts the first video stream's dimensions plus the container
/// duration and size.
pub async fn inspect(path: &Path) -> Result<MediaInfo, ProbeError> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("quiet")
        .arg("-print_format")
        .arg("json")
        .arg("-show_format")
        .arg("-show_streams")
        .arg(path)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProbeError::FfprobeFailed(format!(
            "exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_probe_output(&stdout)
}

/// Parse ffprobe JSON output into MediaInfo
///
/// The first stream with `codec_type == "video"` wins. Dimensions are
/// required; duration and size fall back to zero so that files with
/// incomplete container metadata still convert (progress reporting is
/// suppressed for them downstream).
pub fn parse_probe_output(json: &str) -> Result<MediaInfo, ProbeError> {
    let parsed: ffprobe_json::FfprobeOutput =
        serde_json::from_str(json).map_err(|e| ProbeError::ParseError(e.to_string()))?;

    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(ProbeError::NoVideoStream)?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) => (w, h),
        _ => {
            return Err(ProbeError::ParseError(
                "video stream missing dimensions".to_string(),
            ))
        }
    };

    let (duration_secs, size_bytes) = match &parsed.format {
        Some(format) => {
            let duration = format
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0)
                .max(0.0);
            let size = format
                .size
                .as_deref()
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            (duration, size)
        }
        None => (0.0, 0),
    };

    Ok(MediaInfo {
        width,
        height,
        duration_secs,
        size_bytes,
    })
}
