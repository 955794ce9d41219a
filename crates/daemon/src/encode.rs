//! ffmpeg invocation: command construction and progress-streamed execution

use crate::plan::EncodePlan;
use crate::progress::{parse_progress_line, ProgressTracker};
use mkv2mp4_config::EncodeTargets;
use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Last stderr lines kept for failure diagnostics
const STDERR_TAIL_LINES: usize = 40;

/// Errors from the encode stage
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("ffmpeg exited with code {code}: {stderr_tail}")]
    FfmpegFailed { code: i32, stderr_tail: String },
    #[error("ffmpeg terminated by signal")]
    FfmpegTerminated,
    #[error("encoder produced no output file")]
    MissingOutput,
    #[error("encoder produced an empty output file")]
    EmptyOutput,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the ffmpeg command for one attempt
///
/// Audio is always re-encoded to AAC for MP4 compatibility. Video is either
/// copied unchanged or re-encoded with libx264 under the plan's rate control
/// and optional downscale filter. Progress lines go to stdout via
/// `-progress pipe:1`; the temporary output path is the final argument.
pub fn build_ffmpeg_command(
    source: &Path,
    temp_output: &Path,
    plan: &EncodePlan,
    targets: &EncodeTargets,
) -> std::process::Command {
    let mut cmd = std::process::Command::new("ffmpeg");
    cmd.arg("-i").arg(source);
    cmd.args(["-c:a", "aac", "-b:a", "128k", "-strict", "experimental"]);

    if plan.reencode_video {
        cmd.args(["-c:v", "libx264"]);
        cmd.args(["-preset", targets.preset.as_str()]);
        cmd.arg("-crf").arg(targets.crf.to_string());
        cmd.args(["-profile:v", targets.profile.as_str()]);
        if let Some(tune) = targets.tune {
            cmd.args(["-tune", tune.as_str()]);
        }
        if let Some(maxrate) = plan.maxrate {
            cmd.arg("-maxrate").arg(maxrate.to_string());
        }
        if let Some(bufsize) = plan.bufsize {
            cmd.arg("-bufsize").arg(bufsize.to_string());
        }
        // Index at the front of the file so playback can start mid-download
        cmd.args(["-movflags", "+faststart"]);
        if plan.downscale {
            cmd.arg("-vf")
                .arg(format!("scale={}:{}", plan.width, plan.height));
        }
    } else {
        cmd.args(["-c:v", "copy"]);
    }

    cmd.arg("-y");
    cmd.args(["-progress", "pipe:1"]);
    cmd.arg(temp_output);
    cmd
}

/// Spawn ffmpeg and pump its progress stream into the tracker
///
/// stdout carries the `-progress` key=value lines; stderr is drained
/// concurrently (an unread pipe would stall a chatty encoder) and its tail
/// kept for the error message. The child is killed if this future is
/// dropped, which is how operator interrupts cancel an in-flight encode.
pub async fn run_encoder(
    command: std::process::Command,
    tracker: &mut ProgressTracker,
) -> Result<(), EncodeError> {
    let mut cmd = Command::from(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd.spawn()?;

    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut tail: VecDeque<String> = VecDeque::new();
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    });

    if let Some(stdout) = child.stdout.take() {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(secs) = parse_progress_line(&line) {
                tracker.update(secs);
            }
        }
    }

    let status = child.wait().await?;
    let stderr_tail = stderr_task.await.unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        match status.code() {
            Some(code) => Err(EncodeError::FfmpegFailed { code, stderr_tail }),
            None => Err(EncodeError::FfmpegTerminated),
        }
    }
}
