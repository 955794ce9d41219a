//! Startup checks for the conversion daemon.
//!
//! Verifies that the external tools the pipeline shells out to are present
//! before watching begins:
//! - FFmpeg availability (used for encoding)
//! - FFprobe availability (used for media inspection)

use std::process::Command;
use thiserror::Error;

/// Error types for startup checks
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("FFmpeg not available: {0}")]
    FfmpegUnavailable(String),

    #[error("FFprobe not available: {0}")]
    FfprobeUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parse FFmpeg version string and extract major version number
///
/// Handles various FFmpeg version formats:
/// - Standard: "ffmpeg version 6.0 ..."
/// - N-prefixed: "ffmpeg version n6.0-... ..."
pub fn parse_ffmpeg_version(version_output: &str) -> Option<u32> {
    let version_line = version_output
        .lines()
        .find(|line| line.to_lowercase().contains("ffmpeg version"))?;

    let version_part = version_line
        .to_lowercase()
        .split("ffmpeg version")
        .nth(1)?
        .trim()
        .split_whitespace()
        .next()?
        .to_string();

    // Handle n-prefixed versions (e.g., "n6.0-...")
    let version_str = version_part.trim_start_matches('n');

    let major_str = version_str.split(|c| c == '.' || c == '-').next()?;

    major_str.parse().ok()
}

/// Check if FFmpeg is available by running `ffmpeg -version`
///
/// The detected version is logged for diagnostics but not gated on; any
/// mainstream build carries the libx264 and aac codecs this daemon uses.
pub fn check_ffmpeg_available() -> Result<(), StartupError> {
    let output = Command::new("ffmpeg").arg("-version").output().map_err(|e| {
        StartupError::FfmpegUnavailable(format!(
            "ffmpeg -version failed; is FFmpeg installed and in PATH? Error: {}",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(StartupError::FfmpegUnavailable(
            "ffmpeg -version failed; is FFmpeg installed and in PATH?".to_string(),
        ));
    }

    let version_output = String::from_utf8_lossy(&output.stdout);
    match parse_ffmpeg_version(&version_output) {
        Some(major) => tracing::info!(major_version = major, "ffmpeg found"),
        None => tracing::debug!("ffmpeg found, version string not recognized"),
    }

    Ok(())
}

/// Check if FFprobe is available by running `ffprobe -version`
pub fn check_ffprobe_available() -> Result<(), StartupError> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            StartupError::FfprobeUnavailable(format!(
                "ffprobe -version failed; is FFprobe installed and in PATH? Error: {}",
                e
            ))
        })?;

    if !output.status.success() {
        return Err(StartupError::FfprobeUnavailable(
            "ffprobe -version failed; is FFprobe installed and in PATH?".to_string(),
        ));
    }

    Ok(())
}

/// Run all startup checks in order
///
/// Checks are run in the following order:
/// 1. FFmpeg availability
/// 2. FFprobe availability
pub fn run_startup_checks() -> Result<(), StartupError> {
    check_ffmpeg_available()?;
    check_ffprobe_available()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_ffmpeg_version_parsing_standard(
            major in 1u32..20,
            minor in 0u32..10,
            patch in 0u32..10,
        ) {
            let version_output = format!(
                "ffmpeg version {}.{}.{} Copyright (c) 2000-2024 the FFmpeg developers",
                major, minor, patch
            );

            let parsed = parse_ffmpeg_version(&version_output);
            prop_assert_eq!(
                parsed, Some(major),
                "Should parse major version {} from '{}'",
                major, version_output
            );
        }

        #[test]
        fn prop_ffmpeg_version_parsing_n_prefixed(
            major in 1u32..20,
            minor in 0u32..10,
            git_hash in "[a-f0-9]{7}",
        ) {
            let version_output = format!(
                "ffmpeg version n{}.{}-123-g{} Copyright (c) 2000-2024",
                major, minor, git_hash
            );

            let parsed = parse_ffmpeg_version(&version_output);
            prop_assert_eq!(
                parsed, Some(major),
                "Should parse major version {} from n-prefixed '{}'",
                major, version_output
            );
        }

        #[test]
        fn prop_ffmpeg_version_parsing_multiline(
            major in 1u32..20,
            minor in 0u32..10,
        ) {
            let version_output = format!(
                "ffmpeg version {}.{} Copyright (c) 2000-2024\nbuilt with gcc 12.2.0\nconfiguration: --enable-gpl",
                major, minor
            );

            let parsed = parse_ffmpeg_version(&version_output);
            prop_assert_eq!(
                parsed, Some(major),
                "Should parse major version {} from multiline output",
                major
            );
        }
    }

    #[test]
    fn test_parse_ffmpeg_version_standard() {
        let output = "ffmpeg version 6.0 Copyright (c) 2000-2024";
        assert_eq!(parse_ffmpeg_version(output), Some(6));
    }

    #[test]
    fn test_parse_ffmpeg_version_n_prefixed() {
        let output = "ffmpeg version n6.0-123-gabcdef Copyright (c) 2000-2024";
        assert_eq!(parse_ffmpeg_version(output), Some(6));
    }

    #[test]
    fn test_parse_ffmpeg_version_with_minor() {
        let output = "ffmpeg version 5.1.2 Copyright (c) 2000-2024";
        assert_eq!(parse_ffmpeg_version(output), Some(5));
    }

    #[test]
    fn test_parse_ffmpeg_version_multiline() {
        let output = r#"ffmpeg version n6.0-5-g1234567 Copyright (c) 2000-2024
built with gcc 12.2.0
configuration: --enable-gpl"#;
        assert_eq!(parse_ffmpeg_version(output), Some(6));
    }

    #[test]
    fn test_parse_ffmpeg_version_invalid() {
        assert_eq!(parse_ffmpeg_version("not ffmpeg output"), None);
        assert_eq!(parse_ffmpeg_version(""), None);
    }
}
