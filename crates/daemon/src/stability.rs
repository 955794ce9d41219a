//! Stability checking module for verifying files are not being written to.
//!
//! A file that just appeared in the watched tree may still be mid-copy.
//! Before probing it, we wait until its size stops changing over a
//! configurable interval.

use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;

/// Result of a stability check on a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StabilityResult {
    /// File size remained unchanged during the stability window.
    Stable,
    /// File size changed during the stability window.
    Unstable {
        /// Size when first checked.
        initial_size: u64,
        /// Size after waiting.
        current_size: u64,
    },
}

/// Check if a file is stable by comparing its size before and after a wait period.
///
/// # Arguments
/// * `path` - Path to the file to check
/// * `initial_size` - The file size when first observed
/// * `wait` - How long to wait before re-checking
///
/// # Returns
/// * `Ok(StabilityResult::Stable)` if the file size is unchanged
/// * `Ok(StabilityResult::Unstable { .. })` if the file size changed
/// * `Err` if the file cannot be read
pub async fn check_stability(
    path: &Path,
    initial_size: u64,
    wait: Duration,
) -> Result<StabilityResult, std::io::Error> {
    sleep(wait).await;

    let metadata = tokio::fs::metadata(path).await?;
    let current_size = metadata.len();

    Ok(compare_sizes(initial_size, current_size))
}

/// Waits until the file's size holds steady across one full interval.
///
/// Re-checks up to `max_checks` times. If the file is still growing after
/// that, a warning is logged and the last observed size is returned so the
/// caller can proceed rather than stall forever. Returns an error if the
/// file disappears during the wait.
pub async fn wait_until_stable(
    path: &Path,
    interval: Duration,
    max_checks: u32,
) -> Result<u64, std::io::Error> {
    let mut known_size = tokio::fs::metadata(path).await?.len();

    for _ in 0..max_checks {
        match check_stability(path, known_size, interval).await? {
            StabilityResult::Stable => return Ok(known_size),
            StabilityResult::Unstable { current_size, .. } => {
                tracing::debug!(
                    path = %path.display(),
                    previous = known_size,
                    current = current_size,
                    "file still growing, waiting"
                );
                known_size = current_size;
            }
        }
    }

    tracing::warn!(
        path = %path.display(),
        checks = max_checks,
        "file size never settled, processing anyway"
    );
    Ok(known_size)
}

/// Compare two file sizes and return the appropriate StabilityResult.
///
/// This is a pure function extracted for property testing.
#[inline]
pub fn compare_sizes(initial_size: u64, current_size: u64) -> StabilityResult {
    if initial_size == current_size {
        StabilityResult::Stable
    } else {
        StabilityResult::Unstable {
            initial_size,
            current_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::TempDir;

    proptest! {
        #[test]
        fn prop_stability_size_comparison(initial_size: u64, current_size: u64) {
            let result = compare_sizes(initial_size, current_size);

            if initial_size == current_size {
                prop_assert_eq!(result, StabilityResult::Stable);
            } else {
                match result {
                    StabilityResult::Unstable { initial_size: i, current_size: c } => {
                        prop_assert_eq!(i, initial_size);
                        prop_assert_eq!(c, current_size);
                    }
                    StabilityResult::Stable => {
                        prop_assert!(false, "Expected Unstable when sizes differ");
                    }
                }
            }
        }
    }

    #[test]
    fn test_compare_sizes_stable() {
        let result = compare_sizes(1000, 1000);
        assert_eq!(result, StabilityResult::Stable);
    }

    #[test]
    fn test_compare_sizes_unstable_larger() {
        let result = compare_sizes(1000, 2000);
        assert_eq!(
            result,
            StabilityResult::Unstable {
                initial_size: 1000,
                current_size: 2000
            }
        );
    }

    #[test]
    fn test_compare_sizes_unstable_smaller() {
        let result = compare_sizes(2000, 1000);
        assert_eq!(
            result,
            StabilityResult::Unstable {
                initial_size: 2000,
                current_size: 1000
            }
        );
    }

    #[tokio::test]
    async fn test_check_stability_reports_changed_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movie.mkv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"0123456789").unwrap();

        // An initial size that no longer matches reads as unstable.
        let result = check_stability(&path, 3, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(
            result,
            StabilityResult::Unstable {
                initial_size: 3,
                current_size: 10
            }
        );
    }

    #[tokio::test]
    async fn test_wait_until_stable_returns_settled_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("movie.mkv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"matroska data").unwrap();
        drop(file);

        let size = wait_until_stable(&path, Duration::from_millis(1), 5)
            .await
            .unwrap();
        assert_eq!(size, 13);
    }

    #[tokio::test]
    async fn test_wait_until_stable_missing_file_errors() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("gone.mkv");

        let result = wait_until_stable(&path, Duration::from_millis(1), 3).await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().kind(),
            std::io::ErrorKind::NotFound
        );
    }
}
