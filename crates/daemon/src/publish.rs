//! Atomic publication of verified encoder output.
//!
//! The temporary file becomes visible under its final name only through a
//! rename, so readers never observe a half-written output.

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while publishing output.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Failed to create the output's parent directory.
    #[error("Failed to create output directory: {0}")]
    CreateDirFailed(std::io::Error),

    /// Failed to move the temporary output into place.
    #[error("Failed to move output into place: {0}")]
    MoveFailed(std::io::Error),
}

/// Move the verified temporary output onto its final path.
///
/// Tries rename first (atomic, same filesystem) and falls back to
/// copy-then-remove when rename fails. On failure the temporary file is
/// left in place for the caller's cleanup; a partially copied final file
/// is removed.
pub fn publish_output(temp_path: &Path, final_path: &Path) -> Result<(), PublishError> {
    if let Some(parent) = final_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(PublishError::CreateDirFailed)?;
        }
    }

    if fs::rename(temp_path, final_path).is_err() {
        if let Err(e) = fs::copy(temp_path, final_path) {
            let _ = fs::remove_file(final_path);
            return Err(PublishError::MoveFailed(e));
        }
        fs::remove_file(temp_path).map_err(PublishError::MoveFailed)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(content).unwrap();
    }

    #[test]
    fn test_publish_moves_temp_onto_final() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join("movie.temp.mp4");
        let final_path = temp_dir.path().join("movie.mp4");
        write_file(&temp_path, b"encoded content");

        publish_output(&temp_path, &final_path).unwrap();

        assert!(!temp_path.exists(), "temp should be gone");
        let content = fs::read_to_string(&final_path).unwrap();
        assert_eq!(content, "encoded content");
    }

    #[test]
    fn test_publish_replaces_existing_final() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join("movie.temp.mp4");
        let final_path = temp_dir.path().join("movie.mp4");
        write_file(&temp_path, b"new content");
        write_file(&final_path, b"stale content");

        publish_output(&temp_path, &final_path).unwrap();

        let content = fs::read_to_string(&final_path).unwrap();
        assert_eq!(content, "new content");
    }

    #[test]
    fn test_publish_creates_missing_parent() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join("movie.temp.mp4");
        let final_path = temp_dir.path().join("nested/dir/movie.mp4");
        write_file(&temp_path, b"encoded content");

        publish_output(&temp_path, &final_path).unwrap();

        assert!(final_path.exists());
    }

    #[test]
    fn test_publish_missing_temp_fails_and_leaves_no_final() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join("gone.temp.mp4");
        let final_path = temp_dir.path().join("gone.mp4");

        let result = publish_output(&temp_path, &final_path);

        assert!(matches!(result, Err(PublishError::MoveFailed(_))));
        assert!(!final_path.exists());
    }
}
