//! Scanner module for discovering conversion candidates in the watched tree.
//!
//! Classification lives here so the startup scan and the live watcher agree
//! on exactly which paths are sources and which are this daemon's own
//! artifacts.

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The watched input container extension (case-insensitive matching).
pub const INPUT_EXTENSION: &str = "mkv";

/// The produced output container extension.
pub const OUTPUT_EXTENSION: &str = "mp4";

/// Name infix marking an in-progress encoder output.
pub const TEMP_MARKER: &str = ".temp.";

fn extension_matches(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Checks if a file is a watched input (by extension, case-insensitive).
pub fn is_input_file(path: &Path) -> bool {
    extension_matches(path, INPUT_EXTENSION)
}

/// Checks if a path is something this daemon itself produces.
///
/// Covers finished outputs (the output extension) and in-progress encoder
/// writes (the `.temp.` name infix); both are excluded everywhere so a
/// converted tree is never re-processed.
pub fn is_derived_artifact(path: &Path) -> bool {
    if extension_matches(path, OUTPUT_EXTENSION) {
        return true;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_ascii_lowercase().contains(TEMP_MARKER))
        .unwrap_or(false)
}

/// Checks if a path is a conversion candidate.
pub fn is_candidate(path: &Path) -> bool {
    is_input_file(path) && !is_derived_artifact(path)
}

/// Recursively collects conversion candidates under the root.
///
/// This function:
/// - Skips hidden directories (names starting with `.`), except the root itself
/// - Filters files through [`is_candidate`]
/// - Sorts the result so startup processing order is deterministic
pub fn scan_tree(root: &Path) -> Vec<PathBuf> {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.file_type().is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                // Allow the root directory even if it starts with '.'
                if name.starts_with('.') && entry.depth() > 0 {
                    return false;
                }
            }
        }
        true
    });

    let mut found: Vec<PathBuf> = walker
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| is_candidate(p))
        .collect();
    found.sort();
    found
}
