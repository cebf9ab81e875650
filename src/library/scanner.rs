use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

use super::cancel::CancelToken;

/// List of supported audio file extensions
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp3", "flac", "ogg", "wav", "m4a", "opus", "aac", "wma",
];

/// Case-insensitive check against [`SUPPORTED_EXTENSIONS`]
pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Modification time as fractional epoch seconds, `None` if the file can't be stat'ed
pub fn file_mtime(path: &Path) -> Option<f64> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
        .map(|since| since.as_secs_f64())
}

/// Scanner for finding audio files in a directory tree
pub struct DirectoryScanner;

impl DirectoryScanner {
    /// Scan a directory recursively and return all audio file paths, sorted.
    ///
    /// Unreadable directories and entries are skipped. When `cancel` fires
    /// the walk stops early and returns what it found so far; callers must
    /// check the token before trusting the list as complete.
    pub fn scan<P: AsRef<Path>>(directory: P, cancel: &CancelToken) -> Vec<PathBuf> {
        let mut audio_files = Vec::new();

        for entry in WalkDir::new(directory).follow_links(false).into_iter() {
            if cancel.is_cancelled() {
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            if path.is_file() && is_audio_file(path) {
                audio_files.push(path.to_path_buf());
            }
        }

        // Sort by path for consistent ordering
        audio_files.sort();
        audio_files
    }
}
