//! Crate-wide error type.
//!
//! Per-file problems (unreadable tags, vanished files, permission errors
//! while walking) are recovered where they happen and never reach this
//! type. What does reach it is structural: the cache, the settings file,
//! or a request that names something that does not exist.

use std::path::PathBuf;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// Tag reading failed for a single file.
    #[error("Metadata error for {path}: {message}")]
    Metadata { path: PathBuf, message: String },

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("Import failed: {0}")]
    Import(String),

    #[error("Invalid filter '{0}', expected one of artist, album, year, codec")]
    InvalidFilter(String),

    #[error("Invalid sort key '{0}'")]
    InvalidSortKey(String),

    #[error("Scan worker error: {0}")]
    Worker(String),
}

impl Error {
    pub fn metadata(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Error::Metadata {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
