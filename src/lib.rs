// Wired - music library player core
// Module declarations
pub mod commands;
pub mod db;
pub mod error;
pub mod library;
pub mod metadata;
pub mod observers;
pub mod playlist;
pub mod queue;
pub mod search;
pub mod settings;
pub mod state;

pub use db::connection::DatabaseConnection;
pub use db::models::{SavedPlaylist, Track};
pub use error::{Error, Result};
pub use library::{CancelToken, LibraryIndexer, ScanEvent, ScanSummary};
pub use metadata::{MetadataExtractor, TagReader};
pub use playlist::{Playlist, PlaylistManager, SortKey};
pub use queue::PlaybackQueue;
pub use settings::AppSettings;
pub use state::AppState;
