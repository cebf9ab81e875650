// Database module
// This module owns the SQLite metadata cache

pub mod connection;
pub mod migrations;
pub mod models;
pub mod operations;

pub use connection::DatabaseConnection;
pub use models::{CacheEntry, SavedPlaylist, Track};
pub use operations::DbOperations;
