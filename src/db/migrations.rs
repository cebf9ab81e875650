// Database migrations
use rusqlite::Connection;

use crate::error::Result;

pub fn run_migrations(conn: &Connection) -> Result<()> {
    // Enable foreign keys so playlist rows cascade
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Cached track metadata, keyed by path
    conn.execute(
        "CREATE TABLE IF NOT EXISTS tracks (
            id INTEGER PRIMARY KEY,
            filepath TEXT UNIQUE NOT NULL,
            mtime REAL NOT NULL,
            title TEXT,
            artist TEXT,
            album TEXT,
            year TEXT,
            genre TEXT,
            track_number INTEGER,
            duration REAL,
            codec TEXT,
            bitrate INTEGER,
            sample_rate INTEGER,
            bit_depth INTEGER
        )",
        [],
    )?;

    // Older caches predate the genre column
    if !has_column(conn, "tracks", "genre")? {
        conn.execute("ALTER TABLE tracks ADD COLUMN genre TEXT", [])?;
    }

    // Saved playlists
    conn.execute(
        "CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at REAL NOT NULL,
            modified_at REAL NOT NULL
        )",
        [],
    )?;

    // Playlist entries reference tracks by path, not by row id
    conn.execute(
        "CREATE TABLE IF NOT EXISTS playlist_tracks (
            id INTEGER PRIMARY KEY,
            playlist_id TEXT NOT NULL,
            track_path TEXT NOT NULL,
            position INTEGER NOT NULL,
            FOREIGN KEY (playlist_id) REFERENCES playlists(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS favorites (
            filepath TEXT PRIMARY KEY
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_tracks_artist_album ON tracks(artist, album)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_playlist_tracks_playlist
         ON playlist_tracks(playlist_id, position)",
        [],
    )?;

    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}
