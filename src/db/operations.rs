use rusqlite::{params, OptionalExtension, Row};
use std::collections::{HashMap, HashSet};

use crate::db::connection::DatabaseConnection;
use crate::db::models::{now_timestamp, timestamp_to_datetime, CacheEntry, SavedPlaylist, Track, UNKNOWN};
use crate::error::{Error, Result};

const TRACK_COLUMNS: &str = "t.filepath, t.title, t.artist, t.album, t.year, t.genre,
     t.track_number, t.duration, t.codec, t.bitrate, t.sample_rate, t.bit_depth,
     f.filepath IS NOT NULL";

/// Database operations for the library cache
pub struct DbOperations;

impl DbOperations {
    // ===== Track cache =====

    /// Get all cached tracks, ordered by path
    pub fn get_all_tracks(db: &DatabaseConnection) -> Result<Vec<Track>> {
        let conn = db.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {TRACK_COLUMNS}
             FROM tracks t
             LEFT JOIN favorites f ON f.filepath = t.filepath
             ORDER BY t.filepath"
        ))?;

        let tracks = stmt
            .query_map([], track_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tracks)
    }

    /// Get a single track by file path
    pub fn get_track(db: &DatabaseConnection, file_path: &str) -> Result<Option<Track>> {
        let conn = db.lock();

        let track = conn
            .query_row(
                &format!(
                    "SELECT {TRACK_COLUMNS}
                     FROM tracks t
                     LEFT JOIN favorites f ON f.filepath = t.filepath
                     WHERE t.filepath = ?1"
                ),
                [file_path],
                track_from_row,
            )
            .optional()?;

        Ok(track)
    }

    /// Path -> modification time for every cached track
    pub fn get_cached_mtimes(db: &DatabaseConnection) -> Result<HashMap<String, f64>> {
        let conn = db.lock();

        let mut stmt = conn.prepare("SELECT filepath, mtime FROM tracks")?;
        let mtimes = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()?;

        Ok(mtimes)
    }

    /// Insert or replace a batch of tracks in one transaction
    pub fn upsert_tracks(db: &DatabaseConnection, entries: &[CacheEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut conn = db.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO tracks
                 (filepath, mtime, title, artist, album, year, genre, track_number,
                  duration, codec, bitrate, sample_rate, bit_depth)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;

            for entry in entries {
                let track = &entry.track;
                stmt.execute(params![
                    track.file_path,
                    entry.mtime,
                    track.title,
                    track.artist,
                    track.album,
                    track.year,
                    track.genre,
                    track.track_number,
                    track.duration,
                    track.codec,
                    track.bitrate,
                    track.sample_rate,
                    track.bit_depth,
                ])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    /// Remove tracks by path, returns how many rows were deleted
    pub fn remove_tracks(db: &DatabaseConnection, file_paths: &[String]) -> Result<usize> {
        if file_paths.is_empty() {
            return Ok(0);
        }

        let mut conn = db.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM tracks WHERE filepath = ?1")?;
            for path in file_paths {
                removed += stmt.execute([path])?;
            }
        }
        tx.commit()?;

        Ok(removed)
    }

    /// Remove every cached track whose path is not in `keep`
    pub fn remove_tracks_not_in(db: &DatabaseConnection, keep: &HashSet<String>) -> Result<usize> {
        let stale: Vec<String> = Self::get_cached_mtimes(db)?
            .into_keys()
            .filter(|path| !keep.contains(path))
            .collect();

        Self::remove_tracks(db, &stale)
    }

    /// Drop all cached tracks (used when the library root changes)
    pub fn clear(db: &DatabaseConnection) -> Result<()> {
        db.lock().execute("DELETE FROM tracks", [])?;
        Ok(())
    }

    pub fn count(db: &DatabaseConnection) -> Result<usize> {
        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ===== Saved playlists =====

    /// Get all playlists with their track counts, ordered by name
    pub fn get_all_playlists(db: &DatabaseConnection) -> Result<Vec<SavedPlaylist>> {
        let conn = db.lock();

        let mut stmt = conn.prepare(
            "SELECT p.id, p.name, p.created_at, p.modified_at,
                    (SELECT COUNT(*) FROM playlist_tracks pt WHERE pt.playlist_id = p.id)
             FROM playlists p
             ORDER BY p.name",
        )?;

        let playlists = stmt
            .query_map([], playlist_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(playlists)
    }

    pub fn get_playlist(db: &DatabaseConnection, playlist_id: &str) -> Result<Option<SavedPlaylist>> {
        let conn = db.lock();

        let playlist = conn
            .query_row(
                "SELECT p.id, p.name, p.created_at, p.modified_at,
                        (SELECT COUNT(*) FROM playlist_tracks pt WHERE pt.playlist_id = p.id)
                 FROM playlists p
                 WHERE p.id = ?1",
                [playlist_id],
                playlist_from_row,
            )
            .optional()?;

        Ok(playlist)
    }

    /// Track paths of a playlist in position order
    pub fn get_playlist_tracks(db: &DatabaseConnection, playlist_id: &str) -> Result<Vec<String>> {
        let conn = db.lock();

        let mut stmt = conn.prepare(
            "SELECT track_path FROM playlist_tracks
             WHERE playlist_id = ?1
             ORDER BY position",
        )?;
        let paths = stmt
            .query_map([playlist_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(paths)
    }

    pub fn get_playlist_track_count(db: &DatabaseConnection, playlist_id: &str) -> Result<usize> {
        let count: i64 = db.lock().query_row(
            "SELECT COUNT(*) FROM playlist_tracks WHERE playlist_id = ?1",
            [playlist_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Create a new empty playlist, returns its generated id
    pub fn create_playlist(db: &DatabaseConnection, name: &str) -> Result<String> {
        let playlist_id = uuid::Uuid::new_v4().to_string();
        let now = now_timestamp();

        db.lock().execute(
            "INSERT INTO playlists (id, name, created_at, modified_at) VALUES (?1, ?2, ?3, ?4)",
            params![playlist_id, name, now, now],
        )?;

        Ok(playlist_id)
    }

    pub fn rename_playlist(db: &DatabaseConnection, playlist_id: &str, name: &str) -> Result<()> {
        let rows_affected = db.lock().execute(
            "UPDATE playlists SET name = ?1, modified_at = ?2 WHERE id = ?3",
            params![name, now_timestamp(), playlist_id],
        )?;

        if rows_affected == 0 {
            return Err(Error::PlaylistNotFound(playlist_id.to_string()));
        }

        Ok(())
    }

    /// Delete a playlist; its entries go with it through the cascade
    pub fn delete_playlist(db: &DatabaseConnection, playlist_id: &str) -> Result<()> {
        let rows_affected = db
            .lock()
            .execute("DELETE FROM playlists WHERE id = ?1", [playlist_id])?;

        if rows_affected == 0 {
            return Err(Error::PlaylistNotFound(playlist_id.to_string()));
        }

        Ok(())
    }

    /// Append tracks after the current last position
    pub fn add_tracks_to_playlist(
        db: &DatabaseConnection,
        playlist_id: &str,
        track_paths: &[String],
    ) -> Result<()> {
        if track_paths.is_empty() {
            return Ok(());
        }

        let mut conn = db.lock();
        let tx = conn.transaction()?;

        let max_position: i64 = tx.query_row(
            "SELECT COALESCE(MAX(position), -1) FROM playlist_tracks WHERE playlist_id = ?1",
            [playlist_id],
            |row| row.get(0),
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO playlist_tracks (playlist_id, track_path, position) VALUES (?1, ?2, ?3)",
            )?;
            for (index, path) in track_paths.iter().enumerate() {
                stmt.execute(params![playlist_id, path, max_position + 1 + index as i64])?;
            }
        }
        touch_playlist(&tx, playlist_id)?;

        tx.commit()?;
        Ok(())
    }

    /// Remove every entry for the given paths, then renumber positions densely
    pub fn remove_tracks_from_playlist(
        db: &DatabaseConnection,
        playlist_id: &str,
        track_paths: &[String],
    ) -> Result<()> {
        if track_paths.is_empty() {
            return Ok(());
        }

        let mut conn = db.lock();
        let tx = conn.transaction()?;
        {
            let mut delete = tx.prepare(
                "DELETE FROM playlist_tracks WHERE playlist_id = ?1 AND track_path = ?2",
            )?;
            for path in track_paths {
                delete.execute(params![playlist_id, path])?;
            }

            let mut select = tx.prepare(
                "SELECT id FROM playlist_tracks WHERE playlist_id = ?1 ORDER BY position",
            )?;
            let remaining = select
                .query_map([playlist_id], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let mut renumber = tx.prepare("UPDATE playlist_tracks SET position = ?1 WHERE id = ?2")?;
            for (position, row_id) in remaining.iter().enumerate() {
                renumber.execute(params![position as i64, row_id])?;
            }
        }
        touch_playlist(&tx, playlist_id)?;

        tx.commit()?;
        Ok(())
    }

    /// Replace the whole contents of a playlist
    pub fn set_playlist_tracks(
        db: &DatabaseConnection,
        playlist_id: &str,
        track_paths: &[String],
    ) -> Result<()> {
        let mut conn = db.lock();
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM playlist_tracks WHERE playlist_id = ?1", [playlist_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO playlist_tracks (playlist_id, track_path, position) VALUES (?1, ?2, ?3)",
            )?;
            for (position, path) in track_paths.iter().enumerate() {
                stmt.execute(params![playlist_id, path, position as i64])?;
            }
        }
        touch_playlist(&tx, playlist_id)?;

        tx.commit()?;
        Ok(())
    }

    // ===== Favorites =====

    pub fn is_favorite(db: &DatabaseConnection, file_path: &str) -> Result<bool> {
        let found = db
            .lock()
            .query_row("SELECT 1 FROM favorites WHERE filepath = ?1", [file_path], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn set_favorite(db: &DatabaseConnection, file_path: &str, favorite: bool) -> Result<()> {
        let conn = db.lock();
        if favorite {
            conn.execute("INSERT OR IGNORE INTO favorites (filepath) VALUES (?1)", [file_path])?;
        } else {
            conn.execute("DELETE FROM favorites WHERE filepath = ?1", [file_path])?;
        }
        Ok(())
    }

    pub fn get_all_favorites(db: &DatabaseConnection) -> Result<HashSet<String>> {
        let conn = db.lock();

        let mut stmt = conn.prepare("SELECT filepath FROM favorites")?;
        let favorites = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<HashSet<String>, _>>()?;

        Ok(favorites)
    }

    pub fn get_favorites_count(db: &DatabaseConnection) -> Result<usize> {
        let count: i64 = db
            .lock()
            .query_row("SELECT COUNT(*) FROM favorites", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn touch_playlist(conn: &rusqlite::Connection, playlist_id: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE playlists SET modified_at = ?1 WHERE id = ?2",
        params![now_timestamp(), playlist_id],
    )?;
    Ok(())
}

fn track_from_row(row: &Row<'_>) -> rusqlite::Result<Track> {
    let text = |index: usize, default: &str| -> rusqlite::Result<String> {
        Ok(row
            .get::<_, Option<String>>(index)?
            .unwrap_or_else(|| default.to_string()))
    };

    Ok(Track {
        file_path: row.get(0)?,
        title: text(1, UNKNOWN)?,
        artist: text(2, UNKNOWN)?,
        album: text(3, UNKNOWN)?,
        year: text(4, "")?,
        genre: text(5, "")?,
        track_number: row.get::<_, Option<u32>>(6)?.unwrap_or(0),
        duration: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        codec: text(8, UNKNOWN)?,
        bitrate: row.get::<_, Option<u32>>(9)?.unwrap_or(0),
        sample_rate: row.get::<_, Option<u32>>(10)?.unwrap_or(0),
        bit_depth: row.get::<_, Option<u32>>(11)?.unwrap_or(0),
        favorite: row.get(12)?,
        album_art: None,
    })
}

fn playlist_from_row(row: &Row<'_>) -> rusqlite::Result<SavedPlaylist> {
    Ok(SavedPlaylist {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: timestamp_to_datetime(row.get(2)?),
        modified_at: timestamp_to_datetime(row.get(3)?),
        track_count: row.get::<_, i64>(4)? as usize,
    })
}
