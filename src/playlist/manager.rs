// Saved playlists stored in the cache
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

use super::m3u;
use crate::db::connection::DatabaseConnection;
use crate::db::models::{SavedPlaylist, Track};
use crate::db::operations::DbOperations;
use crate::error::{Error, Result};
use crate::observers::Observers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaylistManagerEvent {
    /// A playlist was created, renamed or deleted
    PlaylistsChanged,
    /// The tracks of one playlist changed
    PlaylistUpdated(String),
}

/// CRUD over saved playlists.
///
/// Playlists store file paths only; they are resolved against the current
/// library on every read and paths the library no longer has are dropped.
#[derive(Debug)]
pub struct PlaylistManager {
    db: DatabaseConnection,
    observers: Observers<PlaylistManagerEvent>,
}

impl PlaylistManager {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            observers: Observers::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PlaylistManagerEvent) + 'static) {
        self.observers.subscribe(listener);
    }

    /// All playlists ordered by name, with track counts
    pub fn get_all(&self) -> Result<Vec<SavedPlaylist>> {
        DbOperations::get_all_playlists(&self.db)
    }

    pub fn get(&self, playlist_id: &str) -> Result<Option<SavedPlaylist>> {
        DbOperations::get_playlist(&self.db, playlist_id)
    }

    /// Find a playlist by exact id, falling back to a case-insensitive name match
    pub fn find(&self, id_or_name: &str) -> Result<SavedPlaylist> {
        if let Some(playlist) = self.get(id_or_name)? {
            return Ok(playlist);
        }
        self.get_all()?
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(id_or_name))
            .ok_or_else(|| Error::PlaylistNotFound(id_or_name.to_string()))
    }

    pub fn create(&mut self, name: &str) -> Result<SavedPlaylist> {
        let playlist_id = DbOperations::create_playlist(&self.db, name)?;
        self.observers.notify(&PlaylistManagerEvent::PlaylistsChanged);
        self.get(&playlist_id)?
            .ok_or(Error::PlaylistNotFound(playlist_id))
    }

    pub fn rename(&mut self, playlist_id: &str, name: &str) -> Result<()> {
        DbOperations::rename_playlist(&self.db, playlist_id, name)?;
        self.observers.notify(&PlaylistManagerEvent::PlaylistsChanged);
        Ok(())
    }

    /// Delete a playlist and its track entries
    pub fn delete(&mut self, playlist_id: &str) -> Result<()> {
        DbOperations::delete_playlist(&self.db, playlist_id)?;
        self.observers.notify(&PlaylistManagerEvent::PlaylistsChanged);
        Ok(())
    }

    /// Playlist tracks in order, resolved against `library_tracks`
    pub fn get_tracks(&self, playlist_id: &str, library_tracks: &[Track]) -> Result<Vec<Track>> {
        let paths = DbOperations::get_playlist_tracks(&self.db, playlist_id)?;
        let by_path: HashMap<&str, &Track> = library_tracks
            .iter()
            .map(|t| (t.file_path.as_str(), t))
            .collect();

        Ok(paths
            .iter()
            .filter_map(|path| by_path.get(path.as_str()).map(|t| (*t).clone()))
            .collect())
    }

    pub fn add_tracks(&mut self, playlist_id: &str, tracks: &[Track]) -> Result<()> {
        self.ensure_exists(playlist_id)?;
        DbOperations::add_tracks_to_playlist(&self.db, playlist_id, &paths_of(tracks))?;
        self.updated(playlist_id);
        Ok(())
    }

    pub fn remove_tracks(&mut self, playlist_id: &str, tracks: &[Track]) -> Result<()> {
        self.ensure_exists(playlist_id)?;
        DbOperations::remove_tracks_from_playlist(&self.db, playlist_id, &paths_of(tracks))?;
        self.updated(playlist_id);
        Ok(())
    }

    /// Replace all tracks in a playlist
    pub fn set_tracks(&mut self, playlist_id: &str, tracks: &[Track]) -> Result<()> {
        self.ensure_exists(playlist_id)?;
        DbOperations::set_playlist_tracks(&self.db, playlist_id, &paths_of(tracks))?;
        self.updated(playlist_id);
        Ok(())
    }

    /// Write a playlist as extended M3U. Only tracks still in the library are exported.
    pub fn export_m3u(&self, playlist_id: &str, path: &Path, library_tracks: &[Track]) -> Result<()> {
        let playlist = self
            .get(playlist_id)?
            .ok_or_else(|| Error::PlaylistNotFound(playlist_id.to_string()))?;
        let tracks = self.get_tracks(playlist_id, library_tracks)?;

        m3u::export(path, Some(&playlist.name), &tracks)?;
        info!(playlist = %playlist.name, path = %path.display(), tracks = tracks.len(), "exported playlist");
        Ok(())
    }

    /// Create a playlist from an M3U file, keeping only paths present in the library
    pub fn import_m3u(&mut self, path: &Path, library_tracks: &[Track]) -> Result<SavedPlaylist> {
        if !path.is_file() {
            return Err(Error::Import(format!("{} does not exist", path.display())));
        }

        let parsed = m3u::read_m3u(path)?;
        let known: HashSet<&str> = library_tracks.iter().map(|t| t.file_path.as_str()).collect();
        let matched: Vec<String> = parsed
            .paths
            .into_iter()
            .filter(|p| known.contains(p.as_str()))
            .collect();

        if matched.is_empty() {
            return Err(Error::Import("no matching tracks found".to_string()));
        }

        let playlist_id = DbOperations::create_playlist(&self.db, &parsed.name)?;
        DbOperations::add_tracks_to_playlist(&self.db, &playlist_id, &matched)?;
        self.observers.notify(&PlaylistManagerEvent::PlaylistsChanged);

        info!(playlist = %parsed.name, path = %path.display(), tracks = matched.len(), "imported playlist");
        self.get(&playlist_id)?
            .ok_or(Error::PlaylistNotFound(playlist_id))
    }

    fn ensure_exists(&self, playlist_id: &str) -> Result<()> {
        match self.get(playlist_id)? {
            Some(_) => Ok(()),
            None => Err(Error::PlaylistNotFound(playlist_id.to_string())),
        }
    }

    fn updated(&mut self, playlist_id: &str) {
        self.observers
            .notify(&PlaylistManagerEvent::PlaylistUpdated(playlist_id.to_string()));
    }
}

fn paths_of(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.file_path.clone()).collect()
}
