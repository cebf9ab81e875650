// Application state management
use crossbeam_channel::Receiver;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::connection::{DatabaseConnection, DEFAULT_DB_NAME};
use crate::db::models::Track;
use crate::db::operations::DbOperations;
use crate::error::Result;
use crate::library::{CancelToken, LibraryIndexer, ScanController, ScanEvent, ScanProgress, ScanSummary};
use crate::metadata::{MetadataExtractor, TagReader};
use crate::playlist::{Playlist, PlaylistManager, SortKey};
use crate::queue::persistence::restore_queue;
use crate::queue::PlaybackQueue;
use crate::settings::AppSettings;

/// Everything a front end drives: the cache, the loaded library, the playlist
/// being traversed, the play-next queue and persisted settings.
pub struct AppState {
    pub db: DatabaseConnection,
    pub settings: AppSettings,
    pub app_dir: PathBuf,
    /// Full library, unfiltered
    pub library: Vec<Track>,
    pub playlist: Playlist,
    pub queue: PlaybackQueue,
    pub playlists: PlaylistManager,
    scans: ScanController,
}

impl AppState {
    /// Open the cache and settings stored in `app_dir`, creating it if needed
    pub fn open(app_dir: impl Into<PathBuf>) -> Result<Self> {
        let app_dir = app_dir.into();
        std::fs::create_dir_all(&app_dir)?;

        let db = DatabaseConnection::new(app_dir.join(DEFAULT_DB_NAME))?;
        let settings = AppSettings::load_or_default(&app_dir);
        Ok(Self::new(db, settings, app_dir))
    }

    pub fn new(db: DatabaseConnection, settings: AppSettings, app_dir: PathBuf) -> Self {
        Self {
            playlists: PlaylistManager::new(db.clone()),
            db,
            settings,
            app_dir,
            library: Vec::new(),
            playlist: Playlist::new("Library"),
            queue: PlaybackQueue::new(),
            scans: ScanController::new(),
        }
    }

    pub fn indexer(&self) -> LibraryIndexer {
        LibraryIndexer::new(self.db.clone())
    }

    pub fn library_root(&self) -> Option<&Path> {
        self.settings.library.last_path.as_deref()
    }

    /// Remember `root` as the library and return its absolute form, which is
    /// what gets scanned so cached paths never depend on the working directory.
    /// Switching to a different root empties the cache.
    pub fn set_library_root(&mut self, root: &Path) -> Result<PathBuf> {
        let root = root.canonicalize()?;
        if self.library_root() == Some(root.as_path()) {
            return Ok(root);
        }
        if self.library_root().is_some() {
            info!(root = %root.display(), "library root changed, clearing cache");
            DbOperations::clear(&self.db)?;
        }
        self.settings.library.last_path = Some(root.clone());
        Ok(root)
    }

    /// Show whatever the cache holds, without touching the filesystem
    pub fn load_cached_library(&mut self) -> Result<usize> {
        let tracks = self.indexer().load_from_cache()?;
        let count = tracks.len();
        if count > 0 {
            self.apply_library(tracks);
        }
        Ok(count)
    }

    /// Reconcile the cache with `root` on the calling thread
    pub fn scan_library<F>(&mut self, root: &Path, cancel: &CancelToken, progress: F) -> Result<ScanSummary>
    where
        F: FnMut(ScanProgress),
    {
        self.scan_library_with(MetadataExtractor, root, cancel, progress)
    }

    pub fn scan_library_with<R, F>(
        &mut self,
        reader: R,
        root: &Path,
        cancel: &CancelToken,
        progress: F,
    ) -> Result<ScanSummary>
    where
        R: TagReader,
        F: FnMut(ScanProgress),
    {
        self.scans.stop();
        let root = self.set_library_root(root)?;
        let summary = LibraryIndexer::with_reader(self.db.clone(), reader).scan_for_changes(&root, cancel, progress)?;
        self.apply_library(summary.tracks.clone());
        Ok(summary)
    }

    /// Start a background scan, replacing any scan already running
    pub fn start_background_scan(&mut self, root: &Path, load_cache_first: bool) -> Result<Receiver<ScanEvent>> {
        self.start_background_scan_with(MetadataExtractor, root, load_cache_first)
    }

    pub fn start_background_scan_with<R>(
        &mut self,
        reader: R,
        root: &Path,
        load_cache_first: bool,
    ) -> Result<Receiver<ScanEvent>>
    where
        R: TagReader + Send + 'static,
    {
        // Join the old scan before a root change clears the cache
        self.scans.stop();
        let root = self.set_library_root(root)?;
        let indexer = LibraryIndexer::with_reader(self.db.clone(), reader);
        self.scans.start(indexer, root, load_cache_first)
    }

    pub fn cancel_background_scan(&mut self) {
        self.scans.stop();
    }

    /// Apply one worker event; returns a status line for display
    pub fn handle_scan_event(&mut self, event: ScanEvent) -> String {
        match event {
            ScanEvent::CacheLoaded(tracks) => {
                let count = tracks.len();
                if count > 0 {
                    self.apply_library(tracks);
                }
                format!("Loaded {} tracks from cache", count)
            }
            ScanEvent::Progress(progress) => progress.status,
            ScanEvent::Finished(summary) => {
                let status = summary.status_text();
                self.apply_library(summary.tracks);
                status
            }
            ScanEvent::Failed(message) => format!("Scan failed: {}", message),
        }
    }

    /// Load a folder without caching it or changing the library root
    pub fn open_folder(&mut self, path: &Path, cancel: &CancelToken) -> usize {
        let tracks = self.indexer().scan_directory(path, cancel, |_| {});
        let count = tracks.len();
        if count > 0 {
            self.playlist.set_tracks(tracks);
            self.playlist.sort(SortKey::Album, false);
            self.queue.clear();
        }
        count
    }

    /// Replace the library and rebuild the playlist view from it.
    ///
    /// The selection follows the current track by path; on first load the
    /// persisted index is used instead. The saved queue and shuffle mode are
    /// restored here too.
    pub fn apply_library(&mut self, tracks: Vec<Track>) {
        let current_path = self.playlist.current().map(|t| t.file_path.clone());

        self.library = tracks;
        self.playlist.set_tracks(self.library.clone());
        self.playlist.sort(SortKey::Album, false);

        // The persisted index only seeds the very first selection
        let restored = match current_path {
            Some(path) => self.playlist.index_of(&path),
            None => self.settings.playback.last_track_index,
        };
        if let Some(index) = restored {
            self.playlist.set_current(index);
        }

        self.restore_queue();
        if self.settings.playback.shuffle_enabled && !self.playlist.is_shuffled() {
            self.playlist.shuffle(true);
        }
    }

    /// Move saved queue paths into the queue, once
    pub fn restore_queue(&mut self) -> usize {
        let saved = self.settings.take_queue_paths();
        if saved.is_empty() {
            return 0;
        }
        restore_queue(&mut self.queue, &saved, &self.library)
    }

    /// What plays next: the queue's front if any, otherwise the playlist's next track
    pub fn advance(&mut self) -> Option<Track> {
        if let Some(track) = self.queue.pop_next() {
            return Some(track);
        }
        self.playlist.next().cloned()
    }

    pub fn go_back(&mut self) -> Option<Track> {
        self.playlist.previous().cloned()
    }

    /// Queued tracks followed by the playlist's upcoming ones
    pub fn up_next(&self, count: usize) -> Vec<&Track> {
        self.queue
            .iter()
            .chain(self.playlist.upcoming(count))
            .take(count)
            .collect()
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.playlist.shuffle(enabled);
        self.settings.playback.shuffle_enabled = enabled;
    }

    pub fn set_favorite(&mut self, file_path: &str, favorite: bool) -> Result<()> {
        DbOperations::set_favorite(&self.db, file_path, favorite)?;

        if let Some(track) = self.library.iter_mut().find(|t| t.file_path == file_path) {
            track.favorite = favorite;
        }
        if let Some(track) = self
            .playlist
            .index_of(file_path)
            .and_then(|i| self.playlist.get_mut(i))
        {
            track.favorite = favorite;
        }
        Ok(())
    }

    /// Flip the favorite flag; returns the new value
    pub fn toggle_favorite(&mut self, file_path: &str) -> Result<bool> {
        let favorite = !DbOperations::is_favorite(&self.db, file_path)?;
        self.set_favorite(file_path, favorite)?;
        Ok(favorite)
    }

    /// Write cursor, shuffle mode and queue into the settings file
    pub fn persist(&mut self) -> Result<()> {
        self.settings.playback.last_track_index = self.playlist.current_index();
        self.settings.playback.shuffle_enabled = self.playlist.is_shuffled();
        let paths = self.queue.file_paths();
        self.settings.set_queue_paths(&paths);
        self.settings.save(&self.app_dir)
    }
}
