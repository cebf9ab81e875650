// End-to-end checks across the cache, scanner, playlists and app state.
// Audio files are empty stubs; a fake tag reader derives metadata from names.
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tempfile::tempdir;

use wired_lib::db::operations::DbOperations;
use wired_lib::library::ScanWorker;
use wired_lib::{
    AppSettings, AppState, CancelToken, DatabaseConnection, Error, LibraryIndexer, PlaylistManager,
    ScanEvent, TagReader, Track,
};

#[derive(Clone, Default)]
struct StubReader {
    reads: Arc<Mutex<Vec<PathBuf>>>,
}

impl StubReader {
    fn take_reads(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.reads.lock())
    }
}

impl TagReader for StubReader {
    fn read_track(&self, path: &Path) -> wired_lib::Result<Track> {
        self.reads.lock().push(path.to_path_buf());
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if stem.starts_with("broken") {
            return Err(Error::metadata(path, "no tags"));
        }

        let mut track = Track::new(path.to_string_lossy());
        track.artist = "Stub Artist".to_string();
        track.album = stem.split('-').next().unwrap_or(stem).to_string();
        track.duration = 180.0;
        Ok(track)
    }
}

fn touch(path: &Path, age_secs: u64) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let file = File::create(path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
}

fn library_tree(root: &Path) {
    touch(&root.join("a/alpha-1.mp3"), 3600);
    touch(&root.join("a/alpha-2.flac"), 3600);
    touch(&root.join("b/beta-1.ogg"), 3600);
    touch(&root.join("b/cover.jpg"), 3600);
    touch(&root.join("notes.txt"), 3600);
}

#[test]
fn second_scan_reads_nothing() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());

    let db = DatabaseConnection::open_in_memory().unwrap();
    let reader = StubReader::default();
    let indexer = LibraryIndexer::with_reader(db, reader.clone());
    let cancel = CancelToken::new();

    let first = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!(first.tracks.len(), 3);
    assert_eq!(first.added, 3);
    assert_eq!(reader.take_reads().len(), 3);

    let second = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!(second.tracks.len(), 3);
    assert_eq!((second.added, second.removed), (0, 0));
    assert_eq!(second.status_text(), "Library up to date");
    assert!(reader.take_reads().is_empty());
}

#[test]
fn modified_file_is_read_again() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());

    let db = DatabaseConnection::open_in_memory().unwrap();
    let reader = StubReader::default();
    let indexer = LibraryIndexer::with_reader(db, reader.clone());
    let cancel = CancelToken::new();

    indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    reader.take_reads();

    let edited = dir.path().join("b/beta-1.ogg");
    touch(&edited, 0);

    let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!(reader.take_reads(), vec![edited]);
    // Modified files are not counted as added
    assert_eq!(summary.added, 0);
    assert_eq!(summary.tracks.len(), 3);
}

#[test]
fn removed_files_leave_the_cache_and_can_return() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());

    let db = DatabaseConnection::open_in_memory().unwrap();
    let indexer = LibraryIndexer::with_reader(db.clone(), StubReader::default());
    let cancel = CancelToken::new();

    indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

    let gone = dir.path().join("a/alpha-2.flac");
    fs::remove_file(&gone).unwrap();
    let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!(summary.removed, 1);
    assert_eq!(summary.status_text(), "+0 / -1 changes");
    assert_eq!(DbOperations::count(&db).unwrap(), 2);

    touch(&gone, 10);
    let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!((summary.added, summary.removed), (1, 0));
    assert_eq!(DbOperations::count(&db).unwrap(), 3);
}

#[test]
fn unreadable_files_are_skipped_and_retried() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());
    touch(&dir.path().join("broken.mp3"), 3600);

    let reader = StubReader::default();
    let indexer =
        LibraryIndexer::with_reader(DatabaseConnection::open_in_memory().unwrap(), reader.clone());
    let cancel = CancelToken::new();

    let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!(summary.tracks.len(), 3);
    assert_eq!(summary.added, 4);
    reader.take_reads();

    // Never cached, so it looks new every time
    indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    assert_eq!(reader.take_reads(), vec![dir.path().join("broken.mp3")]);
}

#[test]
fn favorites_survive_rescans() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());

    let db = DatabaseConnection::open_in_memory().unwrap();
    let indexer = LibraryIndexer::with_reader(db.clone(), StubReader::default());
    let cancel = CancelToken::new();
    indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

    let path = dir.path().join("a/alpha-1.mp3");
    DbOperations::set_favorite(&db, &path.to_string_lossy(), true).unwrap();
    touch(&path, 0);

    let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
    let favorite: Vec<&Track> = summary.tracks.iter().filter(|t| t.favorite).collect();
    assert_eq!(favorite.len(), 1);
    assert_eq!(favorite[0].path(), path.as_path());
}

#[test]
fn background_worker_reports_cache_then_summary() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());

    let db = DatabaseConnection::open_in_memory().unwrap();
    let indexer = LibraryIndexer::with_reader(db, StubReader::default());
    let worker = ScanWorker::spawn(indexer, dir.path().to_path_buf(), true).unwrap();

    let events: Vec<ScanEvent> = worker.events().clone().iter().collect();
    worker.wait().unwrap();

    assert!(matches!(events.first(), Some(ScanEvent::CacheLoaded(cached)) if cached.is_empty()));
    match events.last() {
        Some(ScanEvent::Finished(summary)) => {
            assert_eq!(summary.tracks.len(), 3);
            assert!(!summary.cancelled);
        }
        other => panic!("expected a finished event, got {other:?}"),
    }
}

#[test]
fn playlist_survives_m3u_round_trip() {
    let dir = tempdir().unwrap();
    library_tree(dir.path());

    let db = DatabaseConnection::open_in_memory().unwrap();
    let indexer = LibraryIndexer::with_reader(db.clone(), StubReader::default());
    let library = indexer
        .scan_for_changes(dir.path(), &CancelToken::new(), |_| {})
        .unwrap()
        .tracks;

    let mut manager = PlaylistManager::new(db);
    let saved = manager.create("Road Trip").unwrap();
    manager.add_tracks(&saved.id, &library[..2]).unwrap();

    let m3u_path = dir.path().join("road-trip.m3u");
    manager.export_m3u(&saved.id, &m3u_path, &library).unwrap();

    let imported = manager.import_m3u(&m3u_path, &library).unwrap();
    assert_eq!(imported.name, "Road Trip");
    assert_eq!(imported.track_count, 2);
    assert_eq!(
        manager.get_tracks(&imported.id, &library).unwrap(),
        manager.get_tracks(&saved.id, &library).unwrap()
    );
}

#[test]
fn queue_plays_before_playlist_and_persists() {
    let dir = tempdir().unwrap();
    let db = DatabaseConnection::open_in_memory().unwrap();
    let mut state = AppState::new(db, AppSettings::default(), dir.path().to_path_buf());

    let tracks: Vec<Track> = ["a", "b", "c"]
        .iter()
        .map(|name| {
            let mut track = Track::new(format!("/music/{name}.mp3"));
            track.album = "Same".to_string();
            track
        })
        .collect();
    state.apply_library(tracks.clone());
    state.playlist.set_current(0);
    state.queue.add_to_queue(tracks[2].clone());

    assert_eq!(state.advance().map(|t| t.file_path), Some("/music/c.mp3".to_string()));
    assert_eq!(state.advance().map(|t| t.file_path), Some("/music/b.mp3".to_string()));

    state.queue.add_to_queue(tracks[0].clone());
    state.persist().unwrap();

    let settings = AppSettings::load(dir.path()).unwrap();
    assert_eq!(settings.playback.last_track_index, Some(1));
    assert_eq!(settings.queue_paths(), vec!["/music/a.mp3"]);
}

#[test]
fn relative_library_root_survives_m3u_round_trip() {
    // A scratch library under the working directory, addressed relatively
    let dir = tempfile::Builder::new().prefix("wired-rel").tempdir_in(".").unwrap();
    let relative = Path::new(dir.path().file_name().unwrap()).to_path_buf();
    library_tree(&relative);

    let app_dir = tempdir().unwrap();
    let db = DatabaseConnection::open_in_memory().unwrap();
    let mut state = AppState::new(db, AppSettings::default(), app_dir.path().to_path_buf());
    state
        .scan_library_with(StubReader::default(), &relative, &CancelToken::new(), |_| {})
        .unwrap();

    assert_eq!(state.library.len(), 3);
    assert!(state.library.iter().all(|t| t.path().is_absolute()));
    assert!(state.library_root().is_some_and(Path::is_absolute));

    let saved = state.playlists.create("Relative").unwrap();
    state.playlists.add_tracks(&saved.id, &state.library).unwrap();
    let m3u_path = app_dir.path().join("relative.m3u");
    state.playlists.export_m3u(&saved.id, &m3u_path, &state.library).unwrap();

    let imported = state.playlists.import_m3u(&m3u_path, &state.library).unwrap();
    assert_eq!(imported.track_count, 3);
}
