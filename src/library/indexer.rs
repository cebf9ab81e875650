use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::cancel::CancelToken;
use super::scanner::{file_mtime, DirectoryScanner};
use crate::db::connection::DatabaseConnection;
use crate::db::models::{CacheEntry, Track};
use crate::db::operations::DbOperations;
use crate::error::Result;
use crate::metadata::{MetadataExtractor, TagReader};

/// Progress update for a scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    pub current: usize,
    pub total: usize,
    pub status: String,
}

/// Result of an incremental scan
#[derive(Debug, Clone)]
pub struct ScanSummary {
    /// Every cached track after reconciliation
    pub tracks: Vec<Track>,
    /// Files classified as new, counted before extraction
    pub added: usize,
    /// Cache rows whose files are gone
    pub removed: usize,
    pub cancelled: bool,
}

impl ScanSummary {
    /// Short status line for the caller to show
    pub fn status_text(&self) -> String {
        if self.added > 0 || self.removed > 0 {
            format!("+{} / -{} changes", self.added, self.removed)
        } else {
            "Library up to date".to_string()
        }
    }
}

/// Keeps the metadata cache in sync with a directory tree
pub struct LibraryIndexer<R = MetadataExtractor> {
    db: DatabaseConnection,
    reader: R,
}

impl LibraryIndexer<MetadataExtractor> {
    pub fn new(db: DatabaseConnection) -> Self {
        Self::with_reader(db, MetadataExtractor)
    }
}

impl<R: TagReader> LibraryIndexer<R> {
    pub fn with_reader(db: DatabaseConnection, reader: R) -> Self {
        Self { db, reader }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Every cached track, no filesystem access
    pub fn load_from_cache(&self) -> Result<Vec<Track>> {
        DbOperations::get_all_tracks(&self.db)
    }

    /// Incremental scan: only read metadata for new or modified files.
    ///
    /// Extraction and stat failures skip the file. Cache errors propagate.
    /// A cancelled scan keeps whatever it already wrote.
    pub fn scan_for_changes<F>(
        &self,
        root: &Path,
        cancel: &CancelToken,
        mut progress_callback: F,
    ) -> Result<ScanSummary>
    where
        F: FnMut(ScanProgress),
    {
        if !root.is_dir() {
            return Ok(ScanSummary {
                tracks: Vec::new(),
                added: 0,
                removed: 0,
                cancelled: false,
            });
        }

        let cached_mtimes = DbOperations::get_cached_mtimes(&self.db)?;

        progress_callback(ScanProgress {
            current: 0,
            total: 0,
            status: "Discovering files...".to_string(),
        });
        let audio_files = DirectoryScanner::scan(root, cancel);

        // A partial file list would make every undiscovered path look removed
        if cancel.is_cancelled() {
            info!(root = %root.display(), "scan cancelled during discovery");
            return Ok(ScanSummary {
                tracks: self.load_from_cache()?,
                added: 0,
                removed: 0,
                cancelled: true,
            });
        }

        let current_paths: HashSet<String> = audio_files
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        // Determine what changed
        let mut new_files: Vec<PathBuf> = Vec::new();
        let mut modified_files: Vec<PathBuf> = Vec::new();

        for file_path in &audio_files {
            if cancel.is_cancelled() {
                break;
            }

            let key = file_path.to_string_lossy();
            match cached_mtimes.get(key.as_ref()) {
                None => new_files.push(file_path.clone()),
                Some(&cached) => match file_mtime(file_path) {
                    Some(current) if current > cached => modified_files.push(file_path.clone()),
                    Some(_) => {}
                    // Vanished since discovery
                    None => debug!(path = %file_path.display(), "stat failed, skipping"),
                },
            }
        }

        let removed = DbOperations::remove_tracks_not_in(&self.db, &current_paths)?;

        let added = new_files.len();
        let files_to_scan: Vec<PathBuf> = new_files.into_iter().chain(modified_files).collect();
        let total = files_to_scan.len();
        info!(
            root = %root.display(),
            discovered = audio_files.len(),
            new = added,
            modified = total - added,
            removed,
            "library diff computed"
        );

        progress_callback(ScanProgress {
            current: 0,
            total,
            status: format!("Scanning {} files...", total),
        });

        let mut entries: Vec<CacheEntry> = Vec::with_capacity(total);
        for (index, file_path) in files_to_scan.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            match self.reader.read_track(file_path) {
                Ok(track) => match file_mtime(file_path) {
                    Some(mtime) => entries.push(CacheEntry { track, mtime }),
                    None => debug!(path = %file_path.display(), "file vanished after extraction"),
                },
                Err(e) => debug!(error = %e, "skipping unreadable file"),
            }

            progress_callback(ScanProgress {
                current: index + 1,
                total,
                status: format!("Scanning... ({}/{})", index + 1, total),
            });
        }

        // Batch update database
        DbOperations::upsert_tracks(&self.db, &entries)?;

        Ok(ScanSummary {
            tracks: self.load_from_cache()?,
            added,
            removed,
            cancelled: cancel.is_cancelled(),
        })
    }

    /// Full, uncached scan of a directory. The cache is not touched.
    pub fn scan_directory<F>(
        &self,
        root: &Path,
        cancel: &CancelToken,
        mut progress_callback: F,
    ) -> Vec<Track>
    where
        F: FnMut(ScanProgress),
    {
        if !root.is_dir() {
            return Vec::new();
        }

        let audio_files = DirectoryScanner::scan(root, cancel);
        let total = audio_files.len();
        let mut tracks = Vec::with_capacity(total);

        for (index, file_path) in audio_files.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }

            match self.reader.read_track(file_path) {
                Ok(track) => tracks.push(track),
                Err(e) => debug!(error = %e, "skipping unreadable file"),
            }

            progress_callback(ScanProgress {
                current: index + 1,
                total,
                status: format!("Loading... ({}/{})", index + 1, total),
            });
        }

        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    /// Titles each track after its file contents and counts reads per path
    #[derive(Default)]
    struct CountingReader {
        reads: RefCell<HashMap<PathBuf, usize>>,
    }

    impl CountingReader {
        fn reads_of(&self, path: &Path) -> usize {
            self.reads.borrow().get(path).copied().unwrap_or(0)
        }
    }

    impl TagReader for CountingReader {
        fn read_track(&self, path: &Path) -> Result<Track> {
            *self.reads.borrow_mut().entry(path.to_path_buf()).or_default() += 1;
            let contents = fs::read_to_string(path)?;
            if contents.starts_with("corrupt") {
                return Err(Error::metadata(path, "bad header"));
            }
            let mut track = Track::new(path.to_string_lossy());
            track.title = contents.trim().to_string();
            Ok(track)
        }
    }

    fn set_mtime(path: &Path, secs_from_now: i64) {
        let base = SystemTime::now();
        let when = if secs_from_now >= 0 {
            base + Duration::from_secs(secs_from_now as u64)
        } else {
            base - Duration::from_secs((-secs_from_now) as u64)
        };
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(when).unwrap();
    }

    fn indexer() -> LibraryIndexer<CountingReader> {
        LibraryIndexer::with_reader(DatabaseConnection::open_in_memory().unwrap(), CountingReader::default())
    }

    #[test]
    fn first_scan_adds_everything() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), "Alpha").unwrap();
        fs::write(dir.path().join("b.flac"), "Beta").unwrap();
        fs::write(dir.path().join("c.txt"), "ignored").unwrap();

        let indexer = indexer();
        let summary = indexer
            .scan_for_changes(dir.path(), &CancelToken::new(), |_| {})
            .unwrap();

        assert_eq!(summary.added, 2);
        assert_eq!(summary.removed, 0);
        assert!(!summary.cancelled);
        let titles: Vec<&str> = summary.tracks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert_eq!(summary.status_text(), "+2 / -0 changes");
    }

    #[test]
    fn unchanged_files_are_not_reextracted() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        fs::write(&a, "Alpha").unwrap();
        set_mtime(&a, -100);

        let indexer = indexer();
        let cancel = CancelToken::new();
        let first = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
        let second = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

        assert_eq!(indexer.reader().reads_of(&a), 1);
        assert_eq!((second.added, second.removed), (0, 0));
        assert_eq!(second.status_text(), "Library up to date");
        assert_eq!(first.tracks.len(), second.tracks.len());
        assert_eq!(first.tracks[0].title, second.tracks[0].title);
    }

    #[test]
    fn newer_mtime_triggers_reextraction() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        fs::write(&a, "Old title").unwrap();
        set_mtime(&a, -100);

        let indexer = indexer();
        let cancel = CancelToken::new();
        indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

        fs::write(&a, "New title").unwrap();
        set_mtime(&a, 100);
        let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

        assert_eq!(indexer.reader().reads_of(&a), 2);
        assert_eq!(summary.added, 0);
        assert_eq!(summary.tracks[0].title, "New title");
    }

    #[test]
    fn vanished_files_are_removed_and_return_as_new() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.mp3");
        let b = dir.path().join("b.mp3");
        fs::write(&a, "Alpha").unwrap();
        fs::write(&b, "Beta").unwrap();

        let indexer = indexer();
        let cancel = CancelToken::new();
        indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

        fs::remove_file(&b).unwrap();
        let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
        assert_eq!((summary.added, summary.removed), (0, 1));
        assert_eq!(summary.tracks.len(), 1);

        fs::write(&b, "Beta").unwrap();
        let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
        assert_eq!((summary.added, summary.removed), (1, 0));
        assert_eq!(summary.tracks.len(), 2);
    }

    #[test]
    fn extraction_failures_are_skipped_but_counted_as_new() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.mp3"), "Good").unwrap();
        let bad = dir.path().join("bad.mp3");
        fs::write(&bad, "corrupt").unwrap();

        let indexer = indexer();
        let cancel = CancelToken::new();
        let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();

        assert_eq!(summary.added, 2);
        assert_eq!(summary.tracks.len(), 1);

        // Still unknown to the cache, so it is retried next time
        indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
        assert_eq!(indexer.reader().reads_of(&bad), 2);
    }

    #[test]
    fn progress_reports_phases_and_each_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), "A").unwrap();
        fs::write(dir.path().join("b.mp3"), "B").unwrap();

        let mut updates = Vec::new();
        indexer()
            .scan_for_changes(dir.path(), &CancelToken::new(), |p| updates.push(p))
            .unwrap();

        let statuses: Vec<&str> = updates.iter().map(|p| p.status.as_str()).collect();
        assert_eq!(
            statuses,
            vec![
                "Discovering files...",
                "Scanning 2 files...",
                "Scanning... (1/2)",
                "Scanning... (2/2)",
            ]
        );
        assert_eq!(updates.last().map(|p| (p.current, p.total)), Some((2, 2)));
    }

    #[test]
    fn cancel_during_extraction_keeps_earlier_writes() {
        let dir = tempdir().unwrap();
        for name in ["a.mp3", "b.mp3", "c.mp3"] {
            fs::write(dir.path().join(name), name).unwrap();
        }

        let indexer = indexer();
        let cancel = CancelToken::new();
        let summary = indexer
            .scan_for_changes(dir.path(), &cancel, |p| {
                if p.current == 1 {
                    cancel.cancel();
                }
            })
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.added, 3);
        assert_eq!(summary.tracks.len(), 1);
    }

    #[test]
    fn cancel_before_discovery_leaves_cache_alone() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), "A").unwrap();

        let indexer = indexer();
        indexer
            .scan_for_changes(dir.path(), &CancelToken::new(), |_| {})
            .unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let summary = indexer.scan_for_changes(dir.path(), &cancel, |_| {}).unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.tracks.len(), 1);
    }

    #[test]
    fn missing_root_returns_nothing() {
        let dir = tempdir().unwrap();
        let summary = indexer()
            .scan_for_changes(&dir.path().join("missing"), &CancelToken::new(), |_| {})
            .unwrap();
        assert!(summary.tracks.is_empty());
        assert_eq!((summary.added, summary.removed), (0, 0));
    }

    #[test]
    fn scan_directory_bypasses_cache() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), "Alpha").unwrap();
        fs::write(dir.path().join("b.mp3"), "corrupt").unwrap();

        let indexer = indexer();
        let tracks = indexer.scan_directory(dir.path(), &CancelToken::new(), |_| {});

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "Alpha");
        assert_eq!(DbOperations::count(indexer.db()).unwrap(), 0);
    }
}
