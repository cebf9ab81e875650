//! Background library scans.
//!
//! A [`ScanWorker`] owns one scan thread and the receiving end of its event
//! channel. Dropping the worker cancels the scan and joins the thread, so a
//! replaced worker can never deliver events after its successor starts.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::cancel::CancelToken;
use super::indexer::{LibraryIndexer, ScanProgress, ScanSummary};
use crate::db::models::Track;
use crate::error::{Error, Result};
use crate::metadata::TagReader;

/// Messages sent from the scan thread to its owner
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Cached tracks, sent before any filesystem work when requested
    CacheLoaded(Vec<Track>),
    Progress(ScanProgress),
    Finished(ScanSummary),
    Failed(String),
}

pub struct ScanWorker {
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
    events: Receiver<ScanEvent>,
}

impl ScanWorker {
    /// Start scanning `root` on a new thread.
    ///
    /// With `load_cache_first` the cached library is emitted immediately so
    /// the caller can show something while the filesystem is walked.
    pub fn spawn<R>(indexer: LibraryIndexer<R>, root: PathBuf, load_cache_first: bool) -> Result<Self>
    where
        R: TagReader + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let cancel = CancelToken::new();
        let thread_cancel = cancel.clone();

        let handle = thread::Builder::new()
            .name("library-scan".to_string())
            .spawn(move || run_scan(&indexer, &root, load_cache_first, &thread_cancel, &tx))?;

        Ok(Self {
            cancel,
            handle: Some(handle),
            events: rx,
        })
    }

    pub fn events(&self) -> &Receiver<ScanEvent> {
        &self.events
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Block until the scan thread exits
    pub fn wait(mut self) -> Result<()> {
        self.join()
    }

    fn join(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| Error::Worker("scan thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Err(e) = self.join() {
            warn!(error = %e, "scan worker did not shut down cleanly");
        }
    }
}

fn run_scan<R: TagReader>(
    indexer: &LibraryIndexer<R>,
    root: &Path,
    load_cache_first: bool,
    cancel: &CancelToken,
    tx: &Sender<ScanEvent>,
) {
    // Send errors only mean the owner stopped listening
    if load_cache_first {
        match indexer.load_from_cache() {
            Ok(tracks) => {
                let _ = tx.send(ScanEvent::CacheLoaded(tracks));
            }
            Err(e) => {
                let _ = tx.send(ScanEvent::Failed(e.to_string()));
                return;
            }
        }
    }

    let result = indexer.scan_for_changes(root, cancel, |progress| {
        let _ = tx.send(ScanEvent::Progress(progress));
    });

    let event = match result {
        Ok(summary) => {
            debug!(added = summary.added, removed = summary.removed, "scan thread finished");
            ScanEvent::Finished(summary)
        }
        Err(e) => {
            warn!(error = %e, "library scan failed");
            ScanEvent::Failed(e.to_string())
        }
    };
    let _ = tx.send(event);
}

/// Keeps at most one scan running; starting a new one retires the old one first
#[derive(Default)]
pub struct ScanController {
    current: Option<ScanWorker>,
}

impl ScanController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel and join any running scan, then start a new one.
    /// Returns the new scan's event stream.
    pub fn start<R>(
        &mut self,
        indexer: LibraryIndexer<R>,
        root: PathBuf,
        load_cache_first: bool,
    ) -> Result<Receiver<ScanEvent>>
    where
        R: TagReader + Send + 'static,
    {
        self.stop();
        let worker = ScanWorker::spawn(indexer, root, load_cache_first)?;
        let events = worker.events().clone();
        self.current = Some(worker);
        Ok(events)
    }

    pub fn stop(&mut self) {
        // Drop cancels and joins
        self.current = None;
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|w| !w.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::DatabaseConnection;
    use crate::db::models::CacheEntry;
    use crate::db::operations::DbOperations;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    struct FileNameReader;

    impl TagReader for FileNameReader {
        fn read_track(&self, path: &Path) -> Result<Track> {
            Ok(Track::new(path.to_string_lossy()))
        }
    }

    fn collect_until_done(rx: &Receiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(10)) {
            let done = matches!(event, ScanEvent::Finished(_) | ScanEvent::Failed(_));
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[test]
    fn cache_is_emitted_before_scan_results() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("new.mp3"), b"").unwrap();

        let db = DatabaseConnection::open_in_memory().unwrap();
        let stale = dir.path().join("stale.mp3").to_string_lossy().into_owned();
        DbOperations::upsert_tracks(
            &db,
            &[CacheEntry {
                track: Track::new(stale),
                mtime: 1.0,
            }],
        )
        .unwrap();

        let indexer = LibraryIndexer::with_reader(db, FileNameReader);
        let worker = ScanWorker::spawn(indexer, dir.path().to_path_buf(), true).unwrap();
        let events = collect_until_done(worker.events());

        match events.first() {
            Some(ScanEvent::CacheLoaded(tracks)) => assert_eq!(tracks.len(), 1),
            other => panic!("expected cached tracks first, got {other:?}"),
        }
        match events.last() {
            Some(ScanEvent::Finished(summary)) => {
                assert_eq!((summary.added, summary.removed), (1, 1));
                assert_eq!(summary.tracks.len(), 1);
            }
            other => panic!("expected a finished scan, got {other:?}"),
        }
        assert!(events.iter().any(|e| matches!(e, ScanEvent::Progress(_))));
        worker.wait().unwrap();
    }

    #[test]
    fn controller_replaces_running_scan() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.mp3"), b"").unwrap();
        let db = DatabaseConnection::open_in_memory().unwrap();

        let mut controller = ScanController::new();
        let first = controller
            .start(LibraryIndexer::with_reader(db.clone(), FileNameReader), dir.path().to_path_buf(), false)
            .unwrap();
        let second = controller
            .start(LibraryIndexer::with_reader(db.clone(), FileNameReader), dir.path().to_path_buf(), false)
            .unwrap();

        // The first worker has been joined, so its channel is closed
        while first.try_recv().is_ok() {}
        assert!(first.recv_timeout(Duration::from_millis(50)).is_err());

        let events = collect_until_done(&second);
        assert!(matches!(events.last(), Some(ScanEvent::Finished(_))));

        controller.stop();
        assert!(!controller.is_running());
        assert_eq!(DbOperations::count(&db).unwrap(), 1);
    }
}
