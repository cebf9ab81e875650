// Library management module
// Directory discovery, incremental indexing against the cache, and background scans

pub mod cancel;
pub mod indexer;
pub mod scanner;
pub mod worker;

pub use cancel::CancelToken;
pub use indexer::{LibraryIndexer, ScanProgress, ScanSummary};
pub use scanner::DirectoryScanner;
pub use worker::{ScanController, ScanEvent, ScanWorker};
