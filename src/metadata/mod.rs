// Metadata module
// Tag reading and the small parsers it relies on

pub mod extractor;
pub mod parser;

pub use extractor::MetadataExtractor;

use std::path::Path;

use crate::db::models::Track;
use crate::error::Result;

/// Turns a file into a [`Track`].
///
/// The scanner only talks to this trait, so tests can count or fake
/// extractions without real audio files.
pub trait TagReader {
    /// Read tags and stream properties. An error means the file is skipped
    /// for this scan.
    fn read_track(&self, path: &Path) -> Result<Track>;

    /// First embedded picture, if any.
    fn read_album_art(&self, _path: &Path) -> Option<Vec<u8>> {
        None
    }
}
