// Data models
use chrono::{DateTime, Utc};
use std::path::Path;

use crate::metadata::TagReader;

pub const UNKNOWN: &str = "Unknown";

/// One audio file's known metadata.
///
/// The file path is the identity: two tracks with the same path are the same
/// track, whatever their other fields say.
#[derive(Debug, Clone)]
pub struct Track {
    pub file_path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// First four characters of the date tag.
    pub year: String,
    /// Multiple genres are joined with "; ".
    pub genre: String,
    pub track_number: u32,
    /// Seconds.
    pub duration: f64,
    pub codec: String,
    /// kbps
    pub bitrate: u32,
    /// Hz
    pub sample_rate: u32,
    /// Only set for lossless formats.
    pub bit_depth: u32,
    /// Stored in its own table, not derived from tags.
    pub favorite: bool,
    /// Loaded on demand, never cached.
    pub album_art: Option<Vec<u8>>,
}

impl Track {
    /// A track with default metadata, titled after the file stem.
    pub fn new(file_path: impl Into<String>) -> Self {
        let file_path = file_path.into();
        let title = Path::new(&file_path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(UNKNOWN)
            .to_string();

        Self {
            file_path,
            title,
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            year: String::new(),
            genre: String::new(),
            track_number: 0,
            duration: 0.0,
            codec: UNKNOWN.to_string(),
            bitrate: 0,
            sample_rate: 0,
            bit_depth: 0,
            favorite: false,
            album_art: None,
        }
    }

    pub fn path(&self) -> &Path {
        Path::new(&self.file_path)
    }

    /// "Artist - Title", as written into M3U `#EXTINF` lines.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }

    /// `M:SS`, or `H:MM:SS` once past an hour.
    pub fn format_duration(&self) -> String {
        let total = self.duration.max(0.0) as u64;
        let hours = total / 3600;
        let minutes = (total % 3600) / 60;
        let seconds = total % 60;

        if hours > 0 {
            format!("{}:{:02}:{:02}", hours, minutes, seconds)
        } else {
            format!("{}:{:02}", minutes, seconds)
        }
    }

    pub fn format_bitrate(&self) -> String {
        if self.bitrate > 0 {
            format!("{} kbps", self.bitrate)
        } else {
            String::new()
        }
    }

    /// e.g. "24-bit / 96 kHz" or "44.1 kHz".
    pub fn format_sample_info(&self) -> String {
        let mut parts = Vec::new();
        if self.bit_depth > 0 {
            parts.push(format!("{}-bit", self.bit_depth));
        }
        if self.sample_rate > 0 {
            if self.sample_rate % 1000 == 0 {
                parts.push(format!("{} kHz", self.sample_rate / 1000));
            } else {
                parts.push(format!("{:.1} kHz", self.sample_rate as f64 / 1000.0));
            }
        }
        parts.join(" / ")
    }

    /// Attach embedded artwork if it hasn't been loaded yet. Files without
    /// artwork leave the field empty and are asked again next time.
    pub fn load_album_art(&mut self, reader: &dyn TagReader) {
        if self.album_art.is_some() {
            return;
        }
        self.album_art = reader.read_album_art(self.path());
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.file_path == other.file_path
    }
}

impl Eq for Track {}

/// A cache row: a track plus the file modification time it was read at.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub track: Track,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
}

/// A named, persisted list of track paths.
#[derive(Debug, Clone)]
pub struct SavedPlaylist {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    pub track_count: usize,
}

/// Current time as fractional epoch seconds, the unit stored in the cache.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub fn timestamp_to_datetime(seconds: f64) -> DateTime<Utc> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos).unwrap_or(DateTime::UNIX_EPOCH)
}
