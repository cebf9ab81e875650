//! Extended M3U reading and writing.
//!
//! ```text
//! #EXTM3U
//! #PLAYLIST:Road Trip
//! #EXTINF:215,Blondie - Atomic
//! /music/Blondie/Atomic.flac
//! ```

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::db::models::Track;
use crate::error::Result;

const HEADER: &str = "#EXTM3U";
const PLAYLIST_DIRECTIVE: &str = "#PLAYLIST:";
const EXTINF_DIRECTIVE: &str = "#EXTINF:";

/// Contents of an M3U file before any library matching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M3uPlaylist {
    pub name: String,
    /// Absolute paths, in file order
    pub paths: Vec<String>,
}

/// Write tracks as extended M3U. Durations are truncated to whole seconds.
pub fn write_m3u<W: Write>(writer: &mut W, name: Option<&str>, tracks: &[Track]) -> io::Result<()> {
    writeln!(writer, "{HEADER}")?;
    if let Some(name) = name {
        writeln!(writer, "{PLAYLIST_DIRECTIVE}{name}")?;
    }

    for track in tracks {
        writeln!(
            writer,
            "{EXTINF_DIRECTIVE}{},{}",
            track.duration.max(0.0) as u64,
            track.display_name()
        )?;
        writeln!(writer, "{}", track.file_path)?;
    }
    Ok(())
}

pub fn export(path: &Path, name: Option<&str>, tracks: &[Track]) -> Result<()> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    write_m3u(&mut writer, name, tracks)?;
    writer.flush()?;
    Ok(())
}

/// Parse M3U text. Relative entries are resolved against `base_dir`.
///
/// The name defaults to `default_name` unless a `#PLAYLIST:` line is present.
/// Other directives are ignored.
pub fn parse_m3u(contents: &str, base_dir: &Path, default_name: &str) -> M3uPlaylist {
    let mut name = default_name.to_string();
    let mut paths = Vec::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(HEADER) {
            continue;
        }
        if let Some(playlist_name) = line.strip_prefix(PLAYLIST_DIRECTIVE) {
            name = playlist_name.trim().to_string();
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        paths.push(resolve_entry(line, base_dir).to_string_lossy().into_owned());
    }

    M3uPlaylist { name, paths }
}

/// Read and parse an M3U file. Invalid UTF-8 is replaced rather than rejected.
pub fn read_m3u(path: &Path) -> Result<M3uPlaylist> {
    let bytes = fs::read(path)?;
    let contents = String::from_utf8_lossy(&bytes);
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let default_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(parse_m3u(&contents, base_dir, &default_name))
}

fn resolve_entry(entry: &str, base_dir: &Path) -> PathBuf {
    let path = Path::new(entry);
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let joined = base_dir.join(path);
    // Entries for files that no longer exist can't be canonicalized; keep them lexical
    joined.canonicalize().unwrap_or(joined)
}
