// Metadata extractor using lofty with id3 fallback for problematic MP3 files
use id3::TagLike;
use lofty::file::FileType;
use lofty::prelude::{Accessor, AudioFile, ItemKey, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::Tag;
use std::path::Path;
use tracing::debug;

use super::parser::{join_genres, parse_track_number, truncate_year};
use super::TagReader;
use crate::db::models::Track;
use crate::error::{Error, Result};

pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn extract_from_file(file_path: &Path) -> Result<Track> {
        let probe = Probe::open(file_path)
            .map_err(|e| Error::metadata(file_path, e))?
            .guess_file_type()
            .map_err(|e| Error::metadata(file_path, e))?;

        let tagged_file = match probe.read() {
            Ok(f) => f,
            Err(e) => {
                debug!(path = %file_path.display(), error = %e, "lofty could not read file");
                return Self::extract_with_fallback(file_path, e.to_string());
            }
        };

        let mut track = Track::new(file_path.to_string_lossy());
        let properties = tagged_file.properties();

        if let Some(tag) = tagged_file.primary_tag().or(tagged_file.first_tag()) {
            Self::apply_tag(&mut track, tag);
        }

        track.duration = properties.duration().as_secs_f64();
        track.bitrate = properties.audio_bitrate().unwrap_or(0);
        track.sample_rate = properties.sample_rate().unwrap_or(0);

        let file_type = tagged_file.file_type();
        track.codec = codec_name(file_type, file_path);
        if is_lossless(file_type) {
            track.bit_depth = properties.bit_depth().map(u32::from).unwrap_or(0);
        }

        Ok(track)
    }

    fn apply_tag(track: &mut Track, tag: &Tag) {
        if let Some(title) = non_empty(tag.title().as_deref()) {
            track.title = title;
        }
        if let Some(artist) = non_empty(tag.artist().as_deref()) {
            track.artist = artist;
        }
        if let Some(album) = non_empty(tag.album().as_deref()) {
            track.album = album;
        }

        // Keep the raw date text so "2003-05-12" and "2003" both land as "2003"
        if let Some(date) = tag
            .get_string(&ItemKey::RecordingDate)
            .or_else(|| tag.get_string(&ItemKey::Year))
        {
            track.year = truncate_year(date);
        } else if let Some(year) = tag.year() {
            track.year = year.to_string();
        }

        track.genre = join_genres(tag.get_strings(&ItemKey::Genre));

        track.track_number = match tag.get_string(&ItemKey::TrackNumber) {
            Some(raw) => parse_track_number(raw),
            None => tag.track().unwrap_or(0),
        };
    }

    /// Fallback extraction: the id3 crate is more lenient with malformed MP3 tags
    fn extract_with_fallback(file_path: &Path, lofty_error: String) -> Result<Track> {
        let extension = file_path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());

        if extension.as_deref() == Some("mp3") {
            match Self::extract_with_id3(file_path) {
                Ok(track) => {
                    debug!(path = %file_path.display(), "extracted metadata using id3 fallback");
                    return Ok(track);
                }
                Err(e) => debug!(path = %file_path.display(), error = %e, "id3 fallback failed"),
            }
        }

        Err(Error::metadata(file_path, lofty_error))
    }

    fn extract_with_id3(file_path: &Path) -> Result<Track> {
        let tag = id3::Tag::read_from_path(file_path).map_err(|e| Error::metadata(file_path, e))?;

        let mut track = Track::new(file_path.to_string_lossy());
        if let Some(title) = non_empty(tag.title()) {
            track.title = title;
        }
        if let Some(artist) = non_empty(tag.artist()) {
            track.artist = artist;
        }
        if let Some(album) = non_empty(tag.album()) {
            track.album = album;
        }
        track.year = tag
            .date_recorded()
            .map(|date| truncate_year(&date.to_string()))
            .or_else(|| tag.year().map(|y| y.to_string()))
            .unwrap_or_default();
        if let Some(genre) = tag.genre_parsed() {
            track.genre = join_genres([genre.as_ref()]);
        }
        track.track_number = tag.track().unwrap_or(0);

        // id3 doesn't read stream properties; TLEN is in milliseconds when present
        track.duration = tag.duration().map(|ms| ms as f64 / 1000.0).unwrap_or(0.0);
        track.codec = "MP3".to_string();

        Ok(track)
    }

    /// First embedded picture, trying lofty first and id3 for MP3s it rejects
    pub fn extract_album_art(file_path: &Path) -> Option<Vec<u8>> {
        let from_lofty = Probe::open(file_path)
            .ok()
            .and_then(|probe| probe.guess_file_type().ok())
            .and_then(|probe| probe.read().ok())
            .and_then(|tagged_file| {
                tagged_file
                    .tags()
                    .iter()
                    .flat_map(|tag| tag.pictures())
                    .next()
                    .map(|picture| picture.data().to_vec())
            });

        from_lofty.or_else(|| {
            let tag = id3::Tag::read_from_path(file_path).ok()?;
            let data = tag.pictures().next().map(|picture| picture.data.clone());
            data
        })
    }
}

impl TagReader for MetadataExtractor {
    fn read_track(&self, path: &Path) -> Result<Track> {
        Self::extract_from_file(path)
    }

    fn read_album_art(&self, path: &Path) -> Option<Vec<u8>> {
        Self::extract_album_art(path)
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_lossless(file_type: FileType) -> bool {
    matches!(
        file_type,
        FileType::Flac | FileType::Wav | FileType::Aiff | FileType::Ape | FileType::WavPack
    )
}

fn codec_name(file_type: FileType, path: &Path) -> String {
    let name = match file_type {
        FileType::Flac => "FLAC",
        FileType::Mpeg => "MP3",
        FileType::Vorbis => "OGG",
        FileType::Opus => "OPUS",
        FileType::Mp4 | FileType::Aac => "AAC",
        FileType::Wav => "WAV",
        _ => return codec_from_extension(path),
    };
    name.to_string()
}

fn codec_from_extension(path: &Path) -> String {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp3" => "MP3".to_string(),
        "flac" => "FLAC".to_string(),
        "ogg" => "OGG".to_string(),
        "m4a" | "aac" => "AAC".to_string(),
        "wav" => "WAV".to_string(),
        "opus" => "OPUS".to_string(),
        "" => crate::db::models::UNKNOWN.to_string(),
        other => other.to_uppercase(),
    }
}
