use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::db::models::{Track, UNKNOWN};
use crate::error::Error;

/// Track attributes a filter can match on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    Artist,
    Album,
    Year,
    Codec,
}

impl FilterField {
    pub const ALL: [FilterField; 4] = [
        FilterField::Artist,
        FilterField::Album,
        FilterField::Year,
        FilterField::Codec,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Artist => "artist",
            FilterField::Album => "album",
            FilterField::Year => "year",
            FilterField::Codec => "codec",
        }
    }

    pub fn value<'a>(&self, track: &'a Track) -> &'a str {
        match self {
            FilterField::Artist => &track.artist,
            FilterField::Album => &track.album,
            FilterField::Year => &track.year,
            FilterField::Codec => &track.codec,
        }
    }
}

impl FromStr for FilterField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        FilterField::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| Error::InvalidFilter(s.to_string()))
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive substring match on one field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Filter {
    pub field: FilterField,
    pub value: String,
}

impl Filter {
    pub fn new(field: FilterField, value: impl Into<String>) -> Self {
        Self {
            field,
            value: value.into(),
        }
    }

    /// Parse `field:value`, e.g. `artist:Blondie`
    pub fn parse(text: &str) -> Result<Self, Error> {
        let (field, value) = text
            .split_once(':')
            .ok_or_else(|| Error::InvalidFilter(text.to_string()))?;
        let field: FilterField = field.parse()?;
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidFilter(text.to_string()));
        }
        Ok(Self::new(field, value))
    }

    pub fn matches(&self, track: &Track) -> bool {
        self.field
            .value(track)
            .to_lowercase()
            .contains(&self.value.to_lowercase())
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.value)
    }
}

/// Tracks matching every filter, in their original order
pub fn apply_filters<'a>(tracks: &'a [Track], filters: &[Filter]) -> Vec<&'a Track> {
    tracks
        .iter()
        .filter(|track| filters.iter().all(|f| f.matches(track)))
        .collect()
}

/// Distinct, sorted values of `field`, skipping blanks and the unknown placeholder
pub fn unique_values(field: FilterField, tracks: &[Track]) -> Vec<String> {
    tracks
        .iter()
        .map(|track| field.value(track))
        .filter(|value| !value.is_empty() && *value != UNKNOWN)
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(artist: &str, album: &str, year: &str, codec: &str) -> Track {
        let mut track = Track::new(format!("/music/{artist}-{album}.flac"));
        track.artist = artist.to_string();
        track.album = album.to_string();
        track.year = year.to_string();
        track.codec = codec.to_string();
        track
    }

    fn library() -> Vec<Track> {
        vec![
            track("Blondie", "Parallel Lines", "1978", "FLAC"),
            track("Bob Dylan", "Blonde on Blonde", "1966", "MP3"),
            track("Unknown", "Unknown", "", "FLAC"),
        ]
    }

    #[test]
    fn matches_case_insensitive_substring() {
        let filter = Filter::new(FilterField::Artist, "BLOND");
        let library = library();
        assert!(filter.matches(&library[0]));
        assert!(!filter.matches(&library[1]));
    }

    #[test]
    fn filters_are_anded() {
        let library = library();
        let filters = vec![
            Filter::new(FilterField::Codec, "flac"),
            Filter::new(FilterField::Year, "19"),
        ];
        let matched = apply_filters(&library, &filters);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].artist, "Blondie");

        assert_eq!(apply_filters(&library, &[]).len(), 3);
    }

    #[test]
    fn parse_field_value() {
        let filter = Filter::parse(" Artist : Bob Dylan ").unwrap();
        assert_eq!(filter, Filter::new(FilterField::Artist, "Bob Dylan"));
        assert_eq!(filter.to_string(), "artist: Bob Dylan");

        // Only the first colon separates
        assert_eq!(Filter::parse("album:Live: 1975").unwrap().value, "Live: 1975");

        assert!(matches!(Filter::parse("genre:Rock"), Err(Error::InvalidFilter(_))));
        assert!(Filter::parse("artist:").is_err());
        assert!(Filter::parse("Blondie").is_err());
    }

    #[test]
    fn unique_values_are_sorted_and_skip_placeholders() {
        let library = library();
        assert_eq!(
            unique_values(FilterField::Artist, &library),
            vec!["Blondie", "Bob Dylan"]
        );
        assert_eq!(unique_values(FilterField::Codec, &library), vec!["FLAC", "MP3"]);
        assert_eq!(unique_values(FilterField::Year, &library), vec!["1966", "1978"]);
    }
}
