//! Fuzzy track search.
//!
//! Scoring is tiered and the highest applicable tier wins:
//!
//! | tier        | score                                              |
//! |-------------|----------------------------------------------------|
//! | exact       | 1000                                               |
//! | prefix      | 500 + 10 × query length                            |
//! | substring   | 200 + max(0, 100 − 5 × position) + 5 × query length |
//! | subsequence | 100 + ⌊50 × query length / text length⌋ + 10 per adjacent pair |
//! | none        | 0                                                  |
//!
//! Lengths and positions count characters, not bytes.

use std::fmt;

use crate::db::models::Track;

pub const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Artist,
    Album,
}

impl MatchField {
    const SEARCHED: [MatchField; 3] = [MatchField::Title, MatchField::Artist, MatchField::Album];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::Title => "title",
            MatchField::Artist => "artist",
            MatchField::Album => "album",
        }
    }

    fn value<'a>(&self, track: &'a Track) -> &'a str {
        match self {
            MatchField::Title => &track.title,
            MatchField::Artist => &track.artist,
            MatchField::Album => &track.album,
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult<'a> {
    pub track: &'a Track,
    /// Position of the track in the searched slice
    pub index: usize,
    pub score: u32,
    pub match_field: MatchField,
}

/// Case-insensitive score of `query` against `text`
pub fn score_match(query: &str, text: &str) -> u32 {
    let query = query.to_lowercase();
    let text = text.to_lowercase();
    score_lowercase(&query, &text)
}

fn score_lowercase(query: &str, text: &str) -> u32 {
    if query.is_empty() || text.is_empty() {
        return 0;
    }

    let query_len = query.chars().count() as u32;

    if query == text {
        return 1000;
    }

    if text.starts_with(query) {
        return 500 + query_len * 10;
    }

    if let Some(byte_pos) = text.find(query) {
        let position = text[..byte_pos].chars().count() as u32;
        let position_bonus = 100u32.saturating_sub(position.saturating_mul(5));
        return 200 + position_bonus + query_len * 5;
    }

    match subsequence_bonus(query, text) {
        Some(bonus) => 100 + bonus,
        None => 0,
    }
}

/// Coverage plus adjacency bonus, `None` unless every query char appears in order
fn subsequence_bonus(query: &str, text: &str) -> Option<u32> {
    let text: Vec<char> = text.chars().collect();
    let mut positions: Vec<usize> = Vec::new();
    let mut text_idx = 0;

    for q in query.chars() {
        let found = text[text_idx..].iter().position(|&c| c == q)?;
        positions.push(text_idx + found);
        text_idx += found + 1;
    }

    let coverage = (50 * positions.len() / text.len()) as u32;
    let adjacent = positions.windows(2).filter(|w| w[1] == w[0] + 1).count() as u32;
    Some(coverage + adjacent * 10)
}

/// Rank tracks by their best-scoring field among title, artist and album.
///
/// Zero scores are dropped; equal scores keep input order.
pub fn fuzzy_search<'a>(query: &str, tracks: &'a [Track], limit: usize) -> Vec<SearchResult<'a>> {
    if query.is_empty() {
        return Vec::new();
    }
    let query = query.to_lowercase();

    let mut results: Vec<SearchResult<'a>> = tracks
        .iter()
        .enumerate()
        .filter_map(|(index, track)| {
            let mut best: Option<(u32, MatchField)> = None;
            for field in MatchField::SEARCHED {
                let score = score_lowercase(&query, &field.value(track).to_lowercase());
                if score > best.map_or(0, |(s, _)| s) {
                    best = Some((score, field));
                }
            }
            best.map(|(score, match_field)| SearchResult {
                track,
                index,
                score,
                match_field,
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.cmp(&a.score));
    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, artist: &str, album: &str) -> Track {
        let mut track = Track::new(format!("/music/{title}.mp3"));
        track.title = title.to_string();
        track.artist = artist.to_string();
        track.album = album.to_string();
        track
    }

    #[test]
    fn tiers() {
        assert_eq!(score_match("Bob Dylan", "bob dylan"), 1000);
        assert_eq!(score_match("bob", "Bob Dylan"), 530);
        assert_eq!(score_match("dyl", "bob dylan"), 295);
        // b(0) d(4) n(8): no adjacent pairs, coverage 50 * 3 / 9
        assert_eq!(score_match("bdn", "bob dylan"), 116);
        assert_eq!(score_match("xyz", "bob dylan"), 0);
    }

    #[test]
    fn late_substring_gets_no_position_bonus() {
        let text = format!("{}needle", "x".repeat(30));
        assert_eq!(score_match("needle", &text), 200 + 30);
    }

    #[test]
    fn subsequence_adjacency_bonus() {
        // a(0) b(1) d(3): one adjacent pair
        assert_eq!(score_match("abd", "abcd"), 100 + 37 + 10);
    }

    #[test]
    fn empty_inputs_score_zero() {
        assert_eq!(score_match("", "anything"), 0);
        assert_eq!(score_match("a", ""), 0);
    }

    #[test]
    fn positions_count_characters() {
        // "é" is two bytes but one character
        assert_eq!(score_match("noir", "éénoir"), 200 + 90 + 20);
    }

    #[test]
    fn best_field_wins_and_results_rank_descending() {
        let tracks = vec![
            track("Hurricane", "Bob Dylan", "Desire"),
            track("Dylan", "Someone", "Other"),
            track("Nothing", "Here", "At all"),
            track("Song", "Artist", "Dylan Covers"),
        ];

        let results = fuzzy_search("dylan", &tracks, DEFAULT_LIMIT);
        let summary: Vec<(usize, u32, MatchField)> =
            results.iter().map(|r| (r.index, r.score, r.match_field)).collect();

        assert_eq!(
            summary,
            vec![
                (1, 1000, MatchField::Title),
                (3, 550, MatchField::Album),
                (0, 305, MatchField::Artist),
            ]
        );
    }

    #[test]
    fn ties_keep_input_order_and_limit_applies() {
        let tracks = vec![
            track("Rain A", "x", "x"),
            track("Rain B", "x", "x"),
            track("Rain C", "x", "x"),
        ];
        let results = fuzzy_search("rain", &tracks, 2);
        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn empty_query_finds_nothing() {
        let tracks = vec![track("a", "b", "c")];
        assert!(fuzzy_search("", &tracks, 10).is_empty());
    }
}
