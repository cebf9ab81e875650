// In-memory playlist with sequential and shuffled traversal
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::db::models::Track;
use crate::error::Error;
use crate::observers::Observers;

/// Notifications emitted by [`Playlist`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistEvent {
    CurrentChanged(usize),
    TracksChanged,
    ShuffleChanged(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Title,
    Artist,
    /// Album name, then track number within the album
    Album,
    Year,
    Duration,
    TrackNumber,
}

impl SortKey {
    pub const ALL: [SortKey; 6] = [
        SortKey::Title,
        SortKey::Artist,
        SortKey::Album,
        SortKey::Year,
        SortKey::Duration,
        SortKey::TrackNumber,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Title => "title",
            SortKey::Artist => "artist",
            SortKey::Album => "album",
            SortKey::Year => "year",
            SortKey::Duration => "duration",
            SortKey::TrackNumber => "track_number",
        }
    }

    fn compare(&self, a: &Track, b: &Track) -> Ordering {
        match self {
            SortKey::Title => cmp_ignore_case(&a.title, &b.title),
            SortKey::Artist => cmp_ignore_case(&a.artist, &b.artist),
            SortKey::Album => cmp_ignore_case(&a.album, &b.album)
                .then(a.track_number.cmp(&b.track_number)),
            SortKey::Year => a.year.cmp(&b.year),
            SortKey::Duration => a.duration.total_cmp(&b.duration),
            SortKey::TrackNumber => a.track_number.cmp(&b.track_number),
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SortKey::ALL
            .into_iter()
            .find(|key| key.as_str() == wanted)
            .ok_or_else(|| Error::InvalidSortKey(s.to_string()))
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn cmp_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Ordered tracks plus a cursor and an optional shuffle permutation.
///
/// The cursor is either `None` or a valid index. While shuffled, the
/// permutation always covers exactly `0..len()`; any mutation rebuilds it
/// with the current track kept in front.
#[derive(Debug)]
pub struct Playlist {
    pub name: String,
    tracks: Vec<Track>,
    current: Option<usize>,
    shuffle_order: Option<Vec<usize>>,
    observers: Observers<PlaylistEvent>,
}

impl Default for Playlist {
    fn default() -> Self {
        Self::new("Playlist")
    }
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
            current: None,
            shuffle_order: None,
            observers: Observers::new(),
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PlaylistEvent) + 'static) {
        self.observers.subscribe(listener);
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Mutable access for metadata updates such as the favorite flag
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Track> {
        self.tracks.get_mut(index)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn index_of(&self, file_path: &str) -> Option<usize> {
        self.tracks.iter().position(|t| t.file_path == file_path)
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle_order.is_some()
    }

    /// The active permutation, if shuffled
    pub fn shuffle_order(&self) -> Option<&[usize]> {
        self.shuffle_order.as_deref()
    }

    pub fn add_track(&mut self, track: Track) {
        self.tracks.push(track);
        self.tracks_changed();
    }

    pub fn add_tracks(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
        self.tracks_changed();
    }

    /// Replace the contents. The cursor is cleared; shuffle mode is kept.
    pub fn set_tracks(&mut self, tracks: Vec<Track>) {
        self.tracks = tracks;
        self.current = None;
        self.tracks_changed();
    }

    /// Remove the track at `index`, keeping the cursor valid
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        if index >= self.tracks.len() {
            return None;
        }

        let removed = self.tracks.remove(index);
        let len = self.tracks.len();
        self.current = match self.current {
            Some(current) if current >= len => len.checked_sub(1),
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        self.tracks_changed();
        Some(removed)
    }

    /// Remove everything, including the shuffle permutation
    pub fn clear(&mut self) {
        self.tracks.clear();
        self.current = None;
        self.shuffle_order = None;
        self.observers.notify(&PlaylistEvent::TracksChanged);
    }

    pub fn set_current(&mut self, index: usize) -> Option<&Track> {
        if index >= self.tracks.len() {
            return None;
        }
        self.move_to(index);
        self.tracks.get(index)
    }

    /// Advance and return the new current track
    pub fn next(&mut self) -> Option<&Track> {
        let index = self.step(true)?;
        self.move_to(index);
        self.tracks.get(index)
    }

    /// Step back and return the new current track
    pub fn previous(&mut self) -> Option<&Track> {
        let index = self.step(false)?;
        self.move_to(index);
        self.tracks.get(index)
    }

    /// Preview up to `count` tracks after the current one in traversal order.
    ///
    /// Never wraps back onto the current track, so at most `len() - 1`
    /// tracks are returned. Empty when nothing is selected.
    pub fn upcoming(&self, count: usize) -> Vec<&Track> {
        let Some(current) = self.current else {
            return Vec::new();
        };
        let total = self.tracks.len();
        let end = count.saturating_add(1).min(total);

        match self.shuffle_order.as_deref() {
            Some(order) if !order.is_empty() => {
                let position = order.iter().position(|&i| i == current).unwrap_or(0);
                (1..end)
                    .map(|offset| &self.tracks[order[(position + offset) % order.len()]])
                    .collect()
            }
            _ => (1..end)
                .map(|offset| &self.tracks[(current + offset) % total])
                .collect(),
        }
    }

    pub fn shuffle(&mut self, enabled: bool) {
        self.shuffle_with_rng(enabled, &mut rand::thread_rng());
    }

    /// Enter or leave shuffled mode using the given random source
    pub fn shuffle_with_rng<R: Rng + ?Sized>(&mut self, enabled: bool, rng: &mut R) {
        self.shuffle_order = enabled.then(|| self.build_shuffle_order(rng));
        self.observers.notify(&PlaylistEvent::ShuffleChanged(enabled));
    }

    /// Stable sort by `key`; the cursor follows the current track by path
    pub fn sort(&mut self, key: SortKey, reverse: bool) {
        let current_path = self.current().map(|t| t.file_path.clone());

        if reverse {
            self.tracks.sort_by(|a, b| key.compare(b, a));
        } else {
            self.tracks.sort_by(|a, b| key.compare(a, b));
        }

        self.current = current_path.and_then(|path| self.index_of(&path));
        self.tracks_changed();
    }

    /// Next index in traversal order, `None` only when empty
    fn step(&self, forward: bool) -> Option<usize> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }

        let index = match self.shuffle_order.as_deref() {
            Some(order) if !order.is_empty() => {
                let n = order.len();
                match self.current.and_then(|c| order.iter().position(|&i| i == c)) {
                    Some(pos) if forward => order[(pos + 1) % n],
                    Some(pos) => order[(pos + n - 1) % n],
                    None => order[0],
                }
            }
            _ => match self.current {
                Some(current) if forward => (current + 1) % len,
                Some(current) => (current + len - 1) % len,
                None if forward => 0,
                None => len - 1,
            },
        };
        Some(index)
    }

    fn move_to(&mut self, index: usize) {
        self.current = Some(index);
        self.observers.notify(&PlaylistEvent::CurrentChanged(index));
    }

    fn build_shuffle_order<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.tracks.len()).collect();
        order.shuffle(rng);

        // Shuffling must not change what is playing now
        if let Some(current) = self.current {
            if let Some(position) = order.iter().position(|&i| i == current) {
                order.remove(position);
                order.insert(0, current);
            }
        }
        order
    }

    fn tracks_changed(&mut self) {
        if self.shuffle_order.is_some() {
            self.shuffle_order = Some(self.build_shuffle_order(&mut rand::thread_rng()));
        }
        self.observers.notify(&PlaylistEvent::TracksChanged);
    }
}
