// Play-next queue, consumed before normal playlist traversal
use std::collections::VecDeque;

use crate::db::models::Track;
use crate::observers::Observers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEvent {
    QueueChanged,
}

/// Tracks to play before the playlist resumes.
///
/// `play_next` jumps the line, `add_to_queue` waits its turn, and each
/// advance consumes exactly one entry from the front.
#[derive(Debug, Default)]
pub struct PlaybackQueue {
    tracks: VecDeque<Track>,
    observers: Observers<QueueEvent>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&QueueEvent) + 'static) {
        self.observers.subscribe(listener);
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

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Insert at the front
    pub fn play_next(&mut self, track: Track) {
        self.tracks.push_front(track);
        self.changed();
    }

    /// Append at the back
    pub fn add_to_queue(&mut self, track: Track) {
        self.tracks.push_back(track);
        self.changed();
    }

    pub fn add_tracks(&mut self, tracks: impl IntoIterator<Item = Track>) {
        self.tracks.extend(tracks);
        self.changed();
    }

    pub fn pop_next(&mut self) -> Option<Track> {
        let track = self.tracks.pop_front()?;
        self.changed();
        Some(track)
    }

    pub fn peek_next(&self) -> Option<&Track> {
        self.tracks.front()
    }

    pub fn remove(&mut self, index: usize) -> Option<Track> {
        let track = self.tracks.remove(index)?;
        self.changed();
        Some(track)
    }

    /// Move an entry; both indices must be in range. Returns whether anything moved.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        if from >= self.tracks.len() || to >= self.tracks.len() {
            return false;
        }
        if let Some(track) = self.tracks.remove(from) {
            self.tracks.insert(to, track);
            self.changed();
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.changed();
    }

    pub fn file_paths(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.file_path.clone()).collect()
    }

    /// Seconds
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(|t| t.duration).sum()
    }

    fn changed(&mut self) {
        self.observers.notify(&QueueEvent::QueueChanged);
    }
}
