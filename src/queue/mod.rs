// Queue management module
// The play-next queue and its persistence between sessions

pub mod manager;
pub mod persistence;

pub use manager::{PlaybackQueue, QueueEvent};
