// Playlist module
// In-memory playlist navigation, filtering, saved playlists and M3U files

pub mod filter;
pub mod m3u;
pub mod manager;
pub mod model;

pub use filter::{apply_filters, unique_values, Filter, FilterField};
pub use manager::{PlaylistManager, PlaylistManagerEvent};
pub use model::{Playlist, PlaylistEvent, SortKey};
