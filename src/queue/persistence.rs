// Queue save/restore through the settings file
use std::collections::HashMap;
use tracing::debug;

use super::manager::PlaybackQueue;
use crate::db::models::Track;

/// Separator between file paths in the persisted queue string
pub const PATH_SEPARATOR: &str = "|";

pub fn join_paths(paths: &[String]) -> String {
    paths.join(PATH_SEPARATOR)
}

pub fn split_paths(joined: &str) -> Vec<String> {
    joined
        .split(PATH_SEPARATOR)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Append saved paths to `queue` in order, skipping any the library no longer has.
/// Returns how many were restored.
pub fn restore_queue(queue: &mut PlaybackQueue, saved_paths: &[String], library: &[Track]) -> usize {
    let by_path: HashMap<&str, &Track> = library.iter().map(|t| (t.file_path.as_str(), t)).collect();

    let restored: Vec<Track> = saved_paths
        .iter()
        .filter_map(|path| by_path.get(path.as_str()).map(|t| (*t).clone()))
        .collect();

    let count = restored.len();
    if count > 0 {
        queue.add_tracks(restored);
    }
    debug!(saved = saved_paths.len(), restored = count, "queue restored");
    count
}
