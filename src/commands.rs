//! Command-line front end.
//!
//! Each invocation opens the persisted state, runs one command and saves
//! whatever the command changed (cursor, queue, shuffle mode).

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::db::models::Track;
use crate::error::Error;
use crate::library::{CancelToken, ScanEvent};
use crate::playlist::{apply_filters, Filter, Playlist, SortKey};
use crate::search::{fuzzy_search, DEFAULT_LIMIT};
use crate::settings::default_app_dir;
use crate::state::AppState;

/// Music library player core
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the cache and settings
    #[arg(long, global = true, env = "WIRED_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a directory into the library cache (defaults to the last library)
    Scan {
        path: Option<PathBuf>,
    },
    /// List a folder's tracks without caching them
    Open {
        path: PathBuf,
    },
    /// List library tracks
    List {
        /// title, artist, album, year, duration or track_number
        #[arg(short, long)]
        sort: Option<String>,
        #[arg(short, long)]
        reverse: bool,
        /// Filters like `artist:Blondie`; all must match
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
    /// Fuzzy search over title, artist and album
    Search {
        query: String,
        #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },
    /// Advance to the next track, taking from the queue first
    Next,
    /// Step back to the previous track
    Previous,
    /// Show the current track
    Now,
    /// Show what plays next
    Upnext {
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },
    /// Manage the play-next queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Turn shuffle on or off
    Shuffle {
        mode: Toggle,
    },
    /// Toggle the favorite flag of a track
    Favorite {
        /// File path or search text
        track: String,
    },
    /// Manage saved playlists
    Playlist {
        #[command(subcommand)]
        action: PlaylistAction,
    },
}

#[derive(Subcommand)]
pub enum QueueAction {
    /// Append a track to the queue
    Add { track: String },
    /// Put a track at the front of the queue
    PlayNext { track: String },
    Show,
    Clear,
}

#[derive(Subcommand)]
pub enum PlaylistAction {
    List,
    Create { name: String },
    Rename { playlist: String, name: String },
    Delete { playlist: String },
    /// Append tracks (paths or search text)
    Add {
        playlist: String,
        #[arg(required = true)]
        tracks: Vec<String>,
    },
    Remove {
        playlist: String,
        #[arg(required = true)]
        tracks: Vec<String>,
    },
    Show { playlist: String },
    /// Write a playlist as extended M3U
    Export { playlist: String, file: PathBuf },
    /// Create a playlist from an M3U file
    Import { file: PathBuf },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

/// Run a parsed command line
pub fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => default_app_dir().ok_or_else(|| anyhow!("no config directory, pass --data-dir"))?,
    };
    debug!(data_dir = %data_dir.display(), "opening state");

    let mut state = AppState::open(&data_dir)
        .with_context(|| format!("failed to open {}", data_dir.display()))?;

    // Stateless listing never loads or saves the library
    if let Commands::Open { path } = &cli.command {
        return cmd_open(&mut state, path);
    }

    state.load_cached_library()?;

    match cli.command {
        Commands::Scan { path } => cmd_scan(&mut state, path)?,
        Commands::Open { .. } => {}
        Commands::List { sort, reverse, filters } => cmd_list(&state, sort.as_deref(), reverse, &filters)?,
        Commands::Search { query, limit } => cmd_search(&state, &query, limit),
        Commands::Next => print_now_playing(state.advance()),
        Commands::Previous => print_now_playing(state.go_back()),
        Commands::Now => print_now_playing(state.playlist.current().cloned()),
        Commands::Upnext { count } => {
            for (i, track) in state.up_next(count).into_iter().enumerate() {
                println!("{:>3}. {}", i + 1, track_line(track));
            }
        }
        Commands::Queue { action } => cmd_queue(&mut state, action)?,
        Commands::Shuffle { mode } => {
            state.set_shuffle(matches!(mode, Toggle::On));
            println!("Shuffle {}", if state.playlist.is_shuffled() { "on" } else { "off" });
        }
        Commands::Favorite { track } => {
            let track = resolve_track(&state, &track)?;
            let favorite = state.toggle_favorite(&track.file_path)?;
            println!("{} {}", if favorite { "★" } else { "☆" }, track.display_name());
        }
        Commands::Playlist { action } => cmd_playlist(&mut state, action)?,
    }

    state.persist()?;
    Ok(())
}

fn cmd_scan(state: &mut AppState, path: Option<PathBuf>) -> anyhow::Result<()> {
    let root = match path {
        Some(path) => path,
        None => state
            .library_root()
            .map(Path::to_path_buf)
            .ok_or_else(|| anyhow!("no library yet, pass a directory to scan"))?,
    };
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    println!("Scanning {}", root.display());
    let events = state.start_background_scan(&root, false)?;

    let mut finished = false;
    for event in events.iter() {
        finished = matches!(event, ScanEvent::Finished(_) | ScanEvent::Failed(_));
        let is_progress = matches!(event, ScanEvent::Progress(_));
        let status = state.handle_scan_event(event);
        if is_progress {
            eprint!("\r{status:<40}");
        } else {
            eprintln!();
            println!("{status}");
        }
        if finished {
            break;
        }
    }
    if !finished {
        warn!("scan worker exited without a result");
    }

    println!("{} tracks in library", state.library.len());
    Ok(())
}

fn cmd_open(state: &mut AppState, path: &Path) -> anyhow::Result<()> {
    if !path.is_dir() {
        bail!("{} is not a directory", path.display());
    }
    let count = state.open_folder(path, &CancelToken::new());
    for track in state.playlist.tracks() {
        println!("{}", track_line(track));
    }
    println!("Opened {} tracks (not cached)", count);
    Ok(())
}

fn cmd_list(state: &AppState, sort: Option<&str>, reverse: bool, filters: &[String]) -> anyhow::Result<()> {
    // Sort a copy so the persisted cursor keeps referring to library order
    let mut view = Playlist::new("view");
    view.set_tracks(state.playlist.tracks().to_vec());
    if let Some(index) = state.playlist.current_index() {
        view.set_current(index);
    }
    if let Some(key) = sort {
        let key: SortKey = key.parse()?;
        view.sort(key, reverse);
    }

    let filters = filters
        .iter()
        .map(|f| Filter::parse(f))
        .collect::<Result<Vec<_>, Error>>()?;

    let current = view.current().map(|t| t.file_path.clone());
    let tracks = apply_filters(view.tracks(), &filters);
    for track in &tracks {
        let marker = if current.as_deref() == Some(track.file_path.as_str()) { ">" } else { " " };
        println!("{} {}", marker, track_line(track));
    }

    if filters.is_empty() {
        println!("{} tracks", tracks.len());
    } else {
        let shown: Vec<String> = filters.iter().map(ToString::to_string).collect();
        println!("FILTERED: {}  ({})", shown.join(", "), tracks.len());
    }
    Ok(())
}

fn cmd_search(state: &AppState, query: &str, limit: usize) {
    let results = fuzzy_search(query, state.playlist.tracks(), limit);
    if results.is_empty() {
        println!("No matches");
        return;
    }
    for result in results {
        println!("{:>4}  {:<6} {}", result.score, result.match_field, track_line(result.track));
    }
}

fn cmd_queue(state: &mut AppState, action: QueueAction) -> anyhow::Result<()> {
    match action {
        QueueAction::Add { track } => {
            let track = resolve_track(state, &track)?;
            println!("Queued {}", track.display_name());
            state.queue.add_to_queue(track);
        }
        QueueAction::PlayNext { track } => {
            let track = resolve_track(state, &track)?;
            println!("Playing next: {}", track.display_name());
            state.queue.play_next(track);
        }
        QueueAction::Show => {
            for (i, track) in state.queue.iter().enumerate() {
                println!("{:>3}. {}", i + 1, track_line(track));
            }
            let total = state.queue.total_duration().max(0.0) as u64;
            println!("{} queued, {}:{:02}", state.queue.len(), total / 60, total % 60);
        }
        QueueAction::Clear => {
            state.queue.clear();
            println!("Queue cleared");
        }
    }
    Ok(())
}

fn cmd_playlist(state: &mut AppState, action: PlaylistAction) -> anyhow::Result<()> {
    match action {
        PlaylistAction::List => {
            for playlist in state.playlists.get_all()? {
                println!(
                    "{}  {}  ({} tracks, modified {})",
                    playlist.id,
                    playlist.name,
                    playlist.track_count,
                    playlist.modified_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        PlaylistAction::Create { name } => {
            let playlist = state.playlists.create(&name)?;
            println!("Created {} ({})", playlist.name, playlist.id);
        }
        PlaylistAction::Rename { playlist, name } => {
            let found = state.playlists.find(&playlist)?;
            state.playlists.rename(&found.id, &name)?;
            println!("Renamed {} to {}", found.name, name);
        }
        PlaylistAction::Delete { playlist } => {
            let found = state.playlists.find(&playlist)?;
            state.playlists.delete(&found.id)?;
            println!("Deleted {}", found.name);
        }
        PlaylistAction::Add { playlist, tracks } => {
            let found = state.playlists.find(&playlist)?;
            let tracks = resolve_tracks(state, &tracks)?;
            state.playlists.add_tracks(&found.id, &tracks)?;
            println!("Added {} tracks to {}", tracks.len(), found.name);
        }
        PlaylistAction::Remove { playlist, tracks } => {
            let found = state.playlists.find(&playlist)?;
            let tracks = resolve_tracks(state, &tracks)?;
            state.playlists.remove_tracks(&found.id, &tracks)?;
            println!("Removed {} tracks from {}", tracks.len(), found.name);
        }
        PlaylistAction::Show { playlist } => {
            let found = state.playlists.find(&playlist)?;
            let tracks = state.playlists.get_tracks(&found.id, &state.library)?;
            println!("{} ({} tracks)", found.name, tracks.len());
            for (i, track) in tracks.iter().enumerate() {
                println!("{:>3}. {}", i + 1, track_line(track));
            }
        }
        PlaylistAction::Export { playlist, file } => {
            let found = state.playlists.find(&playlist)?;
            match state.playlists.export_m3u(&found.id, &file, &state.library) {
                Ok(()) => println!("Exported {} to {}", found.name, file.display()),
                Err(e) => println!("Export failed: {e}"),
            }
        }
        PlaylistAction::Import { file } => match state.playlists.import_m3u(&file, &state.library) {
            Ok(playlist) => println!("Imported {} ({} tracks)", playlist.name, playlist.track_count),
            Err(e) => println!("{e}"),
        },
    }
    Ok(())
}

/// A library track by exact path, or the best fuzzy match for the text
fn resolve_track(state: &AppState, needle: &str) -> anyhow::Result<Track> {
    if let Some(track) = state.library.iter().find(|t| t.file_path == needle) {
        return Ok(track.clone());
    }
    fuzzy_search(needle, &state.library, 1)
        .into_iter()
        .next()
        .map(|result| result.track.clone())
        .ok_or_else(|| anyhow!("no track matches '{needle}'"))
}

fn resolve_tracks(state: &AppState, needles: &[String]) -> anyhow::Result<Vec<Track>> {
    needles.iter().map(|needle| resolve_track(state, needle)).collect()
}

fn print_now_playing(track: Option<Track>) {
    match track {
        Some(track) => println!("Now playing: {}", track_line(&track)),
        None => println!("Nothing to play"),
    }
}

fn track_line(track: &Track) -> String {
    let mut line = format!(
        "{}  [{}]  {}",
        track.display_name(),
        track.format_duration(),
        track.album
    );
    let quality = [track.codec.clone(), track.format_sample_info(), track.format_bitrate()]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if !quality.is_empty() {
        line.push_str(&format!("  ({quality})"));
    }
    if track.favorite {
        line.push_str("  ★");
    }
    line
}
