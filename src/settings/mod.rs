// Settings module
// Persisted application configuration

pub mod settings;

pub use settings::{default_app_dir, AppSettings};
