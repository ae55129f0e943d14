// ABOUTME: XDG Base Directory paths for config and log storage
// ABOUTME: Falls back to the working directory when XDG directories are unavailable

use directories::ProjectDirs;
use std::path::PathBuf;

/// Application identifier for XDG directories
const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "chatty";
const APPLICATION: &str = "chatty";

pub fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
}

/// Data directory (e.g., ~/.local/share/chatty/), ./data as fallback
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// e.g., ~/.local/share/chatty/logs/
pub fn log_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Config directory (e.g., ~/.config/chatty/), current directory as fallback
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// e.g., ~/.config/chatty/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}
