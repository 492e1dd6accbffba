//! Application directories for talkterm.
//!
//! Directories are resolved lazily and cached for the process lifetime.
//! The `set_*` overrides only take effect before the first lookup.

use std::path::PathBuf;
use std::sync::OnceLock;

const APP_DIR: &str = "talkterm";

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();
static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();
static LOGS_DIR: OnceLock<PathBuf> = OnceLock::new();

/// ~/.config/talkterm (or platform equivalent)
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    })
}

/// ~/.local/share/talkterm (or platform equivalent)
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    })
}

/// Log directory. macOS keeps logs under ~/Library/Logs.
pub fn logs_dir() -> &'static PathBuf {
    LOGS_DIR.get_or_init(|| {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Library")
                .join("Logs")
                .join(APP_DIR)
        }
        #[cfg(not(target_os = "macos"))]
        {
            data_dir().join("logs")
        }
    })
}

pub fn set_config_dir(path: PathBuf) {
    let _ = CONFIG_DIR.set(path);
}

pub fn set_data_dir(path: PathBuf) {
    let _ = DATA_DIR.set(path);
}

pub fn set_logs_dir(path: PathBuf) {
    let _ = LOGS_DIR.set(path);
}

/// config_dir()/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// Directory that exported screen transcripts are written to.
pub fn transcripts_dir() -> PathBuf {
    data_dir().join("transcripts")
}

/// File name for a transcript of `screen_id` taken at `unix_secs`.
pub fn transcript_file_name(screen_id: u64, unix_secs: u64) -> String {
    format!("screen-{screen_id}-{unix_secs}.txt")
}
