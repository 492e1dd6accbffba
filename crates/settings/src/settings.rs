//! Configuration for talkterm.
//!
//! Compile-time defaults live in [`constants`]; the user-facing TOML file is
//! handled by [`file`].

pub mod constants;
pub mod file;

pub use file::{
    config_path, ensure_config_file, load_config, load_config_from, persist_accessibility_value,
    watch_config, AccessibilityConfig, Config, KeybindingEntry, SpeechMode, SshHost, StartupMode,
};
