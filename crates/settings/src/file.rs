//! TOML config file support with live reload.
//!
//! Config location: `~/.config/talkterm/config.toml`

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants;

/// Which kind of tab a new window opens with.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StartupMode {
    #[default]
    Shell,
    Ssh,
}

/// Speech output engine selected by `screen-reader-mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechMode {
    /// 0: nothing is spoken.
    Off,
    /// 1: the platform's built-in text-to-speech command.
    System,
    /// 2: the argv configured in `speech-command`.
    Command,
}

impl SpeechMode {
    /// Numeric level as stored in the config file.
    pub fn level(self) -> u8 {
        match self {
            SpeechMode::Off => 0,
            SpeechMode::System => 1,
            SpeechMode::Command => 2,
        }
    }
}

/// Custom keybinding: maps a key chord to an action name.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct KeybindingEntry {
    /// Key chord (e.g., "ctrl-b", "alt-p")
    pub keys: String,
    /// Action name (e.g., "toggle-screen-cursor", "jump-previous")
    pub action: String,
}

/// A saved remote host for SSH tabs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct SshHost {
    pub name: String,
    pub host: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub identity_file: Option<String>,
}

fn default_ssh_port() -> u16 {
    constants::ssh::DEFAULT_PORT
}

/// Speech and screen-reader settings (`[accessibility]` table).
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct AccessibilityConfig {
    /// 0 = no speech, 1 = system speech, 2 = `speech-command`.
    pub screen_reader_mode: u8,
    /// Program and arguments used when `screen-reader-mode = 2`.
    /// The text to speak is appended as the last argument.
    pub speech_command: Vec<String>,
    /// Tag `ls -l` output lines by file type.
    pub ls_command_view: bool,
    /// Require two chord detections per mode toggle.
    pub debounce_chords: bool,
    pub line_feed_settle_ms: u64,
    pub input_settle_ms: u64,
}

impl Default for AccessibilityConfig {
    fn default() -> Self {
        Self {
            screen_reader_mode: 0,
            speech_command: Vec::new(),
            ls_command_view: false,
            debounce_chords: true,
            line_feed_settle_ms: constants::accessibility::LINE_FEED_SETTLE_MS,
            input_settle_ms: constants::accessibility::INPUT_SETTLE_MS,
        }
    }
}

impl AccessibilityConfig {
    pub fn speech_mode(&self) -> SpeechMode {
        match self.screen_reader_mode {
            0 => SpeechMode::Off,
            1 => SpeechMode::System,
            2 if !self.speech_command.is_empty() => SpeechMode::Command,
            2 => {
                tracing::warn!("screen-reader-mode = 2 needs speech-command, speech disabled");
                SpeechMode::Off
            }
            other => {
                tracing::warn!("Unknown screen-reader-mode {}, speech disabled", other);
                SpeechMode::Off
            }
        }
    }

    pub fn line_feed_settle(&self) -> std::time::Duration {
        settle(self.line_feed_settle_ms)
    }

    pub fn input_settle(&self) -> std::time::Duration {
        settle(self.input_settle_ms)
    }
}

fn settle(ms: u64) -> std::time::Duration {
    std::time::Duration::from_millis(ms.clamp(
        constants::accessibility::MIN_SETTLE_MS,
        constants::accessibility::MAX_SETTLE_MS,
    ))
}

/// User-facing config parsed from TOML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Kind of tab opened when a window starts.
    pub startup_terminal_mode: StartupMode,
    /// Local shell: "default", "powershell", "pwsh", "cmd", "bash", "zsh" or a program name.
    pub shell: String,
    /// Maximum number of scrollback lines.
    pub scrollback_lines: usize,
    /// Tab stop width used when collapsing expanded tabs in editor mode.
    pub tab_width: usize,
    pub accessibility: AccessibilityConfig,
    /// Saved hosts for SSH tabs.
    pub ssh_hosts: Vec<SshHost>,
    /// Name of the host used for new SSH tabs (first host when unset).
    pub default_ssh_host: Option<String>,
    /// Custom keybindings (override defaults).
    pub keybindings: Vec<KeybindingEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            startup_terminal_mode: StartupMode::Shell,
            shell: "default".to_string(),
            scrollback_lines: constants::scrollback::DEFAULT_LINES,
            tab_width: constants::terminal::DEFAULT_TAB_WIDTH,
            accessibility: AccessibilityConfig::default(),
            ssh_hosts: Vec::new(),
            default_ssh_host: None,
            keybindings: Vec::new(),
        }
    }
}

impl Config {
    /// Host used for a new SSH tab: the named default, else the first entry.
    pub fn ssh_host(&self) -> Option<&SshHost> {
        if let Some(name) = &self.default_ssh_host {
            if let Some(host) = self.ssh_hosts.iter().find(|h| h.name == *name) {
                return Some(host);
            }
            tracing::warn!("default-ssh-host '{}' not found in ssh-hosts", name);
        }
        self.ssh_hosts.first()
    }

    /// Tab width clamped to a usable range.
    pub fn tab_width(&self) -> usize {
        self.tab_width.clamp(2, constants::terminal::MAX_TAB_WIDTH)
    }

    /// Scrollback clamped to the supported maximum.
    pub fn scrollback_lines(&self) -> usize {
        self.scrollback_lines.min(constants::scrollback::MAX_LINES)
    }
}

/// Default config file content with comments (generated on first launch).
const DEFAULT_CONFIG: &str = r#"# talkterm configuration
# Changes are applied live when the file is saved.

# Tab opened when a window starts: "shell" or "ssh"
startup-terminal-mode = "shell"

# Local shell: "default", "powershell", "pwsh", "cmd", "bash", "zsh" or a program name
shell = "default"

# Maximum scrollback buffer size (lines)
scrollback-lines = 10000

# Tab stop width used by editor mode when reading lines
tab-width = 8

# Host used for new SSH tabs (first entry when unset)
# default-ssh-host = "build-box"

[accessibility]
# 0 = no speech, 1 = system speech, 2 = speech-command
screen-reader-mode = 0

# Program used when screen-reader-mode = 2; the text is appended as the last argument
# speech-command = ["espeak", "-v", "en"]

# Tag `ls -l` lines: D = directory, L = symlink, F = file
ls-command-view = false

# Mode toggles need two chord detections (set false if your input layer reports each chord once)
debounce-chords = true

# Settle delays before reading the cursor (after a line feed) and the typed line (after a key)
line-feed-settle-ms = 300
input-settle-ms = 100

# Saved SSH hosts
# [[ssh-hosts]]
# name = "build-box"
# host = "192.0.2.10"
# port = 22
# user = "me"
# identity-file = "~/.ssh/id_ed25519"

# Custom keybindings (override defaults)
# [[keybindings]]
# keys = "ctrl-b"
# action = "toggle-screen-cursor"
#
# [[keybindings]]
# keys = "alt-j"
# action = "jump-previous"
"#;

/// Return the config file path.
pub fn config_path() -> PathBuf {
    talkterm_paths::config_file()
}

/// Ensure the config file exists, creating a default if missing.
/// Returns the path to the config file.
pub fn ensure_config_file() -> Option<PathBuf> {
    let path = config_path();
    if !path.exists() {
        let parent = path.parent()?;
        std::fs::create_dir_all(parent).ok()?;
        std::fs::write(&path, DEFAULT_CONFIG).ok()?;
        tracing::info!("Created default config at {:?}", path);
    }
    Some(path)
}

/// Load and parse the config file. Returns default on any error.
pub fn load_config() -> Config {
    load_config_from(&config_path())
}

/// Load and parse a config file at `path`. Returns default on any error.
pub fn load_config_from(path: &Path) -> Config {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to read config: {}", e);
            }
            return Config::default();
        }
    };

    // Size guard
    if content.len() > constants::settings::MAX_FILE_SIZE as usize {
        tracing::warn!(
            "Config file too large ({} bytes), using defaults",
            content.len()
        );
        return Config::default();
    }

    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Failed to parse config.toml: {}", e);
            Config::default()
        }
    }
}

/// Write one `[accessibility]` key back to the config file, preserving
/// comments and formatting of everything else.
pub fn persist_accessibility_value(
    path: &Path,
    key: &str,
    value: impl Into<toml_edit::Value>,
) -> Result<()> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", path)),
    };
    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .with_context(|| format!("Failed to parse {:?}", path))?;

    if !doc.contains_table("accessibility") {
        doc["accessibility"] = toml_edit::table();
    }
    doc["accessibility"][key] = toml_edit::value(value);

    std::fs::write(path, doc.to_string()).with_context(|| format!("Failed to write {:?}", path))?;
    tracing::debug!("Persisted accessibility.{} to {:?}", key, path);
    Ok(())
}

/// Start watching the config file for changes.
///
/// `on_change` runs on the watcher thread with the freshly parsed config,
/// only when it differs from the last one seen. Returns a guard that stops
/// watching on drop.
pub fn watch_config(
    on_change: impl Fn(Config) + Send + 'static,
) -> Option<notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>> {
    use notify_debouncer_mini::new_debouncer;
    use std::time::Duration;

    let path = config_path();
    let watch_dir = path.parent()?.to_path_buf();

    let current = std::sync::Arc::new(parking_lot::Mutex::new(load_config_from(&path)));
    let path_clone = path.clone();

    let mut debouncer = new_debouncer(
        Duration::from_millis(100),
        move |res: Result<Vec<notify_debouncer_mini::DebouncedEvent>, _>| {
            let Ok(events) = res else {
                return;
            };
            if !events.iter().any(|event| event.path == path_clone) {
                return;
            }
            let new_config = load_config_from(&path_clone);
            let mut prev = current.lock();
            if new_config != *prev {
                tracing::info!("Config file changed, reloading...");
                *prev = new_config.clone();
                on_change(new_config);
            }
        },
    )
    .ok()?;

    debouncer
        .watcher()
        .watch(&watch_dir, notify::RecursiveMode::NonRecursive)
        .ok()?;

    tracing::info!("Watching config file: {:?}", path);
    Some(debouncer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_config_has_sane_values() {
        let cfg = Config::default();
        assert_eq!(cfg.startup_terminal_mode, StartupMode::Shell);
        assert_eq!(cfg.shell, "default");
        assert_eq!(cfg.tab_width, 8);
        assert!(!cfg.accessibility.ls_command_view);
        assert!(cfg.accessibility.debounce_chords);
        assert_eq!(cfg.accessibility.speech_mode(), SpeechMode::Off);
    }

    #[test]
    fn default_config_template_is_valid_toml() {
        let cfg: Config = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn empty_string_parses_to_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_full_toml() {
        let toml_str = r#"
startup-terminal-mode = "ssh"
shell = "pwsh"
scrollback-lines = 5000
tab-width = 4
default-ssh-host = "web"

[accessibility]
screen-reader-mode = 2
speech-command = ["espeak", "-v", "ja"]
ls-command-view = true
debounce-chords = false
line-feed-settle-ms = 250
input-settle-ms = 60

[[ssh-hosts]]
name = "db"
host = "192.0.2.5"

[[ssh-hosts]]
name = "web"
host = "web.example.com"
port = 2222
user = "deploy"
identity-file = "~/.ssh/deploy"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.startup_terminal_mode, StartupMode::Ssh);
        assert_eq!(cfg.shell, "pwsh");
        assert_eq!(cfg.scrollback_lines, 5000);
        assert_eq!(cfg.tab_width(), 4);
        assert_eq!(cfg.accessibility.speech_mode(), SpeechMode::Command);
        assert_eq!(cfg.accessibility.speech_command, vec!["espeak", "-v", "ja"]);
        assert!(cfg.accessibility.ls_command_view);
        assert!(!cfg.accessibility.debounce_chords);
        assert_eq!(
            cfg.accessibility.input_settle(),
            std::time::Duration::from_millis(60)
        );

        let host = cfg.ssh_host().unwrap();
        assert_eq!(host.name, "web");
        assert_eq!(host.port, 2222);
        assert_eq!(host.user.as_deref(), Some("deploy"));
        assert_eq!(cfg.ssh_hosts[0].port, 22);
    }

    #[test]
    fn ssh_host_falls_back_to_first_entry() {
        let cfg: Config = toml::from_str(
            r#"
default-ssh-host = "missing"

[[ssh-hosts]]
name = "only"
host = "example.org"
"#,
        )
        .unwrap();
        assert_eq!(cfg.ssh_host().map(|h| h.name.as_str()), Some("only"));
    }

    #[test]
    fn no_ssh_hosts_means_none() {
        assert!(Config::default().ssh_host().is_none());
    }

    #[test_case(0, &[] => SpeechMode::Off ; "mode zero")]
    #[test_case(1, &[] => SpeechMode::System ; "system speech")]
    #[test_case(2, &["say"] => SpeechMode::Command ; "custom command")]
    #[test_case(2, &[] => SpeechMode::Off ; "custom command missing")]
    #[test_case(9, &[] => SpeechMode::Off ; "unknown mode")]
    fn speech_mode_from_level(level: u8, command: &[&str]) -> SpeechMode {
        let cfg = AccessibilityConfig {
            screen_reader_mode: level,
            speech_command: command.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        cfg.speech_mode()
    }

    #[test_case(0 => 2 ; "zero clamps up")]
    #[test_case(8 => 8 ; "default")]
    #[test_case(64 => 16 ; "large clamps down")]
    fn tab_width_is_clamped(width: usize) -> usize {
        Config {
            tab_width: width,
            ..Default::default()
        }
        .tab_width()
    }

    #[test]
    fn settle_delays_are_clamped() {
        let cfg = AccessibilityConfig {
            line_feed_settle_ms: 0,
            input_settle_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(
            cfg.line_feed_settle().as_millis() as u64,
            constants::accessibility::MIN_SETTLE_MS
        );
        assert_eq!(
            cfg.input_settle().as_millis() as u64,
            constants::accessibility::MAX_SETTLE_MS
        );
    }

    #[test]
    fn parses_keybindings_array() {
        let toml_str = r#"
[[keybindings]]
keys = "ctrl-b"
action = "toggle-screen-cursor"

[[keybindings]]
keys = "alt-j"
action = "jump-previous"
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.keybindings.len(), 2);
        assert_eq!(cfg.keybindings[1].keys, "alt-j");
        assert_eq!(cfg.keybindings[1].action, "jump-previous");
    }

    #[test]
    fn ignores_unknown_keys() {
        let result: Result<Config, _> = toml::from_str("unknown-key = 1");
        assert!(result.is_ok());
    }

    #[test]
    fn load_config_from_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_config_from_broken_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tab-width = [").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }

    #[test]
    fn load_config_rejects_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let padding = "#".repeat(constants::settings::MAX_FILE_SIZE as usize + 1);
        std::fs::write(&path, format!("tab-width = 4\n{}", padding)).unwrap();
        assert_eq!(load_config_from(&path).tab_width, 8);
    }

    #[test]
    fn persist_keeps_comments_and_updates_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, DEFAULT_CONFIG).unwrap();

        persist_accessibility_value(&path, "ls-command-view", true).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# Tag `ls -l` lines"));
        assert!(load_config_from(&path).accessibility.ls_command_view);
    }

    #[test]
    fn persist_creates_missing_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "tab-width = 4\n").unwrap();

        persist_accessibility_value(&path, "screen-reader-mode", 1i64).unwrap();

        let cfg = load_config_from(&path);
        assert_eq!(cfg.tab_width, 4);
        assert_eq!(cfg.accessibility.speech_mode(), SpeechMode::System);
    }
}
