//! Terminal data types shared by the buffer, the backends and the session.

use alacritty_terminal::grid::Dimensions;
use std::fmt;
use std::path::PathBuf;

use settings::constants::terminal::{DEFAULT_COLS, DEFAULT_ROWS};

/// Identifier of one screen (tab). Assigned monotonically, never reused
/// within a window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScreenId(pub u64);

impl fmt::Display for ScreenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal dimensions in rows and columns.
///
/// Implements `Dimensions` so it can size an alacritty `Term` directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TermSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TermSize {
    fn default() -> Self {
        Self {
            cols: DEFAULT_COLS,
            rows: DEFAULT_ROWS,
        }
    }
}

impl Dimensions for TermSize {
    fn total_lines(&self) -> usize {
        self.rows as usize
    }

    fn screen_lines(&self) -> usize {
        self.rows as usize
    }

    fn columns(&self) -> usize {
        self.cols as usize
    }
}

/// Cursor position inside the viewport (row 0 = top of the active screen).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CursorPos {
    pub col: usize,
    pub row: usize,
}

/// Which local shell a tab runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShellVariant {
    /// `$SHELL` on Unix, Windows PowerShell on Windows.
    Default,
    PowerShell,
    Pwsh,
    Cmd,
    /// Any other program looked up on `PATH`.
    Program(String),
}

impl ShellVariant {
    /// Parse the `shell` config value.
    pub fn from_config(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "default" => ShellVariant::Default,
            "powershell" => ShellVariant::PowerShell,
            "pwsh" => ShellVariant::Pwsh,
            "cmd" => ShellVariant::Cmd,
            _ => ShellVariant::Program(name.trim().to_string()),
        }
    }

    /// Program to launch.
    pub fn program(&self) -> String {
        match self {
            ShellVariant::Default => default_shell(),
            ShellVariant::PowerShell => "powershell.exe".to_string(),
            ShellVariant::Pwsh => "pwsh".to_string(),
            ShellVariant::Cmd => "cmd.exe".to_string(),
            ShellVariant::Program(program) => program.clone(),
        }
    }

    /// Label used in tab titles.
    pub fn label(&self) -> &'static str {
        match self {
            ShellVariant::PowerShell | ShellVariant::Pwsh => "PowerShell",
            ShellVariant::Cmd => "Command Prompt",
            ShellVariant::Default if cfg!(windows) => "PowerShell",
            _ => "Shell",
        }
    }
}

#[cfg(windows)]
fn default_shell() -> String {
    "powershell.exe".to_string()
}

#[cfg(not(windows))]
fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

/// Connection parameters for an ssh tab.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SshParams {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub identity_file: Option<PathBuf>,
}

impl SshParams {
    /// Arguments for the system `ssh` client.
    pub fn ssh_args(&self) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.port.to_string()];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.to_string_lossy().into_owned());
        }
        args.push("-t".to_string());
        args.push(match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        });
        args
    }
}

impl From<&settings::SshHost> for SshParams {
    fn from(host: &settings::SshHost) -> Self {
        Self {
            host: host.host.clone(),
            port: host.port,
            user: host.user.clone(),
            identity_file: host.identity_file.as_deref().map(expand_home),
        }
    }
}

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

/// Exit code the `ssh` client uses for its own errors (refused connection,
/// failed authentication), as opposed to a status passed on from the remote
/// shell.
pub const SSH_ERROR_STATUS: u32 = 255;

/// What a screen is connected to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScreenKind {
    Shell(ShellVariant),
    Ssh(SshParams),
}

impl ScreenKind {
    pub fn is_remote(&self) -> bool {
        matches!(self, ScreenKind::Ssh(_))
    }

    /// Whether a backend exit with `status` means the connection failed
    /// rather than the session ending.
    pub fn is_connection_failure(&self, status: Option<u32>) -> bool {
        self.is_remote() && status == Some(SSH_ERROR_STATUS)
    }

    /// Tab title, e.g. "PowerShell #2" or "SSH #3".
    pub fn title(&self, id: ScreenId) -> String {
        match self {
            ScreenKind::Shell(variant) => format!("{} #{}", variant.label(), id),
            ScreenKind::Ssh(_) => format!("SSH #{}", id),
        }
    }
}
