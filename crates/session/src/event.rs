//! Events fed into a [`Session`](crate::Session) and what it hands back.

use settings::Config;
use terminal::{BackendEvent, CursorPos, TermSize};
use termwiz::input::KeyEvent;

/// Everything the session reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    /// A key press from the host.
    Key(KeyEvent),
    /// Pasted text, forwarded to the active screen as is.
    Paste(String),
    Backend(BackendEvent),
    /// The area available to screens changed.
    Resize(TermSize),
    /// Focus returned to the input region.
    FocusInput,
    ConfigChanged(Config),
}

/// Output for the host terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum HostOutput {
    /// Text relayed from the active screen.
    Bytes(Vec<u8>),
    /// Redraw from the active screen's buffer.
    Repaint {
        title: String,
        lines: Vec<String>,
        /// Cursor position within `lines`, when it is visible.
        cursor: Option<CursorPos>,
    },
}

/// Whether the window stays open after an event.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}
