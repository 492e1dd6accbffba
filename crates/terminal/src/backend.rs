//! Process backend contract.
//!
//! A backend is the process or connection behind one screen. Output and
//! lifecycle changes travel as [`BackendEvent`]s over a channel so the
//! session can consume them on its own thread, in arrival order.

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use crate::types::{ScreenId, ScreenKind, TermSize};

/// Input side of a running process or connection.
pub trait Backend: Send {
    /// Send input bytes (keystrokes, pasted text).
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Propagate new terminal dimensions.
    fn resize(&mut self, size: TermSize) -> Result<()>;

    /// Ask the process to terminate. The matching `Exit` event may still
    /// arrive afterwards.
    fn close(&mut self);
}

/// Everything a backend reports back to the session.
pub enum BackendEvent {
    /// A chunk of output, in order per screen.
    Data { screen: ScreenId, bytes: Vec<u8> },
    /// An asynchronously connected backend is ready for input.
    Ready {
        screen: ScreenId,
        backend: Box<dyn Backend>,
    },
    /// An asynchronous connection attempt failed.
    Failed { screen: ScreenId, error: String },
    /// The process exited or the connection closed. `status` is the exit
    /// code when it could be collected.
    Exit {
        screen: ScreenId,
        status: Option<u32>,
    },
}

impl BackendEvent {
    pub fn screen(&self) -> ScreenId {
        match self {
            BackendEvent::Data { screen, .. }
            | BackendEvent::Ready { screen, .. }
            | BackendEvent::Failed { screen, .. }
            | BackendEvent::Exit { screen, .. } => *screen,
        }
    }
}

impl fmt::Debug for BackendEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendEvent::Data { screen, bytes } => f
                .debug_struct("Data")
                .field("screen", screen)
                .field("len", &bytes.len())
                .finish(),
            BackendEvent::Ready { screen, .. } => {
                f.debug_struct("Ready").field("screen", screen).finish()
            }
            BackendEvent::Failed { screen, error } => f
                .debug_struct("Failed")
                .field("screen", screen)
                .field("error", error)
                .finish(),
            BackendEvent::Exit { screen, status } => f
                .debug_struct("Exit")
                .field("screen", screen)
                .field("status", status)
                .finish(),
        }
    }
}

/// Channel backends report on.
pub type BackendEvents = Sender<BackendEvent>;

/// Backend creation request.
#[derive(Clone, Debug)]
pub struct SpawnRequest {
    pub screen: ScreenId,
    pub kind: ScreenKind,
    pub size: TermSize,
    pub working_dir: Option<PathBuf>,
}

/// Result of a successful creation request.
pub enum Connection {
    /// Usable immediately (local shells).
    Ready(Box<dyn Backend>),
    /// Connecting in the background; `Ready` or `Failed` follows.
    Pending,
}

/// Creates backends for new screens.
pub trait Spawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<Connection>;
}
