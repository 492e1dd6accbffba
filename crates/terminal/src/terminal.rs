//! Terminal collaborators for the session engine.
//!
//! The screen buffer (escape-sequence parsing and the cell grid) and the
//! process backends (local shells and ssh, both behind a PTY). Nothing here
//! knows about tabs, speech or accessibility state.

pub mod backend;
pub mod buffer;
mod pty_handler;
mod spawner;
pub mod types;

pub use backend::{Backend, BackendEvent, BackendEvents, Connection, SpawnRequest, Spawner};
pub use buffer::{AlacrittyBuffer, ScreenBuffer};
pub use pty_handler::PtyHandler;
pub use spawner::PtySpawner;
pub use types::*;
