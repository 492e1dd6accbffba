//! Screen multiplexing and the accessibility overlay.
//!
//! A [`Session`] owns the screens of one window. It relays process output
//! into screen buffers (and, when armed, to speech), forwards keystrokes,
//! tracks where commands were submitted and derives the command and line
//! text that speech and keyboard navigation work from.

mod controller;
mod event;
pub mod extract;
mod jump;
mod keys;
pub mod listing;
mod mode;
mod registry;
pub mod relay;
mod scheduler;
mod screen;

#[cfg(test)]
mod test_utils;

pub use controller::{BufferFactory, Session};
pub use event::{Flow, HostOutput, SessionEvent};
pub use extract::{BufferPos, InputLine};
pub use jump::{JumpPoints, JumpTarget};
pub use keys::{encode_key, Action, KeyChord, Keymap};
pub use mode::{ModeChange, ModeToggle};
pub use registry::ScreenRegistry;
pub use scheduler::{Scheduler, TaskId};
pub use screen::{BackendState, Screen};
