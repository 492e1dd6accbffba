//! One terminal tab: its buffer, its backend and per-screen flags.

use terminal::{Backend, ScreenBuffer, ScreenId, ScreenKind, TermSize};

use crate::jump::JumpPoints;
use crate::relay::Utf8Carry;

/// Lifecycle of a screen's backend.
pub enum BackendState {
    /// Waiting for an asynchronous connection.
    Connecting,
    Ready(Box<dyn Backend>),
    /// Creation failed; the error was written into the buffer.
    Failed,
}

impl BackendState {
    pub fn label(&self) -> &'static str {
        match self {
            BackendState::Connecting => "connecting",
            BackendState::Ready(_) => "ready",
            BackendState::Failed => "failed",
        }
    }
}

pub struct Screen {
    id: ScreenId,
    kind: ScreenKind,
    title: String,
    pub(crate) buffer: Box<dyn ScreenBuffer>,
    pub(crate) backend: BackendState,
    /// Per-screen mute for speech of incoming output.
    pub speech_enabled: bool,
    pub jumps: JumpPoints,
    pub(crate) decoder: Utf8Carry,
}

impl Screen {
    pub fn new(id: ScreenId, kind: ScreenKind, buffer: Box<dyn ScreenBuffer>) -> Self {
        let title = kind.title(id);
        Self {
            id,
            kind,
            title,
            buffer,
            backend: BackendState::Connecting,
            speech_enabled: true,
            jumps: JumpPoints::default(),
            decoder: Utf8Carry::default(),
        }
    }

    pub fn id(&self) -> ScreenId {
        self.id
    }

    pub fn kind(&self) -> &ScreenKind {
        &self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn buffer(&self) -> &dyn ScreenBuffer {
        &*self.buffer
    }

    pub fn backend_state(&self) -> &BackendState {
        &self.backend
    }

    pub fn accepts_input(&self) -> bool {
        matches!(self.backend, BackendState::Ready(_))
    }

    /// Send input to the backend. Input is dropped unless the backend is
    /// ready.
    pub(crate) fn send(&mut self, data: &[u8]) {
        match &mut self.backend {
            BackendState::Ready(backend) => {
                if let Err(e) = backend.write(data) {
                    tracing::warn!("Write to screen {} failed: {:#}", self.id, e);
                }
            }
            state => {
                tracing::debug!(
                    "Dropping {} input bytes for {} screen {}",
                    data.len(),
                    state.label(),
                    self.id
                );
            }
        }
    }

    /// Write pending terminal query replies back to the process.
    pub(crate) fn forward_replies(&mut self) {
        let replies = self.buffer.take_replies();
        if replies.is_empty() {
            return;
        }
        if let BackendState::Ready(backend) = &mut self.backend {
            if let Err(e) = backend.write(&replies) {
                tracing::warn!("Reply to screen {} failed: {:#}", self.id, e);
            }
        }
    }

    pub(crate) fn resize(&mut self, size: TermSize) {
        self.buffer.resize(size);
        if let BackendState::Ready(backend) = &mut self.backend {
            if let Err(e) = backend.resize(size) {
                tracing::warn!("Resize of screen {} failed: {:#}", self.id, e);
            }
        }
    }

    /// Show a creation or connection error inside the screen.
    pub(crate) fn fail(&mut self, message: &str) {
        let line = format!("\x1b[31m\x1b[1mError: {}\x1b[0m\r\n", message);
        self.buffer.write(line.as_bytes());
        self.backend = BackendState::Failed;
    }

    /// Ask the backend to shut down.
    pub(crate) fn close(&mut self) {
        if let BackendState::Ready(backend) = &mut self.backend {
            backend.close();
        }
    }
}
