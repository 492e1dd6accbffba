//! Shared fixtures for driving a `Session` end to end.
//!
//! Screens use the real alacritty-backed buffer; processes and speech are
//! replaced by recorders so tests can see what was sent and spoken.

// Not every test binary uses every helper
#![allow(dead_code)]

use anyhow::Result;
use parking_lot::Mutex;
use platform::SpeechSink;
use session::{Flow, Session, SessionEvent};
use settings::{AccessibilityConfig, Config};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use terminal::{
    Backend, BackendEvent, Connection, ScreenBuffer, ScreenId, ScreenKind, SpawnRequest, Spawner,
    TermSize,
};
use termwiz::input::{KeyCode, KeyEvent, Modifiers};

// ============================================================================
// Process side
// ============================================================================

/// Everything a screen's process received.
#[derive(Debug, Default)]
pub struct Wire {
    pub input: Vec<u8>,
    pub sizes: Vec<TermSize>,
    pub closed: bool,
}

pub struct WireBackend(Arc<Mutex<Wire>>);

impl WireBackend {
    /// Backend not tracked by any spawner, for connections a test completes.
    pub fn detached() -> (Self, Arc<Mutex<Wire>>) {
        let wire = Arc::new(Mutex::new(Wire::default()));
        (Self(wire.clone()), wire)
    }
}

impl Backend for WireBackend {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.0.lock().input.extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, size: TermSize) -> Result<()> {
        self.0.lock().sizes.push(size);
        Ok(())
    }

    fn close(&mut self) {
        self.0.lock().closed = true;
    }
}

/// Wires of every local screen, by screen id.
#[derive(Clone, Default)]
pub struct Wires(Rc<RefCell<Vec<(ScreenId, Arc<Mutex<Wire>>)>>>);

impl Wires {
    pub fn of(&self, screen: ScreenId) -> Arc<Mutex<Wire>> {
        self.0
            .borrow()
            .iter()
            .find(|(id, _)| *id == screen)
            .map(|(_, wire)| wire.clone())
            .unwrap_or_else(|| panic!("no backend for screen {}", screen))
    }

    pub fn input(&self, screen: ScreenId) -> Vec<u8> {
        self.of(screen).lock().input.clone()
    }
}

/// Local shells connect at once; ssh screens stay pending until the test
/// sends `Ready`.
pub struct LocalSpawner {
    wires: Wires,
}

impl Spawner for LocalSpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<Connection> {
        if let ScreenKind::Ssh(_) = request.kind {
            return Ok(Connection::Pending);
        }
        let wire = Arc::new(Mutex::new(Wire::default()));
        self.wires.0.borrow_mut().push((request.screen, wire.clone()));
        Ok(Connection::Ready(Box::new(WireBackend(wire))))
    }
}

// ============================================================================
// Speech side
// ============================================================================

#[derive(Clone, Default)]
pub struct Spoken(Rc<RefCell<Vec<String>>>);

impl Spoken {
    pub fn all(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.0.borrow().last().cloned()
    }
}

impl SpeechSink for Spoken {
    fn speak(&mut self, text: &str) {
        self.0.borrow_mut().push(text.to_string());
    }

    fn stop(&mut self) {}
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub session: Session,
    pub wires: Wires,
    pub spoken: Spoken,
    start: Instant,
}

impl Harness {
    pub fn new(config: Config, size: TermSize) -> Self {
        let wires = Wires::default();
        let spoken = Spoken::default();
        let spawner = LocalSpawner {
            wires: wires.clone(),
        };
        let session = Session::new(config, Box::new(spawner), Box::new(spoken.clone()), size);
        Self {
            session,
            wires,
            spoken,
            start: Instant::now(),
        }
    }

    /// Harness with system speech selected, so announcements are recorded.
    pub fn speaking(size: TermSize) -> Self {
        Self::new(speaking_config(), size)
    }

    pub fn at(&self, ms: u64) -> Instant {
        self.start + Duration::from_millis(ms)
    }

    /// Deliver process output for `screen`.
    pub fn output(&mut self, screen: ScreenId, bytes: &[u8], ms: u64) {
        let now = self.at(ms);
        let event = BackendEvent::Data {
            screen,
            bytes: bytes.to_vec(),
        };
        let _ = self.session.dispatch(SessionEvent::Backend(event), now);
    }

    pub fn event(&mut self, event: BackendEvent, ms: u64) -> Flow {
        let now = self.at(ms);
        self.session.dispatch(SessionEvent::Backend(event), now)
    }

    pub fn key(&mut self, key: KeyCode, ms: u64) -> Flow {
        self.chord(key, Modifiers::NONE, ms)
    }

    pub fn chord(&mut self, key: KeyCode, modifiers: Modifiers, ms: u64) -> Flow {
        let now = self.at(ms);
        self.session
            .dispatch(SessionEvent::Key(KeyEvent { key, modifiers }), now)
    }

    pub fn settle(&mut self, ms: u64) {
        let now = self.at(ms);
        let _ = self.session.run_due(now);
    }

    pub fn buffer(&self, screen: ScreenId) -> &dyn ScreenBuffer {
        self.session
            .screen(screen)
            .unwrap_or_else(|| panic!("screen {} is not open", screen))
            .buffer()
    }

    pub fn row(&self, screen: ScreenId, row: usize) -> String {
        self.buffer(screen).row_text(row).unwrap_or_default()
    }
}

pub fn speaking_config() -> Config {
    Config {
        accessibility: AccessibilityConfig {
            screen_reader_mode: 1,
            ..AccessibilityConfig::default()
        },
        ..Config::default()
    }
}

pub const fn size(cols: u16, rows: u16) -> TermSize {
    TermSize { cols, rows }
}
