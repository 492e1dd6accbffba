//! Fakes for the session's collaborators.

use anyhow::{anyhow, Result};
use parking_lot::Mutex;
use platform::SpeechSink;
use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;
use terminal::{
    Backend, Connection, CursorPos, ScreenBuffer, ScreenKind, SpawnRequest, Spawner, TermSize,
};

/// Line-oriented buffer: text is appended verbatim, `\n` starts a new
/// row, `\r` is dropped. No wrapping or escape parsing. Writing leaves
/// the cursor after the last character.
pub struct FakeBuffer {
    pub rows: Vec<String>,
    pub size: TermSize,
    pub cursor: CursorPos,
    pub base_offset: usize,
    pub viewport_top: usize,
    pub screen_reader: bool,
    pub application_cursor: bool,
    pub replies: Vec<u8>,
    pub written: Vec<u8>,
    /// Rows that soft-wrap into the next one.
    pub wrapped: Vec<usize>,
}

impl FakeBuffer {
    pub fn with_rows(cols: u16, rows: &[&str]) -> Self {
        Self {
            rows: rows.iter().map(|row| row.to_string()).collect(),
            size: TermSize {
                cols,
                rows: rows.len().max(1) as u16,
            },
            cursor: CursorPos::default(),
            base_offset: 0,
            viewport_top: 0,
            screen_reader: false,
            application_cursor: false,
            replies: Vec::new(),
            written: Vec::new(),
            wrapped: Vec::new(),
        }
    }

    pub fn wrapping(mut self, rows: &[usize]) -> Self {
        self.wrapped = rows.to_vec();
        self
    }
}

impl ScreenBuffer for FakeBuffer {
    fn write(&mut self, bytes: &[u8]) {
        self.written.extend_from_slice(bytes);
        for ch in String::from_utf8_lossy(bytes).chars() {
            match ch {
                '\r' => {}
                '\n' => self.rows.push(String::new()),
                ch => match self.rows.last_mut() {
                    Some(row) => row.push(ch),
                    None => self.rows.push(ch.to_string()),
                },
            }
        }
        let last = self.rows.len().saturating_sub(1);
        self.cursor = CursorPos {
            col: self.rows.last().map_or(0, |row| row.chars().count()),
            row: last.saturating_sub(self.base_offset),
        };
    }

    fn translate_line(&self, row: usize, cols: Range<usize>, trim: bool) -> Option<String> {
        let line = self.rows.get(row)?;
        let end = cols.end.min(self.size.cols as usize);
        let start = cols.start.min(end);
        let mut text: String = line.chars().skip(start).take(end - start).collect();
        if trim {
            text.truncate(text.trim_end().len());
        }
        Some(text)
    }

    fn is_wrapped(&self, row: usize) -> bool {
        self.wrapped.contains(&row)
    }

    fn cursor(&self) -> CursorPos {
        self.cursor
    }

    fn base_offset(&self) -> usize {
        self.base_offset
    }

    fn total_rows(&self) -> usize {
        self.rows.len()
    }

    fn viewport_top(&self) -> usize {
        self.viewport_top
    }

    fn size(&self) -> TermSize {
        self.size
    }

    fn resize(&mut self, size: TermSize) {
        self.size = size;
    }

    fn scroll_to_line(&mut self, row: usize) {
        self.viewport_top = row.min(self.base_offset);
    }

    fn scroll_to_bottom(&mut self) {
        self.viewport_top = self.base_offset;
    }

    fn set_screen_reader_mode(&mut self, enabled: bool) {
        self.screen_reader = enabled;
    }

    fn screen_reader_mode(&self) -> bool {
        self.screen_reader
    }

    fn application_cursor(&self) -> bool {
        self.application_cursor
    }

    fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }
}

/// What a [`FakeBackend`] was asked to do.
#[derive(Debug, Default)]
pub struct BackendLog {
    pub written: Vec<u8>,
    pub resizes: Vec<TermSize>,
    pub closed: bool,
}

#[derive(Default)]
pub struct FakeBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl FakeBackend {
    pub fn log(&self) -> Arc<Mutex<BackendLog>> {
        self.log.clone()
    }
}

impl Backend for FakeBackend {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.log.lock().written.extend_from_slice(data);
        Ok(())
    }

    fn resize(&mut self, size: TermSize) -> Result<()> {
        self.log.lock().resizes.push(size);
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().closed = true;
    }
}

/// Shared view of everything a [`FakeSpawner`] created.
#[derive(Default)]
pub struct SpawnLog {
    pub requests: Vec<SpawnRequest>,
    pub backends: Vec<Arc<Mutex<BackendLog>>>,
}

/// Local shells are ready at once, ssh screens stay pending, and
/// programs named in `missing` fail.
#[derive(Default)]
pub struct FakeSpawner {
    pub log: Rc<RefCell<SpawnLog>>,
    pub missing: Vec<String>,
}

impl Spawner for FakeSpawner {
    fn spawn(&mut self, request: SpawnRequest) -> Result<Connection> {
        self.log.borrow_mut().requests.push(request.clone());
        match &request.kind {
            ScreenKind::Shell(variant) => {
                let program = variant.program();
                if self.missing.contains(&program) {
                    return Err(anyhow!("shell '{}' is not installed", program));
                }
                let backend = FakeBackend::default();
                self.log.borrow_mut().backends.push(backend.log());
                Ok(Connection::Ready(Box::new(backend)))
            }
            ScreenKind::Ssh(_) => Ok(Connection::Pending),
        }
    }
}

/// Speech sink that remembers what it was told.
#[derive(Clone, Default)]
pub struct RecordingSpeech {
    pub spoken: Rc<RefCell<Vec<String>>>,
    pub stops: Rc<RefCell<usize>>,
}

impl RecordingSpeech {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.borrow().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.spoken.borrow().last().cloned()
    }
}

impl SpeechSink for RecordingSpeech {
    fn speak(&mut self, text: &str) {
        self.spoken.borrow_mut().push(text.to_string());
    }

    fn stop(&mut self) {
        *self.stops.borrow_mut() += 1;
    }
}
