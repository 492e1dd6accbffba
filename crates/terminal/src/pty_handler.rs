//! PTY process management.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::backend::{Backend, BackendEvent, BackendEvents};
use crate::types::{ScreenId, TermSize};

type SharedChild = Arc<Mutex<Box<dyn Child + Send + Sync>>>;

/// How long the reader waits for the child to be reapable after EOF.
const EXIT_STATUS_ATTEMPTS: u32 = 50;
const EXIT_STATUS_POLL: Duration = Duration::from_millis(10);

/// A child process running on a pseudo-terminal.
///
/// A reader thread forwards output as `BackendEvent::Data` and reports
/// `BackendEvent::Exit` with the child's exit code on EOF. Dropping the
/// handler kills and reaps the child.
pub struct PtyHandler {
    screen: ScreenId,
    master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    child: SharedChild,
    closed: bool,
    _reader_thread: thread::JoinHandle<()>,
}

impl PtyHandler {
    /// Spawn `cmd` on a new PTY of the given size.
    pub fn spawn(
        screen: ScreenId,
        mut cmd: CommandBuilder,
        size: TermSize,
        events: BackendEvents,
    ) -> Result<Self> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(pty_size(size))
            .context("Failed to open PTY")?;

        cmd.env("TERM", "xterm-256color");

        let child: SharedChild = Arc::new(Mutex::new(
            pair.slave
                .spawn_command(cmd)
                .context("Failed to spawn process")?,
        ));
        let reader_child = child.clone();

        let writer = pair
            .master
            .take_writer()
            .context("Failed to get PTY writer")?;

        let mut reader = pair
            .master
            .try_clone_reader()
            .context("Failed to get PTY reader")?;

        let reader_thread = thread::Builder::new()
            .name(format!("talkterm-pty-{}", screen))
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            let event = BackendEvent::Data {
                                screen,
                                bytes: buf[..n].to_vec(),
                            };
                            if events.send(event).is_err() {
                                // Session is gone
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("PTY read for screen {} ended: {}", screen, e);
                            break;
                        }
                    }
                }
                let status = exit_status(&reader_child);
                tracing::debug!("Screen {} process ended with {:?}", screen, status);
                let _ = events.send(BackendEvent::Exit { screen, status });
            })
            .context("Failed to spawn PTY reader thread")?;

        tracing::debug!("Spawned PTY for screen {} ({}x{})", screen, size.cols, size.rows);

        Ok(Self {
            screen,
            master: pair.master,
            writer,
            child,
            closed: false,
            _reader_thread: reader_thread,
        })
    }
}

/// Exit code of a child whose output just ended. The child can close its
/// side of the PTY a moment before it is reapable, so this polls briefly
/// without holding the lock in between.
fn exit_status(child: &SharedChild) -> Option<u32> {
    for _ in 0..EXIT_STATUS_ATTEMPTS {
        match child.lock().try_wait() {
            Ok(Some(status)) => return Some(status.exit_code()),
            Ok(None) => thread::sleep(EXIT_STATUS_POLL),
            Err(e) => {
                tracing::debug!("Exit status unavailable: {}", e);
                return None;
            }
        }
    }
    None
}

fn pty_size(size: TermSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

impl Backend for PtyHandler {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    fn resize(&mut self, size: TermSize) -> Result<()> {
        self.master
            .resize(pty_size(size))
            .context("Failed to resize PTY")?;
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        // ESRCH (no such process) is expected if the child already exited
        if let Err(e) = self.child.lock().kill() {
            tracing::debug!("Kill child of screen {}: {}", self.screen, e);
        }
    }
}

impl Drop for PtyHandler {
    fn drop(&mut self) {
        self.close();

        // Reap to avoid a zombie
        if let Err(e) = self.child.lock().wait() {
            tracing::debug!("Wait for child of screen {}: {}", self.screen, e);
        }

        tracing::debug!("PTY handler for screen {} dropped", self.screen);
    }
}
