//! talkterm - a talking terminal multiplexer
//!
//! Main entry point: hosts a session inside the terminal it was started from.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use session::{Flow, HostOutput, Session, SessionEvent};
use settings::Config;
use std::io::Write;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use terminal::{BackendEvent, PtySpawner, TermSize};
use termwiz::caps::Capabilities;
use termwiz::color::ColorAttribute;
use termwiz::input::InputEvent;
use termwiz::surface::{Change, Position};
use termwiz::terminal::{new_terminal, Terminal};
use tracing::{debug, error, info};

/// Application startup time for performance monitoring
static STARTUP_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Longest wait for host input before backend events are drained.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Initialize required directories.
fn init_paths() -> Result<()> {
    let config_dir = talkterm_paths::config_dir();
    let data_dir = talkterm_paths::data_dir();

    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("Failed to create config directory: {:?}", config_dir))?;
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

    debug!(
        "Initialized paths - config: {:?}, data: {:?}",
        config_dir, data_dir
    );
    Ok(())
}

/// Check if debug mode is enabled via environment variable.
fn is_debug_mode() -> bool {
    std::env::var("TALKTERM_DEBUG").is_ok()
}

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "talkterm=trace,session=trace,terminal=debug,info"
    } else {
        "talkterm=info,session=info,warn"
    }
}

/// Initialize the logging system.
///
/// The hosted screens own stdout, so logs go to a file in the logs
/// directory.
fn init_logging() -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let logs_dir = talkterm_paths::logs_dir();
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory: {:?}", logs_dir))?;
    let log_path = logs_dir.join("talkterm.log");
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {:?}", log_path))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(is_debug_mode())));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(filter)
        .init();

    if is_debug_mode() {
        info!(
            "talkterm v{} starting up (DEBUG MODE ENABLED)",
            env!("CARGO_PKG_VERSION")
        );
        info!("Set RUST_LOG for custom log levels, e.g. RUST_LOG=session=trace");
    } else {
        info!("talkterm v{} starting up", env!("CARGO_PKG_VERSION"));
    }
    Ok(())
}

/// Map host input to the session's events. Mouse input is not used.
fn session_event(input: InputEvent) -> Option<SessionEvent> {
    match input {
        InputEvent::Key(key) => Some(SessionEvent::Key(key)),
        InputEvent::Paste(text) => Some(SessionEvent::Paste(text)),
        InputEvent::Resized { cols, rows } => Some(SessionEvent::Resize(term_size(cols, rows))),
        _ => None,
    }
}

fn term_size(cols: usize, rows: usize) -> TermSize {
    TermSize {
        cols: u16::try_from(cols).unwrap_or(u16::MAX).max(1),
        rows: u16::try_from(rows).unwrap_or(u16::MAX).max(1),
    }
}

/// Changes that redraw the whole host screen from a repaint.
fn repaint_changes(
    title: String,
    lines: Vec<String>,
    cursor: Option<terminal::CursorPos>,
) -> Vec<Change> {
    let mut changes = Vec::with_capacity(lines.len() * 2 + 3);
    changes.push(Change::ClearScreen(ColorAttribute::Default));
    changes.push(Change::Title(title));
    for (row, line) in lines.into_iter().enumerate() {
        changes.push(Change::CursorPosition {
            x: Position::Absolute(0),
            y: Position::Absolute(row),
        });
        changes.push(Change::Text(line));
    }
    if let Some(cursor) = cursor {
        changes.push(Change::CursorPosition {
            x: Position::Absolute(cursor.col),
            y: Position::Absolute(cursor.row),
        });
    }
    changes
}

/// Write everything the session produced to the host terminal.
fn flush_output(terminal: &mut impl Terminal, session: &mut Session) -> Result<()> {
    for output in session.take_output() {
        match output {
            HostOutput::Bytes(bytes) => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(&bytes).context("Failed to write output")?;
                stdout.flush().context("Failed to flush output")?;
            }
            HostOutput::Repaint {
                title,
                lines,
                cursor,
            } => {
                terminal
                    .render(&repaint_changes(title, lines, cursor))
                    .context("Failed to repaint")?;
                terminal.flush().context("Failed to flush repaint")?;
            }
        }
    }
    Ok(())
}

/// Run until the session closes its window.
fn host_loop(
    terminal: &mut impl Terminal,
    session: &mut Session,
    backend_events: &Receiver<BackendEvent>,
    config_changes: &Receiver<Config>,
) -> Result<()> {
    session.open_startup_screen();
    flush_output(terminal, session)?;
    info!("Session ready in {:?}", STARTUP_TIME.elapsed());

    'host: loop {
        let timeout = session.next_deadline().map_or(POLL_INTERVAL, |deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .min(POLL_INTERVAL)
        });
        let input = terminal
            .poll_input(Some(timeout))
            .context("Failed to read host input")?;
        if let Some(event) = input.and_then(session_event) {
            if session.dispatch(event, Instant::now()) == Flow::Close {
                break 'host;
            }
        }

        while let Ok(event) = backend_events.try_recv() {
            if session.dispatch(SessionEvent::Backend(event), Instant::now()) == Flow::Close {
                break 'host;
            }
        }
        while let Ok(config) = config_changes.try_recv() {
            let _ = session.dispatch(SessionEvent::ConfigChanged(config), Instant::now());
        }
        if session.run_due(Instant::now()) == Flow::Close {
            break 'host;
        }
        flush_output(terminal, session)?;
    }

    flush_output(terminal, session)?;
    info!("All screens closed");
    Ok(())
}

fn run() -> Result<()> {
    let config_path = settings::ensure_config_file();
    let config = settings::load_config();

    let (backend_tx, backend_rx) = mpsc::channel();
    let (config_tx, config_rx) = mpsc::channel();
    // Dropping the guard stops the watcher
    let _watcher = settings::watch_config(move |config| {
        let _ = config_tx.send(config);
    });

    let caps = Capabilities::new_from_env().context("Failed to read terminal capabilities")?;
    let mut terminal = new_terminal(caps).context("Failed to open the host terminal")?;
    let screen = terminal
        .get_screen_size()
        .context("Failed to read the host terminal size")?;
    let size = term_size(screen.cols, screen.rows);

    let speech = platform::speech_for(&config.accessibility);
    let spawner = PtySpawner::new(backend_tx);
    let mut session = Session::new(config, Box::new(spawner), speech, size);
    if let Some(path) = config_path {
        session = session.with_config_path(path);
    }

    terminal
        .set_raw_mode()
        .context("Failed to enter raw mode")?;
    terminal
        .enter_alternate_screen()
        .context("Failed to enter the alternate screen")?;

    let result = host_loop(&mut terminal, &mut session, &backend_rx, &config_rx);

    if let Err(e) = terminal.exit_alternate_screen() {
        error!("Failed to leave the alternate screen: {}", e);
    }
    if let Err(e) = terminal.set_cooked_mode() {
        error!("Failed to restore the terminal mode: {}", e);
    }
    result
}

fn main() {
    let _ = *STARTUP_TIME;

    if let Err(e) = init_logging() {
        eprintln!("talkterm: logging disabled: {:#}", e);
    }

    if let Err(e) = init_paths() {
        error!("Failed to initialize paths: {}", e);
    }

    if let Err(e) = run() {
        error!("talkterm failed: {:#}", e);
        eprintln!("talkterm: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termwiz::input::{KeyCode, KeyEvent, Modifiers};
    use test_case::test_case;

    #[test]
    fn keys_and_pastes_reach_the_session() {
        let key = KeyEvent {
            key: KeyCode::Char('a'),
            modifiers: Modifiers::NONE,
        };
        assert!(matches!(
            session_event(InputEvent::Key(key.clone())),
            Some(SessionEvent::Key(k)) if k == key
        ));
        assert!(matches!(
            session_event(InputEvent::Paste("ls -l".into())),
            Some(SessionEvent::Paste(text)) if text == "ls -l"
        ));
    }

    #[test]
    fn host_resize_becomes_session_resize() {
        assert!(matches!(
            session_event(InputEvent::Resized { cols: 100, rows: 30 }),
            Some(SessionEvent::Resize(size)) if size == TermSize { cols: 100, rows: 30 }
        ));
    }

    #[test]
    fn wake_events_are_ignored() {
        assert!(session_event(InputEvent::Wake).is_none());
    }

    #[test_case(0, 0, 1, 1 ; "empty size is clamped")]
    #[test_case(80, 24, 80, 24 ; "normal size")]
    #[test_case(100_000, 24, u16::MAX, 24 ; "oversized width saturates")]
    fn host_sizes_fit_term_size(cols: usize, rows: usize, want_cols: u16, want_rows: u16) {
        assert_eq!(
            term_size(cols, rows),
            TermSize {
                cols: want_cols,
                rows: want_rows
            }
        );
    }

    #[test]
    fn repaint_draws_each_line_then_places_the_cursor() {
        let changes = repaint_changes(
            "Shell #1".into(),
            vec!["$ ls".into(), "a b".into()],
            Some(terminal::CursorPos { col: 3, row: 1 }),
        );
        assert_eq!(changes.len(), 7);
        assert_eq!(changes[1], Change::Title("Shell #1".into()));
        assert_eq!(changes[3], Change::Text("$ ls".into()));
        assert_eq!(
            changes[6],
            Change::CursorPosition {
                x: Position::Absolute(3),
                y: Position::Absolute(1),
            }
        );
    }

    #[test]
    fn debug_filter_is_more_verbose() {
        assert!(default_filter(true).contains("session=trace"));
        assert_eq!(default_filter(false), "talkterm=info,session=info,warn");
    }
}
