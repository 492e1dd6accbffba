//! The session dispatcher.
//!
//! [`Session`] owns every screen of one window plus the accessibility
//! state layered on top of them. All input arrives through
//! [`Session::dispatch`] on a single thread; deferred buffer reads are
//! queued on a [`Scheduler`] and run by [`Session::run_due`].

use anyhow::{anyhow, Context, Result};
use platform::SpeechSink;
use settings::{Config, StartupMode};
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use terminal::{
    AlacrittyBuffer, Backend, BackendEvent, Connection, CursorPos, ScreenBuffer, ScreenId,
    ScreenKind, ShellVariant, SpawnRequest, Spawner, SshParams, TermSize,
};
use termwiz::input::{KeyCode, KeyEvent};

use crate::event::{Flow, HostOutput, SessionEvent};
use crate::extract::{self, BufferPos, InputLine};
use crate::jump::JumpTarget;
use crate::keys::{encode_key, Action, Keymap};
use crate::listing;
use crate::mode::{ModeChange, ModeToggle};
use crate::registry::ScreenRegistry;
use crate::relay;
use crate::scheduler::{Scheduler, TaskId};
use crate::screen::{BackendState, Screen};

/// Builds the buffer for a new screen from its size and scrollback limit.
pub type BufferFactory = Box<dyn Fn(TermSize, usize) -> Box<dyn ScreenBuffer>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Task {
    /// Resample the logical cursor once output after a line feed settled.
    TrackCursor(ScreenId),
    RefreshInput,
    SpeakCurrentLine,
}

pub struct Session {
    config: Config,
    config_path: Option<PathBuf>,
    transcripts_dir: PathBuf,
    registry: ScreenRegistry,
    spawner: Box<dyn Spawner>,
    speech: Box<dyn SpeechSink>,
    buffers: BufferFactory,
    keymap: Keymap,
    scheduler: Scheduler<Task>,
    size: TermSize,
    speech_level: u8,
    /// Gates speech of incoming output. Set by Enter and vertical arrows.
    speech_armed: bool,
    /// Where the command being typed starts.
    tracked: BufferPos,
    pending_input: InputLine,
    /// Pending re-read of the typed line, cancelled when Enter reads it.
    input_refresh: Option<TaskId>,
    /// Row under review while screen cursor mode is on. `None` follows the
    /// terminal cursor.
    review_row: Option<usize>,
    screen_cursor: ModeToggle,
    editor_mode: ModeToggle,
    output: Vec<HostOutput>,
    closed: bool,
}

impl Session {
    pub fn new(
        config: Config,
        spawner: Box<dyn Spawner>,
        speech: Box<dyn SpeechSink>,
        size: TermSize,
    ) -> Self {
        Self {
            keymap: Keymap::from_config(&config.keybindings),
            speech_level: config.accessibility.speech_mode().level(),
            config,
            config_path: None,
            transcripts_dir: talkterm_paths::transcripts_dir(),
            registry: ScreenRegistry::default(),
            spawner,
            speech,
            buffers: Box::new(|size, scrollback| Box::new(AlacrittyBuffer::new(size, scrollback))),
            scheduler: Scheduler::default(),
            size,
            speech_armed: false,
            tracked: BufferPos::default(),
            pending_input: InputLine::default(),
            input_refresh: None,
            review_row: None,
            screen_cursor: ModeToggle::default(),
            editor_mode: ModeToggle::default(),
            output: Vec::new(),
            closed: false,
        }
    }

    pub fn with_buffer_factory(mut self, buffers: BufferFactory) -> Self {
        self.buffers = buffers;
        self
    }

    /// Config file that in-app toggles are written back to.
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    pub fn with_transcripts_dir(mut self, dir: PathBuf) -> Self {
        self.transcripts_dir = dir;
        self
    }

    // Screen lifecycle

    /// Open the tab configured by `startup-terminal-mode`.
    pub fn open_startup_screen(&mut self) -> ScreenId {
        match self.config.startup_terminal_mode {
            StartupMode::Shell => self.open_shell_screen(),
            StartupMode::Ssh => self.open_ssh_screen(),
        }
    }

    pub fn open_shell_screen(&mut self) -> ScreenId {
        let variant = ShellVariant::from_config(&self.config.shell);
        self.create_screen(ScreenKind::Shell(variant))
    }

    /// Open an ssh tab to the default host. Without a configured host the
    /// tab still opens and shows why it cannot connect.
    pub fn open_ssh_screen(&mut self) -> ScreenId {
        match self.config.ssh_host().map(SshParams::from) {
            Some(params) => self.create_screen(ScreenKind::Ssh(params)),
            None => {
                let id = self.registry.allocate_id();
                let kind = ScreenKind::Ssh(SshParams {
                    host: String::new(),
                    port: settings::constants::ssh::DEFAULT_PORT,
                    user: None,
                    identity_file: None,
                });
                self.install_screen(id, kind, Err(anyhow!("no ssh host configured")))
            }
        }
    }

    /// Create a screen, start its backend and make it active.
    ///
    /// A backend that cannot be created leaves the screen open with the
    /// error written into its buffer.
    pub fn create_screen(&mut self, kind: ScreenKind) -> ScreenId {
        let id = self.registry.allocate_id();
        let request = SpawnRequest {
            screen: id,
            kind: kind.clone(),
            size: self.size,
            working_dir: None,
        };
        let connection = self.spawner.spawn(request);
        self.install_screen(id, kind, connection)
    }

    fn install_screen(
        &mut self,
        id: ScreenId,
        kind: ScreenKind,
        connection: Result<Connection>,
    ) -> ScreenId {
        let mut buffer = (self.buffers)(self.size, self.config.scrollback_lines());
        buffer.set_screen_reader_mode(self.screen_cursor.is_on());
        let mut screen = Screen::new(id, kind, buffer);

        let mut spoken_error = None;
        match connection {
            Ok(Connection::Ready(backend)) => screen.backend = BackendState::Ready(backend),
            Ok(Connection::Pending) => tracing::info!("Screen {} connecting", id),
            Err(e) => {
                let message = format!("{:#}", e);
                tracing::warn!("Failed to start screen {}: {}", id, message);
                screen.fail(&message);
                if screen.kind().is_remote() {
                    spoken_error = Some(message);
                }
            }
        }

        tracing::info!("Opened {}", screen.title());
        self.registry.insert(screen);
        self.set_active(id);
        if let Some(message) = spoken_error {
            self.announce(&message);
        }
        id
    }

    /// Close a screen and its backend. Closing an unknown id does nothing.
    /// Returns [`Flow::Close`] once the last screen is gone.
    pub fn close_screen(&mut self, id: ScreenId) -> Flow {
        let was_active = self.registry.active_id() == Some(id);
        let Some(mut screen) = self.registry.remove(id) else {
            tracing::debug!("Screen {} already closed", id);
            return self.flow();
        };
        screen.close();
        self.scheduler.cancel_where(|task| *task == Task::TrackCursor(id));
        tracing::info!("Closed {}", screen.title());
        drop(screen);

        if self.registry.is_empty() {
            tracing::info!("Last screen closed, closing window");
            self.closed = true;
        } else if was_active {
            if let Some(next) = self.registry.active_id() {
                self.set_active(next);
            }
        }
        self.flow()
    }

    /// Switch the active screen. Restarts jump navigation on it and
    /// repaints.
    pub fn set_active(&mut self, id: ScreenId) -> bool {
        if !self.registry.set_active(id) {
            return false;
        }
        self.scheduler.cancel_where(|task| {
            matches!(task, Task::RefreshInput | Task::SpeakCurrentLine)
        });
        self.input_refresh = None;
        self.review_row = None;
        self.pending_input = InputLine::default();
        if let Some(screen) = self.registry.active() {
            self.tracked = BufferPos::of_cursor(screen.buffer());
        }
        self.repaint();
        true
    }

    // Event dispatch

    pub fn dispatch(&mut self, event: SessionEvent, now: Instant) -> Flow {
        if self.closed {
            return Flow::Close;
        }
        match event {
            SessionEvent::Key(key) => self.on_key(key, now),
            SessionEvent::Paste(text) => {
                self.send_to_active(text.as_bytes());
                self.schedule_input_refresh(now);
            }
            SessionEvent::Backend(event) => self.on_backend_event(event, now),
            SessionEvent::Resize(size) => self.on_resize(size),
            SessionEvent::FocusInput => self.focus_input(),
            SessionEvent::ConfigChanged(config) => self.apply_config(config),
        }
        self.flow()
    }

    /// Run the deferred reads that are due.
    pub fn run_due(&mut self, now: Instant) -> Flow {
        for task in self.scheduler.take_due(now) {
            match task {
                Task::TrackCursor(id) => self.track_cursor(id),
                Task::RefreshInput => {
                    self.input_refresh = None;
                    self.refresh_input();
                }
                Task::SpeakCurrentLine => self.speak_current_line(),
            }
        }
        self.flow()
    }

    /// When [`Session::run_due`] next has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Drain output for the host terminal.
    pub fn take_output(&mut self) -> Vec<HostOutput> {
        std::mem::take(&mut self.output)
    }

    fn flow(&self) -> Flow {
        if self.closed {
            Flow::Close
        } else {
            Flow::Continue
        }
    }

    fn on_backend_event(&mut self, event: BackendEvent, now: Instant) {
        let id = event.screen();
        if !self.registry.contains(id) {
            tracing::debug!("Dropping {:?} for closed screen {}", event, id);
            if let BackendEvent::Ready { mut backend, .. } = event {
                backend.close();
            }
            return;
        }
        match event {
            BackendEvent::Data { bytes, .. } => self.on_backend_data(id, &bytes, now),
            BackendEvent::Ready { backend, .. } => self.on_backend_ready(id, backend),
            BackendEvent::Failed { error, .. } => {
                tracing::warn!("Screen {} failed to connect: {}", id, error);
                if let Some(screen) = self.registry.get_mut(id) {
                    screen.fail(&error);
                }
                if self.registry.active_id() == Some(id) {
                    self.repaint();
                }
                self.announce(&error);
            }
            BackendEvent::Exit { status, .. } => self.on_backend_exit(id, status),
        }
    }

    /// A process ended. ssh exiting with its own error status never got a
    /// session, so the screen stays open with the error shown and spoken.
    fn on_backend_exit(&mut self, id: ScreenId, status: Option<u32>) {
        let Some(screen) = self.registry.get_mut(id) else {
            return;
        };
        if !screen.kind().is_connection_failure(status) {
            tracing::info!("Screen {} exited with {:?}", id, status);
            let _ = self.close_screen(id);
            return;
        }

        let message = extract::last_output_line(screen.buffer()).unwrap_or_else(|| {
            format!("ssh exited with status {}", terminal::SSH_ERROR_STATUS)
        });
        tracing::warn!("Screen {} connection failed: {}", id, message);
        screen.fail(&message);
        if self.registry.active_id() == Some(id) {
            self.repaint();
        }
        self.announce(&message);
    }

    fn on_backend_ready(&mut self, id: ScreenId, mut backend: Box<dyn Backend>) {
        let size = self.size;
        let Some(screen) = self.registry.get_mut(id) else {
            return;
        };
        if !matches!(screen.backend, BackendState::Connecting) {
            tracing::warn!(
                "Screen {} reported ready while {}",
                id,
                screen.backend.label()
            );
            backend.close();
            return;
        }
        screen.backend = BackendState::Ready(backend);
        screen.resize(size);
        // Ready only means the client started; authentication may still fail
        tracing::info!("Screen {} backend started", id);
    }

    // I/O relay

    /// Relay a chunk of process output into its screen.
    ///
    /// The buffer always receives it (listing-tagged when that view is on).
    /// Output of the active screen is echoed to the host, and a line feed
    /// schedules a cursor resample. The text is spoken when speech is armed
    /// and the screen is not muted.
    pub fn on_backend_data(&mut self, id: ScreenId, bytes: &[u8], now: Instant) {
        let highlight = self.config.accessibility.ls_command_view;
        let is_active = self.registry.active_id() == Some(id);
        let Some(screen) = self.registry.get_mut(id) else {
            tracing::debug!("Dropping {} bytes for closed screen {}", bytes.len(), id);
            return;
        };

        let text = screen.decoder.decode(bytes);
        if text.is_empty() {
            return;
        }
        let shown = listing::highlight(&text, highlight);
        screen.buffer.write(shown.as_bytes());
        screen.forward_replies();
        let speak = self.speech_armed && screen.speech_enabled;

        if is_active {
            self.output.push(HostOutput::Bytes(shown.as_bytes().to_vec()));
            if text.contains('\n') {
                let due = now + self.config.accessibility.line_feed_settle();
                self.scheduler.schedule(Task::TrackCursor(id), due);
            }
        }
        if speak {
            if let Some(spoken) = relay::speakable(&text) {
                self.announce(&spoken);
            }
        }
    }

    /// Forward input to a screen's backend.
    pub fn send_keystroke(&mut self, id: ScreenId, data: &[u8]) {
        match self.registry.get_mut(id) {
            Some(screen) => screen.send(data),
            None => tracing::debug!("Dropping input for closed screen {}", id),
        }
    }

    fn send_to_active(&mut self, data: &[u8]) {
        if let Some(screen) = self.registry.active_mut() {
            screen.send(data);
        }
    }

    /// Apply new host dimensions to every screen.
    pub fn on_resize(&mut self, size: TermSize) {
        if size == self.size {
            return;
        }
        tracing::debug!("Resizing screens to {}x{}", size.cols, size.rows);
        self.size = size;
        for screen in self.registry.iter_mut() {
            screen.resize(size);
        }
        self.repaint();
    }

    // Keys

    fn on_key(&mut self, event: KeyEvent, now: Instant) {
        if let Some(action) = self.keymap.action_for(&event) {
            tracing::debug!("Key {:?} runs {}", event.key, action.name());
            self.perform(action);
            return;
        }
        if self.screen_cursor.is_on() {
            if let Some(step) = review_step(&event.key, self.size.rows) {
                self.move_review(step);
                return;
            }
        }
        let Some(screen) = self.registry.active() else {
            return;
        };
        let encoded = encode_key(&event, screen.buffer().application_cursor());
        // Anything typed puts review back on the terminal cursor
        self.review_row = None;

        match event.key {
            KeyCode::Enter => self.submit_line(),
            KeyCode::UpArrow | KeyCode::DownArrow => {
                self.speech_armed = true;
                let due = now + self.config.accessibility.input_settle();
                self.scheduler.schedule(Task::SpeakCurrentLine, due);
            }
            KeyCode::RightArrow => {
                self.speech_armed = false;
                self.speak_adjacent_char(true);
            }
            KeyCode::LeftArrow | KeyCode::Backspace => {
                self.speech_armed = false;
                self.speak_adjacent_char(false);
            }
            _ => self.speech_armed = false,
        }

        if let Some(bytes) = encoded {
            self.send_to_active(&bytes);
        }
        // Enter reads the line itself, arrows read it when speaking
        if !matches!(
            event.key,
            KeyCode::Enter | KeyCode::UpArrow | KeyCode::DownArrow
        ) {
            self.schedule_input_refresh(now);
        }
    }

    fn schedule_input_refresh(&mut self, now: Instant) {
        let due = now + self.config.accessibility.input_settle();
        self.input_refresh = Some(self.scheduler.schedule(Task::RefreshInput, due));
    }

    /// Enter: arm speech and record the submitted command as a jump point.
    fn submit_line(&mut self) {
        self.speech_armed = true;
        if let Some(task) = self.input_refresh.take() {
            self.scheduler.cancel(task);
        }
        self.refresh_input();

        let InputLine { text, .. } = std::mem::take(&mut self.pending_input);
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let row = self.tracked.row;
        if let Some(screen) = self.registry.active_mut() {
            if screen.jumps.add(row, text.to_string()) {
                tracing::debug!(
                    "Jump point at row {}: {}",
                    row,
                    util::truncate_for_log(text, 40)
                );
            }
        }
    }

    fn perform(&mut self, action: Action) {
        match action {
            Action::ToggleScreenCursor => self.toggle_screen_cursor(),
            Action::ToggleEditorMode => self.toggle_editor_mode(),
            Action::JumpPrevious => {
                self.jump_previous();
            }
            Action::JumpNext => {
                self.jump_next();
            }
            Action::MuteScreen => self.toggle_mute(),
            Action::StopSpeech => self.speech.stop(),
            Action::ToggleListingView => self.toggle_listing_view(),
            Action::NewShellTab => {
                self.open_shell_screen();
            }
            Action::NewSshTab => {
                self.open_ssh_screen();
            }
            Action::CloseTab => {
                if let Some(id) = self.registry.active_id() {
                    let _ = self.close_screen(id);
                }
            }
            Action::NextTab => self.cycle_tab(true),
            Action::PreviousTab => self.cycle_tab(false),
            Action::SaveTranscript => match self.save_transcript() {
                Ok(_) => self.announce("transcript saved"),
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    self.announce("transcript not saved");
                }
            },
            Action::FocusInput => self.focus_input(),
        }
    }

    // Accessibility modes

    fn toggle_screen_cursor(&mut self) {
        let debounce = self.config.accessibility.debounce_chords;
        let Some(change) = self.screen_cursor.press(debounce) else {
            tracing::debug!("Screen cursor toggle armed");
            return;
        };
        let enabled = change == ModeChange::Enabled;
        for screen in self.registry.iter_mut() {
            screen.buffer.set_screen_reader_mode(enabled);
        }
        self.review_row = None;
        tracing::info!("Screen cursor mode {}", on_off(enabled));
        self.announce(&format!("screen cursor mode {}", on_off(enabled)));
    }

    fn toggle_editor_mode(&mut self) {
        let debounce = self.config.accessibility.debounce_chords;
        let Some(change) = self.editor_mode.press(debounce) else {
            tracing::debug!("Editor mode toggle armed");
            return;
        };
        let enabled = change == ModeChange::Enabled;
        tracing::info!("Editor mode {}", on_off(enabled));
        self.announce(&format!("editor mode {}", on_off(enabled)));
    }

    fn toggle_mute(&mut self) {
        let Some(screen) = self.registry.active_mut() else {
            return;
        };
        screen.speech_enabled = !screen.speech_enabled;
        let enabled = screen.speech_enabled;
        if !enabled {
            self.speech.stop();
        }
        self.announce(if enabled { "speech on" } else { "speech muted" });
    }

    /// Flip the directory-listing view. Applies from the next output chunk
    /// and is written back to the config file.
    fn toggle_listing_view(&mut self) {
        let enabled = !self.config.accessibility.ls_command_view;
        self.config.accessibility.ls_command_view = enabled;
        if let Some(path) = &self.config_path {
            if let Err(e) = settings::persist_accessibility_value(path, "ls-command-view", enabled)
            {
                tracing::warn!("Failed to save ls-command-view: {:#}", e);
            }
        }
        self.announce(&format!("listing view {}", on_off(enabled)));
    }

    fn apply_config(&mut self, config: Config) {
        let old = &self.config.accessibility;
        let speech_changed = old.screen_reader_mode != config.accessibility.screen_reader_mode
            || old.speech_command != config.accessibility.speech_command;

        self.keymap = Keymap::from_config(&config.keybindings);
        self.speech_level = config.accessibility.speech_mode().level();
        if speech_changed {
            self.speech.stop();
            self.speech = platform::speech_for(&config.accessibility);
        }
        self.config = config;
        tracing::info!("Applied updated config");
    }

    // Tabs and navigation

    fn cycle_tab(&mut self, forward: bool) {
        let Some(current) = self.registry.active_id() else {
            return;
        };
        let Some(next) = self.registry.neighbor(current, forward) else {
            return;
        };
        if next == current {
            return;
        }
        self.set_active(next);
        if let Some(title) = self.registry.active().map(|screen| screen.title().to_string()) {
            self.announce(&title);
        }
    }

    fn focus_input(&mut self) {
        self.review_row = None;
        if let Some(screen) = self.registry.active_mut() {
            screen.jumps.reset_cursor();
            screen.buffer.scroll_to_bottom();
        }
        self.repaint();
    }

    /// Jump to the command under the jump cursor, then move the cursor to
    /// an older one.
    pub fn jump_previous(&mut self) -> Option<JumpTarget> {
        self.jump(true)
    }

    /// Jump to the command under the jump cursor, then move the cursor to
    /// a newer one.
    pub fn jump_next(&mut self) -> Option<JumpTarget> {
        self.jump(false)
    }

    fn jump(&mut self, backward: bool) -> Option<JumpTarget> {
        let reviewing = self.screen_cursor.is_on();
        let review_row = self.review_row;
        let screen = self.registry.active_mut()?;
        let target = if reviewing {
            // Relative to the reviewed row rather than the jump cursor
            let from = review_row.unwrap_or_else(|| BufferPos::of_cursor(screen.buffer()).row);
            if backward {
                screen.jumps.before(from)
            } else {
                screen.jumps.after(from)
            }
        } else if backward {
            screen.jumps.previous()
        } else {
            screen.jumps.next()
        }?;
        let last_row = screen.buffer.total_rows().saturating_sub(1);
        screen.buffer.scroll_to_line(target.row.min(last_row));
        if reviewing {
            self.review_row = Some(target.row);
        }
        self.repaint();
        self.announce(&format!("jump {}", target.text));
        Some(target)
    }

    /// Move the review row by `step` rows, keep it in view and read it.
    fn move_review(&mut self, step: isize) {
        let review_row = self.review_row;
        let Some(screen) = self.registry.active_mut() else {
            return;
        };
        let last_row = screen.buffer.total_rows().saturating_sub(1);
        let from = review_row.unwrap_or_else(|| BufferPos::of_cursor(screen.buffer()).row);
        let row = from.saturating_add_signed(step).min(last_row);

        let rows = screen.buffer.size().rows as usize;
        let top = screen.buffer.viewport_top();
        if row < top {
            screen.buffer.scroll_to_line(row);
        } else if row >= top + rows {
            screen.buffer.scroll_to_line(row + 1 - rows);
        }
        let text = extract::current_buffer_line(screen.buffer(), row);

        self.review_row = Some(row);
        self.repaint();
        self.announce(if text.is_empty() { "blank" } else { text.as_str() });
    }

    /// Write the active screen's scrollback to the transcripts directory.
    pub fn save_transcript(&self) -> Result<PathBuf> {
        let screen = self.registry.active().context("No screen to save")?;
        let buffer = screen.buffer();
        let text = extract::buffer_range(buffer, 0, buffer.total_rows());

        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let path = self
            .transcripts_dir
            .join(talkterm_paths::transcript_file_name(screen.id().0, secs));

        std::fs::create_dir_all(&self.transcripts_dir)
            .with_context(|| format!("Failed to create {:?}", self.transcripts_dir))?;
        std::fs::write(&path, text).with_context(|| format!("Failed to write {:?}", path))?;
        tracing::info!("Saved transcript of screen {} to {:?}", screen.id(), path);
        Ok(path)
    }

    // Deferred buffer reads

    fn track_cursor(&mut self, id: ScreenId) {
        if self.registry.active_id() != Some(id) {
            return;
        }
        if let Some(screen) = self.registry.get(id) {
            self.tracked = BufferPos::of_cursor(screen.buffer());
        }
    }

    /// Re-read the command being typed from the tracked position.
    fn refresh_input(&mut self) {
        let Some(screen) = self.registry.active() else {
            return;
        };
        let buffer = screen.buffer();
        if self.tracked.row >= buffer.total_rows() {
            self.tracked = BufferPos::of_cursor(buffer);
        }
        let text = extract::current_command_line(buffer, self.tracked);

        let cursor = BufferPos::of_cursor(buffer);
        let cols = buffer.size().cols as usize;
        let offset = if cursor.row < self.tracked.row {
            0
        } else {
            ((cursor.row - self.tracked.row) * cols + cursor.col).saturating_sub(self.tracked.col)
        };
        self.pending_input = InputLine {
            text,
            cursor: offset,
        };
    }

    /// After a vertical arrow: the raw line in editor mode, else the
    /// command line.
    fn speak_current_line(&mut self) {
        let text = if self.editor_mode.is_on() {
            let tab_width = self.config.tab_width();
            let Some(screen) = self.registry.active() else {
                return;
            };
            let buffer = screen.buffer();
            let pos = BufferPos::of_cursor(buffer);
            let raw = extract::current_buffer_line(buffer, pos.row);
            let line = extract::collapse_tabs(&raw, pos.col, tab_width);
            let text = line.text.clone();
            self.pending_input = line;
            text
        } else {
            self.refresh_input();
            self.pending_input.text.clone()
        };
        self.announce(&text);
    }

    fn speak_adjacent_char(&mut self, forward: bool) {
        let Some(screen) = self.registry.active() else {
            return;
        };
        let buffer = screen.buffer();
        let pos = BufferPos::of_cursor(buffer);
        let col = if forward {
            pos.col + 1
        } else {
            match pos.col.checked_sub(1) {
                Some(col) => col,
                None => return,
            }
        };
        if let Some(text) = buffer.translate_line(pos.row, col..col + 1, false) {
            self.announce(&text);
        }
    }

    // Output

    fn announce(&mut self, text: &str) {
        if self.speech_level == 0 {
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        tracing::debug!("Speaking: {}", util::truncate_for_log(text, 60));
        self.speech.speak(text);
    }

    fn repaint(&mut self) {
        let Some(screen) = self.registry.active() else {
            return;
        };
        let buffer = screen.buffer();
        let top = buffer.viewport_top();
        let visible = top..top + buffer.size().rows as usize;
        let lines = visible
            .clone()
            .map_while(|row| buffer.row_text(row))
            .collect();
        let cursor = match self.review_row {
            Some(row) if buffer.screen_reader_mode() => CursorPos { col: 0, row },
            _ => {
                let cursor = buffer.cursor();
                CursorPos {
                    col: cursor.col,
                    row: buffer.base_offset() + cursor.row,
                }
            }
        };
        let cursor = visible.contains(&cursor.row).then(|| CursorPos {
            col: cursor.col,
            row: cursor.row - top,
        });
        self.output.push(HostOutput::Repaint {
            title: screen.title().to_string(),
            lines,
            cursor,
        });
    }

    // Queries

    /// Command text from the tracked position on the active screen.
    pub fn current_command_line(&self) -> String {
        self.registry
            .active()
            .map(|screen| extract::current_command_line(screen.buffer(), self.tracked))
            .unwrap_or_default()
    }

    /// Text of `row`, or of the cursor row, on the active screen.
    pub fn current_buffer_line(&self, row: Option<usize>) -> String {
        let Some(screen) = self.registry.active() else {
            return String::new();
        };
        let buffer = screen.buffer();
        let row = row.unwrap_or_else(|| BufferPos::of_cursor(buffer).row);
        extract::current_buffer_line(buffer, row)
    }

    /// Rows `start..end` of the active screen.
    pub fn buffer_range(&self, start: usize, end: usize) -> String {
        self.registry
            .active()
            .map(|screen| extract::buffer_range(screen.buffer(), start, end))
            .unwrap_or_default()
    }

    pub fn active_id(&self) -> Option<ScreenId> {
        self.registry.active_id()
    }

    pub fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.registry.get(id)
    }

    /// Open screens in tab order.
    pub fn screen_ids(&self) -> Vec<ScreenId> {
        self.registry.ids().collect()
    }

    /// Row being reviewed in screen cursor mode, if moved off the cursor.
    pub fn review_row(&self) -> Option<usize> {
        self.review_row
    }

    pub fn tracked_position(&self) -> BufferPos {
        self.tracked
    }

    pub fn pending_input(&self) -> &InputLine {
        &self.pending_input
    }

    pub fn is_speech_armed(&self) -> bool {
        self.speech_armed
    }

    pub fn screen_cursor_mode(&self) -> ModeToggle {
        self.screen_cursor
    }

    pub fn editor_mode(&self) -> ModeToggle {
        self.editor_mode
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn size(&self) -> TermSize {
        self.size
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Rows a review key moves by in screen cursor mode.
fn review_step(key: &KeyCode, page: u16) -> Option<isize> {
    let page = isize::try_from(page).unwrap_or(1).max(1);
    match key {
        KeyCode::UpArrow => Some(-1),
        KeyCode::DownArrow => Some(1),
        KeyCode::PageUp => Some(-page),
        KeyCode::PageDown => Some(page),
        _ => None,
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
