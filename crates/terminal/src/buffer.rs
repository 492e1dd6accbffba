//! Screen buffer: escape-sequence parsing and the cell grid.
//!
//! Rows are addressed absolutely: row 0 is the oldest scrollback line and
//! `base_offset()` is the top row of the live screen. The cursor row is
//! relative to `base_offset()`.

use alacritty_terminal::event::{Event, EventListener, WindowSize};
use alacritty_terminal::grid::{Dimensions, Scroll};
use alacritty_terminal::index::{Column, Line};
use alacritty_terminal::term::cell::Flags;
use alacritty_terminal::term::{Config, Term, TermMode};
use alacritty_terminal::vte::ansi::{Processor, Rgb};
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::Arc;

use crate::types::{CursorPos, TermSize};

/// Queryable terminal screen.
///
/// Everything the session needs from a terminal emulator: feed it bytes,
/// read text and cursor state back, move the viewport.
pub trait ScreenBuffer {
    /// Parse and apply a chunk of process output.
    fn write(&mut self, bytes: &[u8]);

    /// Text of absolute row `row` restricted to `cols`, or `None` when the
    /// row does not exist. With `trim`, trailing blanks are removed.
    fn translate_line(&self, row: usize, cols: Range<usize>, trim: bool) -> Option<String>;

    /// Full trimmed text of absolute row `row`.
    fn row_text(&self, row: usize) -> Option<String> {
        self.translate_line(row, 0..self.size().cols as usize, true)
    }

    /// Whether absolute row `row` soft-wraps into the row below it.
    fn is_wrapped(&self, row: usize) -> bool;

    /// Cursor position relative to `base_offset()`.
    fn cursor(&self) -> CursorPos;

    /// Absolute row of the top of the live screen.
    fn base_offset(&self) -> usize;

    /// Scrollback plus screen rows.
    fn total_rows(&self) -> usize;

    /// Absolute row at the top of the viewport.
    fn viewport_top(&self) -> usize;

    fn size(&self) -> TermSize;

    fn resize(&mut self, size: TermSize);

    /// Scroll so that absolute row `row` is the top of the viewport, as far
    /// as the scrollback allows.
    fn scroll_to_line(&mut self, row: usize);

    fn scroll_to_bottom(&mut self);

    /// Render-level accessibility flag.
    fn set_screen_reader_mode(&mut self, enabled: bool);

    fn screen_reader_mode(&self) -> bool;

    /// Whether the application switched cursor keys to application mode.
    fn application_cursor(&self) -> bool;

    /// Replies to terminal queries (cursor position reports, color
    /// queries) that must be written back to the process.
    fn take_replies(&mut self) -> Vec<u8>;
}

/// Captures terminal query responses so the owner can forward them to the
/// backend.
#[derive(Clone, Default)]
struct ReplyListener {
    replies: Arc<Mutex<Vec<u8>>>,
}

impl ReplyListener {
    fn reply(&self, data: &[u8]) {
        self.replies.lock().extend_from_slice(data);
    }
}

impl EventListener for ReplyListener {
    fn send_event(&self, event: Event) {
        match event {
            Event::PtyWrite(text) => self.reply(text.as_bytes()),
            Event::ColorRequest(_index, formatter) => {
                let response = formatter(Rgb { r: 0, g: 0, b: 0 });
                self.reply(response.as_bytes());
            }
            Event::TextAreaSizeRequest(formatter) => {
                let response = formatter(WindowSize {
                    num_lines: 24,
                    num_cols: 80,
                    cell_width: 8,
                    cell_height: 16,
                });
                self.reply(response.as_bytes());
            }
            _ => {}
        }
    }
}

/// [`ScreenBuffer`] backed by alacritty's terminal emulator.
pub struct AlacrittyBuffer {
    term: Term<ReplyListener>,
    processor: Processor,
    listener: ReplyListener,
    size: TermSize,
    screen_reader_mode: bool,
}

impl AlacrittyBuffer {
    pub fn new(size: TermSize, scrollback_lines: usize) -> Self {
        let listener = ReplyListener::default();
        let config = Config {
            scrolling_history: scrollback_lines,
            ..Config::default()
        };
        let term = Term::new(config, &size, listener.clone());
        Self {
            term,
            processor: Processor::new(),
            listener,
            size,
            screen_reader_mode: false,
        }
    }

    fn history_size(&self) -> usize {
        self.term.grid().history_size()
    }
}

impl ScreenBuffer for AlacrittyBuffer {
    fn write(&mut self, bytes: &[u8]) {
        self.processor.advance(&mut self.term, bytes);
    }

    fn translate_line(&self, row: usize, cols: Range<usize>, trim: bool) -> Option<String> {
        if row >= self.total_rows() {
            return None;
        }
        let grid = self.term.grid();
        let line = Line(row as i32 - self.history_size() as i32);
        let end = cols.end.min(grid.columns());
        let start = cols.start.min(end);

        let cells = &grid[line];
        let mut text = String::with_capacity(end - start);
        for col in start..end {
            let cell = &cells[Column(col)];
            if cell
                .flags
                .intersects(Flags::WIDE_CHAR_SPACER | Flags::LEADING_WIDE_CHAR_SPACER)
            {
                continue;
            }
            // Tab cells keep their screen width
            text.push(if cell.c == '\t' { ' ' } else { cell.c });
        }

        if trim {
            text.truncate(text.trim_end().len());
        }
        Some(text)
    }

    fn is_wrapped(&self, row: usize) -> bool {
        if row >= self.total_rows() {
            return false;
        }
        let grid = self.term.grid();
        let line = Line(row as i32 - self.history_size() as i32);
        let last = Column(grid.columns().saturating_sub(1));
        grid[line][last].flags.contains(Flags::WRAPLINE)
    }

    fn cursor(&self) -> CursorPos {
        let point = self.term.grid().cursor.point;
        CursorPos {
            col: point.column.0,
            row: point.line.0.max(0) as usize,
        }
    }

    fn base_offset(&self) -> usize {
        self.history_size()
    }

    fn total_rows(&self) -> usize {
        self.history_size() + self.term.grid().screen_lines()
    }

    fn viewport_top(&self) -> usize {
        self.history_size() - self.term.grid().display_offset()
    }

    fn size(&self) -> TermSize {
        self.size
    }

    fn resize(&mut self, size: TermSize) {
        if size == self.size {
            return;
        }
        self.size = size;
        self.term.resize(size);
    }

    fn scroll_to_line(&mut self, row: usize) {
        let history = self.history_size();
        let target = history.saturating_sub(row.min(history)) as i32;
        let current = self.term.grid().display_offset() as i32;
        // Positive delta scrolls up into history
        let delta = target - current;
        if delta != 0 {
            self.term.scroll_display(Scroll::Delta(delta));
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.term.scroll_display(Scroll::Bottom);
    }

    fn set_screen_reader_mode(&mut self, enabled: bool) {
        self.screen_reader_mode = enabled;
    }

    fn screen_reader_mode(&self) -> bool {
        self.screen_reader_mode
    }

    fn application_cursor(&self) -> bool {
        self.term.mode().contains(TermMode::APP_CURSOR)
    }

    fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut *self.listener.replies.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn buffer(cols: u16, rows: u16) -> AlacrittyBuffer {
        AlacrittyBuffer::new(TermSize { cols, rows }, 1000)
    }

    #[test]
    fn plain_text_lands_on_first_row() {
        let mut buf = buffer(20, 5);
        buf.write(b"hello");
        assert_eq!(buf.row_text(0).as_deref(), Some("hello"));
        assert_eq!(buf.cursor(), CursorPos { col: 5, row: 0 });
        assert_eq!(buf.base_offset(), 0);
        assert_eq!(buf.total_rows(), 5);
    }

    #[test]
    fn untrimmed_line_keeps_padding() {
        let mut buf = buffer(8, 2);
        buf.write(b"ab");
        assert_eq!(buf.translate_line(0, 0..8, false).as_deref(), Some("ab      "));
        assert_eq!(buf.translate_line(0, 1..4, false).as_deref(), Some("b  "));
    }

    #[test]
    fn column_range_is_clamped() {
        let mut buf = buffer(4, 2);
        buf.write(b"abcd");
        assert_eq!(buf.translate_line(0, 2..100, true).as_deref(), Some("cd"));
        assert_eq!(buf.translate_line(0, 9..100, true).as_deref(), Some(""));
    }

    #[test]
    fn out_of_range_row_is_none() {
        let buf = buffer(10, 3);
        assert_eq!(buf.row_text(3), None);
    }

    #[test]
    fn long_input_wraps_to_next_row() {
        let mut buf = buffer(5, 3);
        buf.write(b"echo hello");
        assert_eq!(buf.row_text(0).as_deref(), Some("echo"));
        assert_eq!(buf.row_text(1).as_deref(), Some("hello"));
    }

    #[test]
    fn soft_wrap_is_flagged_on_the_wrapped_row() {
        let mut buf = buffer(5, 3);
        buf.write(b"echo hello\r\nx");
        assert!(buf.is_wrapped(0));
        assert!(!buf.is_wrapped(1));
        assert!(!buf.is_wrapped(2));
        assert!(!buf.is_wrapped(9));
        // The blank that ends the wrapped row is kept untrimmed
        assert_eq!(buf.translate_line(0, 0..5, false).as_deref(), Some("echo "));
    }

    #[test]
    fn wide_chars_skip_spacer_cells() {
        let mut buf = buffer(10, 2);
        buf.write("你好!".as_bytes());
        assert_eq!(buf.row_text(0).as_deref(), Some("你好!"));
    }

    #[test]
    fn scrollback_rows_are_absolute() {
        let mut buf = buffer(10, 3);
        buf.write(b"a\r\nb\r\nc\r\nd\r\ne");
        assert_eq!(buf.base_offset(), 2);
        assert_eq!(buf.total_rows(), 5);
        assert_eq!(buf.row_text(0).as_deref(), Some("a"));
        assert_eq!(buf.row_text(4).as_deref(), Some("e"));
        assert_eq!(buf.cursor(), CursorPos { col: 1, row: 2 });
    }

    #[test]
    fn scroll_to_line_moves_viewport() {
        let mut buf = buffer(10, 3);
        buf.write(b"a\r\nb\r\nc\r\nd\r\ne");
        assert_eq!(buf.viewport_top(), 2);

        buf.scroll_to_line(0);
        assert_eq!(buf.viewport_top(), 0);

        buf.scroll_to_line(1);
        assert_eq!(buf.viewport_top(), 1);

        // Rows below the live screen top pin to the bottom
        buf.scroll_to_line(4);
        assert_eq!(buf.viewport_top(), 2);

        buf.scroll_to_line(0);
        buf.scroll_to_bottom();
        assert_eq!(buf.viewport_top(), 2);
    }

    #[test]
    fn cursor_report_is_captured_as_reply() {
        let mut buf = buffer(10, 3);
        buf.write(b"ab\x1b[6n");
        assert_eq!(buf.take_replies(), b"\x1b[1;3R".to_vec());
        assert!(buf.take_replies().is_empty());
    }

    #[test]
    fn application_cursor_follows_decckm() {
        let mut buf = buffer(10, 3);
        assert!(!buf.application_cursor());
        buf.write(b"\x1b[?1h");
        assert!(buf.application_cursor());
        buf.write(b"\x1b[?1l");
        assert!(!buf.application_cursor());
    }

    #[test]
    fn resize_updates_size() {
        let mut buf = buffer(10, 3);
        let size = TermSize { cols: 40, rows: 12 };
        buf.resize(size);
        assert_eq!(buf.size(), size);
        assert_eq!(buf.total_rows(), 12);
    }

    #[test]
    fn screen_reader_flag_round_trips() {
        let mut buf = buffer(10, 3);
        assert!(!buf.screen_reader_mode());
        buf.set_screen_reader_mode(true);
        assert!(buf.screen_reader_mode());
    }
}
