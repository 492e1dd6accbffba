//! Line and command extraction from screen buffer state.
//!
//! All queries take absolute buffer rows (see [`ScreenBuffer`]).

use terminal::ScreenBuffer;

/// Absolute position in a screen buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferPos {
    pub col: usize,
    pub row: usize,
}

impl BufferPos {
    /// Absolute position of the buffer's cursor.
    pub fn of_cursor(buffer: &dyn ScreenBuffer) -> Self {
        let cursor = buffer.cursor();
        Self {
            col: cursor.col,
            row: buffer.base_offset() + cursor.row,
        }
    }
}

/// The line being typed and the caret offset within it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputLine {
    pub text: String,
    pub cursor: usize,
}

fn checked_row(buffer: &dyn ScreenBuffer, row: usize) -> bool {
    let total = buffer.total_rows();
    if row >= total {
        util::debug_panic!("row {} out of range, buffer has {} rows", row, total);
        return false;
    }
    true
}

/// Command text starting at `from`.
///
/// Reads from `from.col` to the end of its row, then keeps appending
/// following rows until one is blank or the last row is reached, so a
/// command wrapped over several rows comes back whole. Soft-wrapped rows
/// are read untrimmed so a blank at the wrap point survives; only the end
/// of the command is trimmed.
pub fn current_command_line(buffer: &dyn ScreenBuffer, from: BufferPos) -> String {
    if !checked_row(buffer, from.row) {
        return String::new();
    }
    let cols = buffer.size().cols as usize;
    let last_row = buffer.total_rows() - 1;

    let mut line = buffer
        .translate_line(from.row, from.col..cols, !buffer.is_wrapped(from.row))
        .unwrap_or_default();
    for row in from.row + 1..=last_row {
        let text = buffer
            .translate_line(row, 0..cols, !buffer.is_wrapped(row))
            .unwrap_or_default();
        if text.trim().is_empty() {
            break;
        }
        line.push_str(&text);
    }
    line.truncate(line.trim_end().len());
    line
}

/// Last non-blank line at or above the cursor, such as the error a process
/// printed before it exited. A line soft-wrapped over several rows comes
/// back whole.
pub fn last_output_line(buffer: &dyn ScreenBuffer) -> Option<String> {
    let cursor_row = BufferPos::of_cursor(buffer).row;
    let last = cursor_row.min(buffer.total_rows().checked_sub(1)?);
    let end = (0..=last).rev().find(|&row| {
        buffer
            .row_text(row)
            .is_some_and(|text| !text.trim().is_empty())
    })?;
    let mut start = end;
    while start > 0 && buffer.is_wrapped(start - 1) {
        start -= 1;
    }
    let line = current_command_line(buffer, BufferPos { col: 0, row: start });
    Some(line.trim().to_string())
}

/// Trimmed text of a single row.
pub fn current_buffer_line(buffer: &dyn ScreenBuffer, row: usize) -> String {
    if !checked_row(buffer, row) {
        return String::new();
    }
    buffer.row_text(row).unwrap_or_default()
}

/// Rows `start..end`, each followed by a newline. Bounds are clamped to the
/// buffer.
pub fn buffer_range(buffer: &dyn ScreenBuffer, start: usize, end: usize) -> String {
    let end = end.min(buffer.total_rows());
    let start = start.min(end);
    let mut text = String::new();
    for row in start..end {
        if let Some(line) = buffer.row_text(row) {
            text.push_str(&line);
        }
        text.push('\n');
    }
    text
}

/// Collapse runs of `tab_width` spaces back into tab characters.
///
/// The buffer stores tabs as expanded spaces. `cursor` is a screen column;
/// it moves left by `tab_width - 1` for each run collapsed before it, so it
/// indexes the collapsed text.
pub fn collapse_tabs(line: &str, cursor: usize, tab_width: usize) -> InputLine {
    let tab_width = tab_width.max(1);
    let mut text = String::with_capacity(line.len());
    let mut corrected = cursor;
    let mut run = 0;

    for (col, ch) in line.chars().enumerate() {
        if ch == ' ' {
            run += 1;
            if run == tab_width {
                text.push('\t');
                if col < cursor {
                    corrected = corrected.saturating_sub(tab_width - 1);
                }
                run = 0;
            }
            continue;
        }
        text.push_str(&" ".repeat(run));
        run = 0;
        text.push(ch);
    }
    text.push_str(&" ".repeat(run));

    InputLine {
        text,
        cursor: corrected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeBuffer;
    use terminal::CursorPos;
    use test_case::test_case;

    #[test]
    fn wrapped_command_is_concatenated() {
        let buffer = FakeBuffer::with_rows(8, &["$ ls", "echo hel", "lo", "", "junk"]);
        let line = current_command_line(&buffer, BufferPos { col: 5, row: 1 });
        assert_eq!(line, "hello");
    }

    #[test]
    fn blank_at_wrap_point_is_kept() {
        let buffer = FakeBuffer::with_rows(5, &["echo ", "hello", ""]).wrapping(&[0]);
        let line = current_command_line(&buffer, BufferPos { col: 0, row: 0 });
        assert_eq!(line, "echo hello");
    }

    #[test]
    fn trailing_blanks_of_a_wrapped_command_are_trimmed() {
        let buffer = FakeBuffer::with_rows(4, &["$ ab", "cd  ", ""]).wrapping(&[0, 1]);
        let line = current_command_line(&buffer, BufferPos { col: 2, row: 0 });
        assert_eq!(line, "abcd");
    }

    #[test]
    fn last_output_line_skips_blank_rows_under_it() {
        let mut buffer = FakeBuffer::with_rows(40, &["Permission denied (publickey).", "", ""]);
        buffer.cursor = CursorPos { col: 0, row: 2 };
        assert_eq!(
            last_output_line(&buffer).as_deref(),
            Some("Permission denied (publickey).")
        );
    }

    #[test]
    fn last_output_line_joins_wrapped_rows() {
        let mut buffer =
            FakeBuffer::with_rows(10, &["ssh: conne", "ct refused", ""]).wrapping(&[0]);
        buffer.cursor = CursorPos { col: 0, row: 2 };
        assert_eq!(
            last_output_line(&buffer).as_deref(),
            Some("ssh: connect refused")
        );
    }

    #[test]
    fn last_output_line_of_blank_buffer_is_none() {
        let buffer = FakeBuffer::with_rows(10, &["", "  "]);
        assert_eq!(last_output_line(&buffer), None);
    }

    #[test]
    fn command_from_prompt_column() {
        let buffer = FakeBuffer::with_rows(20, &["$ git status", ""]);
        let line = current_command_line(&buffer, BufferPos { col: 2, row: 0 });
        assert_eq!(line, "git status");
    }

    #[test]
    fn last_row_stops_concatenation() {
        let buffer = FakeBuffer::with_rows(4, &["$ ab", "cdef", "gh"]);
        let line = current_command_line(&buffer, BufferPos { col: 2, row: 1 });
        assert_eq!(line, "efgh");
    }

    #[test]
    fn buffer_line_is_trimmed() {
        let buffer = FakeBuffer::with_rows(20, &["first", "second    "]);
        assert_eq!(current_buffer_line(&buffer, 1), "second");
    }

    #[test]
    fn range_ends_every_row_with_newline() {
        let buffer = FakeBuffer::with_rows(10, &["a", "", "c", "d"]);
        assert_eq!(buffer_range(&buffer, 0, 3), "a\n\nc\n");
    }

    #[test]
    fn range_is_clamped() {
        let buffer = FakeBuffer::with_rows(10, &["a", "b"]);
        assert_eq!(buffer_range(&buffer, 1, 99), "b\n");
        assert_eq!(buffer_range(&buffer, 5, 99), "");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn out_of_range_row_panics_in_debug() {
        let buffer = FakeBuffer::with_rows(10, &["a"]);
        current_buffer_line(&buffer, 4);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn out_of_range_row_is_empty_in_release() {
        let buffer = FakeBuffer::with_rows(10, &["a"]);
        assert_eq!(current_buffer_line(&buffer, 4), "");
        assert_eq!(current_command_line(&buffer, BufferPos { col: 0, row: 4 }), "");
    }

    #[test_case("if x:", 5, 8 => ("if x:".to_string(), 5) ; "no runs")]
    #[test_case("        return", 10, 8 => ("\treturn".to_string(), 3) ; "one leading run")]
    #[test_case("                x", 17, 8 => ("\t\tx".to_string(), 3) ; "two runs")]
    #[test_case("a   b", 4, 4 => ("a   b".to_string(), 4) ; "short run kept")]
    #[test_case("    x", 5, 4 => ("\tx".to_string(), 2) ; "width four")]
    #[test_case("x        ", 1, 8 => ("x\t".to_string(), 1) ; "run after cursor")]
    fn tab_collapse(line: &str, cursor: usize, width: usize) -> (String, usize) {
        let input = collapse_tabs(line, cursor, width);
        (input.text, input.cursor)
    }
}
