//! Jump points: buffer rows where commands were submitted.

use collections::FxHashMap;

/// A row to jump to and the command that was entered there.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JumpTarget {
    pub row: usize,
    pub text: String,
}

/// Per-screen command history keyed by buffer row.
///
/// Rows are kept most recent first and never repeat. Re-adding a known row
/// updates its command text but keeps the row where it was first recorded.
#[derive(Debug, Default)]
pub struct JumpPoints {
    rows: Vec<usize>,
    commands: FxHashMap<usize, String>,
    cursor: usize,
}

impl JumpPoints {
    /// Record `text` as submitted at `row`. Returns true if the row is new.
    pub fn add(&mut self, row: usize, text: String) -> bool {
        let is_new = self.commands.insert(row, text).is_none();
        if is_new {
            self.rows.insert(0, row);
            self.cursor = 0;
        }
        is_new
    }

    /// Target under the cursor, then step towards older entries.
    pub fn previous(&mut self) -> Option<JumpTarget> {
        let target = self.current()?;
        if self.cursor + 1 < self.rows.len() {
            self.cursor += 1;
        }
        Some(target)
    }

    /// Target under the cursor, then step towards newer entries.
    pub fn next(&mut self) -> Option<JumpTarget> {
        let target = self.current()?;
        self.cursor = self.cursor.saturating_sub(1);
        Some(target)
    }

    fn current(&self) -> Option<JumpTarget> {
        let row = *self.rows.get(self.cursor)?;
        Some(self.target(row))
    }

    /// Nearest entry above `row`. Leaves the cursor alone.
    pub fn before(&self, row: usize) -> Option<JumpTarget> {
        let found = self.rows.iter().copied().filter(|&r| r < row).max()?;
        Some(self.target(found))
    }

    /// Nearest entry below `row`. Leaves the cursor alone.
    pub fn after(&self, row: usize) -> Option<JumpTarget> {
        let found = self.rows.iter().copied().filter(|&r| r > row).min()?;
        Some(self.target(found))
    }

    fn target(&self, row: usize) -> JumpTarget {
        JumpTarget {
            row,
            text: self.commands.get(&row).cloned().unwrap_or_default(),
        }
    }

    /// Restart navigation from the most recent entry.
    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rows, most recent first.
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn command(&self, row: usize) -> Option<&str> {
        self.commands.get(&row).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
