//! Centralized configuration constants for talkterm.

/// Terminal geometry defaults.
pub mod terminal {
    /// Columns used before the host reports its size.
    pub const DEFAULT_COLS: u16 = 80;
    /// Rows used before the host reports its size.
    pub const DEFAULT_ROWS: u16 = 24;
    /// Default tab stop width.
    pub const DEFAULT_TAB_WIDTH: usize = 8;
    /// Largest tab stop width accepted from the config file.
    pub const MAX_TAB_WIDTH: usize = 16;
}

/// Accessibility timing.
pub mod accessibility {
    /// Delay after a line feed before the cursor position is sampled.
    pub const LINE_FEED_SETTLE_MS: u64 = 300;
    /// Delay after a key press before the typed line is sampled.
    pub const INPUT_SETTLE_MS: u64 = 100;
    /// Lower bound for either settle delay.
    pub const MIN_SETTLE_MS: u64 = 10;
    /// Upper bound for either settle delay.
    pub const MAX_SETTLE_MS: u64 = 2_000;
}

/// SSH defaults.
pub mod ssh {
    pub const DEFAULT_PORT: u16 = 22;
}

/// Scrollback buffer configuration.
pub mod scrollback {
    /// Default scrollback buffer size in lines.
    pub const DEFAULT_LINES: usize = 10_000;
    /// Maximum allowed scrollback buffer size in lines.
    pub const MAX_LINES: usize = 100_000;
}

/// Settings file validation limits.
pub mod settings {
    /// Maximum settings file size in bytes (64 KB).
    pub const MAX_FILE_SIZE: u64 = 64 * 1024;
}

#[cfg(test)]
#[allow(clippy::assertions_on_constants)]
mod tests {
    use super::*;

    #[test]
    fn settle_defaults_are_within_bounds() {
        for value in [
            accessibility::LINE_FEED_SETTLE_MS,
            accessibility::INPUT_SETTLE_MS,
        ] {
            assert!(value >= accessibility::MIN_SETTLE_MS);
            assert!(value <= accessibility::MAX_SETTLE_MS);
        }
    }

    #[test]
    fn input_settles_faster_than_line_feed() {
        assert!(accessibility::INPUT_SETTLE_MS < accessibility::LINE_FEED_SETTLE_MS);
    }

    #[test]
    fn default_tab_width_is_accepted() {
        assert!(terminal::DEFAULT_TAB_WIDTH <= terminal::MAX_TAB_WIDTH);
        assert!(terminal::DEFAULT_TAB_WIDTH > 1);
    }

    #[test]
    fn scrollback_default_fits_max() {
        assert!(scrollback::DEFAULT_LINES <= scrollback::MAX_LINES);
    }
}
