//! Shared helpers for talkterm crates.

/// Report a broken invariant: panics in debug builds, logs with a backtrace
/// in release builds so a bad query never takes the window down.
#[macro_export]
macro_rules! debug_panic {
    ( $($fmt_arg:tt)* ) => {
        if cfg!(debug_assertions) {
            panic!( $($fmt_arg)* );
        } else {
            let backtrace = std::backtrace::Backtrace::capture();
            tracing::error!("{}\n{:?}", format_args!($($fmt_arg)*), backtrace);
        }
    };
}

/// Shorten `text` to at most `max_chars` characters for log output,
/// appending an ellipsis when something was cut.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_for_log("ls -la", 32), "ls -la");
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        assert_eq!(truncate_for_log("こんにちは世界", 5), "こんにちは…");
    }

    #[test]
    #[should_panic(expected = "row 7 out of range")]
    #[cfg(debug_assertions)]
    fn debug_panic_panics_in_debug_builds() {
        debug_panic!("row {} out of range", 7);
    }
}
