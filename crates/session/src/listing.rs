//! Directory-listing highlight.
//!
//! Tags each `ls -l` style line with a colored marker for its file type
//! before the text reaches the screen buffer.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// Marker for directory lines.
pub const DIRECTORY_TAG: &str = "\x1b[44m\x1b[37m\x1b[1m  D  \x1b[0m ";
/// Marker for symbolic-link lines.
pub const LINK_TAG: &str = "\x1b[42m\x1b[37m\x1b[1m  L  \x1b[0m ";
/// Marker for regular-file lines.
pub const FILE_TAG: &str = "\x1b[43m\x1b[37m\x1b[1m  F  \x1b[0m ";

// type + permissions, links, owner, group, size, rest of line
static LISTING_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^[dl-](?:[r-][w-][xtsS-]){3}[.@+]?[ \t]+[0-9]+[ \t]+\S+[ \t]+\S+[ \t]+[0-9]+[ \t]+[^\n]+\n",
    )
    .expect("listing pattern is valid")
});

/// Prefix every complete listing line in `text` with its type tag.
///
/// Lines keep their count and content; only the tag is inserted. A tagged
/// line no longer starts with a permission string, so running the pass
/// again leaves it alone. Returns the input untouched when `enabled` is off.
pub fn highlight(text: &str, enabled: bool) -> Cow<'_, str> {
    if !enabled {
        return Cow::Borrowed(text);
    }
    LISTING_LINE.replace_all(text, |caps: &Captures| {
        let line = &caps[0];
        let tag = match line.as_bytes()[0] {
            b'd' => DIRECTORY_TAG,
            b'l' => LINK_TAG,
            _ => FILE_TAG,
        };
        format!("{tag}{line}")
    })
}
