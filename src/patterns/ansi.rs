//! ANSI escape-sequence stripping for terminal output.

use regex::Regex;
use std::sync::LazyLock;

static ANSI_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x1b\x{9b}][\[()#;?]*(?:[0-9]{1,4}(?:;[0-9]{0,4})*)?[0-9A-ORZcf-nqry=><]")
        .unwrap()
});

/// Removes colour and cursor control sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_REGEX.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_colours() {
        assert_eq!(strip_ansi("\x1b[32mready\x1b[39m in 120ms"), "ready in 120ms");
        assert_eq!(strip_ansi("\x1b[1;36mLocal\x1b[0m"), "Local");
    }

    #[test]
    fn test_strip_cursor_controls() {
        assert_eq!(strip_ansi("\x1b[2K\x1b[1Gdone"), "done");
        assert_eq!(strip_ansi("\x1b[?25lhidden"), "hidden");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(strip_ansi("plain [brackets] text"), "plain [brackets] text");
    }
}
