//! Cleanup of raw model output
//!
//! Terminal runtimes decorate their output with spinners, cursor movement and
//! colour codes. Those are stripped, then whitespace runs collapse to single spaces.

use once_cell::sync::Lazy;
use regex::Regex;

/// 7-bit C1 escapes (ESC + Fe) and CSI sequences
static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1B(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").expect("valid ANSI escape pattern")
});

/// Remove terminal control sequences
///
/// Repeats until nothing matches, since removing one sequence can splice the
/// bytes around it into another.
pub fn strip_control_sequences(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = ANSI_ESCAPE.replace_all(&current, "");
        if next.len() == current.len() {
            return current;
        }
        current = next.into_owned();
    }
}

/// Collapse every whitespace run to a single space and trim the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip control sequences and collapse whitespace; idempotent
pub fn clean_output(text: &str) -> String {
    let mut current = collapse_whitespace(&strip_control_sequences(text));
    loop {
        let next = collapse_whitespace(&strip_control_sequences(&current));
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_colour_and_cursor_codes() {
        let raw = "\x1b[?25l\x1b[2K\x1b[1G⠙ \x1b[32mThe answer\x1b[0m is\n\n  4.\x1b[?25h";
        assert_eq!(clean_output(raw), "⠙ The answer is 4.");
    }

    #[test]
    fn test_plain_text_only_collapses_whitespace() {
        assert_eq!(clean_output("  four\tscore \n and   seven "), "four score and seven");
        assert_eq!(clean_output("4"), "4");
        assert_eq!(clean_output(" \n\t "), "");
    }

    #[test]
    fn test_fe_escapes_are_removed() {
        assert_eq!(strip_control_sequences("a\x1bMb\x1b_c"), "abc");
        // ESC followed by a lowercase letter is not a control sequence
        assert_eq!(strip_control_sequences("a\x1bzb"), "a\x1bzb");
    }

    #[test]
    fn test_spliced_sequences_are_removed() {
        assert_eq!(strip_control_sequences("x\x1b\x1b[31m[1my"), "xy");
        assert_eq!(clean_output("\x1b[ \n A"), "");
    }

    proptest! {
        #[test]
        fn prop_clean_is_idempotent(raw in "(\\PC|\x1b|\\[|[ \t\n]|[0-9;?]){0,64}") {
            let once = clean_output(&raw);
            prop_assert_eq!(clean_output(&once), once);
        }

        #[test]
        fn prop_text_without_escapes_only_loses_whitespace(raw in "[a-zA-Z0-9.,!? \t\n]{0,64}") {
            let cleaned = clean_output(&raw);
            prop_assert_eq!(cleaned, raw.split_whitespace().collect::<Vec<_>>().join(" "));
        }
    }
}
