//! Utility functions for filename mangling, text folding, and log formatting.
//!
//! This module provides helper functions used throughout the application:
//! - Filename mangling for story and author directory names
//! - Paragraph folding for the compiled story HTML
//! - String truncation for logging

/// Convert a story title or author name into a safe filename component.
///
/// Lowercases the input, replaces spaces with underscores, and strips every
/// character outside `[a-z0-9_.-]`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(make_filename("A Study In Magic"), "a_study_in_magic");
/// assert_eq!(make_filename("What's He Got?"), "whats_he_got");
/// ```
pub fn make_filename(title: &str) -> String {
    title
        .to_lowercase()
        .replace(' ', "_")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'))
        .collect()
}

/// Fold a string to at most `n` columns, discarding existing line breaks.
///
/// Whitespace runs are collapsed and line breaks are re-inserted so that no
/// output line exceeds `n` columns (overlong single words excepted). This is
/// applied to chapter HTML before it is written, so the stored files stay
/// readable in a pager.
pub fn fold_string_indiscriminately(s: &str, n: usize) -> String {
    let mut rv = String::with_capacity(s.len());
    let mut col = 0usize;
    for word in s.split_whitespace() {
        if rv.is_empty() {
            rv.push_str(word);
            col = word.len();
        } else if col + word.len() + 1 < n {
            rv.push(' ');
            rv.push_str(word);
            col += word.len() + 1;
        } else {
            rv.push_str(" \n");
            rv.push_str(word);
            col = word.len();
        }
    }
    rv
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes with an ellipsis and byte count
/// indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_filename_basic() {
        assert_eq!(make_filename("A Study In Magic"), "a_study_in_magic");
        assert_eq!(make_filename("What's He Got?"), "whats_he_got");
        assert_eq!(make_filename("Re: Zero 2.0"), "re_zero_2.0");
    }

    #[test]
    fn test_make_filename_strips_unicode() {
        assert_eq!(make_filename("魔法 story"), "_story");
        assert_eq!(make_filename("héllo"), "hllo");
    }

    #[test]
    fn test_fold_short_string_untouched() {
        assert_eq!(fold_string_indiscriminately("a few words", 80), "a few words");
    }

    #[test]
    fn test_fold_collapses_whitespace() {
        assert_eq!(
            fold_string_indiscriminately("one\n  two\tthree", 80),
            "one two three"
        );
    }

    #[test]
    fn test_fold_breaks_lines() {
        let folded = fold_string_indiscriminately("aaaa bbbb cccc dddd", 10);
        for line in folded.lines() {
            assert!(line.trim_end().len() <= 10, "line too long: {:?}", line);
        }
        let unfolded = folded.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(unfolded, "aaaa bbbb cccc dddd");
    }

    #[test]
    fn test_truncate_for_log_short_string() {
        assert_eq!(truncate_for_log("Hello, world!", 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }
}
