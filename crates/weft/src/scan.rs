//! Low-level input matching shared by both parsing engines.
//!
//! The tree-walking parser and the bytecode VM must agree exactly on how
//! leaves consume input, so the character-level scanning lives here and both
//! engines call into it.

use crate::charset::CharSet;

/// Match a single character at `pos`.
///
/// A backslash followed by a character in `escapes` matches as that escaped
/// character and consumes two positions. Otherwise a character in `set`
/// matches and consumes one. Returns the matched character and the new
/// cursor, or `None` without consuming anything.
pub(crate) fn match_class(
    input: &[char],
    pos: usize,
    set: &CharSet,
    escapes: &CharSet,
) -> Option<(char, usize)> {
    match input.get(pos) {
        Some('\\') if input.get(pos + 1).map_or(false, |&c| escapes.contains(c)) => {
            Some((input[pos + 1], pos + 2))
        }
        Some(&c) if set.contains(c) => Some((c, pos + 1)),
        _ => None,
    }
}

/// Greedily match characters from `set` (with the same escape rule as
/// [`match_class`]) starting at `pos`. Returns the accumulated text and the
/// cursor after the run; the run may be empty.
pub(crate) fn match_run(
    input: &[char],
    pos: usize,
    set: &CharSet,
    escapes: &CharSet,
) -> (String, usize) {
    let mut text = String::new();
    let mut p = pos;
    while let Some((c, next)) = match_class(input, p, set, escapes) {
        text.push(c);
        p = next;
    }
    (text, p)
}

/// Match `text` character by character at `pos`. Returns the cursor after
/// the match, or `None` (the caller's cursor is untouched on failure).
pub(crate) fn match_literal(
    input: &[char],
    pos: usize,
    text: &str,
    ignore_case: bool,
) -> Option<usize> {
    let mut p = pos;
    for expected in text.chars() {
        match input.get(p) {
            Some(&c) if chars_equal(c, expected, ignore_case) => p += 1,
            _ => return None,
        }
    }
    Some(p)
}

fn chars_equal(a: char, b: char, ignore_case: bool) -> bool {
    if ignore_case {
        a.eq_ignore_ascii_case(&b)
    } else {
        a == b
    }
}

/// Render the character at `pos` for a diagnostic.
pub(crate) fn describe_at(input: &[char], pos: usize) -> String {
    match input.get(pos) {
        Some(c) => c.to_string(),
        None => "end of input".to_string(),
    }
}

/// The 1-based column of `pos`, counted from the previous newline.
pub(crate) fn column_at(input: &[char], pos: usize) -> usize {
    let mut col = 1;
    let mut i = pos;
    while i > 0 && input[i - 1] != '\n' {
        col += 1;
        i -= 1;
    }
    col
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_class_plain() {
        let set = CharSet::new("ab");
        let esc = CharSet::empty();
        assert_eq!(match_class(&chars("abc"), 0, &set, &esc), Some(('a', 1)));
        assert_eq!(match_class(&chars("abc"), 2, &set, &esc), None);
        assert_eq!(match_class(&chars("a"), 1, &set, &esc), None);
    }

    #[test]
    fn test_class_escape() {
        let set = CharSet::new("ab");
        let esc = CharSet::new("\"");
        // Backslash plus an escapable character consumes two positions.
        assert_eq!(match_class(&chars("\\\"x"), 0, &set, &esc), Some(('"', 2)));
        // Backslash without an escapable follower is not consumed.
        assert_eq!(match_class(&chars("\\x"), 0, &set, &esc), None);
        // Trailing backslash at end of input.
        assert_eq!(match_class(&chars("\\"), 0, &set, &esc), None);
    }

    #[test]
    fn test_class_escape_takes_priority() {
        // Backslash in the set still escapes first when followed by an
        // escapable character.
        let set = CharSet::new("\\a");
        let esc = CharSet::new("a");
        assert_eq!(match_class(&chars("\\a"), 0, &set, &esc), Some(('a', 2)));
        assert_eq!(match_class(&chars("\\b"), 0, &set, &esc), Some(('\\', 1)));
    }

    #[test]
    fn test_run_with_escapes() {
        let set = CharSet::new("ab");
        let esc = CharSet::new("\"");
        let (text, end) = match_run(&chars("a\\\"b c"), 0, &set, &esc);
        assert_eq!(text, "a\"b");
        assert_eq!(end, 4);
    }

    #[test]
    fn test_run_empty() {
        let set = CharSet::new("x");
        let (text, end) = match_run(&chars("abc"), 0, &set, &CharSet::empty());
        assert_eq!(text, "");
        assert_eq!(end, 0);
    }

    #[test]
    fn test_literal() {
        assert_eq!(match_literal(&chars("hello"), 0, "hell", false), Some(4));
        assert_eq!(match_literal(&chars("hello"), 0, "help", false), None);
        assert_eq!(match_literal(&chars("he"), 0, "hello", false), None);
    }

    #[test]
    fn test_literal_ignore_case() {
        assert_eq!(match_literal(&chars("TRUE"), 0, "true", true), Some(4));
        assert_eq!(match_literal(&chars("TRUE"), 0, "true", false), None);
    }

    #[test]
    fn test_column_at() {
        let input = chars("ab\ncde");
        assert_eq!(column_at(&input, 0), 1);
        assert_eq!(column_at(&input, 2), 3);
        assert_eq!(column_at(&input, 3), 1);
        assert_eq!(column_at(&input, 5), 3);
    }
}
