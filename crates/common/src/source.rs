//! Line/column lookup for character offsets in source text.
//!
//! Parsers in this workspace operate on character offsets. Diagnostics are
//! rendered with 1-based line and column numbers, derived on demand from the
//! newline positions recorded here.

/// An index of the newline positions in a piece of source text.
///
/// Offsets are character offsets, not byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    /// Build an index from source text.
    pub fn new(text: &str) -> Self {
        Self::from_chars_iter(text.chars())
    }

    /// Build an index from source text already split into characters.
    pub fn from_chars(chars: &[char]) -> Self {
        Self::from_chars_iter(chars.iter().copied())
    }

    fn from_chars_iter(chars: impl Iterator<Item = char>) -> Self {
        let newlines = chars
            .enumerate()
            .filter(|&(_, c)| c == '\n')
            .map(|(i, _)| i)
            .collect();
        Self { newlines }
    }

    /// The 1-based line number containing `offset`.
    pub fn line(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&n| n < offset) + 1
    }

    /// The 1-based column of `offset` within its line.
    pub fn col(&self, offset: usize) -> usize {
        let line0 = self.newlines.partition_point(|&n| n < offset);
        if line0 == 0 {
            offset + 1
        } else {
            offset - self.newlines[line0 - 1]
        }
    }

    /// Both coordinates at once.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        (self.line(offset), self.col(offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let index = LineIndex::new("hello");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(4), (1, 5));
        // One past the end still reports the last line.
        assert_eq!(index.line_col(5), (1, 6));
    }

    #[test]
    fn test_multi_line() {
        let index = LineIndex::new("ab\ncd\nef");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(2), (1, 3));
        assert_eq!(index.line_col(3), (2, 1));
        assert_eq!(index.line_col(4), (2, 2));
        assert_eq!(index.line_col(6), (3, 1));
        assert_eq!(index.line_col(7), (3, 2));
    }

    #[test]
    fn test_offset_on_newline() {
        // The newline character itself belongs to the line it terminates.
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.line_col(2), (1, 3));
    }

    #[test]
    fn test_from_chars_matches_str() {
        let text = "x\ny\nz";
        let chars: Vec<char> = text.chars().collect();
        assert_eq!(LineIndex::new(text), LineIndex::from_chars(&chars));
    }

    #[test]
    fn test_empty_input() {
        let index = LineIndex::new("");
        assert_eq!(index.line_col(0), (1, 1));
    }
}
