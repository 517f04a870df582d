//! Error types for grammar compilation and parsing.

use common::LineIndex;
use thiserror::Error;

/// Failure to compile a grammar into a bytecode program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A forward rule was used without ever being bound to a target.
    #[error("forward rule {0} was never bound")]
    UnboundForward(String),
    /// Lookahead combinators only exist in the tree-walking engine.
    #[error("{0} cannot be compiled; lookahead is only supported by the tree-walking parser")]
    UnsupportedLookahead(String),
    /// Indentation combinators only exist in the tree-walking engine.
    #[error("{0} cannot be compiled; indentation is only supported by the tree-walking parser")]
    UnsupportedIndentation(String),
}

/// A parse failure, reported at the rightmost position the parser reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("At line {line} column {col}: {msg}")]
pub struct ParseError {
    /// The diagnostic recorded at the failure point.
    pub msg: String,
    /// Character offset of the failure.
    pub offset: usize,
    /// 1-based line of the failure.
    pub line: usize,
    /// 1-based column of the failure.
    pub col: usize,
}

impl ParseError {
    pub(crate) fn at(input: &[char], offset: usize, msg: String) -> Self {
        let (line, col) = LineIndex::from_chars(input).line_col(offset);
        Self { msg, offset, line, col }
    }
}

/// An in-flight failure, before it is promoted to a [`ParseError`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Fail {
    pub msg: String,
    pub pos: usize,
}

/// Tracks the rightmost failure observed during a parse.
///
/// Backtracking discards local failures as a matter of course; the most
/// useful diagnostic is almost always the one furthest into the input, so
/// every failure site reports here and the winner is surfaced at the end.
#[derive(Debug, Default)]
pub(crate) struct Furthest {
    pos: usize,
    msg: Option<String>,
}

impl Furthest {
    /// Record a failure. Later positions win; ties go to the newer message.
    pub fn note(&mut self, pos: usize, msg: &str) {
        if self.msg.is_none() || pos >= self.pos {
            self.pos = pos;
            self.msg = Some(msg.to_string());
        }
    }

    /// Promote to a [`ParseError`], falling back to `last` when nothing was
    /// recorded.
    pub fn into_error(self, input: &[char], last: Fail) -> ParseError {
        let (pos, msg) = match self.msg {
            Some(msg) => (self.pos, msg),
            None => (last.pos, last.msg),
        };
        ParseError::at(input, pos, msg)
    }
}
