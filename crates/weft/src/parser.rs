//! The common parsing interface.
//!
//! Both engines, the tree-walking [`TreeParser`](crate::interp::TreeParser)
//! and the bytecode [`CompiledParser`](crate::vm::CompiledParser), implement
//! [`Parser`] and must agree on results for any grammar both support.

use crate::error::ParseError;
use crate::value::Value;

/// Outcome of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    /// The value the grammar produced.
    pub value: Value,
    /// Character offset one past the last consumed character. The grammar
    /// is not required to consume all input.
    pub end: usize,
}

/// A runnable parser over string input.
pub trait Parser {
    /// Parse a prefix of `input`.
    fn parse(&self, input: &str) -> Result<Parsed, ParseError>;

    /// Parse `input`, requiring that every character is consumed.
    fn parse_complete(&self, input: &str) -> Result<Value, ParseError> {
        let total = input.chars().count();
        let parsed = self.parse(input)?;
        if parsed.end < total {
            let chars: Vec<char> = input.chars().collect();
            return Err(ParseError::at(
                &chars,
                parsed.end,
                format!("Expected end of input at {}.", parsed.end),
            ));
        }
        Ok(parsed.value)
    }
}
