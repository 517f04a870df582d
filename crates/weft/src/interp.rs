//! Tree-walking parser.
//!
//! Walks the grammar DAG directly, one node per call. Slower than the
//! bytecode engine but supports every construct, including the lookahead
//! and indentation combinators, and serves as the behavioral reference the
//! VM is checked against.

use common::{create_logger, log, Logger};

use crate::error::{Fail, Furthest, ParseError};
use crate::grammar::{Node, NodeKind};
use crate::parser::{Parsed, Parser};
use crate::scan;
use crate::value::Value;

/// A parser that interprets the grammar DAG directly.
pub struct TreeParser<'a> {
    root: &'a Node<'a>,
    log: Logger,
}

/// Mutable state threaded through one parse: the rightmost-failure tracker
/// and the indentation columns recorded by `with_indent`.
#[derive(Default)]
struct ParseState {
    furthest: Furthest,
    indents: Vec<usize>,
}

type Step = Result<(Value, usize), Fail>;

impl<'a> TreeParser<'a> {
    pub fn new(root: &'a Node<'a>) -> Self {
        Self { root, log: create_logger("interp") }
    }

    fn fail(&self, state: &mut ParseState, pos: usize, msg: String) -> Step {
        state.furthest.note(pos, &msg);
        Err(Fail { msg, pos })
    }

    fn eval(
        &self,
        node: &'a Node<'a>,
        input: &[char],
        pos: usize,
        state: &mut ParseState,
    ) -> Step {
        match &node.kind {
            NodeKind::Class { set, escapes } => {
                match scan::match_class(input, pos, set, escapes) {
                    Some((c, next)) => Ok((Value::Char(c), next)),
                    None => self.fail(
                        state,
                        pos,
                        format!(
                            "Expected {} at {}. Got {} instead.",
                            node.label(),
                            pos,
                            scan::describe_at(input, pos)
                        ),
                    ),
                }
            }
            NodeKind::Run { set, escapes, min } => {
                let (text, end) = scan::match_run(input, pos, set, escapes);
                if text.chars().count() >= *min {
                    Ok((Value::Str(text), end))
                } else {
                    self.fail(
                        state,
                        pos,
                        format!("Expected at least {} {} at {}.", min, node.label(), pos),
                    )
                }
            }
            NodeKind::Literal { text, ignore_case } => {
                match scan::match_literal(input, pos, text, *ignore_case) {
                    Some(end) => Ok((Value::Str(text.to_string()), end)),
                    None => self.fail(
                        state,
                        pos,
                        format!("Expected {} at {}.", node.label(), pos),
                    ),
                }
            }
            NodeKind::Keyword { text, value, ignore_case } => {
                match scan::match_literal(input, pos, text, *ignore_case) {
                    Some(end) => Ok(((*value).clone(), end)),
                    None => self.fail(
                        state,
                        pos,
                        format!("Expected {} at {}.", node.label(), pos),
                    ),
                }
            }
            NodeKind::Opt { child, default } => match self.eval(child, input, pos, state) {
                Ok(ok) => Ok(ok),
                Err(_) => Ok(((*default).clone(), pos)),
            },
            NodeKind::KeepLeft { left, right } => {
                let (value, mid) = self.eval(left, input, pos, state)?;
                let (_, end) = self.eval(right, input, mid, state)?;
                Ok((value, end))
            }
            NodeKind::KeepRight { left, right } => {
                let (_, mid) = self.eval(left, input, pos, state)?;
                self.eval(right, input, mid, state)
            }
            NodeKind::Pair { left, right } => {
                let (lv, mid) = self.eval(left, input, pos, state)?;
                let (rv, end) = self.eval(right, input, mid, state)?;
                Ok((Value::Seq(vec![lv, rv]), end))
            }
            NodeKind::Append { left, right } => {
                let (lv, mid) = self.eval(left, input, pos, state)?;
                let (rv, end) = self.eval(right, input, mid, state)?;
                let combined = match lv {
                    Value::Seq(mut items) => {
                        items.push(rv);
                        Value::Seq(items)
                    }
                    lv => Value::Seq(vec![lv, rv]),
                };
                Ok((combined, end))
            }
            NodeKind::Choice { children } => {
                let mut last = None;
                for child in children.iter() {
                    match self.eval(child, input, pos, state) {
                        Ok(ok) => return Ok(ok),
                        Err(fail) => last = Some(fail),
                    }
                }
                // choice() guarantees at least one alternative
                Err(last.expect("empty alternation"))
            }
            NodeKind::Many { child } => {
                let (items, end) = self.eval_repeat(child, input, pos, state);
                Ok((Value::Seq(items), end))
            }
            NodeKind::Many1 { child } => {
                let (items, end) = self.eval_repeat(child, input, pos, state);
                if items.is_empty() {
                    self.fail(
                        state,
                        pos,
                        format!("Expected at least 1 {} at {}.", child.label(), pos),
                    )
                } else {
                    Ok((Value::Seq(items), end))
                }
            }
            NodeKind::Map { child, func } => {
                let (value, end) = self.eval(child, input, pos, state)?;
                match func(value) {
                    Ok(mapped) => Ok((mapped, end)),
                    Err(msg) => self.fail(state, end, msg),
                }
            }
            NodeKind::Lift { children, func } => {
                let mut values = Vec::with_capacity(children.len());
                let mut cursor = pos;
                for child in children.iter() {
                    let (value, next) = self.eval(child, input, cursor, state)?;
                    values.push(value);
                    cursor = next;
                }
                match func(values) {
                    Ok(combined) => Ok((combined, cursor)),
                    Err(msg) => self.fail(state, cursor, msg),
                }
            }
            NodeKind::Forward { target } => {
                let target = target.get().expect("forward rule was never bound");
                self.eval(target, input, pos, state)
            }
            NodeKind::Wrap { child } => self.eval(child, input, pos, state),
            NodeKind::FollowedBy { inner, guard } => {
                let (value, end) = self.eval(inner, input, pos, state)?;
                self.eval(guard, input, end, state)?;
                Ok((value, end))
            }
            NodeKind::NotFollowedBy { inner, guard } => {
                let (value, end) = self.eval(inner, input, pos, state)?;
                match self.eval(guard, input, end, state) {
                    Ok(_) => self.fail(
                        state,
                        end,
                        format!("Unexpected {} at {}.", guard.label(), end),
                    ),
                    Err(_) => Ok((value, end)),
                }
            }
            NodeKind::WithIndent { child } => {
                let mut start = pos;
                while matches!(input.get(start), Some(c) if c.is_whitespace()) {
                    start += 1;
                }
                state.indents.push(scan::column_at(input, start));
                let result = self.eval(child, input, start, state);
                // popped on failure too, so sibling rules never inherit it
                state.indents.pop();
                result
            }
            NodeKind::Indented { child } => {
                match state.indents.last().copied() {
                    Some(indent) if scan::column_at(input, pos) <= indent => self.fail(
                        state,
                        pos,
                        format!("Expected {} at {}.", node.label(), pos),
                    ),
                    _ => self.eval(child, input, pos, state),
                }
            }
        }
    }

    fn eval_repeat(
        &self,
        child: &'a Node<'a>,
        input: &[char],
        pos: usize,
        state: &mut ParseState,
    ) -> (Vec<Value>, usize) {
        let mut items = Vec::new();
        let mut cursor = pos;
        while let Ok((value, next)) = self.eval(child, input, cursor, state) {
            items.push(value);
            cursor = next;
        }
        (items, cursor)
    }
}

impl Parser for TreeParser<'_> {
    fn parse(&self, input: &str) -> Result<Parsed, ParseError> {
        let chars: Vec<char> = input.chars().collect();
        log!(self.log, "parse: {} chars", chars.len());
        let mut state = ParseState::default();
        match self.eval(self.root, &chars, 0, &mut state) {
            Ok((value, end)) => Ok(Parsed { value, end }),
            Err(fail) => Err(state.furthest.into_error(&chars, fail)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use bumpalo::Bump;

    #[test]
    fn test_opt_restores_and_defaults() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.pair(g.opt(g.literal("a")), g.literal("b"));
        let parsed = TreeParser::new(p).parse("b").unwrap();
        assert_eq!(
            parsed.value,
            Value::Seq(vec![Value::Null, Value::Str("b".into())])
        );
        assert_eq!(parsed.end, 1);
    }

    #[test]
    fn test_keep_sides() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let left = g.keep_left(g.literal("a"), g.literal("b"));
        let right = g.keep_right(g.literal("a"), g.literal("b"));
        assert_eq!(
            TreeParser::new(left).parse("ab").unwrap().value,
            Value::Str("a".into())
        );
        assert_eq!(
            TreeParser::new(right).parse("ab").unwrap().value,
            Value::Str("b".into())
        );
    }

    #[test]
    fn test_append_flattens() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.append(g.pair(g.literal("a"), g.literal("b")), g.literal("c"));
        assert_eq!(
            TreeParser::new(p).parse("abc").unwrap().value,
            Value::Seq(vec![
                Value::Str("a".into()),
                Value::Str("b".into()),
                Value::Str("c".into()),
            ])
        );
    }

    #[test]
    fn test_map_failure_reports_after_child() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.map(g.literal("ab"), |_| Err("rejected".into()));
        let err = TreeParser::new(p).parse("ab").unwrap_err();
        assert_eq!(err.msg, "rejected");
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_error_is_rightmost() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.either(
            g.keep_right(g.literal("ab"), g.literal("x")),
            g.literal("zz"),
        );
        let err = TreeParser::new(p).parse("abq").unwrap_err();
        // The deepest attempt got to offset 2; the later "zz" failure at 0
        // must not replace it.
        assert_eq!(err.offset, 2);
    }

    #[test]
    fn test_lookahead() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.followed_by(g.literal("a"), g.literal("b"));
        let parsed = TreeParser::new(p).parse("ab").unwrap();
        assert_eq!(parsed.value, Value::Str("a".into()));
        assert_eq!(parsed.end, 1);
        assert!(TreeParser::new(p).parse("ac").is_err());

        let n = g.not_followed_by(g.literal("a"), g.literal("b"));
        assert!(TreeParser::new(n).parse("ab").is_err());
        assert_eq!(TreeParser::new(n).parse("ac").unwrap().end, 1);
    }

    #[test]
    fn test_with_indent_skips_whitespace_and_records_the_column() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let word = g.run_of("abcdefghijklmnopqrstuvwxyz", "", 1);
        let ws = g.many(g.one_of(" \t\n\r"));
        let block = g.with_indent(g.pair(
            word,
            g.many(g.keep_right(ws, g.indented(word))),
        ));
        let parsed = TreeParser::new(block).parse("  top\n    one\n    two\nnext").unwrap();
        assert_eq!(
            parsed.value,
            Value::Seq(vec![
                Value::Str("top".into()),
                Value::Seq(vec![Value::Str("one".into()), Value::Str("two".into())]),
            ])
        );
        // "next" at column 1 is outside the block
        assert_eq!(parsed.end, 21);
    }

    #[test]
    fn test_indented_without_a_recorded_indent_accepts_any_column() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.indented(g.literal("x"));
        assert_eq!(TreeParser::new(p).parse("x").unwrap().end, 1);
    }

    #[test]
    fn test_with_indent_pops_its_record_on_failure() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        // If the failed first alternative leaked its column-1 record, the
        // second alternative's guard would demand a deeper column and fail.
        let p = g.either(
            g.with_indent(g.literal("zzz")),
            g.indented(g.literal("x")),
        );
        assert_eq!(TreeParser::new(p).parse("x").unwrap().end, 1);
    }
}
