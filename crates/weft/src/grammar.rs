//! Grammar construction.
//!
//! A grammar is a DAG of [`Node`]s allocated in a [`Bump`] arena and built
//! through the [`Grammar`] factory. Nodes are immutable except for two
//! bind-once cells: the optional display name, and the target of a forward
//! rule. Node identity (used by the compiler to detect recursion) is the
//! arena address.

use std::cell::Cell;

use bumpalo::Bump;

use crate::charset::CharSet;
use crate::value::Value;

/// A value transform attached to a `map` node.
pub type MapFn<'a> = dyn Fn(Value) -> Result<Value, String> + 'a;

/// A value transform attached to a `lift` node, combining one value per
/// child.
pub type LiftFn<'a> = dyn Fn(Vec<Value>) -> Result<Value, String> + 'a;

/// Stable identity of a grammar node within its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A node in the grammar DAG.
pub struct Node<'a> {
    pub kind: NodeKind<'a>,
    name: Cell<Option<&'a str>>,
}

/// Every grammar construct.
pub enum NodeKind<'a> {
    /// Match one character from `set`, or a backslash escape from `escapes`.
    Class { set: &'a CharSet, escapes: &'a CharSet },
    /// Greedy run of class characters, at least `min` of them.
    Run { set: &'a CharSet, escapes: &'a CharSet, min: usize },
    /// Match exact text, yielding the text.
    Literal { text: &'a str, ignore_case: bool },
    /// Match exact text, yielding a replacement value.
    Keyword { text: &'a str, value: &'a Value, ignore_case: bool },
    /// Try the child; on failure restore the cursor and yield `default`.
    Opt { child: &'a Node<'a>, default: &'a Value },
    /// Both sides in order, keeping the left value.
    KeepLeft { left: &'a Node<'a>, right: &'a Node<'a> },
    /// Both sides in order, keeping the right value.
    KeepRight { left: &'a Node<'a>, right: &'a Node<'a> },
    /// Both sides in order, yielding a two-element sequence.
    Pair { left: &'a Node<'a>, right: &'a Node<'a> },
    /// Both sides in order, appending the right value onto the left when the
    /// left is already a sequence.
    Append { left: &'a Node<'a>, right: &'a Node<'a> },
    /// Ordered alternation: first success wins.
    Choice { children: &'a [&'a Node<'a>] },
    /// Zero or more repetitions, yielding a sequence.
    Many { child: &'a Node<'a> },
    /// One or more repetitions, yielding a sequence.
    Many1 { child: &'a Node<'a> },
    /// Transform the child's value; `Err` turns into a parse failure.
    Map { child: &'a Node<'a>, func: &'a MapFn<'a> },
    /// All children in order, combining their values with one function.
    Lift { children: &'a [&'a Node<'a>], func: &'a LiftFn<'a> },
    /// A rule declared before its definition, bound exactly once.
    Forward { target: Cell<Option<&'a Node<'a>>> },
    /// A derived construct that behaves exactly like its expansion.
    Wrap { child: &'a Node<'a> },
    /// Positive lookahead: match `guard` after `inner` without consuming it.
    FollowedBy { inner: &'a Node<'a>, guard: &'a Node<'a> },
    /// Negative lookahead: fail when `guard` matches after `inner`.
    NotFollowedBy { inner: &'a Node<'a>, guard: &'a Node<'a> },
    /// Skip whitespace, record the column where `child` begins on the
    /// indent stack, and pop it when `child` finishes.
    WithIndent { child: &'a Node<'a> },
    /// Parse `child` only when the cursor's column is deeper than the
    /// innermost recorded indent.
    Indented { child: &'a Node<'a> },
}

impl<'a> Node<'a> {
    pub(crate) fn alloc(
        arena: &'a Bump,
        kind: NodeKind<'a>,
        name: Option<&'a str>,
    ) -> &'a Node<'a> {
        arena.alloc(Node { kind, name: Cell::new(name) })
    }

    /// The arena address, used as node identity.
    pub fn id(&self) -> NodeId {
        NodeId(self as *const Node as usize)
    }

    /// The display name, if one was assigned.
    pub fn name(&self) -> Option<&'a str> {
        self.name.get()
    }

    pub(crate) fn set_name(&self, name: &'a str) {
        self.name.set(Some(name));
    }

    /// The name used in diagnostics: the assigned name, or a generic
    /// description of the construct.
    pub fn label(&self) -> String {
        if let Some(name) = self.name.get() {
            return name.to_string();
        }
        match &self.kind {
            NodeKind::Class { .. } => "character".to_string(),
            NodeKind::Run { .. } => "characters".to_string(),
            NodeKind::Literal { text, .. } => format!("\"{}\"", text),
            NodeKind::Keyword { text, .. } => format!("\"{}\"", text),
            NodeKind::Opt { child, .. } => format!("optional {}", child.label()),
            NodeKind::KeepLeft { .. }
            | NodeKind::KeepRight { .. }
            | NodeKind::Pair { .. }
            | NodeKind::Append { .. }
            | NodeKind::Lift { .. } => "sequence".to_string(),
            NodeKind::Choice { .. } => "one of the alternatives".to_string(),
            NodeKind::Many { child } | NodeKind::Many1 { child } => child.label(),
            NodeKind::Map { child, .. } => child.label(),
            NodeKind::Forward { .. } => "forward rule".to_string(),
            NodeKind::Wrap { child } => child.label(),
            NodeKind::FollowedBy { .. } => "lookahead".to_string(),
            NodeKind::NotFollowedBy { .. } => "negative lookahead".to_string(),
            NodeKind::WithIndent { child } => child.label(),
            NodeKind::Indented { .. } => "deeper indentation".to_string(),
        }
    }

    /// Bind a forward rule to its definition. Panics when called on anything
    /// other than an unbound forward rule; binding is a construction-time
    /// contract, not a runtime condition.
    pub fn bind(&self, target: &'a Node<'a>) {
        match &self.kind {
            NodeKind::Forward { target: slot } => {
                assert!(slot.get().is_none(), "forward rule bound twice");
                slot.set(Some(target));
            }
            _ => panic!("bind() called on a non-forward node"),
        }
    }

    /// The bound target of a forward rule.
    pub fn forward_target(&self) -> Option<&'a Node<'a>> {
        match &self.kind {
            NodeKind::Forward { target } => target.get(),
            _ => None,
        }
    }
}

/// Factory for grammar nodes, tied to an arena.
#[derive(Clone, Copy)]
pub struct Grammar<'a> {
    arena: &'a Bump,
}

impl<'a> Grammar<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    fn node(&self, kind: NodeKind<'a>) -> &'a Node<'a> {
        Node::alloc(self.arena, kind, None)
    }

    /// Assign a display name, used in diagnostics. Returns the same node.
    pub fn named(&self, node: &'a Node<'a>, name: &str) -> &'a Node<'a> {
        node.set_name(self.arena.alloc_str(name));
        node
    }

    /// Match one character from `set`.
    pub fn one_of(&self, set: &str) -> &'a Node<'a> {
        self.one_of_esc(set, "")
    }

    /// Match one character from `set`, or a backslash escape from `escapes`.
    pub fn one_of_esc(&self, set: &str, escapes: &str) -> &'a Node<'a> {
        self.node(NodeKind::Class {
            set: self.arena.alloc(CharSet::new(set)),
            escapes: self.arena.alloc(CharSet::new(escapes)),
        })
    }

    /// Greedy run of at least `min` characters from `set`, with escapes.
    /// Yields the accumulated text as a string.
    pub fn run_of(&self, set: &str, escapes: &str, min: usize) -> &'a Node<'a> {
        self.node(NodeKind::Run {
            set: self.arena.alloc(CharSet::new(set)),
            escapes: self.arena.alloc(CharSet::new(escapes)),
            min,
        })
    }

    /// Match `text` exactly, yielding it as a string.
    pub fn literal(&self, text: &str) -> &'a Node<'a> {
        self.node(NodeKind::Literal { text: self.arena.alloc_str(text), ignore_case: false })
    }

    /// Match `text` ASCII-case-insensitively, yielding it as written here.
    pub fn literal_no_case(&self, text: &str) -> &'a Node<'a> {
        self.node(NodeKind::Literal { text: self.arena.alloc_str(text), ignore_case: true })
    }

    /// Match `text` exactly, yielding `value` instead of the text.
    pub fn keyword(&self, text: &str, value: Value) -> &'a Node<'a> {
        self.node(NodeKind::Keyword {
            text: self.arena.alloc_str(text),
            value: self.arena.alloc(value),
            ignore_case: false,
        })
    }

    /// Case-insensitive [`Grammar::keyword`].
    pub fn keyword_no_case(&self, text: &str, value: Value) -> &'a Node<'a> {
        self.node(NodeKind::Keyword {
            text: self.arena.alloc_str(text),
            value: self.arena.alloc(value),
            ignore_case: true,
        })
    }

    /// Try `child`; on failure restore the cursor and yield `Null`.
    pub fn opt(&self, child: &'a Node<'a>) -> &'a Node<'a> {
        self.opt_or(child, Value::Null)
    }

    /// Try `child`; on failure restore the cursor and yield `default`.
    pub fn opt_or(&self, child: &'a Node<'a>, default: Value) -> &'a Node<'a> {
        self.node(NodeKind::Opt { child, default: self.arena.alloc(default) })
    }

    /// `left` then `right`, keeping the left value.
    pub fn keep_left(&self, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::KeepLeft { left, right })
    }

    /// `left` then `right`, keeping the right value.
    pub fn keep_right(&self, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::KeepRight { left, right })
    }

    /// `left` then `right`, yielding `Seq([left, right])`.
    pub fn pair(&self, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Pair { left, right })
    }

    /// `left` then `right`; when the left value is already a sequence the
    /// right value is pushed onto it, otherwise a two-element sequence.
    pub fn append(&self, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Append { left, right })
    }

    /// Two-way ordered alternation.
    pub fn either(&self, left: &'a Node<'a>, right: &'a Node<'a>) -> &'a Node<'a> {
        self.choice(&[left, right])
    }

    /// N-way ordered alternation: alternatives are tried in order from the
    /// same cursor, and the first success wins.
    pub fn choice(&self, children: &[&'a Node<'a>]) -> &'a Node<'a> {
        assert!(!children.is_empty(), "choice needs at least one alternative");
        self.node(NodeKind::Choice { children: self.arena.alloc_slice_copy(children) })
    }

    /// Zero or more repetitions of `child`, yielding a sequence.
    pub fn many(&self, child: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Many { child })
    }

    /// One or more repetitions of `child`, yielding a sequence.
    pub fn many1(&self, child: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Many1 { child })
    }

    /// Transform the child's value. An `Err` from `func` fails the parse at
    /// the position after the child, without moving the cursor back.
    pub fn map<F>(&self, child: &'a Node<'a>, func: F) -> &'a Node<'a>
    where
        F: Fn(Value) -> Result<Value, String> + 'a,
    {
        let func: &'a MapFn<'a> = self.arena.alloc(func);
        self.node(NodeKind::Map { child, func })
    }

    /// All `children` in order; their values are handed to `func` as one
    /// vector. Any child failing restores the cursor to before the first.
    pub fn lift<F>(&self, children: &[&'a Node<'a>], func: F) -> &'a Node<'a>
    where
        F: Fn(Vec<Value>) -> Result<Value, String> + 'a,
    {
        assert!(!children.is_empty(), "lift needs at least one child");
        let func: &'a LiftFn<'a> = self.arena.alloc(func);
        self.node(NodeKind::Lift {
            children: self.arena.alloc_slice_copy(children),
            func,
        })
    }

    /// Declare a rule ahead of its definition; call [`Node::bind`] exactly
    /// once before parsing or compiling.
    pub fn forward(&self) -> &'a Node<'a> {
        self.node(NodeKind::Forward { target: Cell::new(None) })
    }

    /// `inner` surrounded by `wrapper` on both sides, keeping the inner
    /// value.
    pub fn between(&self, inner: &'a Node<'a>, wrapper: &'a Node<'a>) -> &'a Node<'a> {
        let expansion = self.keep_right(wrapper, self.keep_left(inner, wrapper));
        self.node(NodeKind::Wrap { child: expansion })
    }

    /// Zero or more `item`s separated by `sep`, yielding a sequence of the
    /// item values. Separators are dropped; a trailing separator is not
    /// consumed.
    pub fn sep_by(&self, item: &'a Node<'a>, sep: &'a Node<'a>) -> &'a Node<'a> {
        let rest = self.many(self.keep_right(sep, item));
        let non_empty = self.lift(&[item, rest], |values| {
            let mut iter = values.into_iter();
            let first = iter.next().unwrap_or(Value::Null);
            let rest = iter.next().unwrap_or(Value::Seq(Vec::new()));
            let mut items = vec![first];
            if let Value::Seq(more) = rest {
                items.extend(more);
            }
            Ok(Value::Seq(items))
        });
        let expansion = self.opt_or(non_empty, Value::Seq(Vec::new()));
        self.node(NodeKind::Wrap { child: expansion })
    }

    /// Positive lookahead: succeed with `inner`'s value only when `guard`
    /// matches right after it; `guard` consumes nothing. Only supported by
    /// the tree-walking parser.
    pub fn followed_by(&self, inner: &'a Node<'a>, guard: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::FollowedBy { inner, guard })
    }

    /// Negative lookahead: succeed with `inner`'s value only when `guard`
    /// does not match right after it. Only supported by the tree-walking
    /// parser.
    pub fn not_followed_by(&self, inner: &'a Node<'a>, guard: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::NotFollowedBy { inner, guard })
    }

    /// Skip leading whitespace, record the column where `child` starts on
    /// the indent stack, parse `child`, and pop the record afterwards
    /// (success or failure). Only supported by the tree-walking parser.
    pub fn with_indent(&self, child: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::WithIndent { child })
    }

    /// Parse `child` only when the cursor sits in a column strictly deeper
    /// than the innermost [`Grammar::with_indent`] column. Without a
    /// recorded indent any column is accepted. Only supported by the
    /// tree-walking parser.
    pub fn indented(&self, child: &'a Node<'a>) -> &'a Node<'a> {
        self.node(NodeKind::Indented { child })
    }

    /// A comment delimited by `start` and `end`, e.g. `/* ... */`. Yields
    /// the full comment text including the delimiters. The body may span
    /// lines and must hold at least one character. Built on negative
    /// lookahead, so only the tree-walking parser runs it.
    pub fn enclosed_comment(&self, start: &str, end: &str) -> &'a Node<'a> {
        let any = self.named(self.one_of(&printable()), "any character");
        let stop = self.literal(end);
        let body = self.many(self.not_followed_by(any, stop));
        let expansion = self.lift(&[self.literal(start), body, any, stop], concat_text);
        self.node(NodeKind::Wrap { child: expansion })
    }

    /// A comment running from `start` to the end of the line, e.g. `// ...`.
    /// Yields the comment text including the newline when one is present.
    pub fn one_line_comment(&self, start: &str) -> &'a Node<'a> {
        let line: String = printable().chars().filter(|&c| c != '\n' && c != '\r').collect();
        let expansion = self.lift(
            &[
                self.literal(start),
                self.run_of(&line, "", 0),
                self.opt_or(self.one_of("\n\r"), Value::Str(String::new())),
            ],
            concat_text,
        );
        self.node(NodeKind::Wrap { child: expansion })
    }
}

/// The printable characters, matching what comment bodies accept.
fn printable() -> String {
    let mut set: String = (' '..='~').collect();
    set.push_str("\t\n\r\u{b}\u{c}");
    set
}

fn concat_text(values: Vec<Value>) -> Result<Value, String> {
    let mut text = String::new();
    for value in &values {
        push_text(&mut text, value);
    }
    Ok(Value::Str(text))
}

fn push_text(out: &mut String, value: &Value) {
    match value {
        Value::Char(c) => out.push(*c),
        Value::Str(s) => out.push_str(s),
        Value::Seq(items) => {
            for item in items {
                push_text(out, item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_labels() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let digits = g.run_of("0123456789", "", 1);
        assert_eq!(digits.label(), "characters");
        let digits = g.named(digits, "digits");
        assert_eq!(digits.label(), "digits");
        assert_eq!(g.literal("if").label(), "\"if\"");
    }

    #[test]
    fn test_node_identity() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let a = g.literal("a");
        let b = g.literal("a");
        assert_eq!(a.id(), a.id());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_forward_bind() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let fwd = g.forward();
        assert!(fwd.forward_target().is_none());
        let target = g.literal("x");
        fwd.bind(target);
        assert!(fwd.forward_target().is_some());
    }

    #[test]
    #[should_panic(expected = "bound twice")]
    fn test_forward_double_bind_panics() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let fwd = g.forward();
        fwd.bind(g.literal("x"));
        fwd.bind(g.literal("y"));
    }

    #[test]
    #[should_panic(expected = "non-forward")]
    fn test_bind_non_forward_panics() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        g.literal("x").bind(g.literal("y"));
    }
}
