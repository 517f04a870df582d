//! Grammar simplification passes run before compilation.
//!
//! Two rewrites, both value-preserving:
//!
//! - nested unnamed alternations are flattened into one n-way alternation,
//!   keeping the alternatives in order;
//! - adjacent single-character alternatives with identical escape sets and
//!   identical names are merged into one character class.
//!
//! Forward rules are left untouched: their identity is what the compiler
//! keys recursion on, and their targets are rewritten when the compiler
//! first descends into them.

use bumpalo::Bump;
use hashbrown::HashMap;

use crate::grammar::{Node, NodeId, NodeKind};

/// Rewrite `root` into an equivalent, simpler grammar in the same arena.
///
/// Nodes that come out unchanged are returned as-is, so shared subtrees
/// stay shared.
pub fn optimize<'a>(arena: &'a Bump, root: &'a Node<'a>) -> &'a Node<'a> {
    let mut pass = Pass { arena, memo: HashMap::new() };
    pass.rewrite(root)
}

struct Pass<'a> {
    arena: &'a Bump,
    memo: HashMap<NodeId, &'a Node<'a>>,
}

impl<'a> Pass<'a> {
    fn rewrite(&mut self, node: &'a Node<'a>) -> &'a Node<'a> {
        if let Some(done) = self.memo.get(&node.id()) {
            return done;
        }
        let out = self.rewrite_uncached(node);
        self.memo.insert(node.id(), out);
        out
    }

    fn rewrite_uncached(&mut self, node: &'a Node<'a>) -> &'a Node<'a> {
        match &node.kind {
            NodeKind::Class { .. }
            | NodeKind::Run { .. }
            | NodeKind::Literal { .. }
            | NodeKind::Keyword { .. }
            | NodeKind::Forward { .. } => node,

            NodeKind::Opt { child, default } => {
                let (child, default) = (*child, *default);
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::Opt { child: new, default })
            }
            NodeKind::KeepLeft { left, right } => {
                let (left, right) = (*left, *right);
                let (l, r) = (self.rewrite(left), self.rewrite(right));
                self.rebuild2(node, (left, right), (l, r), |l, r| NodeKind::KeepLeft {
                    left: l,
                    right: r,
                })
            }
            NodeKind::KeepRight { left, right } => {
                let (left, right) = (*left, *right);
                let (l, r) = (self.rewrite(left), self.rewrite(right));
                self.rebuild2(node, (left, right), (l, r), |l, r| NodeKind::KeepRight {
                    left: l,
                    right: r,
                })
            }
            NodeKind::Pair { left, right } => {
                let (left, right) = (*left, *right);
                let (l, r) = (self.rewrite(left), self.rewrite(right));
                self.rebuild2(node, (left, right), (l, r), |l, r| NodeKind::Pair {
                    left: l,
                    right: r,
                })
            }
            NodeKind::Append { left, right } => {
                let (left, right) = (*left, *right);
                let (l, r) = (self.rewrite(left), self.rewrite(right));
                self.rebuild2(node, (left, right), (l, r), |l, r| NodeKind::Append {
                    left: l,
                    right: r,
                })
            }
            NodeKind::Many { child } => {
                let child = *child;
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::Many { child: new })
            }
            NodeKind::Many1 { child } => {
                let child = *child;
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::Many1 { child: new })
            }
            NodeKind::Map { child, func } => {
                let (child, func) = (*child, *func);
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::Map { child: new, func })
            }
            NodeKind::Wrap { child } => {
                let child = *child;
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::Wrap { child: new })
            }
            NodeKind::FollowedBy { inner, guard } => {
                let (inner, guard) = (*inner, *guard);
                let (i, gd) = (self.rewrite(inner), self.rewrite(guard));
                self.rebuild2(node, (inner, guard), (i, gd), |i, gd| NodeKind::FollowedBy {
                    inner: i,
                    guard: gd,
                })
            }
            NodeKind::NotFollowedBy { inner, guard } => {
                let (inner, guard) = (*inner, *guard);
                let (i, gd) = (self.rewrite(inner), self.rewrite(guard));
                self.rebuild2(node, (inner, guard), (i, gd), |i, gd| {
                    NodeKind::NotFollowedBy { inner: i, guard: gd }
                })
            }
            NodeKind::WithIndent { child } => {
                let child = *child;
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::WithIndent { child: new })
            }
            NodeKind::Indented { child } => {
                let child = *child;
                let new = self.rewrite(child);
                self.rebuild1(node, child, new, |new| NodeKind::Indented { child: new })
            }
            NodeKind::Lift { children, func } => {
                let func = *func;
                let new: Vec<_> = children.iter().map(|c| self.rewrite(c)).collect();
                if new.iter().zip(children.iter()).all(|(a, b)| std::ptr::eq(*a, *b)) {
                    node
                } else {
                    Node::alloc(
                        self.arena,
                        NodeKind::Lift {
                            children: self.arena.alloc_slice_copy(&new),
                            func,
                        },
                        node.name(),
                    )
                }
            }
            NodeKind::Choice { children } => self.rewrite_choice(node, children),
        }
    }

    fn rewrite_choice(&mut self, node: &'a Node<'a>, children: &'a [&'a Node<'a>]) -> &'a Node<'a> {
        // Flatten, then merge runs of compatible character classes.
        let mut flat: Vec<&'a Node<'a>> = Vec::with_capacity(children.len());
        for child in children {
            let child = self.rewrite(child);
            match &child.kind {
                NodeKind::Choice { children: inner } if child.name().is_none() => {
                    flat.extend(inner.iter().copied());
                }
                _ => flat.push(child),
            }
        }

        let mut merged: Vec<&'a Node<'a>> = Vec::with_capacity(flat.len());
        for child in flat {
            let fused = match (merged.last(), &child.kind) {
                (Some(prev), NodeKind::Class { set, escapes }) => match &prev.kind {
                    // Names feed diagnostics, so only alternatives carrying
                    // the same name (or none) may fuse.
                    NodeKind::Class { set: prev_set, escapes: prev_escapes }
                        if *prev_escapes == *escapes && prev.name() == child.name() =>
                    {
                        let name = prev.name();
                        let combined = Node::alloc(
                            self.arena,
                            NodeKind::Class {
                                set: self.arena.alloc(prev_set.union(set)),
                                escapes: *escapes,
                            },
                            name,
                        );
                        Some(combined)
                    }
                    _ => None,
                },
                _ => None,
            };
            match fused {
                Some(combined) => {
                    merged.pop();
                    merged.push(combined);
                }
                None => merged.push(child),
            }
        }

        if merged.len() == 1 && node.name().is_none() {
            return merged[0];
        }
        if merged.len() == children.len()
            && merged.iter().zip(children.iter()).all(|(a, b)| std::ptr::eq(*a, *b))
        {
            return node;
        }
        Node::alloc(
            self.arena,
            NodeKind::Choice { children: self.arena.alloc_slice_copy(&merged) },
            node.name(),
        )
    }

    fn rebuild1(
        &mut self,
        node: &'a Node<'a>,
        old: &'a Node<'a>,
        new: &'a Node<'a>,
        make: impl FnOnce(&'a Node<'a>) -> NodeKind<'a>,
    ) -> &'a Node<'a> {
        if std::ptr::eq(old, new) {
            node
        } else {
            Node::alloc(self.arena, make(new), node.name())
        }
    }

    fn rebuild2(
        &mut self,
        node: &'a Node<'a>,
        old: (&'a Node<'a>, &'a Node<'a>),
        new: (&'a Node<'a>, &'a Node<'a>),
        make: impl FnOnce(&'a Node<'a>, &'a Node<'a>) -> NodeKind<'a>,
    ) -> &'a Node<'a> {
        if std::ptr::eq(old.0, new.0) && std::ptr::eq(old.1, new.1) {
            node
        } else {
            Node::alloc(self.arena, make(new.0, new.1), node.name())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use bumpalo::Bump;

    #[test]
    fn test_flattens_nested_alternation() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.either(g.literal("a"), g.either(g.literal("b"), g.literal("c")));
        let opt = optimize(&arena, p);
        match &opt.kind {
            NodeKind::Choice { children } => assert_eq!(children.len(), 3),
            _ => panic!("expected an alternation"),
        }
    }

    #[test]
    fn test_merges_adjacent_classes() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.either(g.one_of("ab"), g.one_of("cd"));
        let opt = optimize(&arena, p);
        match &opt.kind {
            NodeKind::Class { set, .. } => {
                for c in "abcd".chars() {
                    assert!(set.contains(c));
                }
            }
            other => panic!("expected a single class, got {}", kind_name(other)),
        }
    }

    #[test]
    fn test_no_merge_across_distinct_names() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.either(
            g.named(g.one_of("ab"), "letter"),
            g.named(g.one_of("01"), "bit"),
        );
        let opt = optimize(&arena, p);
        match &opt.kind {
            NodeKind::Choice { children } => {
                assert_eq!(children.len(), 2);
                assert_eq!(children[0].name(), Some("letter"));
                assert_eq!(children[1].name(), Some("bit"));
            }
            _ => panic!("expected an alternation"),
        }
    }

    #[test]
    fn test_merges_classes_sharing_a_name() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.either(
            g.named(g.one_of("ab"), "letter"),
            g.named(g.one_of("cd"), "letter"),
        );
        let opt = optimize(&arena, p);
        match &opt.kind {
            NodeKind::Class { set, .. } => {
                assert!(set.contains('a') && set.contains('d'));
                assert_eq!(opt.name(), Some("letter"));
            }
            _ => panic!("expected a single class"),
        }
    }

    #[test]
    fn test_no_merge_across_escape_sets() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.either(g.one_of_esc("ab", "\""), g.one_of("cd"));
        let opt = optimize(&arena, p);
        match &opt.kind {
            NodeKind::Choice { children } => assert_eq!(children.len(), 2),
            _ => panic!("expected an alternation"),
        }
    }

    #[test]
    fn test_unchanged_subtrees_are_shared() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.pair(g.literal("a"), g.literal("b"));
        let opt = optimize(&arena, p);
        assert!(std::ptr::eq(p, opt));
    }

    #[test]
    fn test_forward_identity_preserved() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let fwd = g.forward();
        fwd.bind(g.keep_right(g.one_of("["), g.keep_left(g.opt(fwd), g.one_of("]"))));
        let p = g.pair(fwd, g.literal("!"));
        let opt = optimize(&arena, p);
        match &opt.kind {
            NodeKind::Pair { left, .. } => assert_eq!(left.id(), fwd.id()),
            _ => panic!("expected a pair"),
        }
    }

    fn kind_name(kind: &NodeKind) -> &'static str {
        match kind {
            NodeKind::Class { .. } => "class",
            NodeKind::Choice { .. } => "choice",
            _ => "other",
        }
    }
}
