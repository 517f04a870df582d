//! Lowering from grammar DAG to bytecode.
//!
//! Each construct lowers to a fixed instruction shape; jump offsets are
//! derived by emitting placeholder jumps and patching them once the target
//! position is known, so the shapes below never hard-code distances.
//!
//! Recursion is handled through forward rules: the first time a forward
//! rule is reached its target is compiled both inline and into a standalone
//! sub-program, and every later occurrence becomes a `Call` into that
//! sub-program.

use bumpalo::Bump;
use common::{create_logger, log, log_detail, Logger};
use hashbrown::{HashMap, HashSet};

use crate::error::CompileError;
use crate::grammar::{Node, NodeId, NodeKind};
use crate::optimizer::optimize;
use crate::vm::instruction::{Instr, Program};

/// Sub-programs for forward rules, keyed by the forward node's identity.
pub type ForwardTable<'a> = HashMap<NodeId, Program<'a>>;

/// Compiles a grammar into a [`Program`] plus its [`ForwardTable`].
pub struct Compiler<'a> {
    arena: &'a Bump,
    seen: HashSet<NodeId>,
    forwards: ForwardTable<'a>,
    log: Logger,
}

impl<'a> Compiler<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self {
            arena,
            seen: HashSet::new(),
            forwards: HashMap::new(),
            log: create_logger("compiler"),
        }
    }

    pub fn compile(
        mut self,
        root: &'a Node<'a>,
    ) -> Result<(Program<'a>, ForwardTable<'a>), CompileError> {
        let root = optimize(self.arena, root);
        let code = self.lower(root)?;
        let program = Program::new(code);
        debug_assert!(
            program.check().is_ok(),
            "malformed program: {:?}",
            program.check()
        );
        log!(
            self.log,
            "compiled {} instructions, {} forward rules",
            program.len(),
            self.forwards.len()
        );
        Ok((program, self.forwards))
    }

    fn label(&self, node: &Node<'a>) -> &'a str {
        self.arena.alloc_str(&node.label())
    }

    fn lower(&mut self, node: &'a Node<'a>) -> Result<Vec<Instr<'a>>, CompileError> {
        match &node.kind {
            NodeKind::Class { set, escapes } => Ok(vec![Instr::Class {
                set: *set,
                escapes: *escapes,
                name: self.label(node),
            }]),
            NodeKind::Run { set, escapes, min } => Ok(vec![Instr::Run {
                set: *set,
                escapes: *escapes,
                min: *min,
                name: self.label(node),
            }]),
            NodeKind::Literal { text, ignore_case } => Ok(vec![Instr::Literal {
                text: *text,
                ignore_case: *ignore_case,
                name: self.label(node),
            }]),
            NodeKind::Keyword { text, value, ignore_case } => Ok(vec![Instr::Keyword {
                text: *text,
                ignore_case: *ignore_case,
                value: *value,
                name: self.label(node),
            }]),
            NodeKind::Opt { child, default } => {
                let child = self.lower(child)?;
                let mut block = Block::new();
                block.emit(Instr::SavePos);
                block.extend(child);
                let on_ok = block.emit(Instr::JumpIfOk(0));
                block.emit(Instr::RestorePos);
                block.emit(Instr::OrDefault(*default));
                let to_end = block.emit(Instr::Jump(0));
                block.patch_here(on_ok);
                block.emit(Instr::DropPos);
                block.patch_here(to_end);
                Ok(block.into_code())
            }
            NodeKind::KeepLeft { left, right } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                let mut block = Block::new();
                block.emit(Instr::OpenAcc);
                block.emit(Instr::SavePos);
                block.extend(left);
                let fail_left = block.emit(Instr::JumpIfFail(0));
                block.emit(Instr::Push);
                block.extend(right);
                let fail_right = block.emit(Instr::JumpIfFail(0));
                block.emit(Instr::Pop);
                block.emit(Instr::DropPos);
                let to_end = block.emit(Instr::Jump(0));
                block.patch_here(fail_left);
                block.patch_here(fail_right);
                block.emit(Instr::RestorePos);
                block.patch_here(to_end);
                block.emit(Instr::CloseAcc);
                Ok(block.into_code())
            }
            NodeKind::KeepRight { left, right } => {
                let left = self.lower(left)?;
                let right = self.lower(right)?;
                let mut block = Block::new();
                block.emit(Instr::SavePos);
                block.extend(left);
                let fail_left = block.emit(Instr::JumpIfFail(0));
                block.extend(right);
                let fail_right = block.emit(Instr::JumpIfFail(0));
                block.emit(Instr::DropPos);
                let to_end = block.emit(Instr::Jump(0));
                block.patch_here(fail_left);
                block.patch_here(fail_right);
                block.emit(Instr::RestorePos);
                block.patch_here(to_end);
                Ok(block.into_code())
            }
            NodeKind::Pair { left, right } => {
                let name = self.label(node);
                self.lower_two(left, right, Instr::CollectAcc { min: 2, name })
            }
            NodeKind::Append { left, right } => {
                let name = self.label(node);
                self.lower_two(left, right, Instr::AppendAcc { name })
            }
            NodeKind::Choice { children } => {
                let mut block = Block::new();
                block.emit(Instr::SavePos);
                let mut successes = Vec::with_capacity(children.len());
                for (i, child) in children.iter().enumerate() {
                    block.extend(self.lower(child)?);
                    successes.push(block.emit(Instr::JumpIfOk(0)));
                    if i + 1 < children.len() {
                        block.emit(Instr::ResetPos);
                    }
                }
                block.emit(Instr::RestorePos);
                let to_end = block.emit(Instr::Jump(0));
                for at in successes {
                    block.patch_here(at);
                }
                block.emit(Instr::DropPos);
                block.patch_here(to_end);
                Ok(block.into_code())
            }
            NodeKind::Many { child } => self.lower_repeat(child, 0),
            NodeKind::Many1 { child } => self.lower_repeat(child, 1),
            NodeKind::Map { child, func } => {
                let mut code = self.lower(child)?;
                code.push(Instr::ApplyMap(*func));
                Ok(code)
            }
            NodeKind::Lift { children, func } => {
                let mut block = Block::new();
                block.emit(Instr::OpenAcc);
                block.emit(Instr::SavePos);
                let mut failures = Vec::with_capacity(children.len());
                for child in children.iter() {
                    block.extend(self.lower(child)?);
                    failures.push(block.emit(Instr::JumpIfFail(0)));
                    block.emit(Instr::Push);
                }
                block.emit(Instr::CollectAcc {
                    min: children.len(),
                    name: self.label(node),
                });
                block.emit(Instr::ApplyLift(*func));
                block.emit(Instr::DropPos);
                let to_end = block.emit(Instr::Jump(0));
                for at in failures {
                    block.patch_here(at);
                }
                block.emit(Instr::RestorePos);
                block.emit(Instr::CloseAcc);
                block.patch_here(to_end);
                Ok(block.into_code())
            }
            NodeKind::Forward { target } => {
                let id = node.id();
                if self.seen.contains(&id) {
                    return Ok(vec![Instr::Call { id, name: self.label(node) }]);
                }
                let target = target
                    .get()
                    .ok_or_else(|| CompileError::UnboundForward(node.label()))?;
                self.seen.insert(id);
                let target = optimize(self.arena, target);
                let code = self.lower(target)?;
                let sub = Program::new(code.clone());
                debug_assert!(
                    sub.check().is_ok(),
                    "malformed forward sub-program: {:?}",
                    sub.check()
                );
                log_detail!(
                    self.log,
                    "forward rule {} compiled to {} instructions",
                    node.label(),
                    sub.len()
                );
                self.forwards.insert(id, sub);
                Ok(code)
            }
            NodeKind::Wrap { child } => self.lower(child),
            NodeKind::FollowedBy { .. } | NodeKind::NotFollowedBy { .. } => {
                Err(CompileError::UnsupportedLookahead(node.label()))
            }
            NodeKind::WithIndent { .. } | NodeKind::Indented { .. } => {
                Err(CompileError::UnsupportedIndentation(node.label()))
            }
        }
    }

    /// Shared shape for the two-child sequencing constructs that collect
    /// both values before combining them.
    fn lower_two(
        &mut self,
        left: &'a Node<'a>,
        right: &'a Node<'a>,
        combine: Instr<'a>,
    ) -> Result<Vec<Instr<'a>>, CompileError> {
        let left = self.lower(left)?;
        let right = self.lower(right)?;
        let mut block = Block::new();
        block.emit(Instr::OpenAcc);
        block.emit(Instr::SavePos);
        block.extend(left);
        let fail_left = block.emit(Instr::JumpIfFail(0));
        block.emit(Instr::Push);
        block.extend(right);
        let fail_right = block.emit(Instr::JumpIfFail(0));
        block.emit(Instr::Push);
        // The combine instruction consumes the accumulator frame itself.
        block.emit(combine);
        block.emit(Instr::DropPos);
        let to_end = block.emit(Instr::Jump(0));
        block.patch_here(fail_left);
        block.patch_here(fail_right);
        block.emit(Instr::RestorePos);
        block.emit(Instr::CloseAcc);
        block.patch_here(to_end);
        Ok(block.into_code())
    }

    fn lower_repeat(
        &mut self,
        child: &'a Node<'a>,
        min: usize,
    ) -> Result<Vec<Instr<'a>>, CompileError> {
        let name = self.label(child);
        let child = self.lower(child)?;
        let mut block = Block::new();
        block.emit(Instr::OpenAcc);
        let top = block.here();
        block.emit(Instr::SavePos);
        block.extend(child);
        let on_fail = block.emit(Instr::JumpIfFail(0));
        block.emit(Instr::Push);
        block.emit(Instr::DropPos);
        let back = block.emit(Instr::Jump(0));
        block.patch(back, top);
        block.patch_here(on_fail);
        block.emit(Instr::RestorePos);
        block.emit(Instr::CollectAcc { min, name });
        Ok(block.into_code())
    }
}

/// An instruction buffer with placeholder-jump patching.
struct Block<'a> {
    code: Vec<Instr<'a>>,
}

impl<'a> Block<'a> {
    fn new() -> Self {
        Self { code: Vec::new() }
    }

    fn here(&self) -> usize {
        self.code.len()
    }

    fn emit(&mut self, instr: Instr<'a>) -> usize {
        let at = self.code.len();
        self.code.push(instr);
        at
    }

    fn extend(&mut self, code: Vec<Instr<'a>>) {
        self.code.extend(code);
    }

    /// Point the jump at `at` to the instruction position `target`.
    fn patch(&mut self, at: usize, target: usize) {
        let offset = target as isize - at as isize;
        match &mut self.code[at] {
            Instr::Jump(o) | Instr::JumpIfFail(o) | Instr::JumpIfOk(o) => *o = offset,
            _ => unreachable!("patched instruction is not a jump"),
        }
    }

    /// Point the jump at `at` to the next instruction to be emitted.
    fn patch_here(&mut self, at: usize) {
        let target = self.here();
        self.patch(at, target);
    }

    fn into_code(self) -> Vec<Instr<'a>> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;
    use bumpalo::Bump;

    fn compile<'a>(
        arena: &'a Bump,
        root: &'a Node<'a>,
    ) -> Result<(Program<'a>, ForwardTable<'a>), CompileError> {
        Compiler::new(arena).compile(root)
    }

    #[test]
    fn test_all_jumps_in_range() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let item = g.forward();
        item.bind(g.either(
            g.run_of("0123456789", "", 1),
            g.keep_right(g.one_of("["), g.keep_left(g.sep_by(item, g.one_of(",")), g.one_of("]"))),
        ));
        let (program, forwards) = compile(&arena, item).unwrap();
        assert!(program.check().is_ok());
        for sub in forwards.values() {
            assert!(sub.check().is_ok());
        }
    }

    #[test]
    fn test_forward_table_entries() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let fwd = g.forward();
        fwd.bind(g.keep_right(g.one_of("["), g.keep_left(g.opt(fwd), g.one_of("]"))));
        let (_, forwards) = compile(&arena, fwd).unwrap();
        assert_eq!(forwards.len(), 1);
        assert!(forwards.contains_key(&fwd.id()));
    }

    #[test]
    fn test_unbound_forward_rejected() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let fwd = g.forward();
        let p = g.pair(g.literal("a"), fwd);
        assert!(matches!(
            compile(&arena, p),
            Err(CompileError::UnboundForward(_))
        ));
    }

    #[test]
    fn test_lookahead_rejected() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let p = g.followed_by(g.literal("a"), g.literal("b"));
        assert!(matches!(
            compile(&arena, p),
            Err(CompileError::UnsupportedLookahead(_))
        ));
        let n = g.not_followed_by(g.literal("a"), g.literal("b"));
        assert!(matches!(
            compile(&arena, n),
            Err(CompileError::UnsupportedLookahead(_))
        ));
    }

    #[test]
    fn test_indentation_rejected() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let block = g.with_indent(g.literal("a"));
        assert!(matches!(
            compile(&arena, block),
            Err(CompileError::UnsupportedIndentation(_))
        ));
        let guard = g.indented(g.literal("a"));
        assert!(matches!(
            compile(&arena, guard),
            Err(CompileError::UnsupportedIndentation(_))
        ));
    }

    #[test]
    fn test_leaf_compiles_to_single_instruction() {
        let arena = Bump::new();
        let g = Grammar::new(&arena);
        let (program, _) = compile(&arena, g.one_of("ab")).unwrap();
        assert_eq!(program.len(), 1);
    }
}
