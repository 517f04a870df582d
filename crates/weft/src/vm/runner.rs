//! The compiled-parser front end.

use bumpalo::Bump;

use crate::error::{CompileError, Fail, ParseError};
use crate::grammar::Node;
use crate::parser::{Parsed, Parser};
use crate::vm::compiler::{Compiler, ForwardTable};
use crate::vm::instruction::Program;
use crate::vm::vm::{Reg, Vm};

/// A grammar compiled to bytecode, ready to run against input.
pub struct CompiledParser<'a> {
    program: Program<'a>,
    forwards: ForwardTable<'a>,
}

impl<'a> CompiledParser<'a> {
    /// Compile `root` (and everything reachable from it) into bytecode.
    pub fn compile(arena: &'a Bump, root: &'a Node<'a>) -> Result<Self, CompileError> {
        let (program, forwards) = Compiler::new(arena).compile(root)?;
        Ok(Self { program, forwards })
    }

    /// The main program.
    pub fn program(&self) -> &Program<'a> {
        &self.program
    }

    /// Sub-programs generated for forward rules.
    pub fn forwards(&self) -> &ForwardTable<'a> {
        &self.forwards
    }
}

impl Parser for CompiledParser<'_> {
    fn parse(&self, input: &str) -> Result<Parsed, ParseError> {
        let chars: Vec<char> = input.chars().collect();
        let mut vm = Vm::new(&chars, &self.forwards);
        let (reg, end) = vm.run(&self.program, 0);
        match reg {
            Reg::Value(value) => Ok(Parsed { value, end }),
            Reg::Fail(msg) => Err(vm.furthest.into_error(&chars, Fail { msg, pos: end })),
        }
    }
}
