//! The bytecode engine: compiler, instruction set, and interpreter.

mod compiler;
mod instruction;
mod runner;
mod vm;

pub use compiler::{Compiler, ForwardTable};
pub use instruction::{Instr, Program};
pub use runner::CompiledParser;

pub(crate) use vm::{Reg, Vm};
