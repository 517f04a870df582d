//! Parser combinators compiled to bytecode.
//!
//! A grammar is built declaratively through [`Grammar`], producing an
//! arena-allocated DAG of combinator nodes. The grammar can then be run two
//! ways:
//!
//! - [`TreeParser`] walks the DAG directly; it supports every construct and
//!   serves as the behavioral reference;
//! - [`CompiledParser`] lowers the grammar to a linear bytecode [`Program`]
//!   and executes it on a small stack machine with explicit backtracking.
//!
//! Both implement the [`Parser`] trait and agree on values, consumed input,
//! and diagnostics for every grammar the VM supports. Failures surface as a
//! [`ParseError`] carrying the rightmost diagnostic the parse reached, with
//! line and column information.
//!
//! ```ignore
//! use bumpalo::Bump;
//! use weft::{CompiledParser, Grammar, Parser, Value};
//!
//! let arena = Bump::new();
//! let g = Grammar::new(&arena);
//! let digits = g.named(g.run_of("0123456789", "", 1), "digits");
//! let list = g.sep_by(digits, g.one_of(","));
//!
//! let parser = CompiledParser::compile(&arena, list)?;
//! let value = parser.parse_complete("1,2,3")?;
//! assert_eq!(
//!     value,
//!     Value::Seq(vec!["1".into(), "2".into(), "3".into()])
//! );
//! ```

pub mod charset;
pub mod error;
pub mod grammar;
pub mod interp;
pub mod json;
pub mod optimizer;
pub mod parser;
mod scan;
pub mod value;
pub mod vm;

pub use charset::CharSet;
pub use error::{CompileError, ParseError};
pub use grammar::{Grammar, Node, NodeId, NodeKind};
pub use interp::TreeParser;
pub use optimizer::optimize;
pub use parser::{Parsed, Parser};
pub use value::Value;
pub use vm::{CompiledParser, Compiler, ForwardTable, Instr, Program};
