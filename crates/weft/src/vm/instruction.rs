//! The bytecode instruction set and compiled programs.
//!
//! Programs are flat instruction vectors. Control flow uses jumps relative
//! to the current instruction; a jump of `+1` is a no-op fallthrough and a
//! jump to one past the last instruction halts the program.

use std::fmt;
use std::io::{self, Write};

use crate::charset::CharSet;
use crate::grammar::{LiftFn, MapFn, NodeId};
use crate::value::Value;

/// One VM instruction.
#[derive(Clone, Copy)]
pub enum Instr<'a> {
    /// Match one character from `set`, or a backslash escape from `escapes`.
    Class { set: &'a CharSet, escapes: &'a CharSet, name: &'a str },
    /// Greedy run of class characters, at least `min` of them.
    Run { set: &'a CharSet, escapes: &'a CharSet, min: usize, name: &'a str },
    /// Match exact text, yielding the text.
    Literal { text: &'a str, ignore_case: bool, name: &'a str },
    /// Match exact text, yielding `value`.
    Keyword { text: &'a str, ignore_case: bool, value: &'a Value, name: &'a str },
    /// Unconditional relative jump.
    Jump(isize),
    /// Relative jump taken when the register holds a failure.
    JumpIfFail(isize),
    /// Relative jump taken when the register holds a value.
    JumpIfOk(isize),
    /// Save the cursor on the position stack.
    SavePos,
    /// Pop the position stack, restoring the cursor from it.
    RestorePos,
    /// Pop the position stack, keeping the current cursor.
    DropPos,
    /// Restore the cursor from the top of the position stack, keeping the
    /// entry for further retries.
    ResetPos,
    /// Open a fresh accumulator frame.
    OpenAcc,
    /// Discard the top accumulator frame.
    CloseAcc,
    /// Move the register's value onto the top accumulator frame.
    Push,
    /// Move the last value of the top accumulator frame into the register.
    Pop,
    /// Pop the top accumulator frame into a sequence value; fails when the
    /// frame holds fewer than `min` values.
    CollectAcc { min: usize, name: &'a str },
    /// Pop the top accumulator frame of two values, appending the second
    /// onto the first when the first is a sequence.
    AppendAcc { name: &'a str },
    /// Apply a value transform to the register.
    ApplyMap(&'a MapFn<'a>),
    /// Apply an n-ary transform to the sequence in the register.
    ApplyLift(&'a LiftFn<'a>),
    /// Replace a failure in the register with a default value.
    OrDefault(&'a Value),
    /// Run the forward-compiled sub-program registered under `id`.
    Call { id: NodeId, name: &'a str },
}

impl fmt::Debug for Instr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Class { name, .. } => write!(f, "CLASS        {name}"),
            Instr::Run { min, name, .. } => write!(f, "RUN          {name} min={min}"),
            Instr::Literal { text, .. } => write!(f, "LITERAL      {text:?}"),
            Instr::Keyword { text, .. } => write!(f, "KEYWORD      {text:?}"),
            Instr::Jump(off) => write!(f, "JUMP         {off:+}"),
            Instr::JumpIfFail(off) => write!(f, "JUMP_IF_FAIL {off:+}"),
            Instr::JumpIfOk(off) => write!(f, "JUMP_IF_OK   {off:+}"),
            Instr::SavePos => write!(f, "SAVE_POS"),
            Instr::RestorePos => write!(f, "RESTORE_POS"),
            Instr::DropPos => write!(f, "DROP_POS"),
            Instr::ResetPos => write!(f, "RESET_POS"),
            Instr::OpenAcc => write!(f, "OPEN_ACC"),
            Instr::CloseAcc => write!(f, "CLOSE_ACC"),
            Instr::Push => write!(f, "PUSH"),
            Instr::Pop => write!(f, "POP"),
            Instr::CollectAcc { min, name } => write!(f, "COLLECT_ACC  {name} min={min}"),
            Instr::AppendAcc { name } => write!(f, "APPEND_ACC   {name}"),
            Instr::ApplyMap(_) => write!(f, "APPLY_MAP"),
            Instr::ApplyLift(_) => write!(f, "APPLY_LIFT"),
            Instr::OrDefault(_) => write!(f, "OR_DEFAULT"),
            Instr::Call { name, .. } => write!(f, "CALL         {name}"),
        }
    }
}

/// A compiled instruction sequence.
#[derive(Clone)]
pub struct Program<'a> {
    code: Vec<Instr<'a>>,
}

impl<'a> Program<'a> {
    pub(crate) fn new(code: Vec<Instr<'a>>) -> Self {
        Self { code }
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub(crate) fn code(&self) -> &[Instr<'a>] {
        &self.code
    }

    /// Verify that every jump lands inside the program or exactly one past
    /// its end.
    pub fn check(&self) -> Result<(), String> {
        for (at, instr) in self.code.iter().enumerate() {
            let offset = match instr {
                Instr::Jump(o) | Instr::JumpIfFail(o) | Instr::JumpIfOk(o) => *o,
                _ => continue,
            };
            let target = at as isize + offset;
            if target < 0 || target > self.code.len() as isize {
                return Err(format!(
                    "jump at {} lands at {}, outside 0..={}",
                    at,
                    target,
                    self.code.len()
                ));
            }
        }
        Ok(())
    }

    /// Write a human-readable listing of the program.
    pub fn disassemble<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (at, instr) in self.code.iter().enumerate() {
            match instr {
                Instr::Jump(off) | Instr::JumpIfFail(off) | Instr::JumpIfOk(off) => {
                    writeln!(out, "  {:4}: {:?} -> @{}", at, instr, at as isize + off)?;
                }
                _ => writeln!(out, "  {:4}: {:?}", at, instr)?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Program<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut listing = Vec::new();
        self.disassemble(&mut listing).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&listing))
    }
}
