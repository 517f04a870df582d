//! The bytecode interpreter.
//!
//! Execution state is a cursor into the input, a single result register,
//! a stack of saved cursor positions for backtracking, and a stack of
//! accumulator frames for collecting sequence values. The register holds
//! either a value or a failure diagnostic; conditional jumps branch on
//! which one it is.

use std::mem;

use common::{create_logger, log, log_detail, log_fail, Logger};

use crate::error::Furthest;
use crate::scan;
use crate::value::Value;
use crate::vm::compiler::ForwardTable;
use crate::vm::instruction::{Instr, Program};

/// The result register: a parsed value, or the diagnostic of the most
/// recent failure.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Reg {
    Value(Value),
    Fail(String),
}

impl Reg {
    pub(crate) fn is_ok(&self) -> bool {
        matches!(self, Reg::Value(_))
    }

    pub(crate) fn is_fail(&self) -> bool {
        matches!(self, Reg::Fail(_))
    }
}

pub(crate) struct Vm<'a, 'i> {
    input: &'i [char],
    forwards: &'i ForwardTable<'a>,
    pub(crate) furthest: Furthest,
    log: Logger,
}

impl<'a, 'i> Vm<'a, 'i> {
    pub(crate) fn new(input: &'i [char], forwards: &'i ForwardTable<'a>) -> Self {
        Self {
            input,
            forwards,
            furthest: Furthest::default(),
            log: create_logger("vm"),
        }
    }

    fn fail(&mut self, pos: usize, msg: String) -> Reg {
        self.furthest.note(pos, &msg);
        log_fail!(self.log, "{}", msg);
        Reg::Fail(msg)
    }

    /// Execute `program` from `start`. Returns the final register and the
    /// cursor; on failure the cursor is wherever backtracking left it.
    pub(crate) fn run(&mut self, program: &Program<'a>, start: usize) -> (Reg, usize) {
        let code = program.code();
        log!(self.log, "run: {} instructions at {}", code.len(), start);

        let mut ip: usize = 0;
        let mut pos = start;
        let mut reg = Reg::Value(Value::Null);
        let mut pos_stack: Vec<usize> = Vec::new();
        let mut acc_stack: Vec<Vec<Value>> = Vec::new();

        while ip < code.len() {
            match code[ip] {
                Instr::Class { set, escapes, name } => {
                    match scan::match_class(self.input, pos, set, escapes) {
                        Some((c, next)) => {
                            pos = next;
                            reg = Reg::Value(Value::Char(c));
                        }
                        None => {
                            let msg = format!(
                                "Expected {} at {}. Got {} instead.",
                                name,
                                pos,
                                scan::describe_at(self.input, pos)
                            );
                            reg = self.fail(pos, msg);
                        }
                    }
                }
                Instr::Run { set, escapes, min, name } => {
                    let (text, end) = scan::match_run(self.input, pos, set, escapes);
                    if text.chars().count() >= min {
                        pos = end;
                        reg = Reg::Value(Value::Str(text));
                    } else {
                        let msg = format!("Expected at least {} {} at {}.", min, name, pos);
                        reg = self.fail(pos, msg);
                    }
                }
                Instr::Literal { text, ignore_case, name } => {
                    match scan::match_literal(self.input, pos, text, ignore_case) {
                        Some(end) => {
                            pos = end;
                            reg = Reg::Value(Value::Str(text.to_string()));
                        }
                        None => {
                            let msg = format!("Expected {} at {}.", name, pos);
                            reg = self.fail(pos, msg);
                        }
                    }
                }
                Instr::Keyword { text, ignore_case, value, name } => {
                    match scan::match_literal(self.input, pos, text, ignore_case) {
                        Some(end) => {
                            pos = end;
                            reg = Reg::Value(value.clone());
                        }
                        None => {
                            let msg = format!("Expected {} at {}.", name, pos);
                            reg = self.fail(pos, msg);
                        }
                    }
                }
                Instr::Jump(offset) => {
                    ip = jump(ip, offset);
                    continue;
                }
                Instr::JumpIfFail(offset) => {
                    if reg.is_fail() {
                        ip = jump(ip, offset);
                        continue;
                    }
                }
                Instr::JumpIfOk(offset) => {
                    if reg.is_ok() {
                        ip = jump(ip, offset);
                        continue;
                    }
                }
                Instr::SavePos => pos_stack.push(pos),
                Instr::RestorePos => {
                    pos = pos_stack.pop().expect("position stack underflow");
                }
                Instr::DropPos => {
                    pos_stack.pop().expect("position stack underflow");
                }
                Instr::ResetPos => {
                    pos = *pos_stack.last().expect("position stack underflow");
                }
                Instr::OpenAcc => acc_stack.push(Vec::new()),
                Instr::CloseAcc => {
                    acc_stack.pop().expect("accumulator stack underflow");
                }
                Instr::Push => {
                    let value = match mem::replace(&mut reg, Reg::Value(Value::Null)) {
                        Reg::Value(value) => value,
                        Reg::Fail(_) => unreachable!("push of a failed register"),
                    };
                    acc_stack
                        .last_mut()
                        .expect("accumulator stack underflow")
                        .push(value);
                }
                Instr::Pop => {
                    let value = acc_stack
                        .last_mut()
                        .expect("accumulator stack underflow")
                        .pop()
                        .expect("accumulator frame underflow");
                    reg = Reg::Value(value);
                }
                Instr::CollectAcc { min, name } => {
                    let frame = acc_stack.pop().expect("accumulator stack underflow");
                    if frame.len() >= min {
                        reg = Reg::Value(Value::Seq(frame));
                    } else {
                        let msg = format!("Expected at least {} {} at {}.", min, name, pos);
                        reg = self.fail(pos, msg);
                    }
                }
                Instr::AppendAcc { .. } => {
                    let mut frame = acc_stack.pop().expect("accumulator stack underflow");
                    let right = frame.pop().expect("accumulator frame underflow");
                    let left = frame.pop().expect("accumulator frame underflow");
                    let combined = match left {
                        Value::Seq(mut items) => {
                            items.push(right);
                            Value::Seq(items)
                        }
                        left => Value::Seq(vec![left, right]),
                    };
                    reg = Reg::Value(combined);
                }
                Instr::ApplyMap(func) => {
                    reg = match mem::replace(&mut reg, Reg::Value(Value::Null)) {
                        Reg::Value(value) => match func(value) {
                            Ok(mapped) => Reg::Value(mapped),
                            Err(msg) => self.fail(pos, msg),
                        },
                        failed => failed,
                    };
                }
                Instr::ApplyLift(func) => {
                    reg = match mem::replace(&mut reg, Reg::Value(Value::Null)) {
                        Reg::Value(Value::Seq(values)) => match func(values) {
                            Ok(combined) => Reg::Value(combined),
                            Err(msg) => self.fail(pos, msg),
                        },
                        Reg::Value(_) => unreachable!("lift register is not a sequence"),
                        failed => failed,
                    };
                }
                Instr::OrDefault(default) => {
                    if reg.is_fail() {
                        reg = Reg::Value(default.clone());
                    }
                }
                Instr::Call { id, name } => {
                    let sub = self
                        .forwards
                        .get(&id)
                        .expect("forward sub-program missing from table");
                    log_detail!(self.log, "call {}", name);
                    let (sub_reg, sub_pos) = self.run(sub, pos);
                    if sub_reg.is_ok() {
                        pos = sub_pos;
                    }
                    reg = sub_reg;
                }
            }
            ip += 1;
        }

        debug_assert!(pos_stack.is_empty(), "unbalanced position stack");
        debug_assert!(acc_stack.is_empty(), "unbalanced accumulator stack");
        (reg, pos)
    }
}

fn jump(ip: usize, offset: isize) -> usize {
    // Program::check verified the target at compile time.
    (ip as isize + offset) as usize
}
