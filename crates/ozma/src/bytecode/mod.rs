//! Bytecode representation for the abstract machine.
//!
//! An [`Instruction`] is an opcode plus up to three [`Operand`]s; a
//! [`Segment`] is the growable instruction sequence emitted for one procedure.
//! Compiled segments serialize with serde/postcard so build artifacts can be
//! snapshotted and compared.

pub use compiler::{CompileError, Compiler};

use std::fmt;

use smallvec::SmallVec;
use strum::IntoStaticStr;

use crate::store::{Store, Value};

mod compiler;

/// Abstract machine operations.
///
/// Only the unification/call subset is emitted today; branching, equality,
/// and arithmetic opcodes are declared for later passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    /// Unifies two store cells.
    Unify,
    /// Binds a fresh unbound variable into the operand register.
    NewVariable,
    /// Allocates an array: destination, size, initial value.
    NewArray,
    /// Stores a value into an array slot: array, index, value.
    AssignArray,
    /// Invokes a closure with a parameter array.
    Call,
    /// Invokes a host primitive named by an atom with a parameter array.
    CallNative,
    /// Raises an exception value.
    ExnRaise,

    // Declared for future compilation passes.
    Branch,
    BranchIf,
    TestEqual,
    NumberAdd,
    NumberMultiply,
}

/// Register classes addressable by bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, serde::Serialize, serde::Deserialize)]
pub enum RegisterKind {
    Parameter,
    Local,
    Closure,
}

impl RegisterKind {
    /// Single-letter prefix used in disassembly (`p0`, `l2`, `c1`).
    #[must_use]
    pub fn prefix(self) -> char {
        match self {
            Self::Parameter => 'p',
            Self::Local => 'l',
            Self::Closure => 'c',
        }
    }
}

/// A bytecode argument.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Operand {
    /// A store value materialized at compile time.
    Immediate(Value),
    Register(RegisterKind, usize),
    /// Operand absence (e.g. the parameter array of a zero-argument call).
    Invalid,
}

impl Operand {
    #[must_use]
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(value) => write!(f, "@{}", value.index()),
            Self::Register(kind, index) => write!(f, "{}{index}", kind.prefix()),
            Self::Invalid => f.write_str("-"),
        }
    }
}

/// One abstract machine instruction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    pub op: Opcode,
    pub operands: SmallVec<[Operand; 3]>,
}

impl Instruction {
    pub fn new(op: Opcode, operands: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            op,
            operands: operands.into_iter().collect(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.op.into();
        f.write_str(name)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}

/// The growing bytecode sequence of one procedure.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Segment(Vec<Instruction>);

impl Segment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one instruction.
    pub fn emit(&mut self, op: Opcode, operands: impl IntoIterator<Item = Operand>) {
        self.0.push(Instruction::new(op, operands));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.0
    }

    /// Renders a human-readable listing, resolving immediates through `store`.
    #[must_use]
    pub fn disassemble(&self, store: &Store) -> String {
        use fmt::Write;

        let mut out = String::new();
        for (offset, instruction) in self.0.iter().enumerate() {
            let name: &'static str = instruction.op.into();
            let _ = write!(out, "{offset:4}  {name}");
            for operand in &instruction.operands {
                match operand {
                    Operand::Immediate(value) => {
                        let _ = write!(out, " {}", store.render(*value));
                    }
                    other => {
                        let _ = write!(out, " {other}");
                    }
                }
            }
            out.push('\n');
        }
        out
    }
}

impl<'a> IntoIterator for &'a Segment {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn emit_appends_in_order() {
        let mut segment = Segment::new();
        segment.emit(Opcode::NewVariable, [Operand::Register(RegisterKind::Local, 0)]);
        segment.emit(
            Opcode::Unify,
            [
                Operand::Register(RegisterKind::Local, 0),
                Operand::Register(RegisterKind::Parameter, 1),
            ],
        );

        assert_eq!(segment.len(), 2);
        assert_eq!(segment.instructions()[0].op, Opcode::NewVariable);
        assert_eq!(segment.instructions()[1].op, Opcode::Unify);
    }

    #[test]
    fn instruction_display_uses_register_prefixes() {
        let instruction = Instruction::new(
            Opcode::Unify,
            [
                Operand::Register(RegisterKind::Parameter, 0),
                Operand::Register(RegisterKind::Closure, 2),
            ],
        );
        assert_eq!(instruction.to_string(), "unify p0 c2");
    }

    #[test]
    fn invalid_operand_renders_as_dash() {
        let instruction = Instruction::new(Opcode::Call, [Operand::Register(RegisterKind::Local, 1), Operand::Invalid]);
        assert_eq!(instruction.to_string(), "call l1 -");
    }
}
