//! Symbolic method bodies and their assembly into `Code` attributes.
//!
//! Bodies are written as [`Insn`] lists with symbolic [`Label`]s. The
//! assembler picks instruction encodings, resolves branches, and runs a
//! type-inference pass to compute `max_stack`, `max_locals` and the
//! `StackMapTable` frames required from class file version 50 on.

mod analyzer;
mod assembler;
mod frame;
mod insn;
mod opcode;

pub use assembler::{AssembledCode, MethodContext, assemble};
pub use frame::{Frame, VType, encode_stack_map};
pub use insn::{
    ArithOp, ArrayElem, Cond, FieldOp, FieldRef, Insn, IntNarrow, InvokeKind, Label, MethodRef, NumKind,
    PrimitiveArray, ValueKind,
};
