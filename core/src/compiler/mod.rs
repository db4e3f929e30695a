//! Bytecode compiler for typed expression trees.
//!
//! Tree nodes compile themselves against the [`Emitter`] trait; the
//! [`BytecodeEmitter`] writes the byte encoding, patches forward jumps and
//! tracks the operand stack depth. [`ClassBuilder`] compiles whole method
//! bodies and packs them into a class file for the loader.
//!
//! ## Design
//!
//! - Each node compiles with a `needs_result` flag, so statements never push
//!   values that are popped right away
//! - Operands are evaluated left to right
//! - Branches and loops use labels; forward jumps are patched when the
//!   label is marked

mod assembler;
mod assignment;
mod bytecode;
mod emitter;
mod error;

#[cfg(test)]
mod assembler_test;

pub use assembler::{ClassBuilder, MethodRef};
pub(crate) use assembler::check_parameters;
pub(crate) use assignment::check_definite_assignment;
pub use emitter::{BytecodeEmitter, ConstantPool, Emitter, JumpCondition, Label};
pub use error::{CompileError, ScopeState};
