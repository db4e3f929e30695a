//! Compilation errors.
//!
//! Everything here is raised while a tree is being assembled or compiled,
//! before any generated code runs. None of these are retried: the caller
//! discards the tree and reports the definition that produced it.

use core::fmt;

use crate::scope::ScopeId;
use crate::types::TypeError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("`{name}` is already declared in this scope")]
    DuplicateBinding { name: String },

    #[error("cannot find `{name}` in this scope or any enclosing scope")]
    UnresolvedReference { name: String },

    #[error("`{name}` may be read before it is assigned")]
    UnassignedVariable { name: String },

    #[error("scope {scope} {state}")]
    ScopeState { scope: ScopeId, state: ScopeState },

    /// Too many local variable slots in one frame (limit: 65535).
    #[error("too many local variable slots (limit: 65535)")]
    TooManyLocals,

    /// Too many constant pool entries in one class (limit: 65535).
    #[error("too many constants (limit: 65535)")]
    TooManyConstants,

    #[error("too many methods in one class (limit: 65535)")]
    TooManyMethods,

    /// Jump distance exceeds the signed 16-bit offset range.
    #[error("jump distance too large (limit: 32767 bytes)")]
    JumpTooFar,

    #[error("label L{0} is the target of a jump but was never marked")]
    UnmarkedLabel(usize),

    #[error("label L{0} was marked twice")]
    LabelAlreadyMarked(usize),

    #[error("method `{name}` is already declared")]
    DuplicateMethod { name: String },

    #[error("method `{name}` is declared but never defined")]
    UndefinedMethod { name: String },

    #[error("method `{name}` can reach its end without returning a value")]
    MissingReturn { name: String },

    #[error("method `{name}` is already defined")]
    MethodAlreadyDefined { name: String },
}

/// Why a scope refused an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// The scope was already closed.
    Closed,
    /// The scope has an open child; only the innermost scope may allocate or close.
    Suspended,
    /// The handle does not belong to this set of code blocks.
    Unknown,
}

impl fmt::Display for ScopeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeState::Closed => write!(f, "is already closed"),
            ScopeState::Suspended => write!(f, "has an open child scope"),
            ScopeState::Unknown => write!(f, "does not exist"),
        }
    }
}
