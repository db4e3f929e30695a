//! Errors raised by the loader and by running code.

use super::instruction_set::DecodeError;

/// Rejection of a class at definition time. Fatal for that class: nothing
/// from it becomes callable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AssemblyError {
    #[error("not a class file (bad magic)")]
    BadMagic,

    #[error("unsupported class file version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("malformed class file: {0}")]
    Malformed(String),

    #[error("class `{name}` is already defined")]
    DuplicateClass { name: String },

    #[error("in method `{method}`: {source}")]
    Decode {
        method: String,
        #[source]
        source: DecodeError,
    },

    #[error("native `{name}` with descriptor `{descriptor}` is not registered")]
    UnresolvedNative { name: String, descriptor: String },

    #[error("verification of `{method}` failed at offset {offset}: {reason}")]
    Verify {
        method: String,
        offset: usize,
        reason: String,
    },
}

/// A fault raised while generated code runs.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExecutionError {
    #[error("division by zero")]
    DivisionByZero,

    #[error("null reference")]
    NullReference,

    #[error("call depth {depth} exceeds the limit of {max}")]
    StackOverflow { depth: usize, max: usize },

    #[error("execution exceeded {limit} steps")]
    StepLimitExceeded { limit: usize },

    #[error("native function failed: {0}")]
    Native(String),

    #[error("bad arguments: expected {expected}, found {found}")]
    BadArguments { expected: String, found: String },

    /// Invariant broken in verified code. Only reachable when verification
    /// was turned off.
    #[error("internal error: {0}")]
    Internal(String),
}
