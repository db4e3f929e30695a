//! Public error type.
//!
//! Each layer has its own error enum. [`Error`] joins them at the API
//! boundary so callers can use a single `?` across compiling, loading and
//! running.

use crate::compiler::CompileError;
use crate::types::TypeError;
use crate::vm::{AssemblyError, ExecutionError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Building or compiling a tree failed. Raised before any code runs.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The loader rejected a class.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Generated code faulted.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl From<TypeError> for Error {
    fn from(error: TypeError) -> Self {
        Error::Compile(error.into())
    }
}

impl Error {
    /// Whether the error was raised before generated code ran.
    pub fn is_static(&self) -> bool {
        !matches!(self, Error::Execution(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        let error: Error = TypeError::EmptyClassName.into();
        assert!(matches!(error, Error::Compile(CompileError::Type(TypeError::EmptyClassName))));
        assert!(error.is_static());

        let error: Error = ExecutionError::DivisionByZero.into();
        assert_eq!(error.to_string(), "division by zero");
        assert!(!error.is_static());
    }
}
