//! Tree-walking reference evaluator.
//!
//! Interprets the same expression trees the compiler translates, with the
//! same operator semantics as the interpreter (they share `vm::operators`).
//! Running a tree both ways and comparing results checks the compiler.
//!
//! ## Example
//!
//! ```ignore
//! use bumpalo::Bump;
//! use codetree_core::{evaluator, expr::ExprBuilder};
//!
//! let arena = Bump::new();
//! let b = ExprBuilder::new(&arena);
//! let sum = b.add(b.int(1), b.int(2))?;
//! assert_eq!(evaluator::eval(sum)?, Some(Value::Int(3)));
//! ```

mod eval;


pub use eval::Evaluator;

use crate::api::ExecutionOptions;
use crate::expr::Expr;
use crate::vm::{ExecutionError, Value};

/// Evaluate a closed expression with default limits.
pub fn eval<'a>(expr: &'a Expr<'a>) -> Result<Option<Value>, ExecutionError> {
    Evaluator::new(ExecutionOptions::default()).eval(expr)
}
