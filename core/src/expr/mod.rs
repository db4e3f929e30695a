//! Typed expression trees.
//!
//! Trees are built bottom-up through [`ExprBuilder`], which validates types
//! as each node is constructed: a tree that was built successfully is well
//! typed, and compiling it can only fail on resource limits.

mod builder;
mod typed_expr;

#[cfg(test)]
mod builder_test;

pub use builder::ExprBuilder;
pub use typed_expr::{BinaryOp, Callee, CompareOp, Constant, Expr, ExprInner, LogicalOp, UnaryOp};
