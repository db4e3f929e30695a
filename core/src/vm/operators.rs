//! Arithmetic, comparison and conversion semantics shared by the
//! interpreter and the tree evaluator.

use super::error::ExecutionError;
use super::value::{Value, ref_eq};
use crate::expr::{BinaryOp, CompareOp};
use crate::types::Category;

macro_rules! int_op {
    ($op:expr, $a:expr, $b:expr) => {
        match $op {
            BinaryOp::Add => $a.wrapping_add($b),
            BinaryOp::Sub => $a.wrapping_sub($b),
            BinaryOp::Mul => $a.wrapping_mul($b),
            BinaryOp::Div if $b == 0 => return Err(ExecutionError::DivisionByZero),
            BinaryOp::Div => $a.wrapping_div($b),
            BinaryOp::Rem if $b == 0 => return Err(ExecutionError::DivisionByZero),
            BinaryOp::Rem => $a.wrapping_rem($b),
        }
    };
}

/// Integer operations wrap on overflow; integer division and remainder by
/// zero fault. Float operations follow IEEE 754.
pub(crate) fn arith(op: BinaryOp, left: Value, right: Value) -> Result<Value, ExecutionError> {
    Ok(match (left, right) {
        (Value::Int(a), Value::Int(b)) => Value::Int(int_op!(op, a, b)),
        (Value::Long(a), Value::Long(b)) => Value::Long(int_op!(op, a, b)),
        (Value::Float(a), Value::Float(b)) => Value::Float(float_op(op, a, b)),
        (Value::Double(a), Value::Double(b)) => Value::Double(float_op(op, a, b)),
        (left, right) => return Err(mismatch("arithmetic", &left, &right)),
    })
}

fn float_op<F>(op: BinaryOp, a: F, b: F) -> F
where
    F: core::ops::Add<Output = F>
        + core::ops::Sub<Output = F>
        + core::ops::Mul<Output = F>
        + core::ops::Div<Output = F>
        + core::ops::Rem<Output = F>,
{
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
    }
}

pub(crate) fn negate(value: Value) -> Result<Value, ExecutionError> {
    Ok(match value {
        Value::Int(a) => Value::Int(a.wrapping_neg()),
        Value::Long(a) => Value::Long(a.wrapping_neg()),
        Value::Float(a) => Value::Float(-a),
        Value::Double(a) => Value::Double(-a),
        other => return Err(ExecutionError::Internal(format!("cannot negate {:?}", other))),
    })
}

/// Comparisons involving NaN are false, except `!=`. References compare by
/// identity.
pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, ExecutionError> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
        (Value::Long(a), Value::Long(b)) => a.partial_cmp(b),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::Ref(a), Value::Ref(b)) => {
            let same = ref_eq(a, b);
            return match op {
                CompareOp::Eq => Ok(same),
                CompareOp::Ne => Ok(!same),
                _ => Err(ExecutionError::Internal(format!(
                    "operator `{}` applied to references",
                    op
                ))),
            };
        }
        _ => return Err(mismatch("comparison", left, right)),
    };
    use core::cmp::Ordering::*;
    Ok(match (op, ordering) {
        (CompareOp::Ne, None) => true,
        (_, None) => false,
        (CompareOp::Eq, Some(o)) => o == Equal,
        (CompareOp::Ne, Some(o)) => o != Equal,
        (CompareOp::Lt, Some(o)) => o == Less,
        (CompareOp::Le, Some(o)) => o != Greater,
        (CompareOp::Gt, Some(o)) => o == Greater,
        (CompareOp::Ge, Some(o)) => o != Less,
    })
}

/// Numeric conversion. Narrowing integer conversions truncate; float to
/// integer conversions saturate, with NaN becoming zero.
pub(crate) fn convert(value: Value, to: Category) -> Result<Value, ExecutionError> {
    Ok(match (value, to) {
        (Value::Int(a), Category::Int) => Value::Int(a),
        (Value::Int(a), Category::Long) => Value::Long(a as i64),
        (Value::Int(a), Category::Float) => Value::Float(a as f32),
        (Value::Int(a), Category::Double) => Value::Double(a as f64),
        (Value::Long(a), Category::Int) => Value::Int(a as i32),
        (Value::Long(a), Category::Long) => Value::Long(a),
        (Value::Long(a), Category::Float) => Value::Float(a as f32),
        (Value::Long(a), Category::Double) => Value::Double(a as f64),
        (Value::Float(a), Category::Int) => Value::Int(a as i32),
        (Value::Float(a), Category::Long) => Value::Long(a as i64),
        (Value::Float(a), Category::Float) => Value::Float(a),
        (Value::Float(a), Category::Double) => Value::Double(a as f64),
        (Value::Double(a), Category::Int) => Value::Int(a as i32),
        (Value::Double(a), Category::Long) => Value::Long(a as i64),
        (Value::Double(a), Category::Float) => Value::Float(a as f32),
        (Value::Double(a), Category::Double) => Value::Double(a),
        (value, to) => {
            return Err(ExecutionError::Internal(format!(
                "cannot convert {:?} to {:?}",
                value, to
            )));
        }
    })
}

fn mismatch(what: &str, left: &Value, right: &Value) -> ExecutionError {
    ExecutionError::Internal(format!("{} on {:?} and {:?}", what, left, right))
}
