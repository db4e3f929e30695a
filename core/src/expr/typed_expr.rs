use core::fmt;

use serde::{Deserialize, Serialize};

use crate::compiler::MethodRef;
use crate::scope::{LocalVariable, ScopeId};
use crate::types::TypeDescriptor;

/// One typed computation step: static result type plus the node itself.
#[derive(Debug, Clone)]
pub struct Expr<'a>(pub &'static TypeDescriptor, pub ExprInner<'a>);

impl<'a> Expr<'a> {
    /// Static result type. `Void` for effect-only nodes.
    #[inline]
    pub fn result_type(&self) -> &'static TypeDescriptor {
        self.0
    }

    #[inline]
    pub fn inner(&self) -> &ExprInner<'a> {
        &self.1
    }

    /// Whether compiling this node with `needs_result = true` is meaningful.
    pub fn produces_value(&self) -> bool {
        self.0.is_value()
    }
}

impl PartialEq for Expr<'_> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.0, other.0) && self.1 == other.1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprInner<'a> {
    Constant(Constant<'a>),
    Read(LocalVariable),
    Write {
        var: LocalVariable,
        value: &'a Expr<'a>,
    },
    Binary {
        op: BinaryOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Unary {
        op: UnaryOp,
        operand: &'a Expr<'a>,
    },
    Compare {
        op: CompareOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    Logical {
        op: LogicalOp,
        left: &'a Expr<'a>,
        right: &'a Expr<'a>,
    },
    /// Numeric conversion to the node's result type.
    Convert {
        operand: &'a Expr<'a>,
    },
    Invoke {
        callee: Callee<'a>,
        args: &'a [&'a Expr<'a>],
    },
    If {
        cond: &'a Expr<'a>,
        then_branch: &'a Expr<'a>,
        else_branch: Option<&'a Expr<'a>>,
    },
    While {
        cond: &'a Expr<'a>,
        body: &'a Expr<'a>,
    },
    Block {
        scope: Option<ScopeId>,
        statements: &'a [&'a Expr<'a>],
    },
    Return {
        value: Option<&'a Expr<'a>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constant<'a> {
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(&'a str),
    /// The null reference of the given reference type.
    Null(&'static TypeDescriptor),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Callee<'a> {
    /// A method of the class being assembled.
    Method(MethodRef),
    /// A host function, linked by name and signature when the class is loaded.
    Native {
        name: &'a str,
        signature: &'static TypeDescriptor,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinaryOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Rem = 4,
}

impl BinaryOp {
    pub const ALL: [BinaryOp; 5] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Rem,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareOp {
    Eq = 0,
    Ne = 1,
    Lt = 2,
    Le = 3,
    Gt = 4,
    Ge = 5,
}

impl CompareOp {
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Eq,
        CompareOp::Ne,
        CompareOp::Lt,
        CompareOp::Le,
        CompareOp::Gt,
        CompareOp::Ge,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }

    /// Only `==` and `!=` apply to booleans and references.
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
