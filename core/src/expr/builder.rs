use bumpalo::Bump;

use super::typed_expr::{BinaryOp, Callee, CompareOp, Constant, Expr, ExprInner, LogicalOp, UnaryOp};
use crate::compiler::{CompileError, MethodRef};
use crate::scope::{CodeBlocks, LocalVariable, ScopeId};
use crate::types::{TypeDescriptor, TypeError, TypeRegistry};

/// Allocates expression nodes in an arena, rejecting ill-typed trees as they
/// are assembled.
///
/// ```ignore
/// let arena = Bump::new();
/// let b = ExprBuilder::new(&arena);
/// let n = blocks.declare(frame, "n", b.types().int())?;
/// let doubled = b.write(n, b.mul(b.read(n), b.int(2))?)?;
/// ```
#[derive(Clone, Copy)]
pub struct ExprBuilder<'a> {
    arena: &'a Bump,
    types: &'static TypeRegistry,
}

type Result<T> = core::result::Result<T, CompileError>;

impl<'a> ExprBuilder<'a> {
    pub fn new(arena: &'a Bump) -> Self {
        Self::with_registry(arena, TypeRegistry::global())
    }

    /// A builder interning object types in `types`. Types from different
    /// registries never compare equal, so a class compiling these trees
    /// needs the same registry (see [`ClassBuilder::with_registry`](crate::compiler::ClassBuilder::with_registry)).
    pub fn with_registry(arena: &'a Bump, types: &'static TypeRegistry) -> Self {
        Self { arena, types }
    }

    pub fn types(&self) -> &'static TypeRegistry {
        self.types
    }

    pub fn arena(&self) -> &'a Bump {
        self.arena
    }

    fn alloc(&self, ty: &'static TypeDescriptor, inner: ExprInner<'a>) -> &'a Expr<'a> {
        self.arena.alloc(Expr(ty, inner))
    }

    // === Constants ===

    pub fn constant(&self, value: Constant<'_>) -> Result<&'a Expr<'a>> {
        let (ty, value) = match value {
            Constant::Bool(b) => (self.types.bool(), Constant::Bool(b)),
            Constant::Int(i) => (self.types.int(), Constant::Int(i)),
            Constant::Long(l) => (self.types.long(), Constant::Long(l)),
            Constant::Float(x) => (self.types.float(), Constant::Float(x)),
            Constant::Double(x) => (self.types.double(), Constant::Double(x)),
            Constant::Str(s) => (self.types.string(), Constant::Str(self.arena.alloc_str(s))),
            Constant::Null(ty) => {
                if !ty.is_reference() {
                    return Err(TypeError::NotReference { ty }.into());
                }
                (ty, Constant::Null(ty))
            }
        };
        Ok(self.alloc(ty, ExprInner::Constant(value)))
    }

    pub fn bool(&self, value: bool) -> &'a Expr<'a> {
        self.alloc(self.types.bool(), ExprInner::Constant(Constant::Bool(value)))
    }

    pub fn int(&self, value: i32) -> &'a Expr<'a> {
        self.alloc(self.types.int(), ExprInner::Constant(Constant::Int(value)))
    }

    pub fn long(&self, value: i64) -> &'a Expr<'a> {
        self.alloc(self.types.long(), ExprInner::Constant(Constant::Long(value)))
    }

    pub fn float(&self, value: f32) -> &'a Expr<'a> {
        self.alloc(self.types.float(), ExprInner::Constant(Constant::Float(value)))
    }

    pub fn double(&self, value: f64) -> &'a Expr<'a> {
        self.alloc(self.types.double(), ExprInner::Constant(Constant::Double(value)))
    }

    pub fn string(&self, value: &str) -> &'a Expr<'a> {
        let value = self.arena.alloc_str(value);
        self.alloc(self.types.string(), ExprInner::Constant(Constant::Str(value)))
    }

    pub fn null(&self, ty: &'static TypeDescriptor) -> Result<&'a Expr<'a>> {
        self.constant(Constant::Null(ty))
    }

    // === Variables ===

    pub fn read(&self, var: LocalVariable) -> &'a Expr<'a> {
        self.alloc(var.ty(), ExprInner::Read(var))
    }

    /// Read the innermost binding of `name` visible from `scope`.
    pub fn read_name(&self, blocks: &CodeBlocks, scope: ScopeId, name: &str) -> Result<&'a Expr<'a>> {
        Ok(self.read(blocks.lookup(scope, name)?))
    }

    /// Store `value` into `var`. In value position the stored value is also
    /// the node's result.
    pub fn write(&self, var: LocalVariable, value: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        expect_type(var.ty(), value)?;
        Ok(self.alloc(var.ty(), ExprInner::Write { var, value }))
    }

    pub fn write_name(
        &self,
        blocks: &CodeBlocks,
        scope: ScopeId,
        name: &str,
        value: &'a Expr<'a>,
    ) -> Result<&'a Expr<'a>> {
        self.write(blocks.lookup(scope, name)?, value)
    }

    // === Operators ===

    pub fn binary(&self, op: BinaryOp, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        let ty = expect_numeric(left)?;
        expect_type(ty, right)?;
        Ok(self.alloc(ty, ExprInner::Binary { op, left, right }))
    }

    pub fn add(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.binary(BinaryOp::Add, left, right)
    }

    pub fn sub(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.binary(BinaryOp::Sub, left, right)
    }

    pub fn mul(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.binary(BinaryOp::Mul, left, right)
    }

    pub fn div(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.binary(BinaryOp::Div, left, right)
    }

    pub fn rem(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.binary(BinaryOp::Rem, left, right)
    }

    pub fn neg(&self, operand: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        let ty = expect_numeric(operand)?;
        Ok(self.alloc(ty, ExprInner::Unary { op: UnaryOp::Neg, operand }))
    }

    pub fn not(&self, operand: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        expect_bool(operand)?;
        Ok(self.alloc(self.types.bool(), ExprInner::Unary { op: UnaryOp::Not, operand }))
    }

    pub fn compare(&self, op: CompareOp, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        let ty = expect_value(left)?;
        expect_type(ty, right)?;
        if !ty.is_numeric() && !op.is_equality() {
            return Err(TypeError::UnsupportedOperator { op: op.symbol(), ty }.into());
        }
        Ok(self.alloc(self.types.bool(), ExprInner::Compare { op, left, right }))
    }

    pub fn eq(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.compare(CompareOp::Eq, left, right)
    }

    pub fn lt(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.compare(CompareOp::Lt, left, right)
    }

    pub fn gt(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.compare(CompareOp::Gt, left, right)
    }

    /// Short-circuiting `&&` / `||`.
    pub fn logical(&self, op: LogicalOp, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        expect_bool(left)?;
        expect_bool(right)?;
        Ok(self.alloc(self.types.bool(), ExprInner::Logical { op, left, right }))
    }

    pub fn and(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.logical(LogicalOp::And, left, right)
    }

    pub fn or(&self, left: &'a Expr<'a>, right: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        self.logical(LogicalOp::Or, left, right)
    }

    /// Numeric conversion. Converting to the same type is allowed and free.
    pub fn convert(&self, operand: &'a Expr<'a>, to: &'static TypeDescriptor) -> Result<&'a Expr<'a>> {
        let from = expect_value(operand)?;
        if !from.is_numeric() || !to.is_numeric() {
            return Err(TypeError::InvalidConversion { from, to }.into());
        }
        if from.same(to) {
            return Ok(operand);
        }
        Ok(self.alloc(to, ExprInner::Convert { operand }))
    }

    // === Calls ===

    pub fn invoke(&self, method: MethodRef, args: &[&'a Expr<'a>]) -> Result<&'a Expr<'a>> {
        let ret = check_arguments(method.signature(), args)?;
        let args = self.arena.alloc_slice_copy(args);
        Ok(self.alloc(ret, ExprInner::Invoke { callee: Callee::Method(method), args }))
    }

    pub fn invoke_native(
        &self,
        name: &str,
        signature: &'static TypeDescriptor,
        args: &[&'a Expr<'a>],
    ) -> Result<&'a Expr<'a>> {
        let ret = check_arguments(signature, args)?;
        let name = self.arena.alloc_str(name);
        let args = self.arena.alloc_slice_copy(args);
        Ok(self.alloc(
            ret,
            ExprInner::Invoke {
                callee: Callee::Native { name, signature },
                args,
            },
        ))
    }

    // === Control flow ===

    /// `if cond { then_branch }`. Always effect-only.
    pub fn if_then(&self, cond: &'a Expr<'a>, then_branch: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        expect_bool(cond)?;
        Ok(self.alloc(
            self.types.void(),
            ExprInner::If {
                cond,
                then_branch,
                else_branch: None,
            },
        ))
    }

    /// `if cond { then_branch } else { else_branch }`.
    ///
    /// Produces a value when both branches have the same value type, and is
    /// effect-only otherwise.
    pub fn if_else(
        &self,
        cond: &'a Expr<'a>,
        then_branch: &'a Expr<'a>,
        else_branch: &'a Expr<'a>,
    ) -> Result<&'a Expr<'a>> {
        expect_bool(cond)?;
        let then_ty = then_branch.result_type();
        let ty = if then_ty.same(else_branch.result_type()) {
            then_ty
        } else {
            self.types.void()
        };
        Ok(self.alloc(
            ty,
            ExprInner::If {
                cond,
                then_branch,
                else_branch: Some(else_branch),
            },
        ))
    }

    pub fn while_loop(&self, cond: &'a Expr<'a>, body: &'a Expr<'a>) -> Result<&'a Expr<'a>> {
        expect_bool(cond)?;
        Ok(self.alloc(self.types.void(), ExprInner::While { cond, body }))
    }

    /// A sequence of statements; its value is the last statement's value.
    pub fn block(&self, scope: Option<ScopeId>, statements: &[&'a Expr<'a>]) -> &'a Expr<'a> {
        let ty = statements
            .last()
            .map_or(self.types.void(), |last| last.result_type());
        let statements = self.arena.alloc_slice_copy(statements);
        self.alloc(ty, ExprInner::Block { scope, statements })
    }

    /// An empty statement.
    pub fn empty(&self) -> &'a Expr<'a> {
        self.block(None, &[])
    }

    /// Return from the enclosing method. The value is checked against the
    /// method's return type when the method is defined.
    pub fn ret(&self, value: Option<&'a Expr<'a>>) -> Result<&'a Expr<'a>> {
        if let Some(value) = value {
            expect_value(value)?;
        }
        Ok(self.alloc(self.types.void(), ExprInner::Return { value }))
    }
}

fn expect_value(expr: &Expr<'_>) -> core::result::Result<&'static TypeDescriptor, TypeError> {
    let ty = expr.result_type();
    if ty.is_value() {
        Ok(ty)
    } else {
        Err(TypeError::NotAValue { found: ty })
    }
}

fn expect_type(expected: &'static TypeDescriptor, expr: &Expr<'_>) -> core::result::Result<(), TypeError> {
    let found = expect_value(expr)?;
    if found.same(expected) {
        Ok(())
    } else {
        Err(TypeError::Mismatch { expected, found })
    }
}

fn expect_numeric(expr: &Expr<'_>) -> core::result::Result<&'static TypeDescriptor, TypeError> {
    let ty = expect_value(expr)?;
    if ty.is_numeric() {
        Ok(ty)
    } else {
        Err(TypeError::NotNumeric { found: ty })
    }
}

fn expect_bool(expr: &Expr<'_>) -> core::result::Result<(), TypeError> {
    let ty = expr.result_type();
    if matches!(ty, TypeDescriptor::Bool) {
        Ok(())
    } else {
        Err(TypeError::NotBoolean { found: ty })
    }
}

/// Check `args` against a method signature and return its result type.
fn check_arguments(
    signature: &'static TypeDescriptor,
    args: &[&Expr<'_>],
) -> core::result::Result<&'static TypeDescriptor, TypeError> {
    let TypeDescriptor::Method { params, ret } = signature else {
        return Err(TypeError::NotAMethod { found: signature });
    };
    if params.len() != args.len() {
        return Err(TypeError::ArgumentCount {
            expected: params.len(),
            found: args.len(),
        });
    }
    for (param, arg) in params.iter().zip(args) {
        expect_type(*param, arg)?;
    }
    Ok(*ret)
}
