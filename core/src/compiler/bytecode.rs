//! Translation of typed expression trees into instructions.

use super::emitter::{Emitter, JumpCondition};
use super::error::CompileError;
use crate::expr::{Callee, Constant, Expr, ExprInner, LogicalOp, UnaryOp};
use crate::types::{Category, TypeDescriptor};
use crate::vm::Instruction;

impl<'a> Expr<'a> {
    /// Emit the instructions for this node.
    ///
    /// With `needs_result` the emitted code leaves exactly one value of
    /// [`result_type`](Expr::result_type) on the operand stack. Without it
    /// the code leaves the stack as it found it, and pushes nothing that it
    /// would only pop again unless computing it can fault.
    pub fn compile<E: Emitter + ?Sized>(&self, emitter: &mut E, needs_result: bool) -> Result<(), CompileError> {
        debug_assert!(
            !needs_result || self.produces_value(),
            "a `{}` node cannot produce a result",
            self.result_type()
        );

        match self.inner() {
            ExprInner::Constant(constant) => {
                if needs_result {
                    compile_constant(emitter, constant)?;
                }
            }

            ExprInner::Read(var) => {
                if needs_result {
                    emitter.emit(Instruction::Load(category(var.ty()), var.slot()));
                }
            }

            ExprInner::Write { var, value } => {
                value.compile(emitter, true)?;
                let category = category(var.ty());
                if needs_result {
                    emitter.emit(dup(category));
                }
                emitter.emit(Instruction::Store(category, var.slot()));
            }

            ExprInner::Binary { op, left, right } => {
                let category = category(self.result_type());
                let arith = Instruction::Arith(category, *op);
                // Integer division faults on zero, so it runs even when unused.
                if needs_result || arith.can_error() {
                    left.compile(emitter, true)?;
                    right.compile(emitter, true)?;
                    emitter.emit(arith);
                    if !needs_result {
                        emitter.emit(pop(category));
                    }
                } else {
                    left.compile(emitter, false)?;
                    right.compile(emitter, false)?;
                }
            }

            ExprInner::Unary { op, operand } => {
                operand.compile(emitter, needs_result)?;
                if needs_result {
                    match op {
                        UnaryOp::Neg => emitter.emit(Instruction::Neg(category(self.result_type()))),
                        UnaryOp::Not => emitter.emit(Instruction::Not),
                    }
                }
            }

            ExprInner::Compare { op, left, right } => {
                left.compile(emitter, needs_result)?;
                right.compile(emitter, needs_result)?;
                if needs_result {
                    emitter.emit(Instruction::Cmp(category(left.result_type()), *op));
                }
            }

            ExprInner::Logical { op, left, right } => {
                compile_logical(emitter, *op, left, right, needs_result)?;
            }

            ExprInner::Convert { operand } => {
                operand.compile(emitter, needs_result)?;
                if needs_result {
                    let from = category(operand.result_type());
                    let to = category(self.result_type());
                    if from != to {
                        emitter.emit(Instruction::Convert(from, to));
                    }
                }
            }

            ExprInner::Invoke { callee, args } => {
                let mut arg_units = 0;
                for arg in args.iter() {
                    arg.compile(emitter, true)?;
                    arg_units += arg.result_type().width();
                }
                let ret = self.result_type();
                let instruction = match callee {
                    Callee::Method(method) => Instruction::Invoke(method.index()),
                    Callee::Native { name, signature } => {
                        Instruction::InvokeNative(emitter.native(name, &signature.descriptor())?)
                    }
                };
                emitter.emit_invoke(instruction, arg_units, ret.width());
                if !needs_result && ret.is_value() {
                    emitter.emit(pop(category(ret)));
                }
            }

            ExprInner::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let else_label = emitter.new_label();
                cond.compile(emitter, true)?;
                emitter.jump(JumpCondition::IfFalse, else_label)?;
                then_branch.compile(emitter, needs_result)?;
                match else_branch {
                    Some(else_branch) => {
                        let end = emitter.new_label();
                        emitter.jump(JumpCondition::Always, end)?;
                        emitter.mark(else_label)?;
                        else_branch.compile(emitter, needs_result)?;
                        emitter.mark(end)?;
                    }
                    None => emitter.mark(else_label)?,
                }
            }

            ExprInner::While { cond, body } => {
                let head = emitter.new_label();
                let end = emitter.new_label();
                emitter.mark(head)?;
                cond.compile(emitter, true)?;
                emitter.jump(JumpCondition::IfFalse, end)?;
                body.compile(emitter, false)?;
                emitter.jump(JumpCondition::Always, head)?;
                emitter.mark(end)?;
            }

            ExprInner::Block { statements, .. } => {
                if let Some((last, init)) = statements.split_last() {
                    for statement in init {
                        statement.compile(emitter, false)?;
                    }
                    last.compile(emitter, needs_result)?;
                }
            }

            ExprInner::Return { value } => match value {
                Some(value) => {
                    value.compile(emitter, true)?;
                    emitter.emit(Instruction::Return(category(value.result_type())));
                }
                None => emitter.emit(Instruction::ReturnVoid),
            },
        }
        Ok(())
    }
}

fn compile_constant<E: Emitter + ?Sized>(emitter: &mut E, constant: &Constant<'_>) -> Result<(), CompileError> {
    let instruction = match *constant {
        Constant::Bool(b) => Instruction::IConst(b as i32),
        Constant::Int(i) => Instruction::IConst(i),
        Constant::Long(l) => Instruction::LConst(l),
        Constant::Float(x) => Instruction::FConst(x),
        Constant::Double(x) => Instruction::DConst(x),
        Constant::Str(s) => Instruction::Ldc(emitter.string_constant(s)?),
        Constant::Null(_) => Instruction::Null,
    };
    emitter.emit(instruction);
    Ok(())
}

/// Short-circuit `&&` / `||`.
///
/// ```text
/// left; iffalse F; right; goto END; F: iconst 0; END:      (&&, value)
/// left; iffalse END; right (discarded); END:               (&&, effect only)
/// ```
fn compile_logical<E: Emitter + ?Sized>(
    emitter: &mut E,
    op: LogicalOp,
    left: &Expr<'_>,
    right: &Expr<'_>,
    needs_result: bool,
) -> Result<(), CompileError> {
    let (skip_right, short_value) = match op {
        LogicalOp::And => (JumpCondition::IfFalse, 0),
        LogicalOp::Or => (JumpCondition::IfTrue, 1),
    };

    left.compile(emitter, true)?;
    let short = emitter.new_label();
    emitter.jump(skip_right, short)?;
    right.compile(emitter, needs_result)?;

    if needs_result {
        let end = emitter.new_label();
        emitter.jump(JumpCondition::Always, end)?;
        emitter.mark(short)?;
        emitter.emit(Instruction::IConst(short_value));
        emitter.mark(end)?;
    } else {
        emitter.mark(short)?;
    }
    Ok(())
}

/// Storage category of a value type. Builder validation guarantees every
/// type reaching the compiler in value position has one.
fn category(ty: &TypeDescriptor) -> Category {
    ty.category().unwrap_or(Category::Int)
}

fn dup(category: Category) -> Instruction {
    if category.is_wide() {
        Instruction::Dup2
    } else {
        Instruction::Dup
    }
}

fn pop(category: Category) -> Instruction {
    if category.is_wide() {
        Instruction::Pop2
    } else {
        Instruction::Pop
    }
}
