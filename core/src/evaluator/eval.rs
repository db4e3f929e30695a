//! Core evaluation logic.

use std::sync::Arc;

use hashbrown::HashMap;

use crate::api::ExecutionOptions;
use crate::compiler::{CompileError, MethodRef, check_definite_assignment, check_parameters};
use crate::expr::{Callee, Constant, Expr, ExprInner, LogicalOp, UnaryOp};
use crate::scope::{CodeBlocks, LocalVariable, ScopeId, VarId};
use crate::types::Category;
use crate::vm::{self, ExecutionError, NativeFunction, Object, Value};

/// Non-local exits while walking a tree.
enum Unwind {
    Return(Option<Value>),
    Error(ExecutionError),
}

impl From<ExecutionError> for Unwind {
    fn from(error: ExecutionError) -> Self {
        Unwind::Error(error)
    }
}

type Eval<T> = Result<T, Unwind>;

struct MethodBody<'a> {
    method: MethodRef,
    params: Vec<VarId>,
    statements: Vec<&'a Expr<'a>>,
}

/// Evaluator for expression trees.
///
/// Variables are keyed by their identity, not by slot, so the result does
/// not depend on slot allocation. Every method call runs in a fresh
/// environment.
pub struct Evaluator<'a> {
    options: ExecutionOptions,
    natives: HashMap<String, NativeFunction>,
    methods: HashMap<u16, MethodBody<'a>>,
    /// String constants share one object per distinct text, like pooled
    /// constants do in a loaded class.
    strings: HashMap<&'a str, Arc<Object>>,
    env: HashMap<VarId, Value>,
    depth: usize,
    steps: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(options: ExecutionOptions) -> Self {
        Self {
            options,
            natives: HashMap::new(),
            methods: HashMap::new(),
            strings: HashMap::new(),
            env: HashMap::new(),
            depth: 0,
            steps: 0,
        }
    }

    pub fn register_native(&mut self, name: impl Into<String>, native: NativeFunction) -> Option<NativeFunction> {
        self.natives.insert(name.into(), native)
    }

    /// Provide the body of a method, with the same parameter and return
    /// conventions as [`ClassBuilder::define_method`](crate::compiler::ClassBuilder::define_method).
    pub fn define_method(
        &mut self,
        method: MethodRef,
        blocks: &CodeBlocks,
        frame: ScopeId,
        statements: &[&'a Expr<'a>],
    ) -> Result<(), CompileError> {
        let params = check_parameters(method, blocks, frame)?;
        check_definite_assignment(blocks, &params, statements)?;
        self.methods.insert(
            method.index(),
            MethodBody {
                method,
                params: params.iter().map(LocalVariable::id).collect(),
                statements: statements.to_vec(),
            },
        );
        Ok(())
    }

    /// Assign a variable in the top-level environment.
    pub fn set(&mut self, var: LocalVariable, value: Value) {
        self.env.insert(var.id(), value);
    }

    pub fn get(&self, var: LocalVariable) -> Option<&Value> {
        self.env.get(&var.id())
    }

    /// Evaluate `expr` in the top-level environment.
    ///
    /// Returns the value of value-typed expressions. A `return` reached at
    /// top level ends evaluation with the returned value.
    pub fn eval(&mut self, expr: &'a Expr<'a>) -> Result<Option<Value>, ExecutionError> {
        self.steps = 0;
        match self.eval_expr(expr) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    /// Call a defined method.
    pub fn call(&mut self, method: MethodRef, args: &[Value]) -> Result<Option<Value>, ExecutionError> {
        self.steps = 0;
        self.invoke_method(method, args.to_vec())
    }

    fn invoke_method(&mut self, method: MethodRef, args: Vec<Value>) -> Result<Option<Value>, ExecutionError> {
        if self.depth >= self.options.max_depth {
            return Err(ExecutionError::StackOverflow {
                depth: self.depth + 1,
                max: self.options.max_depth,
            });
        }
        let body = self
            .methods
            .get(&method.index())
            .filter(|body| body.method == method)
            .ok_or_else(|| ExecutionError::Internal(format!("method #{} has no body", method.index())))?;
        if args.len() != body.params.len() {
            return Err(ExecutionError::BadArguments {
                expected: method.signature().descriptor(),
                found: format!("{} arguments", args.len()),
            });
        }
        let env: HashMap<VarId, Value> = body.params.iter().copied().zip(args).collect();
        let statements = body.statements.clone();
        let ret = method.ret();

        let saved = core::mem::replace(&mut self.env, env);
        self.depth += 1;
        let result = self.run_body(&statements, ret.is_value());
        self.depth -= 1;
        self.env = saved;

        match result {
            Ok(value) if ret.is_value() => match value {
                Some(value) => Ok(Some(value)),
                None => Err(ExecutionError::Internal(format!(
                    "method #{} ended without a value",
                    method.index()
                ))),
            },
            Ok(_) => Ok(None),
            Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
        }
    }

    fn run_body(&mut self, statements: &[&'a Expr<'a>], returns: bool) -> Eval<Option<Value>> {
        let mut last = None;
        for statement in statements {
            last = self.eval_expr(statement)?;
        }
        Ok(if returns { last } else { None })
    }

    fn tick(&mut self) -> Result<(), ExecutionError> {
        self.steps += 1;
        match self.options.max_steps {
            Some(limit) if self.steps > limit => Err(ExecutionError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }

    fn eval_value(&mut self, expr: &'a Expr<'a>) -> Eval<Value> {
        self.eval_expr(expr)?
            .ok_or_else(|| Unwind::Error(ExecutionError::Internal("expected a value".into())))
    }

    fn eval_bool(&mut self, expr: &'a Expr<'a>) -> Eval<bool> {
        self.eval_value(expr)?
            .as_bool()
            .ok_or_else(|| Unwind::Error(ExecutionError::Internal("expected a boolean".into())))
    }

    fn eval_expr(&mut self, expr: &'a Expr<'a>) -> Eval<Option<Value>> {
        self.tick()?;
        let value = match expr.inner() {
            ExprInner::Constant(constant) => Some(self.constant(constant)),

            ExprInner::Read(var) => Some(
                self.env
                    .get(&var.id())
                    .cloned()
                    .ok_or_else(|| ExecutionError::Internal(format!("read of unassigned slot {}", var.slot())))?,
            ),

            ExprInner::Write { var, value } => {
                let value = self.eval_value(value)?;
                self.env.insert(var.id(), value.clone());
                Some(value)
            }

            ExprInner::Binary { op, left, right } => {
                let left = self.eval_value(left)?;
                let right = self.eval_value(right)?;
                Some(vm::arith(*op, left, right)?)
            }

            ExprInner::Unary { op, operand } => match op {
                UnaryOp::Neg => Some(vm::negate(self.eval_value(operand)?)?),
                UnaryOp::Not => Some(Value::bool(!self.eval_bool(operand)?)),
            },

            ExprInner::Compare { op, left, right } => {
                let left = self.eval_value(left)?;
                let right = self.eval_value(right)?;
                Some(Value::bool(vm::compare(*op, &left, &right)?))
            }

            ExprInner::Logical { op, left, right } => {
                let left = self.eval_bool(left)?;
                let result = match (op, left) {
                    (LogicalOp::And, false) => false,
                    (LogicalOp::Or, true) => true,
                    _ => self.eval_bool(right)?,
                };
                Some(Value::bool(result))
            }

            ExprInner::Convert { operand } => {
                let value = self.eval_value(operand)?;
                let to = expr.result_type().category().unwrap_or(Category::Int);
                Some(vm::convert(value, to)?)
            }

            ExprInner::Invoke { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args.iter() {
                    values.push(self.eval_value(arg)?);
                }
                match callee {
                    Callee::Method(method) => self.invoke_method(*method, values)?,
                    Callee::Native { name, signature } => {
                        let native = self
                            .natives
                            .get(*name)
                            .filter(|native| native.signature().same(signature))
                            .ok_or_else(|| {
                                ExecutionError::Native(format!("no native `{}` with signature {}", name, signature))
                            })?;
                        native.call(&values)?
                    }
                }
            }

            ExprInner::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(cond)? {
                    self.eval_expr(then_branch)?
                } else if let Some(else_branch) = else_branch {
                    self.eval_expr(else_branch)?
                } else {
                    None
                }
            }

            ExprInner::While { cond, body } => {
                while self.eval_bool(cond)? {
                    self.eval_expr(body)?;
                }
                None
            }

            ExprInner::Block { statements, .. } => {
                let mut last = None;
                for statement in statements.iter() {
                    last = self.eval_expr(statement)?;
                }
                last
            }

            ExprInner::Return { value } => {
                let value = match value {
                    Some(value) => Some(self.eval_value(value)?),
                    None => None,
                };
                return Err(Unwind::Return(value));
            }
        };
        // Effect-only nodes (e.g. an `if` whose branches disagree) yield nothing.
        Ok(value.filter(|_| expr.result_type().is_value()))
    }

    fn constant(&mut self, constant: &Constant<'a>) -> Value {
        match *constant {
            Constant::Bool(b) => Value::bool(b),
            Constant::Int(i) => Value::Int(i),
            Constant::Long(l) => Value::Long(l),
            Constant::Float(x) => Value::Float(x),
            Constant::Double(x) => Value::Double(x),
            Constant::Str(s) => {
                let object = self
                    .strings
                    .entry(s)
                    .or_insert_with(|| Arc::new(Object::Str(s.to_string())));
                Value::Ref(Some(Arc::clone(object)))
            }
            Constant::Null(_) => Value::null(),
        }
    }
}
