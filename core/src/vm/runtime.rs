use std::sync::Arc;

use super::error::ExecutionError;
use super::instruction_set::Instruction;
use super::loader::{LinkedConstant, LoadedClass};
use super::operators;
use super::stack::Stack;
use super::value::Value;
use crate::api::ExecutionOptions;

/// Executes verified methods of one class.
///
/// Each call gets its own operand stack and locals. Locals are slot cells:
/// a wide value sits in its first slot and leaves the second one empty.
pub(crate) struct Interpreter<'c> {
    class: &'c LoadedClass,
    options: &'c ExecutionOptions,
    steps: usize,
}

impl<'c> Interpreter<'c> {
    pub fn new(class: &'c LoadedClass, options: &'c ExecutionOptions) -> Self {
        Self {
            class,
            options,
            steps: 0,
        }
    }

    pub fn call(&mut self, index: usize, args: Vec<Value>, depth: usize) -> Result<Option<Value>, ExecutionError> {
        if depth > self.options.max_depth {
            return Err(ExecutionError::StackOverflow {
                depth,
                max: self.options.max_depth,
            });
        }
        let method = self
            .class
            .methods
            .get(index)
            .ok_or_else(|| internal(format!("no method #{}", index)))?;

        let mut locals: Vec<Option<Value>> = vec![None; method.max_locals as usize];
        let mut slot = 0;
        for arg in args {
            let width = arg.category().width() as usize;
            *locals.get_mut(slot).ok_or_else(|| internal("arguments exceed max_locals"))? = Some(arg);
            slot += width;
        }
        let mut stack: Stack<Value> = Stack::new(method.max_stack as usize);
        let mut pc = 0;

        loop {
            let op = method
                .ops
                .get(pc)
                .ok_or_else(|| internal(format!("`{}` ran off the end of its code", method.name)))?;
            self.tick()?;
            pc += 1;

            match op.instruction {
                Instruction::Nop => {}
                Instruction::IConst(i) => stack.push(Value::Int(i)),
                Instruction::LConst(l) => stack.push(Value::Long(l)),
                Instruction::FConst(x) => stack.push(Value::Float(x)),
                Instruction::DConst(x) => stack.push(Value::Double(x)),
                Instruction::Null => stack.push(Value::Ref(None)),
                Instruction::Ldc(index) => match self.class.constants.get(index as usize) {
                    Some(LinkedConstant::Str(s)) => stack.push(Value::Ref(Some(Arc::clone(s)))),
                    _ => return Err(internal(format!("constant #{} is not a string", index))),
                },

                Instruction::Load(_, slot) => {
                    let value = locals
                        .get(slot as usize)
                        .cloned()
                        .flatten()
                        .ok_or_else(|| internal(format!("read of unset slot {}", slot)))?;
                    stack.push(value);
                }
                Instruction::Store(category, slot) => {
                    let value = pop(&mut stack)?;
                    let slot = slot as usize;
                    if slot + category.width() as usize > locals.len() {
                        return Err(internal(format!("store to slot {} outside the frame", slot)));
                    }
                    if category.is_wide() {
                        locals[slot + 1] = None;
                    }
                    locals[slot] = Some(value);
                }

                Instruction::Arith(_, op) => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(operators::arith(op, left, right)?);
                }
                Instruction::Neg(_) => {
                    let value = pop(&mut stack)?;
                    stack.push(operators::negate(value)?);
                }
                Instruction::Cmp(_, op) => {
                    let right = pop(&mut stack)?;
                    let left = pop(&mut stack)?;
                    stack.push(Value::bool(operators::compare(op, &left, &right)?));
                }
                Instruction::Not => {
                    let value = pop_bool(&mut stack)?;
                    stack.push(Value::bool(!value));
                }
                Instruction::Convert(_, to) => {
                    let value = pop(&mut stack)?;
                    stack.push(operators::convert(value, to)?);
                }

                Instruction::Dup => {
                    if !stack.dup() {
                        return Err(internal("dup on an empty stack"));
                    }
                }
                Instruction::Dup2 => {
                    let top = stack.peek().ok_or_else(|| internal("dup2 on an empty stack"))?;
                    if top.category().is_wide() {
                        stack.dup();
                    } else {
                        let pair = stack
                            .top_n(2)
                            .ok_or_else(|| internal("dup2 needs two values"))?
                            .to_vec();
                        for value in pair {
                            stack.push(value);
                        }
                    }
                }
                Instruction::Pop => {
                    pop(&mut stack)?;
                }
                Instruction::Pop2 => {
                    if !pop(&mut stack)?.category().is_wide() {
                        pop(&mut stack)?;
                    }
                }

                Instruction::Jump(_) => pc = op.target,
                Instruction::JumpIfFalse(_) => {
                    if !pop_bool(&mut stack)? {
                        pc = op.target;
                    }
                }
                Instruction::JumpIfTrue(_) => {
                    if pop_bool(&mut stack)? {
                        pc = op.target;
                    }
                }

                Instruction::Invoke(index) => {
                    let callee = self
                        .class
                        .methods
                        .get(index as usize)
                        .ok_or_else(|| internal(format!("no method #{}", index)))?;
                    let args = pop_args(&mut stack, callee.params.len())?;
                    if let Some(result) = self.call(index as usize, args, depth + 1)? {
                        stack.push(result);
                    }
                }
                Instruction::InvokeNative(index) => {
                    let native = match self.class.constants.get(index as usize) {
                        Some(LinkedConstant::Native(native)) => native,
                        _ => return Err(internal(format!("constant #{} is not a native", index))),
                    };
                    let args = pop_args(&mut stack, native.params().len())?;
                    if let Some(result) = native.call(&args)? {
                        stack.push(result);
                    }
                }

                Instruction::Return(_) => return Ok(Some(pop(&mut stack)?)),
                Instruction::ReturnVoid => return Ok(None),
            }
        }
    }

    fn tick(&mut self) -> Result<(), ExecutionError> {
        self.steps += 1;
        match self.options.max_steps {
            Some(limit) if self.steps > limit => Err(ExecutionError::StepLimitExceeded { limit }),
            _ => Ok(()),
        }
    }
}

fn internal(message: impl Into<String>) -> ExecutionError {
    ExecutionError::Internal(message.into())
}

fn pop(stack: &mut Stack<Value>) -> Result<Value, ExecutionError> {
    stack.pop().ok_or_else(|| internal("operand stack underflow"))
}

fn pop_bool(stack: &mut Stack<Value>) -> Result<bool, ExecutionError> {
    pop(stack)?
        .as_bool()
        .ok_or_else(|| internal("expected a boolean on the stack"))
}

fn pop_args(stack: &mut Stack<Value>, count: usize) -> Result<Vec<Value>, ExecutionError> {
    stack
        .pop_n(count)
        .ok_or_else(|| internal("not enough arguments on the stack"))
}
