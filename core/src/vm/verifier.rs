//! Bytecode verification.
//!
//! Abstract interpretation over the category of every operand stack entry
//! and every local slot. States are merged where control flow joins: stack
//! shapes must agree exactly, locals that disagree become unusable.

use smallvec::SmallVec;
use tracing::debug;

use super::error::AssemblyError;
use super::instruction_set::Instruction;
use super::loader::{LinkedConstant, LoadedMethod, Op};
use crate::types::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotType {
    Unset,
    Value(Category),
    /// Second half of a wide value starting in the previous slot.
    Upper(Category),
}

#[derive(Debug, Clone, PartialEq)]
struct Frame {
    stack: SmallVec<[Category; 8]>,
    units: u16,
    locals: Vec<SlotType>,
}

impl Frame {
    /// Merge `other` into `self`, returning whether `self` changed.
    fn merge(&mut self, other: &Frame) -> Result<bool, String> {
        if self.stack != other.stack {
            return Err(format!(
                "inconsistent stack at merge point: {:?} vs {:?}",
                self.stack, other.stack
            ));
        }
        let mut changed = false;
        for (mine, theirs) in self.locals.iter_mut().zip(&other.locals) {
            if *mine != *theirs && *mine != SlotType::Unset {
                *mine = SlotType::Unset;
                changed = true;
            }
        }
        Ok(changed)
    }
}

struct Verifier<'m> {
    method: &'m LoadedMethod,
    methods: &'m [LoadedMethod],
    constants: &'m [LinkedConstant],
}

pub(crate) fn verify(
    method: &LoadedMethod,
    methods: &[LoadedMethod],
    constants: &[LinkedConstant],
) -> Result<(), AssemblyError> {
    Verifier {
        method,
        methods,
        constants,
    }
    .run()
    .map_err(|(offset, reason)| AssemblyError::Verify {
        method: method.name.clone(),
        offset,
        reason,
    })
}

type Failure = (usize, String);

impl Verifier<'_> {
    fn run(&self) -> Result<(), Failure> {
        let ops = &self.method.ops;
        if ops.is_empty() {
            return Err((0, "method has no code".into()));
        }

        let mut entry = Frame {
            stack: SmallVec::new(),
            units: 0,
            locals: vec![SlotType::Unset; self.method.max_locals as usize],
        };
        let mut slot = 0usize;
        for &param in &self.method.params {
            if slot + param.width() as usize > entry.locals.len() {
                return Err((0, "parameters do not fit in max_locals".into()));
            }
            entry.locals[slot] = SlotType::Value(param);
            if param.is_wide() {
                entry.locals[slot + 1] = SlotType::Upper(param);
            }
            slot += param.width() as usize;
        }

        let mut states: Vec<Option<Frame>> = vec![None; ops.len()];
        states[0] = Some(entry);
        let mut worklist = vec![0usize];
        let mut visited = 0usize;

        while let Some(index) = worklist.pop() {
            visited += 1;
            let op = &ops[index];
            let Some(mut frame) = states[index].clone() else {
                continue;
            };
            self.step(&mut frame, op).map_err(|reason| (op.offset, reason))?;

            let mut successors: SmallVec<[usize; 2]> = SmallVec::new();
            if op.instruction.jump_offset().is_some() {
                successors.push(op.target);
            }
            if !op.instruction.ends_block() {
                if index + 1 >= ops.len() {
                    return Err((op.offset, "execution can fall off the end of the code".into()));
                }
                successors.push(index + 1);
            }

            for next in successors {
                let changed = match &mut states[next] {
                    Some(existing) => existing.merge(&frame).map_err(|reason| (ops[next].offset, reason))?,
                    state => {
                        *state = Some(frame.clone());
                        true
                    }
                };
                if changed {
                    worklist.push(next);
                }
            }
        }

        debug!(method = %self.method.name, visited, "Verified method");
        Ok(())
    }

    fn step(&self, frame: &mut Frame, op: &Op) -> Result<(), String> {
        match op.instruction {
            Instruction::Nop => {}
            Instruction::IConst(_) => self.push(frame, Category::Int)?,
            Instruction::LConst(_) => self.push(frame, Category::Long)?,
            Instruction::FConst(_) => self.push(frame, Category::Float)?,
            Instruction::DConst(_) => self.push(frame, Category::Double)?,
            Instruction::Null => self.push(frame, Category::Ref)?,
            Instruction::Ldc(index) => match self.constants.get(index as usize) {
                Some(LinkedConstant::Str(_)) => self.push(frame, Category::Ref)?,
                _ => return Err(format!("constant #{} is not a string", index)),
            },

            Instruction::Load(category, slot) => {
                self.check_slot(category, slot)?;
                let slot = slot as usize;
                let held = frame.locals[slot];
                let upper_ok = !category.is_wide() || frame.locals[slot + 1] == SlotType::Upper(category);
                if held != SlotType::Value(category) || !upper_ok {
                    return Err(format!(
                        "load of slot {} as {:?}, but it holds {:?}",
                        slot, category, held
                    ));
                }
                self.push(frame, category)?;
            }
            Instruction::Store(category, slot) => {
                self.pop(frame, category)?;
                self.check_slot(category, slot)?;
                store(&mut frame.locals, category, slot as usize);
            }

            Instruction::Arith(category, _) => {
                self.pop(frame, category)?;
                self.pop(frame, category)?;
                self.push(frame, category)?;
            }
            Instruction::Neg(category) => {
                self.pop(frame, category)?;
                self.push(frame, category)?;
            }
            Instruction::Cmp(category, op) => {
                if category == Category::Ref && !op.is_equality() {
                    return Err(format!("operator `{}` is not defined on references", op));
                }
                self.pop(frame, category)?;
                self.pop(frame, category)?;
                self.push(frame, Category::Int)?;
            }
            Instruction::Not => {
                self.pop(frame, Category::Int)?;
                self.push(frame, Category::Int)?;
            }
            Instruction::Convert(from, to) => {
                if !from.is_numeric() || !to.is_numeric() {
                    return Err(format!("cannot convert {:?} to {:?}", from, to));
                }
                self.pop(frame, from)?;
                self.push(frame, to)?;
            }

            Instruction::Dup => {
                let top = self.top(frame)?;
                if top.is_wide() {
                    return Err("dup of a wide value".into());
                }
                self.push(frame, top)?;
            }
            Instruction::Dup2 => {
                let top = self.top(frame)?;
                if top.is_wide() {
                    self.push(frame, top)?;
                } else {
                    let below = self.below_top(frame)?;
                    self.push(frame, below)?;
                    self.push(frame, top)?;
                }
            }
            Instruction::Pop => {
                let top = self.top(frame)?;
                if top.is_wide() {
                    return Err("pop of a wide value".into());
                }
                self.pop(frame, top)?;
            }
            Instruction::Pop2 => {
                let top = self.top(frame)?;
                self.pop(frame, top)?;
                if !top.is_wide() {
                    let below = self.top(frame)?;
                    if below.is_wide() {
                        return Err("pop2 would split a wide value".into());
                    }
                    self.pop(frame, below)?;
                }
            }

            Instruction::Jump(_) => {}
            Instruction::JumpIfFalse(_) | Instruction::JumpIfTrue(_) => self.pop(frame, Category::Int)?,

            Instruction::Invoke(index) => {
                let callee = self
                    .methods
                    .get(index as usize)
                    .ok_or_else(|| format!("no method #{}", index))?;
                self.call(frame, &callee.params, callee.ret)?;
            }
            Instruction::InvokeNative(index) => match self.constants.get(index as usize) {
                Some(LinkedConstant::Native(native)) => self.call(frame, native.params(), native.ret())?,
                _ => return Err(format!("constant #{} is not a native function", index)),
            },

            Instruction::Return(category) => {
                if self.method.ret != Some(category) {
                    return Err(format!(
                        "returns {:?} from a method returning {:?}",
                        category, self.method.ret
                    ));
                }
                self.pop(frame, category)?;
            }
            Instruction::ReturnVoid => {
                if let Some(ret) = self.method.ret {
                    return Err(format!("returns nothing from a method returning {:?}", ret));
                }
            }
        }
        Ok(())
    }

    fn call(&self, frame: &mut Frame, params: &[Category], ret: Option<Category>) -> Result<(), String> {
        for &param in params.iter().rev() {
            self.pop(frame, param)?;
        }
        if let Some(ret) = ret {
            self.push(frame, ret)?;
        }
        Ok(())
    }

    fn check_slot(&self, category: Category, slot: u16) -> Result<(), String> {
        if slot as usize + category.width() as usize > self.method.max_locals as usize {
            return Err(format!(
                "slot {} is outside the frame (max_locals {})",
                slot, self.method.max_locals
            ));
        }
        Ok(())
    }

    fn push(&self, frame: &mut Frame, category: Category) -> Result<(), String> {
        let units = frame.units + category.width();
        if units > self.method.max_stack {
            return Err(format!(
                "operand stack exceeds max_stack {}",
                self.method.max_stack
            ));
        }
        frame.units = units;
        frame.stack.push(category);
        Ok(())
    }

    fn pop(&self, frame: &mut Frame, expected: Category) -> Result<(), String> {
        match frame.stack.pop() {
            Some(found) if found == expected => {
                frame.units -= found.width();
                Ok(())
            }
            Some(found) => Err(format!("expected {:?} on the stack, found {:?}", expected, found)),
            None => Err("operand stack underflow".into()),
        }
    }

    fn top(&self, frame: &Frame) -> Result<Category, String> {
        frame.stack.last().copied().ok_or_else(|| "operand stack underflow".into())
    }

    fn below_top(&self, frame: &Frame) -> Result<Category, String> {
        let len = frame.stack.len();
        match len.checked_sub(2).map(|i| frame.stack[i]) {
            Some(category) if !category.is_wide() => Ok(category),
            Some(_) => Err("dup2 would split a wide value".into()),
            None => Err("operand stack underflow".into()),
        }
    }
}

/// Record a store, invalidating any wide value it partially overwrites.
fn store(locals: &mut [SlotType], category: Category, slot: usize) {
    if slot > 0 && matches!(locals[slot - 1], SlotType::Value(c) if c.is_wide()) {
        locals[slot - 1] = SlotType::Unset;
    }
    let last = slot + category.width() as usize - 1;
    if let SlotType::Value(c) = locals[last] {
        if c.is_wide() && last + 1 < locals.len() {
            locals[last + 1] = SlotType::Unset;
        }
    }
    locals[slot] = SlotType::Value(category);
    if category.is_wide() {
        locals[slot + 1] = SlotType::Upper(category);
    }
}
