//! Bytecode emission with labels and forward jump patching.

use hashbrown::HashMap;
use tracing::trace;

use super::error::CompileError;
use crate::vm::{Instruction, JUMP_SIZE, PoolEntry};

/// A jump target. Labels may be jumped to before they are marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(usize);

impl Label {
    pub fn id(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpCondition {
    Always,
    /// Pops an `Int` boolean and jumps when it is false.
    IfFalse,
    IfTrue,
}

/// Sink for the instructions of one method body.
///
/// Tree nodes compile against this trait, so the same tree can be emitted
/// into different targets.
pub trait Emitter {
    /// Append a non-call, non-jump instruction.
    fn emit(&mut self, instruction: Instruction);

    /// Append a call whose stack effect is given by the callee's signature.
    fn emit_invoke(&mut self, instruction: Instruction, arg_units: u16, result_units: u16);

    fn new_label(&mut self) -> Label;

    fn jump(&mut self, condition: JumpCondition, target: Label) -> Result<(), CompileError>;

    /// Bind `label` to the current position.
    fn mark(&mut self, label: Label) -> Result<(), CompileError>;

    /// Pool index of a string constant.
    fn string_constant(&mut self, value: &str) -> Result<u16, CompileError>;

    /// Pool index of a native function reference.
    fn native(&mut self, name: &str, descriptor: &str) -> Result<u16, CompileError>;
}

/// Class-wide constant pool with deduplication.
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
    index: HashMap<PoolEntry, u16>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry to the pool (or reuse an equal one) and return its index.
    pub fn intern(&mut self, entry: PoolEntry) -> Result<u16, CompileError> {
        if let Some(&existing) = self.index.get(&entry) {
            return Ok(existing);
        }
        let index = u16::try_from(self.entries.len()).map_err(|_| CompileError::TooManyConstants)?;
        self.entries.push(entry.clone());
        self.index.insert(entry, index);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<PoolEntry> {
        self.entries
    }
}

#[derive(Debug, Default)]
struct LabelState {
    /// Byte offset, once marked.
    target: Option<usize>,
    /// Stack depth expected at the label, taken from the first jump or mark.
    depth: Option<u16>,
    /// Opcode offsets of jumps waiting for this label.
    pending: Vec<usize>,
}

/// [`Emitter`] producing the byte encoding of [`Instruction`]s.
///
/// Tracks the operand stack depth (in slot units) along the emitted code:
/// after an unconditional transfer the depth is unknown until the next
/// label restores the depth recorded by the jumps to it. The maximum is the
/// method's `max_stack`.
pub struct BytecodeEmitter<'p> {
    code: Vec<u8>,
    pool: &'p mut ConstantPool,
    labels: Vec<LabelState>,
    /// `None` while the current position is unreachable.
    depth: Option<u16>,
    max_stack: u16,
}

impl<'p> BytecodeEmitter<'p> {
    pub fn new(pool: &'p mut ConstantPool) -> Self {
        Self {
            code: Vec::new(),
            pool,
            labels: Vec::new(),
            depth: Some(0),
            max_stack: 0,
        }
    }

    /// Current stack depth, `None` if the current position is unreachable.
    pub fn depth(&self) -> Option<u16> {
        self.depth
    }

    pub fn max_stack(&self) -> u16 {
        self.max_stack
    }

    pub fn position(&self) -> usize {
        self.code.len()
    }

    /// Finish emission and return the code and its `max_stack`.
    pub fn finish(self) -> Result<(Vec<u8>, u16), CompileError> {
        if let Some(id) = self
            .labels
            .iter()
            .position(|l| l.target.is_none() && !l.pending.is_empty())
        {
            return Err(CompileError::UnmarkedLabel(id));
        }
        Ok((self.code, self.max_stack))
    }

    fn apply(&mut self, popped: u16, pushed: u16) {
        let Some(depth) = self.depth else {
            return;
        };
        debug_assert!(
            depth >= popped,
            "Stack underflow: popping {} but depth is {}",
            popped,
            depth
        );
        let depth = depth.saturating_sub(popped) + pushed;
        self.max_stack = self.max_stack.max(depth);
        self.depth = Some(depth);
    }

    fn label_mut(&mut self, label: Label) -> &mut LabelState {
        &mut self.labels[label.0]
    }

    fn record_depth(&mut self, label: Label, depth: Option<u16>) {
        let state = self.label_mut(label);
        match (state.depth, depth) {
            (None, _) => state.depth = depth,
            (Some(expected), Some(found)) => debug_assert_eq!(
                expected, found,
                "inconsistent stack depth at label L{}",
                label.0
            ),
            (Some(_), None) => {}
        }
    }
}

fn relative(from: usize, to: usize) -> Result<i16, CompileError> {
    let offset = to as isize - from as isize;
    i16::try_from(offset).map_err(|_| CompileError::JumpTooFar)
}

impl Emitter for BytecodeEmitter<'_> {
    fn emit(&mut self, instruction: Instruction) {
        debug_assert!(
            instruction.jump_offset().is_none(),
            "jumps go through Emitter::jump"
        );
        if let Some((popped, pushed)) = instruction.stack_effect() {
            self.apply(popped, pushed);
        }
        if instruction.ends_block() {
            self.depth = None;
        }
        instruction.encode(&mut self.code);
    }

    fn emit_invoke(&mut self, instruction: Instruction, arg_units: u16, result_units: u16) {
        self.apply(arg_units, result_units);
        instruction.encode(&mut self.code);
    }

    fn new_label(&mut self) -> Label {
        self.labels.push(LabelState::default());
        Label(self.labels.len() - 1)
    }

    fn jump(&mut self, condition: JumpCondition, target: Label) -> Result<(), CompileError> {
        let at = self.code.len();
        let offset = match self.labels[target.0].target {
            Some(marked) => relative(at, marked)?,
            None => {
                self.label_mut(target).pending.push(at);
                0
            }
        };

        let instruction = match condition {
            JumpCondition::Always => Instruction::Jump(offset),
            JumpCondition::IfFalse => Instruction::JumpIfFalse(offset),
            JumpCondition::IfTrue => Instruction::JumpIfTrue(offset),
        };
        if condition != JumpCondition::Always {
            self.apply(1, 0);
        }
        self.record_depth(target, self.depth);
        if condition == JumpCondition::Always {
            self.depth = None;
        }
        instruction.encode(&mut self.code);
        Ok(())
    }

    fn mark(&mut self, label: Label) -> Result<(), CompileError> {
        let here = self.code.len();
        let state = self.label_mut(label);
        if state.target.is_some() {
            return Err(CompileError::LabelAlreadyMarked(label.0));
        }
        state.target = Some(here);
        let pending = core::mem::take(&mut state.pending);
        let recorded = state.depth;

        for at in pending {
            let offset = relative(at, here)?;
            trace!(label = label.0, at, offset, "Patching forward jump");
            self.code[at + 1..at + JUMP_SIZE].copy_from_slice(&offset.to_le_bytes());
        }

        match (self.depth, recorded) {
            (None, recorded) => self.depth = recorded,
            (Some(_), None) => self.record_depth(label, self.depth),
            (Some(current), Some(expected)) => debug_assert_eq!(
                current, expected,
                "inconsistent stack depth at label L{}",
                label.0
            ),
        }
        Ok(())
    }

    fn string_constant(&mut self, value: &str) -> Result<u16, CompileError> {
        self.pool.intern(PoolEntry::Str(value.to_string()))
    }

    fn native(&mut self, name: &str, descriptor: &str) -> Result<u16, CompileError> {
        self.pool.intern(PoolEntry::Native {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })
    }
}
