//! Instruction set of the embedded stack machine.
//!
//! # Encoding
//!
//! Instructions are variable length: one opcode byte followed by zero or
//! more little-endian operand bytes.
//!
//! ```text
//! 0x00        nop
//! 0x02 i8     iconst (short form)
//! 0x03 i32    iconst
//! 0x04 i64    lconst
//! 0x05 f32    fconst
//! 0x06 f64    dconst
//! 0x07        aconst_null
//! 0x08 u16    ldc             constant pool entry
//! 0x10+c u8   load            c = category index
//! 0x18+c u8   store
//! 0x20+4*op+c arith           numeric categories only
//! 0x34+c      neg
//! 0x40+c u8   cmp             operand = compare op
//! 0x48        not
//! 0x50 u8     convert         operand = from << 4 | to
//! 0x58..0x5B  dup dup2 pop pop2
//! 0x60 i16    goto            offset relative to the jump's own opcode
//! 0x61 i16    iffalse
//! 0x62 i16    iftrue
//! 0x70 u16    invoke          method index within the class
//! 0x71 u16    invokenative    constant pool entry
//! 0x78+c      return value
//! 0x7D        return
//! 0xC4        wide            prefix: the following load/store takes a u16 slot
//! ```
//!
//! # Stack Discipline
//!
//! Stack effects are counted in slot units: `Long` and `Double` values take
//! two units, everything else one.

use core::fmt;

use crate::expr::{BinaryOp, CompareOp};
use crate::types::Category;

/// A decoded instruction.
#[derive(Clone, Copy, PartialEq)]
pub enum Instruction {
    Nop,

    /// Push an `Int` (also used for `Bool`, as 0 or 1).
    IConst(i32),
    LConst(i64),
    FConst(f32),
    DConst(f64),
    /// Push the null reference.
    Null,
    /// Push a constant pool string.
    Ldc(u16),

    /// `[...] -> [..., value]`
    Load(Category, u16),
    /// `[..., value] -> [...]`
    Store(Category, u16),

    /// `[..., a, b] -> [..., a op b]`
    Arith(Category, BinaryOp),
    Neg(Category),
    /// `[..., a, b] -> [..., a op b]` where the result is an `Int` 0 or 1.
    Cmp(Category, CompareOp),
    /// Logical negation of an `Int` boolean.
    Not,
    /// Numeric conversion `(from, to)`.
    Convert(Category, Category),

    /// Duplicate the single-width value on top of the stack.
    Dup,
    /// Duplicate the top two units (one wide value).
    Dup2,
    Pop,
    Pop2,

    Jump(i16),
    /// Pops an `Int` and jumps when it is zero.
    JumpIfFalse(i16),
    JumpIfTrue(i16),

    Invoke(u16),
    InvokeNative(u16),

    Return(Category),
    ReturnVoid,
}

pub(crate) const WIDE: u8 = 0xC4;

const NOP: u8 = 0x00;
const ICONST_SHORT: u8 = 0x02;
const ICONST: u8 = 0x03;
const LCONST: u8 = 0x04;
const FCONST: u8 = 0x05;
const DCONST: u8 = 0x06;
const NULL: u8 = 0x07;
const LDC: u8 = 0x08;
const LOAD: u8 = 0x10;
const STORE: u8 = 0x18;
const ARITH: u8 = 0x20;
const NEG: u8 = 0x34;
const CMP: u8 = 0x40;
const NOT: u8 = 0x48;
const CONVERT: u8 = 0x50;
const DUP: u8 = 0x58;
const DUP2: u8 = 0x59;
const POP: u8 = 0x5A;
const POP2: u8 = 0x5B;
const JUMP: u8 = 0x60;
const JUMP_IF_FALSE: u8 = 0x61;
const JUMP_IF_TRUE: u8 = 0x62;
const INVOKE: u8 = 0x70;
const INVOKE_NATIVE: u8 = 0x71;
const RETURN: u8 = 0x78;
const RETURN_VOID: u8 = 0x7D;

/// Size in bytes of every jump instruction.
pub const JUMP_SIZE: usize = 3;

impl Instruction {
    /// Append the encoded form of this instruction to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match *self {
            Instruction::Nop => out.push(NOP),
            Instruction::IConst(value) => match i8::try_from(value) {
                Ok(short) => out.extend_from_slice(&[ICONST_SHORT, short as u8]),
                Err(_) => {
                    out.push(ICONST);
                    out.extend_from_slice(&value.to_le_bytes());
                }
            },
            Instruction::LConst(value) => {
                out.push(LCONST);
                out.extend_from_slice(&value.to_le_bytes());
            }
            Instruction::FConst(value) => {
                out.push(FCONST);
                out.extend_from_slice(&value.to_bits().to_le_bytes());
            }
            Instruction::DConst(value) => {
                out.push(DCONST);
                out.extend_from_slice(&value.to_bits().to_le_bytes());
            }
            Instruction::Null => out.push(NULL),
            Instruction::Ldc(index) => {
                out.push(LDC);
                out.extend_from_slice(&index.to_le_bytes());
            }
            Instruction::Load(category, slot) => encode_local(out, LOAD + category.index(), slot),
            Instruction::Store(category, slot) => encode_local(out, STORE + category.index(), slot),
            Instruction::Arith(category, op) => out.push(ARITH + 4 * op as u8 + category.index()),
            Instruction::Neg(category) => out.push(NEG + category.index()),
            Instruction::Cmp(category, op) => out.extend_from_slice(&[CMP + category.index(), op as u8]),
            Instruction::Not => out.push(NOT),
            Instruction::Convert(from, to) => {
                out.extend_from_slice(&[CONVERT, from.index() << 4 | to.index()])
            }
            Instruction::Dup => out.push(DUP),
            Instruction::Dup2 => out.push(DUP2),
            Instruction::Pop => out.push(POP),
            Instruction::Pop2 => out.push(POP2),
            Instruction::Jump(offset) => encode_jump(out, JUMP, offset),
            Instruction::JumpIfFalse(offset) => encode_jump(out, JUMP_IF_FALSE, offset),
            Instruction::JumpIfTrue(offset) => encode_jump(out, JUMP_IF_TRUE, offset),
            Instruction::Invoke(index) => {
                out.push(INVOKE);
                out.extend_from_slice(&index.to_le_bytes());
            }
            Instruction::InvokeNative(index) => {
                out.push(INVOKE_NATIVE);
                out.extend_from_slice(&index.to_le_bytes());
            }
            Instruction::Return(category) => out.push(RETURN + category.index()),
            Instruction::ReturnVoid => out.push(RETURN_VOID),
        }
    }

    /// Encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        let mut buf = Vec::with_capacity(9);
        self.encode(&mut buf);
        buf.len()
    }

    /// Decode the instruction starting at `pc`, returning it with its size.
    pub fn decode(code: &[u8], pc: usize) -> Result<(Instruction, usize), DecodeError> {
        let mut reader = Reader { code, start: pc, pos: pc };
        let opcode = reader.u8()?;
        let instruction = match opcode {
            NOP => Instruction::Nop,
            ICONST_SHORT => Instruction::IConst(reader.u8()? as i8 as i32),
            ICONST => Instruction::IConst(i32::from_le_bytes(reader.array()?)),
            LCONST => Instruction::LConst(i64::from_le_bytes(reader.array()?)),
            FCONST => Instruction::FConst(f32::from_bits(u32::from_le_bytes(reader.array()?))),
            DCONST => Instruction::DConst(f64::from_bits(u64::from_le_bytes(reader.array()?))),
            NULL => Instruction::Null,
            LDC => Instruction::Ldc(reader.u16()?),
            0x10..=0x14 => Instruction::Load(category(opcode - LOAD), reader.u8()? as u16),
            0x18..=0x1C => Instruction::Store(category(opcode - STORE), reader.u8()? as u16),
            WIDE => {
                let inner = reader.u8()?;
                let slot = reader.u16()?;
                match inner {
                    0x10..=0x14 => Instruction::Load(category(inner - LOAD), slot),
                    0x18..=0x1C => Instruction::Store(category(inner - STORE), slot),
                    _ => return Err(reader.error(DecodeErrorKind::BadWide(inner))),
                }
            }
            0x20..=0x33 => {
                let n = opcode - ARITH;
                Instruction::Arith(category(n % 4), BinaryOp::ALL[(n / 4) as usize])
            }
            0x34..=0x37 => Instruction::Neg(category(opcode - NEG)),
            0x40..=0x44 => {
                let op = reader.u8()?;
                let op = CompareOp::ALL
                    .get(op as usize)
                    .copied()
                    .ok_or_else(|| reader.error(DecodeErrorKind::BadOperand(op)))?;
                Instruction::Cmp(category(opcode - CMP), op)
            }
            NOT => Instruction::Not,
            CONVERT => {
                let operand = reader.u8()?;
                match (Category::from_index(operand >> 4), Category::from_index(operand & 0x0F)) {
                    (Some(from), Some(to)) => Instruction::Convert(from, to),
                    _ => return Err(reader.error(DecodeErrorKind::BadOperand(operand))),
                }
            }
            DUP => Instruction::Dup,
            DUP2 => Instruction::Dup2,
            POP => Instruction::Pop,
            POP2 => Instruction::Pop2,
            JUMP => Instruction::Jump(reader.i16()?),
            JUMP_IF_FALSE => Instruction::JumpIfFalse(reader.i16()?),
            JUMP_IF_TRUE => Instruction::JumpIfTrue(reader.i16()?),
            INVOKE => Instruction::Invoke(reader.u16()?),
            INVOKE_NATIVE => Instruction::InvokeNative(reader.u16()?),
            0x78..=0x7C => Instruction::Return(category(opcode - RETURN)),
            RETURN_VOID => Instruction::ReturnVoid,
            _ => return Err(reader.error(DecodeErrorKind::UnknownOpcode(opcode))),
        };
        Ok((instruction, reader.pos - pc))
    }

    /// Jump offset, if this is a jump.
    pub fn jump_offset(&self) -> Option<i16> {
        match *self {
            Instruction::Jump(offset)
            | Instruction::JumpIfFalse(offset)
            | Instruction::JumpIfTrue(offset) => Some(offset),
            _ => None,
        }
    }

    /// Whether execution never continues with the next instruction.
    pub const fn ends_block(&self) -> bool {
        matches!(
            self,
            Instruction::Jump(_) | Instruction::Return(_) | Instruction::ReturnVoid
        )
    }

    /// Check if this instruction can fault at run time.
    pub const fn can_error(&self) -> bool {
        matches!(
            self,
            Instruction::Arith(Category::Int | Category::Long, BinaryOp::Div | BinaryOp::Rem)
                | Instruction::Invoke(_)
                | Instruction::InvokeNative(_)
        )
    }

    /// Stack effect in slot units as `(popped, pushed)`.
    ///
    /// Calls depend on the callee's signature and return `None`.
    pub fn stack_effect(&self) -> Option<(u16, u16)> {
        let effect = match *self {
            Instruction::Nop => (0, 0),
            Instruction::IConst(_) | Instruction::FConst(_) | Instruction::Null | Instruction::Ldc(_) => (0, 1),
            Instruction::LConst(_) | Instruction::DConst(_) => (0, 2),
            Instruction::Load(category, _) => (0, category.width()),
            Instruction::Store(category, _) => (category.width(), 0),
            Instruction::Arith(category, _) => (2 * category.width(), category.width()),
            Instruction::Neg(category) => (category.width(), category.width()),
            Instruction::Cmp(category, _) => (2 * category.width(), 1),
            Instruction::Not => (1, 1),
            Instruction::Convert(from, to) => (from.width(), to.width()),
            Instruction::Dup => (1, 2),
            Instruction::Dup2 => (2, 4),
            Instruction::Pop => (1, 0),
            Instruction::Pop2 => (2, 0),
            Instruction::Jump(_) => (0, 0),
            Instruction::JumpIfFalse(_) | Instruction::JumpIfTrue(_) => (1, 0),
            Instruction::Invoke(_) | Instruction::InvokeNative(_) => return None,
            Instruction::Return(category) => (category.width(), 0),
            Instruction::ReturnVoid => (0, 0),
        };
        Some(effect)
    }
}

fn category(index: u8) -> Category {
    // Opcode ranges are chosen so that every index reaching here is valid.
    Category::ALL[index as usize]
}

fn encode_local(out: &mut Vec<u8>, opcode: u8, slot: u16) {
    match u8::try_from(slot) {
        Ok(short) => out.extend_from_slice(&[opcode, short]),
        Err(_) => {
            out.extend_from_slice(&[WIDE, opcode]);
            out.extend_from_slice(&slot.to_le_bytes());
        }
    }
}

fn encode_jump(out: &mut Vec<u8>, opcode: u8, offset: i16) {
    out.push(opcode);
    out.extend_from_slice(&offset.to_le_bytes());
}

struct Reader<'c> {
    code: &'c [u8],
    start: usize,
    pos: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self
            .code
            .get(self.pos..self.pos + N)
            .ok_or_else(|| self.error(DecodeErrorKind::Truncated))?;
        self.pos += N;
        let mut out = [0; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    fn i16(&mut self) -> Result<i16, DecodeError> {
        Ok(i16::from_le_bytes(self.array()?))
    }

    fn error(&self, kind: DecodeErrorKind) -> DecodeError {
        DecodeError {
            offset: self.start,
            kind,
        }
    }
}

/// Mnemonic of an arithmetic or comparison operator (`add`, `lt`, ...).
fn op_name(op: impl Into<OpName>) -> &'static str {
    match op.into() {
        OpName::Binary(BinaryOp::Add) => "add",
        OpName::Binary(BinaryOp::Sub) => "sub",
        OpName::Binary(BinaryOp::Mul) => "mul",
        OpName::Binary(BinaryOp::Div) => "div",
        OpName::Binary(BinaryOp::Rem) => "rem",
        OpName::Compare(CompareOp::Eq) => "eq",
        OpName::Compare(CompareOp::Ne) => "ne",
        OpName::Compare(CompareOp::Lt) => "lt",
        OpName::Compare(CompareOp::Le) => "le",
        OpName::Compare(CompareOp::Gt) => "gt",
        OpName::Compare(CompareOp::Ge) => "ge",
    }
}

enum OpName {
    Binary(BinaryOp),
    Compare(CompareOp),
}

impl From<BinaryOp> for OpName {
    fn from(op: BinaryOp) -> Self {
        OpName::Binary(op)
    }
}

impl From<CompareOp> for OpName {
    fn from(op: CompareOp) -> Self {
        OpName::Compare(op)
    }
}

impl fmt::Debug for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Instruction::Nop => write!(f, "nop"),
            Instruction::IConst(v) => write!(f, "iconst {}", v),
            Instruction::LConst(v) => write!(f, "lconst {}", v),
            Instruction::FConst(v) => write!(f, "fconst {:?}", v),
            Instruction::DConst(v) => write!(f, "dconst {:?}", v),
            Instruction::Null => write!(f, "aconst_null"),
            Instruction::Ldc(index) => write!(f, "ldc #{}", index),
            Instruction::Load(c, slot) => write!(f, "{}load {}", c.prefix(), slot),
            Instruction::Store(c, slot) => write!(f, "{}store {}", c.prefix(), slot),
            Instruction::Arith(c, op) => write!(f, "{}{}", c.prefix(), op_name(op)),
            Instruction::Neg(c) => write!(f, "{}neg", c.prefix()),
            Instruction::Cmp(c, op) => write!(f, "{}cmp_{}", c.prefix(), op_name(op)),
            Instruction::Not => write!(f, "not"),
            Instruction::Convert(from, to) => write!(f, "{}2{}", from.prefix(), to.prefix()),
            Instruction::Dup => write!(f, "dup"),
            Instruction::Dup2 => write!(f, "dup2"),
            Instruction::Pop => write!(f, "pop"),
            Instruction::Pop2 => write!(f, "pop2"),
            Instruction::Jump(offset) => write!(f, "goto {:+}", offset),
            Instruction::JumpIfFalse(offset) => write!(f, "iffalse {:+}", offset),
            Instruction::JumpIfTrue(offset) => write!(f, "iftrue {:+}", offset),
            Instruction::Invoke(index) => write!(f, "invoke #{}", index),
            Instruction::InvokeNative(index) => write!(f, "invokenative #{}", index),
            Instruction::Return(c) => write!(f, "{}return", c.prefix()),
            Instruction::ReturnVoid => write!(f, "return"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid code at offset {offset}: {kind}")]
pub struct DecodeError {
    pub offset: usize,
    pub kind: DecodeErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeErrorKind {
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
    #[error("instruction runs past the end of the code")]
    Truncated,
    #[error("`wide` cannot prefix opcode 0x{0:02X}")]
    BadWide(u8),
    #[error("invalid operand 0x{0:02X}")]
    BadOperand(u8),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encoded(instruction: Instruction) -> Vec<u8> {
        let mut out = Vec::new();
        instruction.encode(&mut out);
        out
    }

    #[test]
    fn test_short_forms() {
        assert_eq!(encoded(Instruction::IConst(-3)), vec![0x02, 0xFD]);
        assert_eq!(encoded(Instruction::IConst(1000)), vec![0x03, 0xE8, 0x03, 0, 0]);
        assert_eq!(encoded(Instruction::Load(Category::Long, 4)), vec![0x11, 4]);
        assert_eq!(
            encoded(Instruction::Store(Category::Double, 300)),
            vec![WIDE, 0x1B, 0x2C, 0x01]
        );
    }

    #[test]
    fn test_arith_opcodes() {
        assert_eq!(encoded(Instruction::Arith(Category::Int, BinaryOp::Add)), vec![0x20]);
        assert_eq!(encoded(Instruction::Arith(Category::Double, BinaryOp::Rem)), vec![0x33]);
    }

    #[test]
    fn test_decode_every_form() {
        let all = [
            Instruction::Nop,
            Instruction::IConst(i32::MIN),
            Instruction::LConst(-1),
            Instruction::FConst(1.5),
            Instruction::DConst(-0.25),
            Instruction::Null,
            Instruction::Ldc(7),
            Instruction::Load(Category::Ref, 65535),
            Instruction::Store(Category::Float, 2),
            Instruction::Arith(Category::Long, BinaryOp::Mul),
            Instruction::Neg(Category::Float),
            Instruction::Cmp(Category::Ref, CompareOp::Ne),
            Instruction::Not,
            Instruction::Convert(Category::Int, Category::Double),
            Instruction::Dup2,
            Instruction::Pop,
            Instruction::JumpIfFalse(-12),
            Instruction::Invoke(3),
            Instruction::InvokeNative(1),
            Instruction::Return(Category::Long),
            Instruction::ReturnVoid,
        ];
        let mut code = Vec::new();
        for instruction in &all {
            instruction.encode(&mut code);
        }

        let mut pc = 0;
        let mut decoded = Vec::new();
        while pc < code.len() {
            let (instruction, len) = Instruction::decode(&code, pc).unwrap();
            assert_eq!(len, instruction.encoded_len());
            decoded.push(instruction);
            pc += len;
        }
        assert_eq!(decoded, all.to_vec());
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            Instruction::decode(&[0xFF], 0).unwrap_err().kind,
            DecodeErrorKind::UnknownOpcode(0xFF)
        );
        assert_eq!(
            Instruction::decode(&[0x00, 0x60, 0x01], 1).unwrap_err(),
            DecodeError {
                offset: 1,
                kind: DecodeErrorKind::Truncated
            }
        );
        assert_eq!(
            Instruction::decode(&[WIDE, 0x20, 0, 0], 0).unwrap_err().kind,
            DecodeErrorKind::BadWide(0x20)
        );
        assert_eq!(
            Instruction::decode(&[0x40, 9], 0).unwrap_err().kind,
            DecodeErrorKind::BadOperand(9)
        );
    }

    #[test]
    fn test_stack_effects() {
        assert_eq!(Instruction::Arith(Category::Long, BinaryOp::Add).stack_effect(), Some((4, 2)));
        assert_eq!(Instruction::Cmp(Category::Double, CompareOp::Lt).stack_effect(), Some((4, 1)));
        assert_eq!(Instruction::Convert(Category::Int, Category::Long).stack_effect(), Some((1, 2)));
        assert_eq!(Instruction::Invoke(0).stack_effect(), None);
    }

    #[test]
    fn test_can_error() {
        assert!(Instruction::Arith(Category::Int, BinaryOp::Div).can_error());
        assert!(Instruction::Arith(Category::Long, BinaryOp::Rem).can_error());
        assert!(!Instruction::Arith(Category::Double, BinaryOp::Div).can_error());
        assert!(!Instruction::Arith(Category::Int, BinaryOp::Add).can_error());
    }

    #[test]
    fn test_debug_formatting() {
        assert_eq!(format!("{:?}", Instruction::Load(Category::Long, 3)), "lload 3");
        assert_eq!(format!("{:?}", Instruction::Arith(Category::Int, BinaryOp::Sub)), "isub");
        assert_eq!(format!("{:?}", Instruction::Cmp(Category::Float, CompareOp::Ge)), "fcmp_ge");
        assert_eq!(format!("{:?}", Instruction::Convert(Category::Int, Category::Double)), "i2d");
        assert_eq!(format!("{:?}", Instruction::JumpIfFalse(7)), "iffalse +7");
    }
}
