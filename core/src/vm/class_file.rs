//! The binary class file handed from the assembler to the loader.
//!
//! Layout: the magic bytes `CTRC`, a little-endian `u16` version, then the
//! postcard-serialized [`ClassFile`] body.

use serde::{Deserialize, Serialize};

use super::error::AssemblyError;
use crate::types::Category;

pub const MAGIC: [u8; 4] = *b"CTRC";
pub const VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassFile {
    pub name: String,
    pub constants: Vec<PoolEntry>,
    pub methods: Vec<MethodInfo>,
}

/// One entry of the class-wide constant pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolEntry {
    Str(String),
    /// A host function, resolved by name and descriptor at load time.
    Native { name: String, descriptor: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    /// Signature descriptor, e.g. `(IJ)D`.
    pub descriptor: String,
    /// Operand stack size in slot units.
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// Debug names of local variables. Empty when compiled without debug info.
    pub locals: Vec<LocalVariableInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalVariableInfo {
    pub name: String,
    pub slot: u16,
    pub descriptor: String,
}

impl ClassFile {
    pub fn to_bytes(&self) -> Result<Vec<u8>, AssemblyError> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        postcard::to_extend(self, out).map_err(|e| AssemblyError::Malformed(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<ClassFile, AssemblyError> {
        if bytes.len() < HEADER_LEN || bytes[..MAGIC.len()] != MAGIC {
            return Err(AssemblyError::BadMagic);
        }
        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != VERSION {
            return Err(AssemblyError::UnsupportedVersion {
                found: version,
                expected: VERSION,
            });
        }
        postcard::from_bytes(&bytes[HEADER_LEN..]).map_err(|e| AssemblyError::Malformed(e.to_string()))
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Storage categories of a method descriptor: `(params, return)`, where a
/// `None` return is `void`.
pub fn parse_method_descriptor(descriptor: &str) -> Option<(Vec<Category>, Option<Category>)> {
    let rest = descriptor.strip_prefix('(')?;
    let (params, ret) = rest.split_once(')')?;

    let mut categories = Vec::new();
    let mut remaining = params;
    while !remaining.is_empty() {
        let (category, tail) = parse_field(remaining)?;
        categories.push(category);
        remaining = tail;
    }

    let ret = match ret {
        "V" => None,
        _ => match parse_field(ret)? {
            (category, "") => Some(category),
            _ => return None,
        },
    };
    Some((categories, ret))
}

/// Parse one field descriptor off the front of `s`.
fn parse_field(s: &str) -> Option<(Category, &str)> {
    let first = s.chars().next()?;
    let category = match first {
        'Z' | 'I' => Category::Int,
        'J' => Category::Long,
        'F' => Category::Float,
        'D' => Category::Double,
        'L' => {
            let mut depth = 0usize;
            for (i, c) in s.char_indices().skip(1) {
                match c {
                    '<' => depth += 1,
                    '>' => depth = depth.checked_sub(1)?,
                    ';' if depth == 0 => return Some((Category::Ref, &s[i + 1..])),
                    _ => {}
                }
            }
            return None;
        }
        _ => return None,
    };
    Some((category, &s[1..]))
}
