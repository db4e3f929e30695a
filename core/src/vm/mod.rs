//! The host runtime: class files, loader, verifier and interpreter.

mod class_file;
mod code;
mod error;
mod instruction_set;
mod loader;
mod operators;
mod runtime;
mod stack;
mod value;
mod verifier;


pub(crate) use operators::{arith, compare, convert, negate};

pub use class_file::{ClassFile, LocalVariableInfo, MAGIC, MethodInfo, PoolEntry, VERSION, parse_method_descriptor};
pub use code::{Listing, disassemble};
pub use error::{AssemblyError, ExecutionError};
pub use instruction_set::{DecodeError, DecodeErrorKind, Instruction, JUMP_SIZE};
pub use loader::{LoadedClass, Loader, MethodHandle, NativeFunction};
pub use value::{Object, Value};
