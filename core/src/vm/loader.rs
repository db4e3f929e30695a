//! Class definition: decoding, linking and verification.

use core::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::class_file::{ClassFile, PoolEntry, parse_method_descriptor};
use super::code::Listing;
use super::error::{AssemblyError, ExecutionError};
use super::instruction_set::Instruction;
use super::runtime::Interpreter;
use super::value::{Object, Value};
use super::verifier;
use crate::api::{ExecutionOptions, LoaderOptions};
use crate::types::{Category, TypeDescriptor, TypeError};

type NativeFn = dyn Fn(&[Value]) -> Result<Option<Value>, ExecutionError> + Send + Sync;

/// A host function callable from generated code.
///
/// Linked by name and signature descriptor when a class referring to it is
/// defined.
#[derive(Clone)]
pub struct NativeFunction {
    signature: &'static TypeDescriptor,
    params: Vec<Category>,
    ret: Option<Category>,
    func: Arc<NativeFn>,
}

impl NativeFunction {
    /// `signature` must be a `Method` type. The function receives its
    /// arguments in declaration order and returns `None` only for `Void`.
    pub fn new<F>(signature: &'static TypeDescriptor, func: F) -> Result<Self, TypeError>
    where
        F: Fn(&[Value]) -> Result<Option<Value>, ExecutionError> + Send + Sync + 'static,
    {
        let TypeDescriptor::Method { params, ret } = signature else {
            return Err(TypeError::NotAMethod { found: signature });
        };
        Ok(Self {
            signature,
            params: params.iter().filter_map(|p| p.category()).collect(),
            ret: ret.category(),
            func: Arc::new(func),
        })
    }

    pub fn signature(&self) -> &'static TypeDescriptor {
        self.signature
    }

    pub(crate) fn params(&self) -> &[Category] {
        &self.params
    }

    pub(crate) fn ret(&self) -> Option<Category> {
        self.ret
    }

    /// Call the function, checking the categories of what it returns.
    pub fn call(&self, args: &[Value]) -> Result<Option<Value>, ExecutionError> {
        let result = (self.func)(args)?;
        let found = result.as_ref().map(Value::category);
        if found != self.ret {
            return Err(ExecutionError::Native(format!(
                "returned {:?} where {} was expected",
                result,
                self.signature
            )));
        }
        Ok(result)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("signature", &format_args!("{}", self.signature))
            .finish_non_exhaustive()
    }
}

/// A decoded instruction with its byte offset and, for jumps, the index of
/// the target instruction.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Op {
    pub instruction: Instruction,
    pub offset: usize,
    pub target: usize,
}

#[derive(Debug)]
pub(crate) struct LoadedMethod {
    pub name: String,
    pub descriptor: String,
    pub params: Vec<Category>,
    pub ret: Option<Category>,
    pub max_stack: u16,
    pub max_locals: u16,
    pub ops: Vec<Op>,
}

#[derive(Debug)]
pub(crate) enum LinkedConstant {
    Str(Arc<Object>),
    Native(NativeFunction),
}

/// A defined class. Immutable, and safe to call into from many threads.
#[derive(Debug)]
pub struct LoadedClass {
    name: String,
    pub(crate) methods: Vec<LoadedMethod>,
    pub(crate) constants: Vec<LinkedConstant>,
    pub(crate) execution: ExecutionOptions,
}

static_assertions::assert_impl_all!(LoadedClass: Send, Sync);
static_assertions::assert_impl_all!(MethodHandle: Send, Sync);

impl LoadedClass {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the method called `name`.
    pub fn method(self: &Arc<Self>, name: &str) -> Option<MethodHandle> {
        let index = self.methods.iter().position(|m| m.name == name)?;
        Some(MethodHandle {
            class: Arc::clone(self),
            index,
        })
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|m| m.name.as_str())
    }
}

/// A callable method of a loaded class.
#[derive(Debug, Clone)]
pub struct MethodHandle {
    class: Arc<LoadedClass>,
    index: usize,
}

impl MethodHandle {
    pub fn name(&self) -> &str {
        &self.class.methods[self.index].name
    }

    /// Signature descriptor, e.g. `(IJ)D`.
    pub fn descriptor(&self) -> &str {
        &self.class.methods[self.index].descriptor
    }

    pub fn class(&self) -> &Arc<LoadedClass> {
        &self.class
    }

    /// Call the method with the loader's execution limits.
    pub fn invoke(&self, args: &[Value]) -> Result<Option<Value>, ExecutionError> {
        self.invoke_with(args, &self.class.execution)
    }

    pub fn invoke_with(&self, args: &[Value], options: &ExecutionOptions) -> Result<Option<Value>, ExecutionError> {
        let method = &self.class.methods[self.index];
        let found: Vec<Category> = args.iter().map(Value::category).collect();
        if found != method.params {
            return Err(ExecutionError::BadArguments {
                expected: method.descriptor.clone(),
                found: format!("{:?}", found),
            });
        }
        Interpreter::new(&self.class, options).call(self.index, args.to_vec(), 1)
    }
}

/// Defines classes from class file bytes.
///
/// Natives must be registered before a class that uses them is defined.
pub struct Loader {
    options: LoaderOptions,
    natives: RwLock<HashMap<String, NativeFunction>>,
    classes: RwLock<HashMap<String, Arc<LoadedClass>>>,
}

impl Loader {
    pub fn new(options: LoaderOptions) -> Self {
        Self {
            options,
            natives: RwLock::new(HashMap::new()),
            classes: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Register a host function under `name`, returning the one it replaces.
    pub fn register_native(&self, name: impl Into<String>, native: NativeFunction) -> Option<NativeFunction> {
        self.natives.write().insert(name.into(), native)
    }

    pub fn class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.classes.read().get(name).cloned()
    }

    /// Decode, link and verify a class, then make it available.
    pub fn define_class(&self, bytes: &[u8]) -> Result<Arc<LoadedClass>, AssemblyError> {
        let file = ClassFile::from_bytes(bytes)?;
        if self.classes.read().contains_key(&file.name) {
            return Err(AssemblyError::DuplicateClass { name: file.name });
        }

        let constants = self.link_constants(&file)?;
        let methods = file
            .methods
            .iter()
            .map(decode_method)
            .collect::<Result<Vec<_>, _>>()?;

        for info in &file.methods {
            trace!(class = %file.name, "{}", Listing(info));
        }
        if self.options.verify {
            for method in &methods {
                verifier::verify(method, &methods, &constants)?;
            }
        }

        let class = Arc::new(LoadedClass {
            name: file.name,
            methods,
            constants,
            execution: self.options.execution.clone(),
        });

        let mut classes = self.classes.write();
        if classes.contains_key(&class.name) {
            return Err(AssemblyError::DuplicateClass {
                name: class.name.clone(),
            });
        }
        classes.insert(class.name.clone(), Arc::clone(&class));
        debug!(
            class = %class.name,
            methods = class.methods.len(),
            verified = self.options.verify,
            "Defined class"
        );
        Ok(class)
    }

    fn link_constants(&self, file: &ClassFile) -> Result<Vec<LinkedConstant>, AssemblyError> {
        let natives = self.natives.read();
        file.constants
            .iter()
            .map(|entry| match entry {
                PoolEntry::Str(s) => Ok(LinkedConstant::Str(Arc::new(Object::Str(s.clone())))),
                PoolEntry::Native { name, descriptor } => natives
                    .get(name)
                    .filter(|native| native.signature.descriptor() == *descriptor)
                    .map(|native| LinkedConstant::Native(native.clone()))
                    .ok_or_else(|| AssemblyError::UnresolvedNative {
                        name: name.clone(),
                        descriptor: descriptor.clone(),
                    }),
            })
            .collect()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(LoaderOptions::default())
    }
}

fn decode_method(info: &super::class_file::MethodInfo) -> Result<LoadedMethod, AssemblyError> {
    let (params, ret) = parse_method_descriptor(&info.descriptor).ok_or_else(|| {
        AssemblyError::Malformed(format!(
            "method `{}` has invalid descriptor `{}`",
            info.name, info.descriptor
        ))
    })?;

    let mut ops = Vec::new();
    let mut index_at = HashMap::new();
    let mut pc = 0;
    while pc < info.code.len() {
        let (instruction, len) = Instruction::decode(&info.code, pc).map_err(|source| AssemblyError::Decode {
            method: info.name.clone(),
            source,
        })?;
        index_at.insert(pc, ops.len());
        ops.push(Op {
            instruction,
            offset: pc,
            target: 0,
        });
        pc += len;
    }

    for op in &mut ops {
        if let Some(relative) = op.instruction.jump_offset() {
            let target = op.offset as isize + relative as isize;
            op.target = usize::try_from(target)
                .ok()
                .and_then(|target| index_at.get(&target).copied())
                .ok_or_else(|| AssemblyError::Verify {
                    method: info.name.clone(),
                    offset: op.offset,
                    reason: format!("jump to {} is not the start of an instruction", target),
                })?;
        }
    }

    Ok(LoadedMethod {
        name: info.name.clone(),
        descriptor: info.descriptor.clone(),
        params,
        ret,
        max_stack: info.max_stack,
        max_locals: info.max_locals,
        ops,
    })
}
