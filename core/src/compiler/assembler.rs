//! Assembly of compiled methods into a loadable class.

use std::sync::Arc;

use tracing::debug;

use super::assignment::check_definite_assignment;
use super::emitter::{BytecodeEmitter, ConstantPool, Emitter};
use super::error::CompileError;
use crate::api::{CompilationOptions, Error};
use crate::expr::{Expr, ExprInner};
use crate::scope::{CodeBlocks, LocalVariable, ScopeId};
use crate::types::{TypeDescriptor, TypeError, TypeRegistry};
use crate::vm::{ClassFile, Instruction, LoadedClass, Loader, LocalVariableInfo, MethodInfo};

/// A method of the class being assembled. Obtained from
/// [`ClassBuilder::declare_method`], usable in calls before the method is
/// defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodRef {
    index: u16,
    signature: &'static TypeDescriptor,
}

impl MethodRef {
    /// Position of the method in its class.
    pub fn index(&self) -> u16 {
        self.index
    }

    /// The interned `Method` signature type.
    pub fn signature(&self) -> &'static TypeDescriptor {
        self.signature
    }

    pub fn params(&self) -> &'static [&'static TypeDescriptor] {
        match self.signature {
            TypeDescriptor::Method { params, .. } => params,
            _ => &[],
        }
    }

    pub fn ret(&self) -> &'static TypeDescriptor {
        match self.signature {
            TypeDescriptor::Method { ret, .. } => ret,
            other => other,
        }
    }
}

struct MethodSlot {
    name: String,
    method: MethodRef,
    body: Option<MethodInfo>,
}

/// Builds one class: declares methods, compiles their bodies and packs
/// everything into a [`ClassFile`].
///
/// ```ignore
/// let mut class = ClassBuilder::new("Demo");
/// let square = class.declare_method("square", &[types.int()], types.int())?;
/// let frame = blocks.open_frame();
/// let x = blocks.declare(frame, "x", types.int())?;
/// class.define_method(square, &blocks, frame, &[b.mul(b.read(x), b.read(x))?])?;
/// let loaded = class.load(&loader)?;
/// ```
pub struct ClassBuilder {
    name: String,
    options: CompilationOptions,
    types: &'static TypeRegistry,
    pool: ConstantPool,
    methods: Vec<MethodSlot>,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, CompilationOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: CompilationOptions) -> Self {
        Self::with_registry(name, options, TypeRegistry::global())
    }

    /// A builder whose method signatures are interned in `types`. Trees
    /// compiled into this class must be built against the same registry
    /// (see [`ExprBuilder::with_registry`](crate::expr::ExprBuilder::with_registry)).
    pub fn with_registry(name: impl Into<String>, options: CompilationOptions, types: &'static TypeRegistry) -> Self {
        Self {
            name: name.into(),
            options,
            types,
            pool: ConstantPool::new(),
            methods: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn types(&self) -> &'static TypeRegistry {
        self.types
    }

    /// Declare a method. Declaring before defining lets bodies call methods
    /// that are defined later, including themselves.
    pub fn declare_method(
        &mut self,
        name: &str,
        params: &[&'static TypeDescriptor],
        ret: &'static TypeDescriptor,
    ) -> Result<MethodRef, CompileError> {
        if self.methods.iter().any(|m| m.name == name) {
            return Err(CompileError::DuplicateMethod { name: name.into() });
        }
        let signature = self.types.method(params, ret)?;
        let index = u16::try_from(self.methods.len()).map_err(|_| CompileError::TooManyMethods)?;
        let method = MethodRef { index, signature };
        self.methods.push(MethodSlot {
            name: name.into(),
            method,
            body: None,
        });
        Ok(method)
    }

    /// Compile the body of a declared method.
    ///
    /// The first variables declared in `frame` are the parameters, in order,
    /// and must match the declared signature. Statements are compiled for
    /// effect, except a final statement whose type is the return type: its
    /// value is returned. A void method returns after its last statement;
    /// any other method must end with an explicit return.
    pub fn define_method(
        &mut self,
        method: MethodRef,
        blocks: &CodeBlocks,
        frame: ScopeId,
        statements: &[&Expr<'_>],
    ) -> Result<(), CompileError> {
        let slot = self
            .methods
            .get(method.index() as usize)
            .filter(|slot| slot.method == method)
            .ok_or_else(|| CompileError::UndefinedMethod {
                name: format!("#{}", method.index()),
            })?;
        let name = slot.name.clone();
        if slot.body.is_some() {
            return Err(CompileError::MethodAlreadyDefined { name });
        }

        let params = check_parameters(method, blocks, frame)?;
        let ret = method.ret();
        for statement in statements {
            check_returns(statement, ret, self.types)?;
        }
        check_definite_assignment(blocks, &params, statements)?;

        let mut emitter = BytecodeEmitter::new(&mut self.pool);
        let returns_last = ret.is_value()
            && statements
                .last()
                .is_some_and(|last| last.result_type().same(ret));
        for (i, statement) in statements.iter().enumerate() {
            let is_last = i + 1 == statements.len();
            statement.compile(&mut emitter, is_last && returns_last)?;
        }
        if emitter.depth().is_some() {
            match ret.category() {
                Some(category) if returns_last => emitter.emit(Instruction::Return(category)),
                Some(_) => return Err(CompileError::MissingReturn { name }),
                None => emitter.emit(Instruction::ReturnVoid),
            }
        }
        let (code, max_stack) = emitter.finish()?;

        let max_locals = blocks.frame_size(frame).ok_or(CompileError::ScopeState {
            scope: frame,
            state: super::ScopeState::Unknown,
        })?;
        let locals = if self.options.debug_info {
            blocks
                .frame_variables(frame)
                .map(|(name, var)| LocalVariableInfo {
                    name: name.to_string(),
                    slot: var.slot(),
                    descriptor: var.ty().descriptor(),
                })
                .collect()
        } else {
            Vec::new()
        };

        debug!(
            class = %self.name,
            method = %name,
            signature = %method.signature(),
            code_len = code.len(),
            max_stack,
            max_locals,
            "Compiled method"
        );

        self.methods[method.index() as usize].body = Some(MethodInfo {
            name,
            descriptor: method.signature().descriptor(),
            max_stack,
            max_locals,
            code,
            locals,
        });
        Ok(())
    }

    /// Pack all methods into a class file. Every declared method must have
    /// been defined.
    pub fn assemble(self) -> Result<ClassFile, CompileError> {
        let mut methods = Vec::with_capacity(self.methods.len());
        for slot in self.methods {
            match slot.body {
                Some(body) => methods.push(body),
                None => return Err(CompileError::UndefinedMethod { name: slot.name }),
            }
        }
        debug!(
            class = %self.name,
            methods = methods.len(),
            constants = self.pool.len(),
            "Assembled class"
        );
        Ok(ClassFile {
            name: self.name,
            constants: self.pool.into_entries(),
            methods,
        })
    }

    /// Assemble, serialize and define the class in `loader`.
    pub fn load(self, loader: &Loader) -> Result<Arc<LoadedClass>, Error> {
        let bytes = self.assemble()?.to_bytes()?;
        Ok(loader.define_class(&bytes)?)
    }
}

/// The variables bound to `method`'s parameters, checked against its signature.
pub(crate) fn check_parameters(
    method: MethodRef,
    blocks: &CodeBlocks,
    frame: ScopeId,
) -> Result<Vec<LocalVariable>, CompileError> {
    let params = method.params();
    let declared: Vec<_> = blocks.variables(frame).take(params.len()).collect();
    if declared.len() < params.len() {
        return Err(TypeError::ArgumentCount {
            expected: params.len(),
            found: declared.len(),
        }
        .into());
    }
    for (param, var) in params.iter().zip(&declared) {
        if !var.ty().same(param) {
            return Err(TypeError::Mismatch {
                expected: *param,
                found: var.ty(),
            }
            .into());
        }
    }
    Ok(declared)
}

/// Check every `Return` in `expr` against the method's return type.
fn check_returns(
    expr: &Expr<'_>,
    ret: &'static TypeDescriptor,
    types: &'static TypeRegistry,
) -> Result<(), CompileError> {
    match expr.inner() {
        ExprInner::Return { value } => {
            let found = value.map_or(types.void(), |v| v.result_type());
            if !found.same(ret) {
                return Err(TypeError::Mismatch { expected: ret, found }.into());
            }
            if let Some(value) = value {
                check_returns(value, ret, types)?;
            }
        }
        ExprInner::Constant(_) | ExprInner::Read(_) => {}
        ExprInner::Write { value, .. } => check_returns(value, ret, types)?,
        ExprInner::Binary { left, right, .. }
        | ExprInner::Compare { left, right, .. }
        | ExprInner::Logical { left, right, .. } => {
            check_returns(left, ret, types)?;
            check_returns(right, ret, types)?;
        }
        ExprInner::Unary { operand, .. } | ExprInner::Convert { operand } => check_returns(operand, ret, types)?,
        ExprInner::Invoke { args, .. } => {
            for arg in args.iter() {
                check_returns(arg, ret, types)?;
            }
        }
        ExprInner::If {
            cond,
            then_branch,
            else_branch,
        } => {
            check_returns(cond, ret, types)?;
            check_returns(then_branch, ret, types)?;
            if let Some(else_branch) = else_branch {
                check_returns(else_branch, ret, types)?;
            }
        }
        ExprInner::While { cond, body } => {
            check_returns(cond, ret, types)?;
            check_returns(body, ret, types)?;
        }
        ExprInner::Block { statements, .. } => {
            for statement in statements.iter() {
                check_returns(statement, ret, types)?;
            }
        }
    }
    Ok(())
}
