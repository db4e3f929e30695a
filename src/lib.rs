//! codetree - typed expression trees compiled to stack-machine bytecode
//!
//! # Overview
//!
//! A front end builds typed expression trees programmatically. Each node is
//! type checked as it is constructed; a finished tree compiles to bytecode
//! for an embedded stack machine, is packed into a class file, and is
//! verified and defined by a loader that returns callable method handles.
//!
//! # Quick Start
//!
//! ```
//! use codetree::{Bump, CodeBlocks, Engine, EngineOptions, ExprBuilder, Value};
//!
//! # fn main() -> Result<(), codetree::Error> {
//! let engine = Engine::new(EngineOptions::default(), |_, _| {});
//! let types = engine.types();
//!
//! let arena = Bump::new();
//! let b = ExprBuilder::new(&arena);
//! let mut blocks = CodeBlocks::new();
//!
//! // long area(long w, long h) { w * h }
//! let mut class = engine.class_builder("Shapes");
//! let area = class.declare_method("area", &[types.long(), types.long()], types.long())?;
//! let frame = blocks.open_frame();
//! let w = blocks.declare(frame, "w", types.long())?;
//! let h = blocks.declare(frame, "h", types.long())?;
//! class.define_method(area, &blocks, frame, &[b.mul(b.read(w), b.read(h))?])?;
//!
//! let shapes = engine.load(class)?;
//! let result = shapes.method("area").unwrap().invoke(&[Value::Long(6), Value::Long(7)])?;
//! assert_eq!(result, Some(Value::Long(42)));
//! # Ok(())
//! # }
//! ```
//!
//! # Native Functions
//!
//! Host functions are registered when the engine is created and linked by
//! name and signature when a class that calls them is defined:
//!
//! ```
//! use codetree::{Engine, EngineOptions, Value};
//!
//! let engine = Engine::new(EngineOptions::default(), |types, env| {
//!     let signature = types.method(&[types.int(), types.int()], types.int()).unwrap();
//!     env.register_fn("max", signature, |args| {
//!         let (a, b) = (args[0].as_int().unwrap_or(0), args[1].as_int().unwrap_or(0));
//!         Ok(Some(Value::Int(a.max(b))))
//!     })
//!     .unwrap();
//! });
//! ```

// Re-export public API from codetree_core
pub use codetree_core::api::{
    CompilationOptions, Engine, EngineOptions, EnvironmentBuilder, Error, ExecutionOptions, LoaderOptions,
};

pub use codetree_core::compiler::{self, ClassBuilder, CompileError, MethodRef};
pub use codetree_core::evaluator::{self, Evaluator};
pub use codetree_core::expr::{self, Expr, ExprBuilder};
pub use codetree_core::scope::{self, CodeBlocks, LocalVariable, ScopeId};
pub use codetree_core::types::{self, Category, TypeDescriptor, TypeError, TypeRegistry};
pub use codetree_core::vm::{
    self, AssemblyError, ExecutionError, LoadedClass, Loader, MethodHandle, NativeFunction, Value,
};

/// Arena the expression trees are allocated in.
pub use bumpalo::Bump;
