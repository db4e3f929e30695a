//! Public API: configuration, the [`Engine`] and the joined [`Error`] type.
//!
//! # Example
//!
//! ```
//! use bumpalo::Bump;
//! use codetree_core::api::{Engine, EngineOptions};
//! use codetree_core::expr::ExprBuilder;
//! use codetree_core::scope::CodeBlocks;
//! use codetree_core::vm::Value;
//!
//! # fn main() -> Result<(), codetree_core::api::Error> {
//! let engine = Engine::new(EngineOptions::default(), |_, _| {});
//! let types = engine.types();
//! let arena = Bump::new();
//! let b = ExprBuilder::new(&arena);
//! let mut blocks = CodeBlocks::new();
//!
//! let mut class = engine.class_builder("Demo");
//! let double = class.declare_method("double", &[types.int()], types.int())?;
//! let frame = blocks.open_frame();
//! let x = blocks.declare(frame, "x", types.int())?;
//! class.define_method(double, &blocks, frame, &[b.add(b.read(x), b.read(x))?])?;
//!
//! let loaded = engine.load(class)?;
//! let result = loaded.method("double").unwrap().invoke(&[Value::Int(21)])?;
//! assert_eq!(result, Some(Value::Int(42)));
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod environment;
pub mod error;
pub mod options;

pub use engine::Engine;
pub use environment::EnvironmentBuilder;
pub use error::Error;
pub use options::{CompilationOptions, EngineOptions, ExecutionOptions, LoaderOptions};
