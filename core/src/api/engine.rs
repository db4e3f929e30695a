//! The engine: one loader plus the options and natives it was built with.

use std::sync::Arc;

use tracing::debug;

use super::{EngineOptions, EnvironmentBuilder, Error};
use crate::compiler::ClassBuilder;
use crate::evaluator::Evaluator;
use crate::types::TypeRegistry;
use crate::vm::{LoadedClass, Loader, NativeFunction};

/// Entry point for compiling and running expression trees.
///
/// The engine manages:
/// - The type registry trees are built against
/// - The native functions available to generated code
/// - A [`Loader`] holding every class defined so far
///
/// # Example
///
/// ```
/// use codetree_core::api::{Engine, EngineOptions};
/// use codetree_core::vm::Value;
///
/// let engine = Engine::new(EngineOptions::default(), |types, env| {
///     let signature = types.method(&[types.long()], types.long()).unwrap();
///     env.register_fn("inc", signature, |args| {
///         Ok(Some(Value::Long(args[0].as_long().unwrap_or(0).wrapping_add(1))))
///     })
///     .unwrap();
/// });
/// assert!(engine.natives().any(|(name, _)| name == "inc"));
/// ```
pub struct Engine {
    loader: Loader,
    natives: Vec<(String, NativeFunction)>,
    options: EngineOptions,
}

impl Engine {
    /// Create an engine. `init` registers the native functions.
    pub fn new(options: EngineOptions, init: impl FnOnce(&'static TypeRegistry, &mut EnvironmentBuilder)) -> Self {
        let mut env = EnvironmentBuilder::new();
        init(TypeRegistry::global(), &mut env);
        let natives = env.build();

        let loader = Loader::new(options.loader_options.clone());
        for (name, native) in &natives {
            loader.register_native(name.as_str(), native.clone());
        }
        debug!(natives = natives.len(), verify = options.loader_options.verify, "Created engine");

        Self {
            loader,
            natives,
            options,
        }
    }

    /// The registry types are interned in.
    pub fn types(&self) -> &'static TypeRegistry {
        TypeRegistry::global()
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Registered natives, sorted by name.
    pub fn natives(&self) -> impl Iterator<Item = (&str, &NativeFunction)> {
        self.natives.iter().map(|(name, native)| (name.as_str(), native))
    }

    /// A class builder using the engine's default compilation options.
    pub fn class_builder(&self, name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::with_options(name, self.options.default_compilation_options.clone())
    }

    /// Assemble `class` and define it in the engine's loader.
    pub fn load(&self, class: ClassBuilder) -> Result<Arc<LoadedClass>, Error> {
        class.load(&self.loader)
    }

    /// A reference evaluator with the same natives and limits as loaded code.
    pub fn evaluator<'a>(&self) -> Evaluator<'a> {
        let mut evaluator = Evaluator::new(self.options.loader_options.execution.clone());
        for (name, native) in &self.natives {
            evaluator.register_native(name.as_str(), native.clone());
        }
        evaluator
    }
}
