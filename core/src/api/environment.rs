//! Environment builder for registering host functions.

use crate::types::{TypeDescriptor, TypeError};
use crate::vm::{ExecutionError, NativeFunction, Value};

/// Collects the native functions an [`Engine`](super::Engine) makes
/// available to generated code.
///
/// # Example
///
/// ```
/// use codetree_core::api::{Engine, EngineOptions};
/// use codetree_core::vm::Value;
///
/// let engine = Engine::new(EngineOptions::default(), |types, env| {
///     let signature = types.method(&[types.int()], types.int()).unwrap();
///     env.register_fn("abs", signature, |args| {
///         Ok(Some(Value::Int(args[0].as_int().unwrap_or(0).wrapping_abs())))
///     })
///     .unwrap();
/// });
/// assert_eq!(engine.natives().count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct EnvironmentBuilder {
    entries: Vec<(String, NativeFunction)>,
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a native function. A later registration under the same name
    /// replaces an earlier one.
    pub fn register(&mut self, name: &str, native: NativeFunction) {
        self.entries.retain(|(existing, _)| existing != name);
        self.entries.push((name.to_string(), native));
    }

    /// Register a closure as a native function with the given `Method`
    /// signature.
    pub fn register_fn<F>(&mut self, name: &str, signature: &'static TypeDescriptor, func: F) -> Result<(), TypeError>
    where
        F: Fn(&[Value]) -> Result<Option<Value>, ExecutionError> + Send + Sync + 'static,
    {
        self.register(name, NativeFunction::new(signature, func)?);
        Ok(())
    }

    /// Entries sorted by name.
    pub(crate) fn build(mut self) -> Vec<(String, NativeFunction)> {
        self.entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        self.entries
    }
}
