//! Configuration options for compiling, loading and running code.

/// Configuration options for compilation.
///
/// # Example
///
/// ```
/// use codetree_core::api::CompilationOptions;
///
/// let options = CompilationOptions { debug_info: false };
/// ```
#[derive(Debug, Clone)]
pub struct CompilationOptions {
    /// Record local variable names and slots in each compiled method.
    ///
    /// Default: true
    pub debug_info: bool,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        Self { debug_info: true }
    }
}

/// Resource limits for running loaded code.
///
/// # Example
///
/// ```
/// use codetree_core::api::ExecutionOptions;
///
/// let options = ExecutionOptions {
///     max_depth: 500,
///     max_steps: Some(10_000),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum call depth (for recursion protection).
    ///
    /// Default: 1000
    pub max_depth: usize,

    /// Maximum number of instructions (or tree nodes, for the evaluator)
    /// executed by one top-level call.
    ///
    /// Set to `None` for no limit (be careful with untrusted definitions!).
    ///
    /// Default: None
    pub max_steps: Option<usize>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            max_depth: 1000,
            max_steps: None,
        }
    }
}

/// Configuration options for the class loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Verify every method before it becomes callable. Turning this off is
    /// only sound for class files produced by this crate's assembler.
    ///
    /// Default: true
    pub verify: bool,

    /// Limits applied to every call into classes defined by the loader.
    pub execution: ExecutionOptions,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            verify: true,
            execution: ExecutionOptions::default(),
        }
    }
}

/// Configuration options for the [`Engine`](super::Engine).
///
/// # Example
///
/// ```
/// use codetree_core::api::{CompilationOptions, EngineOptions, LoaderOptions};
///
/// let options = EngineOptions {
///     default_compilation_options: CompilationOptions { debug_info: false },
///     loader_options: LoaderOptions::default(),
/// };
/// ```
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Options handed to every [`ClassBuilder`](crate::compiler::ClassBuilder)
    /// the engine creates.
    pub default_compilation_options: CompilationOptions,

    pub loader_options: LoaderOptions,
}
