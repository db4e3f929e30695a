//! Typed expression trees compiled to stack-machine bytecode.
//!
//! A front end builds trees through [`expr::ExprBuilder`], resolving names
//! against [`scope::CodeBlocks`]. [`compiler::ClassBuilder`] compiles method
//! bodies into a class file, and a [`vm::Loader`] verifies it and returns
//! callable handles. [`evaluator`] interprets the same trees directly.

pub mod api;
pub mod compiler;
pub mod evaluator;
pub mod expr;
pub mod scope;
pub mod types;
pub mod vm;

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with DEBUG level
    /// Call this at the start of tests where you want to see logging output
    ///
    /// # Example
    /// ```ignore
    /// #[test]
    /// fn test_verifier() {
    ///     test_utils::init_test_logging();
    ///     // ... your test code
    /// }
    /// ```
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
            .with_test_writer()
            .try_init();
    }
}
