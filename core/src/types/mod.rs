//! Reified type descriptors and the process-wide type registry.

mod registry;
mod types;


pub use registry::TypeRegistry;
pub use types::{Category, Nominal, TypeDescriptor, TypeError};

/// Reify `nominal` (with an optional generic argument) in the global registry.
pub fn describe(
    nominal: Nominal<'_>,
    argument: Option<&'static TypeDescriptor>,
) -> Result<&'static TypeDescriptor, TypeError> {
    TypeRegistry::global().describe(nominal, argument)
}
