use core::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Reified static type of a value, interned by [`TypeRegistry`].
///
/// Descriptors are only ever handed out as `&'static TypeDescriptor` by the
/// registry, so two descriptors denote the same type iff they are the same
/// pointer. [`TypeDescriptor::same`] performs that check.
///
/// [`TypeRegistry`]: super::TypeRegistry
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum TypeDescriptor {
    Void,
    Bool,
    Int,
    Long,
    Float,
    Double,

    /// A named reference type, optionally instantiated with a generic argument.
    Object {
        class: &'static str,
        argument: Option<&'static TypeDescriptor>,
    },

    /// Signature of a method or native function.
    Method {
        params: &'static [&'static TypeDescriptor],
        ret: &'static TypeDescriptor,
    },
}

impl TypeDescriptor {
    /// Pointer equality, which is type equality for interned descriptors.
    #[inline]
    pub fn same(&self, other: &TypeDescriptor) -> bool {
        core::ptr::eq(self, other)
    }

    /// Storage category, or `None` for types that never live in a slot.
    pub fn category(&self) -> Option<Category> {
        match self {
            TypeDescriptor::Bool | TypeDescriptor::Int => Some(Category::Int),
            TypeDescriptor::Long => Some(Category::Long),
            TypeDescriptor::Float => Some(Category::Float),
            TypeDescriptor::Double => Some(Category::Double),
            TypeDescriptor::Object { .. } => Some(Category::Ref),
            TypeDescriptor::Void | TypeDescriptor::Method { .. } => None,
        }
    }

    /// Number of slots (and operand stack units) a value of this type takes.
    pub fn width(&self) -> u16 {
        self.category().map_or(0, Category::width)
    }

    pub fn is_value(&self) -> bool {
        self.category().is_some()
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            TypeDescriptor::Int
                | TypeDescriptor::Long
                | TypeDescriptor::Float
                | TypeDescriptor::Double
        )
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypeDescriptor::Object { .. })
    }

    /// Textual descriptor used in class files, e.g. `(IJ)D` or `LList<I>;`.
    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            TypeDescriptor::Void => out.push('V'),
            TypeDescriptor::Bool => out.push('Z'),
            TypeDescriptor::Int => out.push('I'),
            TypeDescriptor::Long => out.push('J'),
            TypeDescriptor::Float => out.push('F'),
            TypeDescriptor::Double => out.push('D'),
            TypeDescriptor::Object { class, argument } => {
                out.push('L');
                out.push_str(class);
                if let Some(argument) = argument {
                    out.push('<');
                    argument.write_descriptor(out);
                    out.push('>');
                }
                out.push(';');
            }
            TypeDescriptor::Method { params, ret } => {
                out.push('(');
                for param in params.iter() {
                    param.write_descriptor(out);
                }
                out.push(')');
                ret.write_descriptor(out);
            }
        }
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDescriptor::Void => write!(f, "Void"),
            TypeDescriptor::Bool => write!(f, "Bool"),
            TypeDescriptor::Int => write!(f, "Int"),
            TypeDescriptor::Long => write!(f, "Long"),
            TypeDescriptor::Float => write!(f, "Float"),
            TypeDescriptor::Double => write!(f, "Double"),
            TypeDescriptor::Object {
                class,
                argument: None,
            } => write!(f, "{}", class),
            TypeDescriptor::Object {
                class,
                argument: Some(argument),
            } => write!(f, "{}<{}>", class, argument),
            TypeDescriptor::Method { params, ret } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", params.join(", "), ret)
            }
        }
    }
}

/// Storage category of a value: selects opcodes and decides slot width.
///
/// `Long` and `Double` are wide: they take two local slots and two operand
/// stack units. Loading a wide slot with a single-width instruction (or the
/// other way around) is rejected by the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    Int = 0,
    Long = 1,
    Float = 2,
    Double = 3,
    Ref = 4,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Int,
        Category::Long,
        Category::Float,
        Category::Double,
        Category::Ref,
    ];

    #[inline]
    pub const fn width(self) -> u16 {
        match self {
            Category::Long | Category::Double => 2,
            _ => 1,
        }
    }

    #[inline]
    pub const fn is_wide(self) -> bool {
        self.width() == 2
    }

    pub const fn is_numeric(self) -> bool {
        !matches!(self, Category::Ref)
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Category> {
        Category::ALL.get(index as usize).copied()
    }

    /// One-letter prefix used in listings (`iload`, `lstore`, ...).
    pub const fn prefix(self) -> char {
        match self {
            Category::Int => 'i',
            Category::Long => 'l',
            Category::Float => 'f',
            Category::Double => 'd',
            Category::Ref => 'a',
        }
    }
}

/// Caller-constructed type tag naming a nominal type.
///
/// This is the explicit stand-in for reflecting over a generic parameter:
/// front ends build the tag while assembling a tree and ask the registry to
/// reify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nominal<'n> {
    Void,
    Bool,
    Int,
    Long,
    Float,
    Double,
    Class(&'n str),
}

/// Construction-time type errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TypeError {
    #[error("type `{ty}` does not take a generic argument")]
    NotGeneric { ty: String },

    #[error("`{argument}` cannot be used as a generic argument")]
    InvalidArgument { argument: String },

    #[error("`{class}` cannot be instantiated with itself as argument")]
    SelfReferential { class: String },

    #[error("class name must not be empty")]
    EmptyClassName,

    #[error("expected `{expected}`, found `{found}`")]
    Mismatch {
        expected: &'static TypeDescriptor,
        found: &'static TypeDescriptor,
    },

    #[error("expected a numeric type, found `{found}`")]
    NotNumeric { found: &'static TypeDescriptor },

    #[error("expected `Bool`, found `{found}`")]
    NotBoolean { found: &'static TypeDescriptor },

    #[error("`{found}` does not produce a value")]
    NotAValue { found: &'static TypeDescriptor },

    #[error("`{found}` is not a method signature")]
    NotAMethod { found: &'static TypeDescriptor },

    #[error("operator `{op}` is not supported for `{ty}`")]
    UnsupportedOperator {
        op: &'static str,
        ty: &'static TypeDescriptor,
    },

    #[error("expected {expected} argument(s), found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("cannot convert `{from}` to `{to}`")]
    InvalidConversion {
        from: &'static TypeDescriptor,
        to: &'static TypeDescriptor,
    },

    #[error("`{ty}` is not a reference type")]
    NotReference { ty: &'static TypeDescriptor },
}
