use core::fmt;
use std::sync::Arc;

use crate::types::Category;

/// A run-time value.
///
/// `Bool` is carried as `Int` 0 / 1, mirroring its storage category.
#[derive(Clone)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Ref(Option<Arc<Object>>),
}

/// Heap objects reachable through [`Value::Ref`].
#[derive(Debug, PartialEq)]
pub enum Object {
    Str(String),
    List(Vec<Value>),
}

impl Value {
    pub fn bool(b: bool) -> Self {
        Value::Int(b as i32)
    }

    pub fn null() -> Self {
        Value::Ref(None)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Ref(Some(Arc::new(Object::Str(s.into()))))
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::Ref(Some(Arc::new(Object::List(items))))
    }

    pub fn category(&self) -> Category {
        match self {
            Value::Int(_) => Category::Int,
            Value::Long(_) => Category::Long,
            Value::Float(_) => Category::Float,
            Value::Double(_) => Category::Double,
            Value::Ref(_) => Category::Ref,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match *self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match *self {
            Value::Long(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            Value::Float(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match *self {
            Value::Double(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_int().map(|i| i != 0)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Ref(Some(object)) => match &**object {
                Object::Str(s) => Some(s),
                Object::List(_) => None,
            },
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Ref(object) => object.as_ref(),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Ref(None))
    }
}

/// Numbers compare by value (floats bitwise, so `NaN == NaN` and
/// `0.0 != -0.0`); references compare by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Ref(a), Value::Ref(b)) => ref_eq(a, b),
            _ => false,
        }
    }
}

pub(crate) fn ref_eq(a: &Option<Arc<Object>>, b: &Option<Arc<Object>>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        _ => false,
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Long(l) => write!(f, "{}L", l),
            Value::Float(x) => write!(f, "{:?}f", x),
            Value::Double(x) => write!(f, "{:?}", x),
            Value::Ref(None) => write!(f, "null"),
            Value::Ref(Some(object)) => match &**object {
                Object::Str(s) => write!(f, "{:?}", s),
                Object::List(items) => f.debug_list().entries(items).finish(),
            },
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f32> for Value {
    fn from(x: f32) -> Self {
        Value::Float(x)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Double(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}
