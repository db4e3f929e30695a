use hashbrown::{HashMap, HashSet};
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::types::{Nominal, TypeDescriptor, TypeError};

static VOID: TypeDescriptor = TypeDescriptor::Void;
static BOOL: TypeDescriptor = TypeDescriptor::Bool;
static INT: TypeDescriptor = TypeDescriptor::Int;
static LONG: TypeDescriptor = TypeDescriptor::Long;
static FLOAT: TypeDescriptor = TypeDescriptor::Float;
static DOUBLE: TypeDescriptor = TypeDescriptor::Double;

static GLOBAL: Lazy<TypeRegistry> = Lazy::new(TypeRegistry::new);

type ObjectKey = (&'static str, Option<&'static TypeDescriptor>);
type MethodKey = (Vec<&'static TypeDescriptor>, &'static TypeDescriptor);

/// Interning table for [`TypeDescriptor`]s.
///
/// Interned descriptors are leaked and live for the rest of the process; the
/// number of distinct types used across all compiled trees bounds the
/// growth. Lookups take a read lock, misses upgrade to the write lock and
/// re-check before inserting, so concurrent `describe` calls are safe.
pub struct TypeRegistry {
    class_names: RwLock<HashSet<&'static str>>,
    objects: RwLock<HashMap<ObjectKey, &'static TypeDescriptor>>,
    methods: RwLock<HashMap<MethodKey, &'static TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            class_names: RwLock::new(HashSet::new()),
            objects: RwLock::new(HashMap::new()),
            methods: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static TypeRegistry {
        &GLOBAL
    }

    /// Reify a nominal type, optionally instantiated with a generic argument.
    pub fn describe(
        &self,
        nominal: Nominal<'_>,
        argument: Option<&'static TypeDescriptor>,
    ) -> Result<&'static TypeDescriptor, TypeError> {
        let primitive = match nominal {
            Nominal::Void => &VOID,
            Nominal::Bool => &BOOL,
            Nominal::Int => &INT,
            Nominal::Long => &LONG,
            Nominal::Float => &FLOAT,
            Nominal::Double => &DOUBLE,
            Nominal::Class(name) => return self.object(name, argument),
        };
        match argument {
            None => Ok(primitive),
            Some(_) => Err(TypeError::NotGeneric {
                ty: primitive.to_string(),
            }),
        }
    }

    pub fn void(&self) -> &'static TypeDescriptor {
        &VOID
    }
    pub fn bool(&self) -> &'static TypeDescriptor {
        &BOOL
    }
    pub fn int(&self) -> &'static TypeDescriptor {
        &INT
    }
    pub fn long(&self) -> &'static TypeDescriptor {
        &LONG
    }
    pub fn float(&self) -> &'static TypeDescriptor {
        &FLOAT
    }
    pub fn double(&self) -> &'static TypeDescriptor {
        &DOUBLE
    }

    pub fn string(&self) -> &'static TypeDescriptor {
        self.object("String", None)
            .expect("`String` is a valid raw class type")
    }

    /// Shorthand for `describe(Nominal::Class(class), argument)`.
    pub fn object(
        &self,
        class: &str,
        argument: Option<&'static TypeDescriptor>,
    ) -> Result<&'static TypeDescriptor, TypeError> {
        if class.is_empty() {
            return Err(TypeError::EmptyClassName);
        }
        if let Some(argument) = argument {
            if !argument.is_value() {
                return Err(TypeError::InvalidArgument {
                    argument: argument.to_string(),
                });
            }
            if mentions_raw(argument, class) {
                return Err(TypeError::SelfReferential {
                    class: class.to_string(),
                });
            }
        }

        let class = self.intern_str(class);
        let key = (class, argument);
        if let Some(&interned) = self.objects.read().get(&key) {
            return Ok(interned);
        }

        let mut objects = self.objects.write();
        let interned = *objects
            .entry(key)
            .or_insert_with(|| Box::leak(Box::new(TypeDescriptor::Object { class, argument })));
        Ok(interned)
    }

    /// Intern the signature type of a method taking `params` and returning `ret`.
    pub fn method(
        &self,
        params: &[&'static TypeDescriptor],
        ret: &'static TypeDescriptor,
    ) -> Result<&'static TypeDescriptor, TypeError> {
        if let Some(bad) = params.iter().find(|p| !p.is_value()) {
            return Err(TypeError::NotAValue { found: bad });
        }
        if matches!(ret, TypeDescriptor::Method { .. }) {
            return Err(TypeError::NotAValue { found: ret });
        }

        let key = (params.to_vec(), ret);
        if let Some(&interned) = self.methods.read().get(&key) {
            return Ok(interned);
        }

        let mut methods = self.methods.write();
        if let Some(&interned) = methods.get(&key) {
            return Ok(interned);
        }
        let leaked_params: &'static [&'static TypeDescriptor] = Box::leak(key.0.clone().into_boxed_slice());
        let interned: &'static TypeDescriptor = Box::leak(Box::new(TypeDescriptor::Method {
            params: leaked_params,
            ret,
        }));
        methods.insert(key, interned);
        Ok(interned)
    }

    fn intern_str(&self, s: &str) -> &'static str {
        if let Some(&interned) = self.class_names.read().get(s) {
            return interned;
        }
        let mut names = self.class_names.write();
        if let Some(&interned) = names.get(s) {
            return interned;
        }
        let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
        names.insert(leaked);
        leaked
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether `ty` contains the raw (uninstantiated) form of `class` anywhere in
/// its argument chain, which would make `class<ty>` refer to itself.
fn mentions_raw(ty: &TypeDescriptor, class: &str) -> bool {
    match ty {
        TypeDescriptor::Object {
            class: other,
            argument: None,
        } => *other == class,
        TypeDescriptor::Object {
            argument: Some(inner),
            ..
        } => mentions_raw(inner, class),
        _ => false,
    }
}
