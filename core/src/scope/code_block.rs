use core::fmt;

use hashbrown::HashMap;

use crate::compiler::{CompileError, ScopeState};
use crate::types::{TypeDescriptor, TypeError};

/// Handle to a scope inside a [`CodeBlocks`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(u32);

/// Handle to a declared variable inside a [`CodeBlocks`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u32);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A named, typed storage location bound to a slot in its frame.
///
/// This is a copyable handle; expression nodes embed it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalVariable {
    id: VarId,
    scope: ScopeId,
    slot: u16,
    ty: &'static TypeDescriptor,
}

impl LocalVariable {
    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// First slot. Wide variables also own `slot + 1`.
    pub fn slot(&self) -> u16 {
        self.slot
    }

    pub fn ty(&self) -> &'static TypeDescriptor {
        self.ty
    }

    /// Slots occupied, as a half-open range.
    pub fn slots(&self) -> core::ops::Range<u32> {
        let start = self.slot as u32;
        start..start + self.ty.width() as u32
    }
}

struct ScopeData {
    parent: Option<ScopeId>,
    frame: ScopeId,
    next_slot: u32,
    bindings: HashMap<String, VarId>,
    order: Vec<VarId>,
    open_children: u32,
    closed: bool,
    /// Only meaningful on frames: the most slots ever in use at once.
    high_water: u32,
}

struct VarData {
    name: String,
    variable: LocalVariable,
}

/// Arena of scopes and local variables for one compilation unit.
///
/// Not thread-safe: a unit is built and compiled on one thread.
pub struct CodeBlocks {
    scopes: Vec<ScopeData>,
    vars: Vec<VarData>,
}

const MAX_SLOTS: u32 = u16::MAX as u32;

impl CodeBlocks {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            vars: Vec::new(),
        }
    }

    /// Open the root scope of a new method frame. Slots start at 0.
    pub fn open_frame(&mut self) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: None,
            frame: id,
            next_slot: 0,
            bindings: HashMap::new(),
            order: Vec::new(),
            open_children: 0,
            closed: false,
            high_water: 0,
        });
        id
    }

    /// Open a child scope whose slots start after everything `parent` holds.
    pub fn open_child(&mut self, parent: ScopeId) -> Result<ScopeId, CompileError> {
        let parent_data = self.scope_mut(parent)?;
        if parent_data.closed {
            return Err(scope_error(parent, ScopeState::Closed));
        }
        parent_data.open_children += 1;
        let frame = parent_data.frame;
        let next_slot = parent_data.next_slot;

        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(ScopeData {
            parent: Some(parent),
            frame,
            next_slot,
            bindings: HashMap::new(),
            order: Vec::new(),
            open_children: 0,
            closed: false,
            high_water: 0,
        });
        Ok(id)
    }

    /// Declare `name` in `scope`, allocating as many slots as its type needs.
    ///
    /// Shadowing a binding from an enclosing scope is allowed; redeclaring a
    /// name in the same scope is not.
    pub fn declare(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: &'static TypeDescriptor,
    ) -> Result<LocalVariable, CompileError> {
        if !ty.is_value() {
            return Err(TypeError::NotAValue { found: ty }.into());
        }
        let var_id = VarId(self.vars.len() as u32);

        let data = self.scope_mut(scope)?;
        if data.closed {
            return Err(scope_error(scope, ScopeState::Closed));
        }
        if data.open_children > 0 {
            return Err(scope_error(scope, ScopeState::Suspended));
        }
        if data.bindings.contains_key(name) {
            return Err(CompileError::DuplicateBinding {
                name: name.to_string(),
            });
        }

        let slot = data.next_slot;
        let end = slot + ty.width() as u32;
        if end > MAX_SLOTS {
            return Err(CompileError::TooManyLocals);
        }
        data.next_slot = end;
        data.bindings.insert(name.to_string(), var_id);
        data.order.push(var_id);
        let frame = data.frame;

        let variable = LocalVariable {
            id: var_id,
            scope,
            slot: slot as u16,
            ty,
        };
        self.vars.push(VarData {
            name: name.to_string(),
            variable,
        });

        let frame_data = self.scope_mut(frame)?;
        frame_data.high_water = frame_data.high_water.max(end);
        Ok(variable)
    }

    /// Find the innermost binding of `name` visible from `scope`.
    ///
    /// A closed scope sees nothing: its slots may already belong to a later
    /// declaration.
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<LocalVariable> {
        if self.scopes.get(scope.0 as usize)?.closed {
            return None;
        }
        let mut current = Some(scope);
        while let Some(id) = current {
            let data = self.scopes.get(id.0 as usize)?;
            if let Some(var) = data.bindings.get(name) {
                return Some(self.vars[var.0 as usize].variable);
            }
            current = data.parent;
        }
        None
    }

    /// Like [`resolve`](Self::resolve), but a missing name is an error.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Result<LocalVariable, CompileError> {
        match self.scopes.get(scope.0 as usize) {
            None => return Err(scope_error(scope, ScopeState::Unknown)),
            Some(data) if data.closed => return Err(scope_error(scope, ScopeState::Closed)),
            Some(_) => {}
        }
        self.resolve(scope, name)
            .ok_or_else(|| CompileError::UnresolvedReference {
                name: name.to_string(),
            })
    }

    /// Close `scope`. Its slots become available to the parent again.
    ///
    /// Scopes close innermost first; closing one that still has an open
    /// child is rejected.
    pub fn close(&mut self, scope: ScopeId) -> Result<(), CompileError> {
        let data = self.scope_mut(scope)?;
        if data.closed {
            return Err(scope_error(scope, ScopeState::Closed));
        }
        if data.open_children > 0 {
            return Err(scope_error(scope, ScopeState::Suspended));
        }
        data.closed = true;
        if let Some(parent) = data.parent {
            self.scope_mut(parent)?.open_children -= 1;
        }
        Ok(())
    }

    pub fn is_closed(&self, scope: ScopeId) -> bool {
        self.scopes.get(scope.0 as usize).is_some_and(|s| s.closed)
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes.get(scope.0 as usize)?.parent
    }

    /// The root scope of the frame `scope` belongs to.
    pub fn frame_of(&self, scope: ScopeId) -> Option<ScopeId> {
        Some(self.scopes.get(scope.0 as usize)?.frame)
    }

    /// Number of slots a frame needs: the most ever in use at once.
    pub fn frame_size(&self, frame: ScopeId) -> Option<u16> {
        let data = self.scopes.get(frame.0 as usize)?;
        let frame_data = self.scopes.get(data.frame.0 as usize)?;
        Some(frame_data.high_water as u16)
    }

    /// Next slot `scope` would hand out.
    pub fn next_slot(&self, scope: ScopeId) -> Option<u32> {
        Some(self.scopes.get(scope.0 as usize)?.next_slot)
    }

    /// Variables declared directly in `scope`, in declaration order.
    pub fn variables(&self, scope: ScopeId) -> impl Iterator<Item = LocalVariable> + '_ {
        self.scopes
            .get(scope.0 as usize)
            .into_iter()
            .flat_map(|data| data.order.iter())
            .map(|var| self.vars[var.0 as usize].variable)
    }

    /// Symbolic name of a variable, for debug info only.
    pub fn name_of(&self, var: VarId) -> Option<&str> {
        self.vars.get(var.0 as usize).map(|v| v.name.as_str())
    }

    /// Every variable declared in `frame` or any scope nested in it.
    pub fn frame_variables(&self, frame: ScopeId) -> impl Iterator<Item = (&str, LocalVariable)> + '_ {
        self.vars
            .iter()
            .filter(move |v| {
                self.scopes
                    .get(v.variable.scope.0 as usize)
                    .is_some_and(|s| s.frame == frame)
            })
            .map(|v| (v.name.as_str(), v.variable))
    }

    fn scope_mut(&mut self, scope: ScopeId) -> Result<&mut ScopeData, CompileError> {
        self.scopes
            .get_mut(scope.0 as usize)
            .ok_or_else(|| scope_error(scope, ScopeState::Unknown))
    }
}

impl Default for CodeBlocks {
    fn default() -> Self {
        Self::new()
    }
}

fn scope_error(scope: ScopeId, state: ScopeState) -> CompileError {
    CompileError::ScopeState { scope, state }
}
