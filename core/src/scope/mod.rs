//! Lexical scopes and local slot allocation.
//!
//! All scopes and variables of one compilation unit live in a [`CodeBlocks`]
//! arena and are addressed by integer handles. A child scope starts
//! allocating where its parent currently stops, so it can never collide with
//! a variable the parent still has in scope. Closing a child hands its slots
//! back: the parent's counter never moved, so its next declaration reuses them.

mod code_block;


pub use code_block::{CodeBlocks, LocalVariable, ScopeId, VarId};
