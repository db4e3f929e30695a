//! Definite assignment.
//!
//! Slots are reused once a scope closes, so a local read before any write
//! would observe whatever an earlier variable left in its slot. Method bodies
//! are checked before emission: every `Read` must be preceded, on every path
//! reaching it, by a `Write` of the same variable, with no write to an
//! overlapping slot in between.

use hashbrown::HashMap;

use super::error::CompileError;
use crate::expr::{Expr, ExprInner};
use crate::scope::{CodeBlocks, LocalVariable, VarId};

/// Variables known to hold their own value. `None` once control cannot
/// reach the current point.
type Assigned = Option<HashMap<VarId, LocalVariable>>;

/// Reject `statements` if any of them reads a local that may be unassigned.
/// `params` hold their arguments on entry.
pub(crate) fn check_definite_assignment(
    blocks: &CodeBlocks,
    params: &[LocalVariable],
    statements: &[&Expr<'_>],
) -> Result<(), CompileError> {
    let mut checker = Checker {
        blocks,
        assigned: Some(params.iter().map(|p| (p.id(), *p)).collect()),
    };
    for statement in statements {
        checker.visit(statement)?;
    }
    Ok(())
}

struct Checker<'b> {
    blocks: &'b CodeBlocks,
    assigned: Assigned,
}

impl Checker<'_> {
    fn visit(&mut self, expr: &Expr<'_>) -> Result<(), CompileError> {
        match expr.inner() {
            ExprInner::Constant(_) => {}

            ExprInner::Read(var) => {
                if let Some(assigned) = &self.assigned {
                    if !assigned.contains_key(&var.id()) {
                        let name = self
                            .blocks
                            .name_of(var.id())
                            .map_or_else(|| format!("slot {}", var.slot()), str::to_string);
                        return Err(CompileError::UnassignedVariable { name });
                    }
                }
            }

            ExprInner::Write { var, value } => {
                self.visit(value)?;
                if let Some(assigned) = &mut self.assigned {
                    assigned.retain(|id, other| *id == var.id() || !overlaps(other, var));
                    assigned.insert(var.id(), *var);
                }
            }

            ExprInner::Binary { left, right, .. } | ExprInner::Compare { left, right, .. } => {
                self.visit(left)?;
                self.visit(right)?;
            }

            ExprInner::Unary { operand, .. } | ExprInner::Convert { operand } => self.visit(operand)?,

            ExprInner::Logical { left, right, .. } => {
                self.visit(left)?;
                let skipped = self.assigned.clone();
                self.visit(right)?;
                self.assigned = meet(skipped, self.assigned.take());
            }

            ExprInner::Invoke { args, .. } => {
                for arg in args.iter() {
                    self.visit(arg)?;
                }
            }

            ExprInner::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit(cond)?;
                let before = self.assigned.clone();
                self.visit(then_branch)?;
                let after_then = core::mem::replace(&mut self.assigned, before);
                if let Some(else_branch) = else_branch {
                    self.visit(else_branch)?;
                }
                self.assigned = meet(after_then, self.assigned.take());
            }

            ExprInner::While { cond, body } => {
                // Iterate to the loop-head fixpoint. Each pass starts from a
                // superset of it, so an error found on any pass is real.
                let mut head = self.assigned.clone();
                loop {
                    self.assigned = head.clone();
                    self.visit(cond)?;
                    let exit = self.assigned.clone();
                    self.visit(body)?;
                    let next = meet(head.clone(), self.assigned.take());
                    if next == head {
                        self.assigned = exit;
                        break;
                    }
                    head = next;
                }
            }

            ExprInner::Block { statements, .. } => {
                for statement in statements.iter() {
                    self.visit(statement)?;
                }
            }

            ExprInner::Return { value } => {
                if let Some(value) = value {
                    self.visit(value)?;
                }
                self.assigned = None;
            }
        }
        Ok(())
    }
}

fn overlaps(a: &LocalVariable, b: &LocalVariable) -> bool {
    a.slots().start < b.slots().end && b.slots().start < a.slots().end
}

/// Variables assigned on both paths.
fn meet(a: Assigned, b: Assigned) -> Assigned {
    match (a, b) {
        (None, other) | (other, None) => other,
        (Some(mut a), Some(b)) => {
            a.retain(|id, _| b.contains_key(id));
            Some(a)
        }
    }
}
