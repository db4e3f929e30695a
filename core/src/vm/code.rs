use core::fmt;

use hashbrown::HashMap;

use super::class_file::MethodInfo;
use super::instruction_set::{DecodeError, Instruction};

/// Decode a whole method body into `(offset, instruction)` pairs.
pub fn disassemble(code: &[u8]) -> Result<Vec<(usize, Instruction)>, DecodeError> {
    let mut out = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let (instruction, len) = Instruction::decode(code, pc)?;
        out.push((pc, instruction));
        pc += len;
    }
    Ok(out)
}

/// Human-readable listing of a method, with jump targets labelled.
///
/// ```text
/// method add (II)I
///   max_stack: 2
///   max_locals: 2
///   code:
///        0       iload 0
///        2       iload 1
///        4       iadd
///        5       ireturn
/// ```
pub struct Listing<'m>(pub &'m MethodInfo);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = self.0;
        writeln!(f, "method {} {}", method.name, method.descriptor)?;
        writeln!(f, "  max_stack: {}", method.max_stack)?;
        writeln!(f, "  max_locals: {}", method.max_locals)?;

        let instructions = match disassemble(&method.code) {
            Ok(instructions) => instructions,
            Err(e) => return write!(f, "  <{}>", e),
        };

        // First pass: collect jump targets so they can be labelled in order.
        let mut targets: Vec<usize> = instructions
            .iter()
            .filter_map(|(at, instruction)| {
                let offset = instruction.jump_offset()?;
                usize::try_from(*at as isize + offset as isize).ok()
            })
            .collect();
        targets.sort_unstable();
        targets.dedup();
        let labels: HashMap<usize, usize> = targets.into_iter().enumerate().map(|(i, at)| (at, i)).collect();

        writeln!(f, "  code:")?;
        for (at, instruction) in &instructions {
            let label = labels.get(at).map(|l| format!("L{}:", l)).unwrap_or_default();
            match instruction.jump_offset() {
                Some(offset) => {
                    let target = (*at as isize + offset as isize) as usize;
                    let target = labels
                        .get(&target)
                        .map(|l| format!("L{}", l))
                        .unwrap_or_else(|| format!("@{}", target));
                    writeln!(f, "    {:4} {:>4}  {:?} (to {})", at, label, instruction, target)?;
                }
                None => writeln!(f, "    {:4} {:>4}  {:?}", at, label, instruction)?,
            }
        }

        if !method.locals.is_empty() {
            writeln!(f, "  locals:")?;
            for local in &method.locals {
                writeln!(f, "    {:4}  {} {}", local.slot, local.name, local.descriptor)?;
            }
        }
        Ok(())
    }
}
