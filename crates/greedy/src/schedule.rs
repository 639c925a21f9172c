//! Synthesized schedules and their rendering.

use crate::stack::{SimulationError, StackInstruction, StackModel};
use gasol_config::EvmVersion;
use gasol_sfs::{OpId, Sfs, U256, ValueId};
use rustc_hash::FxHashMap;
use std::fmt;

/// An instruction sequence realizing the target stack of an SFS from its source stack.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schedule {
    instrs: Vec<StackInstruction>,
}

impl Schedule {
    /// Wraps an instruction sequence.
    pub fn new(instrs: Vec<StackInstruction>) -> Self {
        Self { instrs }
    }

    /// Returns the instructions.
    #[inline]
    pub fn as_slice(&self) -> &[StackInstruction] {
        &self.instrs
    }

    /// Returns the number of instructions.
    #[inline]
    pub fn len(&self) -> usize {
        self.instrs.len()
    }

    /// Returns true if the schedule is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    /// Returns an iterator over the instructions.
    pub fn iter(&self) -> std::slice::Iter<'_, StackInstruction> {
        self.instrs.iter()
    }

    /// Renders the schedule as assemblable opcodes.
    pub fn opcodes(&self, sfs: &Sfs, evm_version: EvmVersion) -> Vec<String> {
        self.iter()
            .map(|&instr| match instr {
                StackInstruction::PushConst(value) => match sfs.value(value).as_lit() {
                    Some(lit) => push_opcode(lit, evm_version),
                    None => format!("PUSH {}", sfs.display(value)),
                },
                StackInstruction::Dup(n) => format!("DUP{n}"),
                StackInstruction::Swap(n) => format!("SWAP{n}"),
                StackInstruction::Pop => "POP".to_string(),
                StackInstruction::Apply(id) => {
                    let op = sfs.op(id);
                    let mut s = op.mnemonic.clone();
                    for token in &op.push_value {
                        s.push(' ');
                        s.push_str(token);
                    }
                    s
                }
            })
            .collect()
    }

    /// Names each instruction: the operation id for applications, the instruction name otherwise.
    pub fn ids(&self, sfs: &Sfs) -> Vec<String> {
        self.iter()
            .map(|&instr| match instr {
                StackInstruction::PushConst(_) => "PUSH".to_string(),
                StackInstruction::Dup(n) => format!("DUP{n}"),
                StackInstruction::Swap(n) => format!("SWAP{n}"),
                StackInstruction::Pop => "POP".to_string(),
                StackInstruction::Apply(id) => sfs.op(id).name.clone(),
            })
            .collect()
    }

    /// Runs the schedule from the source stack and returns the final stack, top first.
    pub fn simulate(&self, sfs: &Sfs) -> Result<Vec<ValueId>, SimulationError> {
        let mut stack = StackModel::from_values(&sfs.src);
        for &instr in self {
            stack.execute(instr, sfs)?;
        }
        Ok(stack.as_slice().to_vec())
    }

    /// Returns true if every ordering constraint between two applied operations holds.
    ///
    /// Constraints on an operation that is never applied are ignored, since unread loads are
    /// elided. [`Schedule::misapplied_store`] covers stores.
    pub fn respects_order(&self, sfs: &Sfs) -> bool {
        let mut first: FxHashMap<OpId, usize> = FxHashMap::default();
        for (i, instr) in self.iter().enumerate() {
            if let StackInstruction::Apply(id) = *instr {
                first.entry(id).or_insert(i);
            }
        }
        sfs.all_deps().all(|(before, after)| match (first.get(&before), first.get(&after)) {
            (Some(b), Some(a)) => b < a,
            _ => true,
        })
    }

    /// Returns the first store that is not applied exactly once, with its application count.
    pub fn misapplied_store(&self, sfs: &Sfs) -> Option<(OpId, usize)> {
        let mut applied: FxHashMap<OpId, usize> = FxHashMap::default();
        for instr in self {
            if let StackInstruction::Apply(id) = *instr {
                *applied.entry(id).or_default() += 1;
            }
        }
        sfs.ops
            .iter_enumerated()
            .filter(|(_, op)| op.is_storage())
            .map(|(id, _)| (id, applied.get(&id).copied().unwrap_or(0)))
            .find(|&(_, n)| n != 1)
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a StackInstruction;
    type IntoIter = std::slice::Iter<'a, StackInstruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instr) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{instr}")?;
        }
        Ok(())
    }
}

fn push_opcode(value: &U256, evm_version: EvmVersion) -> String {
    if value.is_zero() && evm_version.has_push0() {
        return "PUSH0".to_string();
    }
    let bytes = value.bit_len().div_ceil(8).max(1);
    format!("PUSH{bytes} 0x{value:x}")
}

/// The result of a successful synthesis attempt.
#[derive(Clone, Debug)]
pub struct Solution {
    /// The synthesized instructions.
    pub schedule: Schedule,
    /// Assemblable opcodes, one per instruction.
    pub opcodes: Vec<String>,
    /// Instruction ids, one per instruction.
    pub ids: Vec<String>,
    /// Whether the validator accepted the id sequence. Always true for a returned solution.
    pub accepted: bool,
    /// Whether single-use and small-nullary operands are adjacent to their consumers.
    pub correct: bool,
}

impl Solution {
    /// Returns the number of instructions.
    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    /// Returns true if the block needs no instructions at all.
    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }
}
