//! Stack instructions emitted by the synthesizer.

use super::MAX_STACK_ACCESS;
use gasol_sfs::{OpId, ValueId};
use std::fmt;

/// One instruction of a synthesized schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StackInstruction {
    /// Push a literal.
    PushConst(ValueId),
    /// DUP1-DUP16: Duplicate the nth stack element.
    Dup(u8),
    /// SWAP1-SWAP16: Swap top with the nth stack element.
    Swap(u8),
    /// POP: Remove top of stack.
    Pop,
    /// Execute an operation: consume its inputs from the top and push its output, if any.
    Apply(OpId),
}

impl StackInstruction {
    /// Returns the `DUP` copying the element at `depth` (0 = top), if it is within reach.
    #[must_use]
    pub fn dup_depth(depth: usize) -> Option<Self> {
        (depth < MAX_STACK_ACCESS).then(|| Self::Dup(depth as u8 + 1))
    }

    /// Returns the `SWAP` exchanging the top with the element at `depth`, if it is within reach.
    #[must_use]
    pub fn swap_depth(depth: usize) -> Option<Self> {
        (1..=MAX_STACK_ACCESS).contains(&depth).then(|| Self::Swap(depth as u8))
    }

    /// Returns true if `n` is within `1..=16` for `DUP`/`SWAP`.
    #[must_use]
    pub fn in_window(self) -> bool {
        match self {
            Self::Dup(n) | Self::Swap(n) => (1..=MAX_STACK_ACCESS as u8).contains(&n),
            Self::PushConst(_) | Self::Pop | Self::Apply(_) => true,
        }
    }
}

impl fmt::Display for StackInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushConst(v) => write!(f, "PUSH {v}"),
            Self::Dup(n) => write!(f, "DUP{n}"),
            Self::Swap(n) => write!(f, "SWAP{n}"),
            Self::Pop => f.write_str("POP"),
            Self::Apply(op) => write!(f, "APPLY {op}"),
        }
    }
}
