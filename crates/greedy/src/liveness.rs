//! Remaining-use analysis.
//!
//! Every value starts with one use per occurrence in the target stack plus one per occurrence as
//! an input of a *needed* operation. An operation is needed if it is a store, or if its output is
//! transitively required by the target stack or by a store. Loads that nothing requires are never
//! scheduled.

use crate::GreedyError;
use gasol_sfs::{IndexVec, OpId, OpKind, Sfs, ValueId};
use tracing::instrument;

/// Remaining-use counts of every value in a block.
#[derive(Clone, Debug)]
pub struct Liveness {
    uses: IndexVec<ValueId, u32>,
    needed: IndexVec<OpId, bool>,
}

impl Liveness {
    /// Computes the initial use counts of `sfs`.
    #[instrument(level = "debug", skip_all)]
    pub fn new(sfs: &Sfs) -> Self {
        let mut needed = IndexVec::from_vec(vec![false; sfs.ops.len()]);
        let mut worklist: Vec<ValueId> = sfs.tgt.clone();
        for (id, op) in sfs.ops.iter_enumerated() {
            if op.kind == OpKind::Store {
                needed[id] = true;
                worklist.extend(op.inputs.iter().copied());
            }
        }
        while let Some(value) = worklist.pop() {
            let Some(producer) = sfs.producer(value) else { continue };
            if !needed[producer] {
                needed[producer] = true;
                worklist.extend(sfs.op(producer).inputs.iter().copied());
            }
        }

        let mut uses = IndexVec::from_vec(vec![0u32; sfs.values.len()]);
        for &value in &sfs.tgt {
            uses[value] += 1;
        }
        for (id, op) in sfs.ops.iter_enumerated() {
            if needed[id] {
                for &input in &op.inputs {
                    uses[input] += 1;
                }
            }
        }

        let this = Self { uses, needed };
        tracing::debug!(
            needed = this.needed.iter().filter(|&&n| n).count(),
            elided = this.elided_ops().count(),
            "computed liveness"
        );
        this
    }

    /// Returns the number of remaining uses of `value`.
    #[inline]
    pub fn uses(&self, value: ValueId) -> u32 {
        self.uses[value]
    }

    /// Returns true if `op` must appear in the schedule.
    #[inline]
    pub fn is_needed(&self, op: OpId) -> bool {
        self.needed[op]
    }

    /// Returns the operations that do not have to be scheduled.
    pub fn elided_ops(&self) -> impl Iterator<Item = OpId> + '_ {
        self.needed.iter_enumerated().filter(|&(_, &n)| !n).map(|(id, _)| id)
    }

    /// Records one consumption of `value`.
    pub(crate) fn consume(&mut self, value: ValueId) -> Result<(), GreedyError> {
        let uses = &mut self.uses[value];
        if *uses == 0 {
            return Err(GreedyError::invariant(format!(
                "{value} consumed more times than it is used"
            )));
        }
        *uses -= 1;
        Ok(())
    }
}
