//! Placing a single value on top of the stack.

use super::Synthesizer;
use crate::{
    GreedyError,
    stack::{MAX_STACK_ACCESS, StackInstruction},
};
use gasol_sfs::{OpId, ValueId};
use rustc_hash::FxHashSet;
use tracing::trace;

impl Synthesizer<'_> {
    /// Puts `value` on top of the stack and pins it.
    ///
    /// Tries, in order: taking the top in place, pushing a small-nullary value, swapping up a
    /// copy that is not needed where it is, duplicating a reachable copy, evicting dead values
    /// until a copy is reachable, and finally computing the producer.
    pub(super) fn materialize(&mut self, value: ValueId) -> Result<(), GreedyError> {
        let sfs = self.sfs;
        if self.takeable(value) {
            trace!(value = %sfs.display(value), "in place");
        } else if sfs.is_small_nullary(value) {
            self.push_fresh(value)?;
        } else if let Some(depth) = self.swappable_copy(value) {
            self.emit(StackInstruction::Swap(depth as u8))?;
        } else if self.stack.find(value).is_some() {
            self.dup_nearest(value)?;
        } else {
            let id = sfs.producer(value).ok_or_else(|| {
                GreedyError::invariant(format!(
                    "`{}` is neither on the stack nor produced by an operation",
                    sfs.display(value)
                ))
            })?;
            if self.computed[id] {
                return Err(GreedyError::invariant(format!(
                    "`{}` was computed but is no longer on the stack",
                    sfs.display(value)
                )));
            }
            if self.queued[id] {
                if self.queue.front() != Some(&id) {
                    return Err(GreedyError::invariant(format!(
                        "`{}` is required before its turn in the ordering constraints",
                        sfs.op(id).name
                    )));
                }
                self.queue.pop_front();
            }
            self.compute_op(id)?;
            if !self.is_covered(value) {
                if self.pinned > 0 {
                    return Err(GreedyError::invariant(format!(
                        "shared value `{}` computed between pinned operands",
                        sfs.display(value)
                    )));
                }
                self.emit(StackInstruction::Dup(1))?;
            }
        }
        self.pinned += 1;
        Ok(())
    }

    /// Returns true if the top of the stack is `value` and can be used without copying.
    pub(super) fn takeable(&self, value: ValueId) -> bool {
        self.pinned == 0
            && self.stack.top() == Some(value)
            && !self.is_frozen(0)
            && self.is_covered(value)
    }

    fn push_fresh(&mut self, value: ValueId) -> Result<(), GreedyError> {
        if self.sfs.is_lit(value) {
            return self.emit(StackInstruction::PushConst(value));
        }
        match self.sfs.producer(value) {
            Some(id) => {
                self.computed[id] = true;
                self.emit(StackInstruction::Apply(id))
            }
            None => Err(GreedyError::invariant(format!(
                "small nullary `{}` has no producer",
                self.sfs.display(value)
            ))),
        }
    }

    /// The nearest copy of `value` that may be moved to the top instead of duplicated.
    fn swappable_copy(&self, value: ValueId) -> Option<usize> {
        if self.pinned > 0 || self.is_frozen(0) || !self.is_covered(value) {
            return None;
        }
        self.stack
            .positions(value)
            .find(|&d| d > 0 && !self.is_frozen(d))
            .filter(|&d| d <= MAX_STACK_ACCESS)
    }

    fn dup_nearest(&mut self, value: ValueId) -> Result<(), GreedyError> {
        loop {
            let Some(depth) = self.stack.find(value) else {
                return Err(GreedyError::invariant(format!(
                    "`{}` was evicted while being materialized",
                    self.sfs.display(value)
                )));
            };
            if let Some(dup) = StackInstruction::dup_depth(depth) {
                return self.emit(dup);
            }
            self.evict(value, depth)?;
        }
    }

    /// Removes one dead value from the addressable window.
    ///
    /// `wanted` and `depth` only describe the failure.
    pub(super) fn evict(&mut self, wanted: ValueId, depth: usize) -> Result<(), GreedyError> {
        let sfs = self.sfs;
        let infeasible =
            || GreedyError::InfeasibleWindow { value: sfs.display(wanted).to_string(), depth };
        if self.pinned > 0 || self.stack.is_empty() || self.is_frozen(0) {
            return Err(infeasible());
        }
        if self.is_dead(0) {
            return self.emit(StackInstruction::Pop);
        }
        let reach = MAX_STACK_ACCESS.min(self.stack.depth() - 1);
        let Some(d) = (1..=reach).rev().find(|&d| self.is_dead(d)) else {
            return Err(infeasible());
        };
        trace!(depth = d, "evict");
        self.emit(StackInstruction::Swap(d as u8))?;
        self.emit(StackInstruction::Pop)
    }

    /// Computes, at top level, every shared operation `root` depends on.
    ///
    /// A shared value computed while operands of another operation are pinned would have to be
    /// duplicated underneath them.
    pub(super) fn hoist(&mut self, root: ValueId) -> Result<(), GreedyError> {
        let mut seen = FxHashSet::default();
        let mut order = Vec::new();
        self.uncomputed_post_order(root, &mut seen, &mut order);
        for id in order {
            let Some(output) = self.sfs.op(id).output else { continue };
            if self.liveness.uses(output) >= 2 && self.stack.find(output).is_none() {
                trace!(op = %self.sfs.op(id).name, "hoist");
                self.compute_op(id)?;
            }
        }
        Ok(())
    }

    /// Hoists shared operations below the inputs of `id`.
    pub(super) fn hoist_inputs(&mut self, id: OpId) -> Result<(), GreedyError> {
        let sfs = self.sfs;
        for &input in &sfs.op(id).inputs {
            self.hoist(input)?;
        }
        Ok(())
    }

    fn uncomputed_post_order(
        &self,
        value: ValueId,
        seen: &mut FxHashSet<OpId>,
        order: &mut Vec<OpId>,
    ) {
        if self.stack.find(value).is_some() || self.sfs.is_small_nullary(value) {
            return;
        }
        let Some(id) = self.sfs.producer(value) else { return };
        if self.computed[id] || self.queued[id] || !seen.insert(id) {
            return;
        }
        for &input in &self.sfs.op(id).inputs {
            self.uncomputed_post_order(input, seen, order);
        }
        order.push(id);
    }
}
