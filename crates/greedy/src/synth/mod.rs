//! The greedy synthesizer.
//!
//! All mutable state of one attempt lives in [`Synthesizer`]: the simulated stack, the remaining
//! use counts, which target slots are solved, and the queue of ordered operations still to flush.
//!
//! ## Slots
//!
//! Target slot `j` (0 = top of the target stack) ends up `T - 1 - j` positions above the bottom of
//! the stack, where `T` is the target length. A solved slot holds its final value and is *frozen*:
//! it is never swapped, popped or counted as an available copy. Slots are solved bottom-up where
//! possible. A shallower slot is solved first only when the deepest unsolved one cannot be reached,
//! or when two neighbouring slots are built as a pair (see [`Synthesizer::pick_slot`] and
//! [`Synthesizer::look_ahead`]).
//!
//! ## Pinned operands
//!
//! While an operation's inputs are being materialized, the ones already placed sit at the top of
//! the stack and must not move. `pinned` counts them. Swaps and evictions only happen when nothing
//! is pinned.

mod compute;
mod materialize;
mod permute;
mod precompute;

use crate::{
    GreedyError, Liveness, Schedule, deps,
    stack::{MAX_STACK_ACCESS, StackInstruction, StackModel},
};
use gasol_sfs::{IndexVec, OpId, Sfs, ValueId};
use rustc_hash::FxHashSet;
use std::collections::VecDeque;
use tracing::{debug, instrument, trace};

/// The state of one synthesis attempt over a block.
pub(crate) struct Synthesizer<'a> {
    sfs: &'a Sfs,
    liveness: Liveness,
    stack: StackModel,
    /// Solved target slots, indexed like the target stack.
    solved: Vec<bool>,
    /// Number of operands at the top of the stack reserved for an operation in progress.
    pinned: usize,
    computed: IndexVec<OpId, bool>,
    queued: IndexVec<OpId, bool>,
    /// Stores and ordered loads not flushed yet, in merged order.
    queue: VecDeque<OpId>,
    schedule: Vec<StackInstruction>,
}

impl<'a> Synthesizer<'a> {
    pub(crate) fn new(sfs: &'a Sfs) -> Self {
        let liveness = Liveness::new(sfs);
        let order = deps::merged_order(sfs, &liveness);
        let mut queued = IndexVec::from_vec(vec![false; sfs.ops.len()]);
        for &id in &order {
            queued[id] = true;
        }
        Self {
            sfs,
            liveness,
            stack: StackModel::from_values(&sfs.src),
            solved: vec![false; sfs.tgt.len()],
            pinned: 0,
            computed: IndexVec::from_vec(vec![false; sfs.ops.len()]),
            queued,
            queue: order.into(),
            schedule: Vec::new(),
        }
    }

    /// Runs the synthesis to completion.
    #[instrument(name = "synthesize", level = "debug", skip_all)]
    pub(crate) fn run(mut self, precompute: bool) -> Result<Schedule, GreedyError> {
        if precompute {
            self.precompute()?;
        }
        self.compute()?;
        Ok(Schedule::new(self.schedule))
    }

    /// The main loop: pop dead values, flush ordered operations, or build the next slot.
    #[instrument(level = "debug", skip_all)]
    fn compute(&mut self) -> Result<(), GreedyError> {
        loop {
            self.pop_dead_tops()?;
            if let Some(&head) = self.queue.front()
                && self.should_flush(head)
            {
                self.flush()?;
                continue;
            }
            if self.queue.is_empty() && self.is_permutation() {
                self.permute()?;
                break;
            }
            let Some(j) = self.pick_slot() else { break };
            self.build(j)?;
        }
        self.pop_dead_tops()?;

        if self.stack.as_slice() != self.sfs.tgt.as_slice() {
            return Err(GreedyError::invariant(format!(
                "finished with {} values on the stack, expected {}",
                self.stack.depth(),
                self.sfs.tgt.len()
            )));
        }
        debug!(len = self.schedule.len(), "built target stack");
        Ok(())
    }

    /// Flushes the next ordered operation.
    fn flush(&mut self) -> Result<(), GreedyError> {
        let Some(id) = self.queue.pop_front() else { return Ok(()) };
        debug!(op = %self.sfs.op(id).name, "flush");
        self.hoist_inputs(id)?;
        self.compute_op(id)
    }

    fn should_flush(&self, head: OpId) -> bool {
        self.sfs.op(head).is_storage()
            || self.pick_slot().is_none_or(|j| self.slot_needs_queued(j))
            || self.too_long()
    }

    /// Returns true if an operand of the next store would fall out of reach once the loads
    /// queued before it are computed.
    fn too_long(&self) -> bool {
        let Some((loads, store)) =
            self.queue.iter().enumerate().find(|&(_, &id)| self.sfs.op(id).is_storage())
        else {
            return false;
        };
        let op = self.sfs.op(*store);
        op.inputs
            .iter()
            .filter(|&&v| !self.sfs.is_small_nullary(v))
            .filter_map(|&v| self.stack.find(v))
            .any(|depth| depth + loads + op.arity() > MAX_STACK_ACCESS)
    }

    /// Returns true if building slot `j` requires an ordered operation that was not flushed yet.
    fn slot_needs_queued(&self, j: usize) -> bool {
        let value = self.sfs.tgt[j];
        if self.slot_holds(j, value) {
            return false;
        }
        let mut seen = FxHashSet::default();
        let mut work = vec![value];
        while let Some(v) = work.pop() {
            if self.stack.find(v).is_some() || self.sfs.is_small_nullary(v) {
                continue;
            }
            let Some(p) = self.sfs.producer(v) else { continue };
            if self.computed[p] || !seen.insert(p) {
                continue;
            }
            if self.queued[p] {
                return true;
            }
            work.extend(self.sfs.op(p).inputs.iter().copied());
        }
        false
    }

    /// Places the value of slot `j` at its final position.
    fn build(&mut self, j: usize) -> Result<(), GreedyError> {
        let value = self.sfs.tgt[j];
        if self.slot_holds(j, value) {
            return self.solve(j);
        }
        trace!(slot = j, value = %self.sfs.display(value), "build");

        if let Some(above) = self.look_ahead(j) {
            return self.build_pair(j, above);
        }

        self.hoist(value)?;
        let target_len = self.sfs.tgt.len();
        loop {
            let depth = (self.stack.depth() + 1 + j).saturating_sub(target_len);
            if depth <= MAX_STACK_ACCESS {
                break;
            }
            self.evict(value, depth)?;
        }
        self.materialize(value)?;
        self.pinned -= 1;

        let depth = self.slot_depth(j).ok_or_else(|| {
            GreedyError::invariant(format!("slot {j} is not on the stack after building it"))
        })?;
        if depth > 0 && self.stack.peek(depth) != Some(value) {
            let swap = StackInstruction::swap_depth(depth).ok_or_else(|| {
                GreedyError::InfeasibleWindow { value: self.sfs.display(value).to_string(), depth }
            })?;
            self.emit(swap)?;
        }
        self.solve(j)
    }

    /// Builds slot `j` together with slot `above = j - 1`, which sit right on top of the stack once
    /// both values are pushed.
    fn build_pair(&mut self, j: usize, above: usize) -> Result<(), GreedyError> {
        let (value, next) = (self.sfs.tgt[j], self.sfs.tgt[above]);
        let sfs = self.sfs;
        debug!(slot = j, value = %sfs.display(value), next = %sfs.display(next), "look-ahead");
        self.materialize(next)?;
        self.materialize(value)?;
        self.pinned -= 2;
        self.emit(StackInstruction::Swap(1))?;
        self.solve(j)?;
        self.solve(above)
    }

    /// Returns the slot to build together with slot `j`, if building `j` alone would push the value
    /// of the slot above it out of reach.
    ///
    /// Applies when the stack holds exactly the slots below `j`, so that both values land in their
    /// slots once pushed, and the next value is a copy at the last `DUP16` position.
    fn look_ahead(&self, j: usize) -> Option<usize> {
        let above = j.checked_sub(1)?;
        if self.solved[above]
            || !self.is_frozen(0)
            || self.stack.depth() + j + 1 != self.sfs.tgt.len()
        {
            return None;
        }
        let (value, next) = (self.sfs.tgt[j], self.sfs.tgt[above]);
        let at_edge = value != next
            && !self.sfs.is_small_nullary(next)
            && self.stack.find(next) == Some(MAX_STACK_ACCESS - 1);
        // The value of slot `j` goes on top of `next` without growing the stack any further.
        let cheap = self.sfs.is_small_nullary(value)
            || self.stack.find(value).is_some_and(|d| d + 1 < MAX_STACK_ACCESS);
        (at_edge && cheap).then_some(above)
    }

    /// Simulates and records one instruction.
    fn emit(&mut self, instr: StackInstruction) -> Result<(), GreedyError> {
        trace!(%instr, depth = self.stack.depth(), "emit");
        self.stack.execute(instr, self.sfs).map_err(|e| GreedyError::invariant(e.to_string()))?;
        self.schedule.push(instr);
        Ok(())
    }

    fn pop_dead_tops(&mut self) -> Result<(), GreedyError> {
        while self.is_dead(0) {
            self.emit(StackInstruction::Pop)?;
        }
        Ok(())
    }

    /// Marks slot `j` as solved, consuming one use of its value.
    fn solve(&mut self, j: usize) -> Result<(), GreedyError> {
        self.solved[j] = true;
        self.liveness.consume(self.sfs.tgt[j])
    }

    /// The deepest unsolved slot.
    fn next_slot(&self) -> Option<usize> {
        self.solved.iter().rposition(|&solved| !solved)
    }

    /// The slot to build next.
    ///
    /// This is the deepest unsolved slot, unless it is out of reach and nothing can be evicted to
    /// bring it closer. In that case the deepest unsolved slot within reach goes first.
    fn pick_slot(&self) -> Option<usize> {
        let deepest = self.next_slot()?;
        if self.slot_in_reach(deepest) || self.can_evict() {
            return Some(deepest);
        }
        let reachable = (0..deepest).rev().find(|&j| {
            !self.solved[j] && self.slot_depth(j).is_some() && self.slot_in_reach(j)
        });
        Some(reachable.unwrap_or(deepest))
    }

    /// Returns true if slot `j` holds its value, or if the value can be brought to the top and
    /// swapped into the slot from there.
    fn slot_in_reach(&self, j: usize) -> bool {
        let value = self.sfs.tgt[j];
        if self.slot_holds(j, value) {
            return true;
        }
        self.slot_depth(j).is_none_or(|d| d < MAX_STACK_ACCESS)
            && (self.sfs.is_small_nullary(value)
                || self.stack.find(value).is_none_or(|d| d < MAX_STACK_ACCESS))
    }

    /// Returns true if a dead value within reach could be popped.
    fn can_evict(&self) -> bool {
        let reach = self.stack.depth().min(MAX_STACK_ACCESS + 1);
        !self.is_frozen(0) && (0..reach).any(|d| self.is_dead(d))
    }

    /// Current depth of slot `j`, if the stack is tall enough to contain it.
    fn slot_depth(&self, j: usize) -> Option<usize> {
        (self.stack.depth() + j).checked_sub(self.sfs.tgt.len())
    }

    fn slot_holds(&self, j: usize, value: ValueId) -> bool {
        self.slot_depth(j).and_then(|depth| self.stack.peek(depth)) == Some(value)
    }

    fn is_frozen(&self, depth: usize) -> bool {
        (depth + self.sfs.tgt.len())
            .checked_sub(self.stack.depth())
            .is_some_and(|j| j < self.solved.len() && self.solved[j])
    }

    /// Copies of `value` that can still be consumed: pinned ones and unfrozen ones.
    fn copies(&self, value: ValueId) -> usize {
        self.stack.positions(value).filter(|&d| d < self.pinned || !self.is_frozen(d)).count()
    }

    /// Returns true if the stack already holds a copy for every remaining use of `value`.
    fn is_covered(&self, value: ValueId) -> bool {
        self.copies(value) >= self.liveness.uses(value) as usize
    }

    /// Returns true if the value at `depth` may be discarded.
    fn is_dead(&self, depth: usize) -> bool {
        depth >= self.pinned
            && !self.is_frozen(depth)
            && self.stack.peek(depth).is_some_and(|v| {
                self.copies(v) > self.liveness.uses(v) as usize
            })
    }

    fn is_permutation(&self) -> bool {
        let tgt = &self.sfs.tgt;
        self.stack.is_permutation_of(tgt)
            && self
                .stack
                .as_slice()
                .iter()
                .zip(tgt)
                .enumerate()
                .all(|(depth, (s, t))| s == t || depth <= MAX_STACK_ACCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasol_sfs::{NewOp, SfsBuilder, U256};

    #[test]
    fn test_slot_geometry() {
        let mut b = SfsBuilder::new();
        let (x, y, z) = (b.var("x"), b.var("y"), b.var("z"));
        b.src(vec![x, y, z]).tgt(vec![y, z]);
        let sfs = b.build().unwrap();
        let mut synth = Synthesizer::new(&sfs);

        assert_eq!(synth.slot_depth(1), Some(2));
        assert_eq!(synth.slot_depth(0), Some(1));
        assert!(synth.slot_holds(1, z));
        assert!(synth.is_dead(0));

        synth.solve(1).unwrap();
        assert!(synth.is_frozen(2));
        assert!(!synth.is_frozen(1));
        assert_eq!(synth.copies(z), 0);
        assert_eq!(synth.next_slot(), Some(0));
    }

    #[test]
    fn test_pick_reachable_slot() {
        let mut b = SfsBuilder::new();
        let xs: Vec<_> = (0..16).map(|i| b.var(&format!("x{i}"))).collect();
        let (w, z) = (b.var("w"), b.var("z"));
        let mut src = xs.clone();
        src.extend([w, z]);
        let mut tgt = xs.clone();
        tgt.extend([w, w]);
        b.src(src).tgt(tgt);
        let sfs = b.build().unwrap();
        let synth = Synthesizer::new(&sfs);

        // Slot 17 needs a copy of `w` from below the window, and every value above it is live.
        assert_eq!(synth.next_slot(), Some(17));
        assert!(!synth.slot_in_reach(17));
        assert!(!synth.can_evict());
        assert_eq!(synth.pick_slot(), Some(16));
    }

    #[test]
    fn test_look_ahead() {
        let block = |lift: usize| {
            let mut b = SfsBuilder::new();
            let vs: Vec<_> = (0..16).map(|i| b.var(&format!("v{i}"))).collect();
            let k = b.lit(U256::from(42));
            let mut tgt = vec![vs[15 - lift], k];
            tgt.extend(&vs);
            b.src(vs).tgt(tgt);
            b.build().unwrap()
        };

        let sfs = block(0);
        let mut synth = Synthesizer::new(&sfs);
        synth.precompute().unwrap();
        assert_eq!(synth.next_slot(), Some(1));
        assert_eq!(synth.look_ahead(1), Some(0));
        synth.build(1).unwrap();
        assert_eq!(synth.stack.as_slice(), sfs.tgt.as_slice());
        assert_eq!(synth.next_slot(), None);
        let k = sfs.tgt[1];
        assert_eq!(
            synth.schedule,
            [StackInstruction::Dup(16), StackInstruction::PushConst(k), StackInstruction::Swap(1)]
        );

        // One position higher, the copy stays within reach after pushing `k`.
        let sfs = block(1);
        let mut synth = Synthesizer::new(&sfs);
        synth.precompute().unwrap();
        assert_eq!(synth.look_ahead(1), None);
    }

    #[test]
    fn test_run_pops_and_builds() {
        let mut b = SfsBuilder::new();
        let (x, y, z) = (b.var("x"), b.var("y"), b.var("z"));
        b.op(NewOp { inputs: vec![x, y], outputs: vec![z], ..NewOp::new("SUB_0", "SUB") })
            .unwrap();
        b.src(vec![y, x]).tgt(vec![z]);
        let sfs = b.build().unwrap();

        let schedule = Synthesizer::new(&sfs).run(true).unwrap();
        assert_eq!(schedule.simulate(&sfs).unwrap(), [z]);
        assert_eq!(schedule.as_slice()[0], StackInstruction::Swap(1));
    }
}
