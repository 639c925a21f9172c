//! Applying a single operation.

use super::Synthesizer;
use crate::{GreedyError, stack::StackInstruction};
use gasol_sfs::{OpId, Operation, ValueId};
use smallvec::SmallVec;
use tracing::trace;

impl Synthesizer<'_> {
    /// Brings the inputs of `id` to the top of the stack and applies it.
    ///
    /// The output, if any, is left on top of the stack, unpinned.
    pub(super) fn compute_op(&mut self, id: OpId) -> Result<(), GreedyError> {
        let sfs = self.sfs;
        let op = sfs.op(id);

        if self.operands_swapped(op) {
            self.emit(StackInstruction::Swap(1))?;
        }
        if self.operands_in_place(op) {
            trace!(op = %op.name, "operands in place");
        } else {
            for value in self.operand_order(op) {
                self.materialize(value)?;
            }
            self.pinned = self.pinned.checked_sub(op.arity()).ok_or_else(|| {
                GreedyError::invariant(format!("operands of `{}` were not pinned", op.name))
            })?;
        }

        self.emit(StackInstruction::Apply(id))?;
        for &input in &op.inputs {
            self.liveness.consume(input)?;
        }
        self.computed[id] = true;
        Ok(())
    }

    /// Returns true if the top of the stack already holds exactly the inputs of `op`, none of
    /// which has to be kept for a later use.
    fn operands_in_place(&self, op: &Operation) -> bool {
        let n = op.arity();
        if n == 0 || self.pinned > 0 || self.stack.depth() < n {
            return false;
        }
        let top = &self.stack.as_slice()[..n];
        let matches = top == op.inputs.as_slice()
            || (op.is_commutative() && top[0] == op.inputs[1] && top[1] == op.inputs[0]);
        matches
            && (0..n).all(|d| !self.is_frozen(d))
            && op.inputs.iter().all(|&v| self.is_covered(v))
    }

    /// Returns true if the two inputs of a non-commutative binary `op` sit on top of the stack in
    /// the wrong order.
    fn operands_swapped(&self, op: &Operation) -> bool {
        if op.arity() != 2 || op.is_commutative() || self.pinned > 0 || self.stack.depth() < 2 {
            return false;
        }
        let top = &self.stack.as_slice()[..2];
        top[0] == op.inputs[1]
            && top[1] == op.inputs[0]
            && top[0] != top[1]
            && (0..2).all(|d| !self.is_frozen(d))
            && op.inputs.iter().all(|&v| self.is_covered(v))
    }

    /// The order in which the inputs of `op` are materialized, deepest first.
    ///
    /// A commutative binary operation materializes its first input first when that input can
    /// be taken in place and the second cannot, or when the second is cheap to push and the
    /// first is not.
    fn operand_order(&self, op: &Operation) -> SmallVec<[ValueId; 4]> {
        let mut order: SmallVec<[ValueId; 4]> = op.inputs.iter().rev().copied().collect();
        if op.is_commutative() {
            let (first, second) = (op.inputs[0], op.inputs[1]);
            let cheap = |v| self.sfs.is_small_nullary(v);
            if (self.takeable(first) && !self.takeable(second)) || (cheap(second) && !cheap(first))
            {
                order.reverse();
            }
        }
        order
    }
}
