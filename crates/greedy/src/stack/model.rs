//! Stack model for tracking EVM stack state.
//!
//! The StackModel maps stack positions to SFS values and simulates stack instructions on them.

use super::StackInstruction;
use gasol_sfs::{Sfs, ValueId};
use smallvec::SmallVec;

/// An error produced when an instruction cannot be executed on a [`StackModel`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("`{0}` reaches outside of the DUP16/SWAP16 window")]
    OutOfWindow(StackInstruction),
    #[error("`{0}` underflows the stack")]
    Underflow(StackInstruction),
    #[error("`{0}` pushes a value that is not a literal")]
    NotALiteral(StackInstruction),
    #[error("operands of `{0}` are not on top of the stack")]
    OperandMismatch(String),
}

/// Represents the current state of the EVM stack.
///
/// Stack positions are 0-indexed from the top:
/// - Position 0 = top of stack
/// - Position 1 = second from top
/// - etc.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StackModel {
    /// The stack, with index 0 being the top.
    stack: SmallVec<[ValueId; 32]>,
}

impl StackModel {
    /// Creates a stack model holding `values`, top first.
    #[must_use]
    pub fn from_values(values: &[ValueId]) -> Self {
        Self { stack: SmallVec::from_slice(values) }
    }

    /// Returns the current stack depth.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns true if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Returns the value at the given stack depth (0 = top).
    #[must_use]
    pub fn peek(&self, depth: usize) -> Option<ValueId> {
        self.stack.get(depth).copied()
    }

    /// Returns the value at the top of the stack.
    #[must_use]
    pub fn top(&self) -> Option<ValueId> {
        self.peek(0)
    }

    /// Finds the depth of the topmost copy of a value.
    #[must_use]
    pub fn find(&self, value: ValueId) -> Option<usize> {
        self.stack.iter().position(|&v| v == value)
    }

    /// Returns the depths of all copies of a value, top first.
    pub fn positions(&self, value: ValueId) -> impl Iterator<Item = usize> + '_ {
        self.stack.iter().enumerate().filter(move |&(_, &v)| v == value).map(|(d, _)| d)
    }

    /// Returns the stack contents as a slice (top to bottom).
    #[must_use]
    pub fn as_slice(&self) -> &[ValueId] {
        &self.stack
    }

    /// Returns true if the stack holds the same values as `other`, in any order.
    #[must_use]
    pub fn is_permutation_of(&self, other: &[ValueId]) -> bool {
        if self.stack.len() != other.len() {
            return false;
        }
        let mut a: SmallVec<[ValueId; 32]> = self.stack.clone();
        let mut b: SmallVec<[ValueId; 32]> = SmallVec::from_slice(other);
        a.sort_unstable();
        b.sort_unstable();
        a == b
    }

    /// Executes one instruction.
    pub fn execute(&mut self, instr: StackInstruction, sfs: &Sfs) -> Result<(), SimulationError> {
        if !instr.in_window() {
            return Err(SimulationError::OutOfWindow(instr));
        }
        match instr {
            StackInstruction::PushConst(v) => {
                if !sfs.is_lit(v) {
                    return Err(SimulationError::NotALiteral(instr));
                }
                self.stack.insert(0, v);
            }
            StackInstruction::Dup(n) => {
                let value = self.peek(n as usize - 1).ok_or(SimulationError::Underflow(instr))?;
                self.stack.insert(0, value);
            }
            StackInstruction::Swap(n) => {
                if n as usize >= self.stack.len() {
                    return Err(SimulationError::Underflow(instr));
                }
                self.stack.swap(0, n as usize);
            }
            StackInstruction::Pop => {
                if self.stack.is_empty() {
                    return Err(SimulationError::Underflow(instr));
                }
                self.stack.remove(0);
            }
            StackInstruction::Apply(id) => {
                let op = sfs.op(id);
                let n = op.arity();
                if n > self.stack.len() {
                    return Err(SimulationError::Underflow(instr));
                }
                let top = &self.stack[..n];
                let in_order = top == op.inputs.as_slice();
                let swapped =
                    op.is_commutative() && top[0] == op.inputs[1] && top[1] == op.inputs[0];
                if !in_order && !swapped {
                    return Err(SimulationError::OperandMismatch(op.name.clone()));
                }
                self.stack.drain(..n);
                if let Some(out) = op.output {
                    self.stack.insert(0, out);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasol_sfs::{NewOp, SfsBuilder, U256};

    fn sfs() -> (Sfs, [ValueId; 4]) {
        let mut b = SfsBuilder::new();
        let (x, y, z) = (b.var("x"), b.var("y"), b.var("z"));
        let five = b.lit(U256::from(5));
        b.op(NewOp {
            inputs: vec![x, y],
            outputs: vec![z],
            commutative: true,
            ..NewOp::new("ADD_0", "ADD")
        })
        .unwrap();
        b.src(vec![x, y]).tgt(vec![z]);
        (b.build().unwrap(), [x, y, z, five])
    }

    #[test]
    fn test_find() {
        let (_, [x, y, z, _]) = sfs();
        let model = StackModel::from_values(&[z, y, x, y]);

        assert_eq!(model.find(z), Some(0)); // Top
        assert_eq!(model.find(y), Some(1));
        assert_eq!(model.find(x), Some(2));
        assert_eq!(model.positions(y).collect::<Vec<_>>(), [1, 3]);
    }

    #[test]
    fn test_dup_swap_pop() {
        let (sfs, [x, y, _, five]) = sfs();
        let mut model = StackModel::from_values(&[x, y]);

        model.execute(StackInstruction::Dup(2), &sfs).unwrap();
        assert_eq!(model.as_slice(), [y, x, y]);
        model.execute(StackInstruction::Swap(1), &sfs).unwrap();
        assert_eq!(model.as_slice(), [x, y, y]);
        model.execute(StackInstruction::Pop, &sfs).unwrap();
        assert_eq!(model.as_slice(), [y, y]);
        model.execute(StackInstruction::PushConst(five), &sfs).unwrap();
        assert_eq!(model.top(), Some(five));

        assert_eq!(
            model.execute(StackInstruction::Swap(3), &sfs),
            Err(SimulationError::Underflow(StackInstruction::Swap(3)))
        );
        assert_eq!(
            model.execute(StackInstruction::PushConst(x), &sfs),
            Err(SimulationError::NotALiteral(StackInstruction::PushConst(x)))
        );
        assert_eq!(
            model.execute(StackInstruction::Dup(17), &sfs),
            Err(SimulationError::OutOfWindow(StackInstruction::Dup(17)))
        );
    }

    #[test]
    fn test_apply_commutative() {
        let (sfs, [x, y, z, _]) = sfs();
        let add = sfs.op_by_name("ADD_0").unwrap();

        let mut model = StackModel::from_values(&[y, x]);
        model.execute(StackInstruction::Apply(add), &sfs).unwrap();
        assert_eq!(model.as_slice(), [z]);

        let mut model = StackModel::from_values(&[x, x]);
        assert!(matches!(
            model.execute(StackInstruction::Apply(add), &sfs),
            Err(SimulationError::OperandMismatch(_))
        ));
    }

    #[test]
    fn test_permutation() {
        let (_, [x, y, z, _]) = sfs();
        let model = StackModel::from_values(&[x, y, x]);
        assert!(model.is_permutation_of(&[x, x, y]));
        assert!(!model.is_permutation_of(&[x, y, y]));
        assert!(!model.is_permutation_of(&[x, y, x, z]));
    }
}
