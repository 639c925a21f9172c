//! SFS operations.

use crate::ValueId;
use smallvec::SmallVec;

index_vec::define_index_type! {
    /// A unique identifier for an operation in an SFS.
    pub struct OpId = u32;
    DISPLAY_FORMAT = "op{}";
}

/// Maximum gas of a nullary operation that is still cheap enough to recompute at every use.
pub const SMALL_NULLARY_MAX_GAS: u64 = 3;

/// Maximum encoded size of a nullary operation that is still cheap enough to recompute.
pub const SMALL_NULLARY_MAX_SIZE: u64 = 5;

/// The kind of an operation.
///
/// Classified once when the SFS is built; the synthesis engine never looks at mnemonics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// An effectful write with no output, e.g. `SSTORE` or `MSTORE`.
    Store,
    /// A value-producing operation that takes part in the memory or storage ordering, e.g.
    /// `SLOAD`, `MLOAD` or `KECCAK256`.
    Load,
    /// A zero-input value producer, e.g. `PUSH [tag]` or `CALLER`.
    Nullary,
    /// Any other computation.
    Pure {
        /// Whether the two inputs of a binary operation may be swapped.
        commutative: bool,
    },
}

impl OpKind {
    /// Returns true for effectful writes.
    #[must_use]
    pub const fn is_storage(self) -> bool {
        matches!(self, Self::Store)
    }

    /// Returns true if the inputs of the operation may be swapped.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(self, Self::Pure { commutative: true })
    }
}

/// A node of the SFS operation DAG.
#[derive(Clone, Debug)]
pub struct Operation {
    /// Unique name, e.g. `ADD_0`.
    pub name: String,
    /// Assembly mnemonic, e.g. `ADD` or `PUSH [tag]`.
    pub mnemonic: String,
    /// Hex-encoded opcode, if known.
    pub opcode: String,
    /// The operation kind.
    pub kind: OpKind,
    /// Inputs, index 0 being the top of the stack when the operation executes.
    pub inputs: SmallVec<[ValueId; 4]>,
    /// The produced value, if any.
    pub output: Option<ValueId>,
    /// Gas cost.
    pub gas: u64,
    /// Encoded size in bytes.
    pub size: u64,
    /// Immediate tokens printed after the mnemonic, e.g. the tag of a `PUSH [tag]`.
    pub push_value: Vec<String>,
}

impl Operation {
    /// Returns the number of inputs.
    #[inline]
    #[must_use]
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    /// Returns true for effectful writes.
    #[inline]
    #[must_use]
    pub fn is_storage(&self) -> bool {
        self.kind.is_storage()
    }

    /// Returns true if the inputs of this binary operation may be swapped.
    #[inline]
    #[must_use]
    pub fn is_commutative(&self) -> bool {
        self.kind.is_commutative() && self.arity() == 2
    }

    /// Returns true if recomputing this operation at every use is cheaper than keeping its
    /// result on the stack.
    #[must_use]
    pub fn is_small_nullary(&self) -> bool {
        self.kind == OpKind::Nullary
            && self.gas <= SMALL_NULLARY_MAX_GAS
            && self.size <= SMALL_NULLARY_MAX_SIZE
    }
}
