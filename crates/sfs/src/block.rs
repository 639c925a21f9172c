//! SFS blocks and their builder.

use crate::{OpId, OpKind, Operation, SfsError, Value, ValueId};
use alloy_primitives::U256;
use index_vec::IndexVec;
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use std::fmt;

/// Metadata carried through from the SFS builder. Not used by the synthesis engine.
#[derive(Clone, Debug, Default)]
pub struct BlockMeta {
    /// Gas cost of the original block.
    pub current_cost: Option<u64>,
    /// Number of instructions in the original block.
    pub init_progr_len: Option<u64>,
    /// Maximum stack size reached by the original block.
    pub max_sk_sz: Option<u64>,
    /// The original instructions, as text.
    pub original_instrs: Option<String>,
}

/// A Stack Functional Specification for one basic block.
#[derive(Clone, Debug)]
pub struct Sfs {
    /// Initial stack, index 0 being the top.
    pub src: Vec<ValueId>,
    /// Goal stack, index 0 being the top.
    pub tgt: Vec<ValueId>,
    /// All interned values.
    pub values: IndexVec<ValueId, Value>,
    /// All operations.
    pub ops: IndexVec<OpId, Operation>,
    /// Memory-space ordering constraints, `(before, after)`.
    pub memory_deps: Vec<(OpId, OpId)>,
    /// Storage-space ordering constraints, `(before, after)`.
    pub storage_deps: Vec<(OpId, OpId)>,
    /// Carried metadata.
    pub meta: BlockMeta,
    producers: FxHashMap<ValueId, OpId>,
    names: FxHashMap<String, OpId>,
}

impl Sfs {
    /// Returns the value with the given id.
    #[inline]
    #[must_use]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id]
    }

    /// Returns the operation with the given id.
    #[inline]
    #[must_use]
    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id]
    }

    /// Returns the operation producing `value`, if any.
    #[inline]
    #[must_use]
    pub fn producer(&self, value: ValueId) -> Option<OpId> {
        self.producers.get(&value).copied()
    }

    /// Looks up an operation by name.
    #[must_use]
    pub fn op_by_name(&self, name: &str) -> Option<OpId> {
        self.names.get(name).copied()
    }

    /// Returns true if `value` is a literal.
    #[inline]
    #[must_use]
    pub fn is_lit(&self, value: ValueId) -> bool {
        self.values[value].is_lit()
    }

    /// Returns true if `value` is cheaper to recompute than to keep around: a literal or the
    /// output of a small nullary operation.
    #[must_use]
    pub fn is_small_nullary(&self, value: ValueId) -> bool {
        self.is_lit(value) || self.producer(value).is_some_and(|op| self.ops[op].is_small_nullary())
    }

    /// Returns both groups of ordering constraints, memory first.
    pub fn all_deps(&self) -> impl Iterator<Item = (OpId, OpId)> + '_ {
        self.memory_deps.iter().chain(&self.storage_deps).copied()
    }

    /// Returns a displayable name for `value`.
    pub fn display(&self, value: ValueId) -> impl fmt::Display + '_ {
        &self.values[value]
    }
}

/// An operation to add to an [`SfsBuilder`].
#[derive(Clone, Debug, Default)]
pub struct NewOp {
    /// Unique name.
    pub name: String,
    /// Assembly mnemonic.
    pub mnemonic: String,
    /// Hex-encoded opcode.
    pub opcode: String,
    /// Inputs, top first.
    pub inputs: Vec<ValueId>,
    /// Outputs; at most one is supported.
    pub outputs: Vec<ValueId>,
    /// Whether the two inputs may be swapped.
    pub commutative: bool,
    /// Whether the operation is an effectful write.
    pub storage: bool,
    /// Gas cost.
    pub gas: u64,
    /// Encoded size.
    pub size: u64,
    /// Immediate tokens.
    pub push_value: Vec<String>,
}

impl NewOp {
    /// Creates a new operation description with the mnemonic as its only required field.
    pub fn new(name: impl Into<String>, mnemonic: impl Into<String>) -> Self {
        Self { name: name.into(), mnemonic: mnemonic.into(), gas: 3, size: 1, ..Default::default() }
    }
}

/// Incrementally builds an [`Sfs`], interning values and classifying operations.
#[derive(Debug, Default)]
pub struct SfsBuilder {
    values: IndexVec<ValueId, Value>,
    interned: FxHashMap<Value, ValueId>,
    ops: Vec<(NewOp, Option<ValueId>)>,
    names: FxHashMap<String, OpId>,
    src: Vec<ValueId>,
    tgt: Vec<ValueId>,
    memory_deps: Vec<(OpId, OpId)>,
    storage_deps: Vec<(OpId, OpId)>,
    meta: BlockMeta,
}

impl SfsBuilder {
    /// Creates a new empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a value.
    pub fn value(&mut self, value: Value) -> ValueId {
        if let Some(&id) = self.interned.get(&value) {
            return id;
        }
        let id = self.values.push(value.clone());
        self.interned.insert(value, id);
        id
    }

    /// Interns a variable.
    pub fn var(&mut self, name: &str) -> ValueId {
        self.value(Value::Var(name.to_string()))
    }

    /// Interns a literal.
    pub fn lit(&mut self, value: U256) -> ValueId {
        self.value(Value::Lit(value))
    }

    /// Interns a stack token, see [`Value::from_token`].
    pub fn token(&mut self, token: &str) -> ValueId {
        self.value(Value::from_token(token))
    }

    /// Sets the source stack.
    pub fn src(&mut self, src: Vec<ValueId>) -> &mut Self {
        self.src = src;
        self
    }

    /// Sets the target stack.
    pub fn tgt(&mut self, tgt: Vec<ValueId>) -> &mut Self {
        self.tgt = tgt;
        self
    }

    /// Sets the carried metadata.
    pub fn meta(&mut self, meta: BlockMeta) -> &mut Self {
        self.meta = meta;
        self
    }

    /// Adds an operation.
    pub fn op(&mut self, op: NewOp) -> Result<OpId, SfsError> {
        if self.names.contains_key(&op.name) {
            return Err(SfsError::DuplicateOp(op.name));
        }
        if op.outputs.len() > 1 {
            return Err(SfsError::MultipleOutputs(op.name, op.outputs.len()));
        }
        let output = op.outputs.first().copied();
        if let Some(out) = output
            && self.values[out].is_lit()
        {
            return Err(SfsError::LiteralOutput(self.values[out].to_string(), op.name));
        }
        let id = OpId::from_usize(self.ops.len());
        self.names.insert(op.name.clone(), id);
        self.ops.push((op, output));
        Ok(id)
    }

    /// Adds a memory-space ordering constraint between two previously added operations.
    pub fn memory_dep(&mut self, before: &str, after: &str) -> Result<&mut Self, SfsError> {
        let pair = (self.lookup(before)?, self.lookup(after)?);
        self.memory_deps.push(pair);
        Ok(self)
    }

    /// Adds a storage-space ordering constraint between two previously added operations.
    pub fn storage_dep(&mut self, before: &str, after: &str) -> Result<&mut Self, SfsError> {
        let pair = (self.lookup(before)?, self.lookup(after)?);
        self.storage_deps.push(pair);
        Ok(self)
    }

    fn lookup(&self, name: &str) -> Result<OpId, SfsError> {
        self.names.get(name).copied().ok_or_else(|| SfsError::UnknownOp(name.to_string()))
    }

    /// Classifies the operations and finishes the SFS.
    pub fn build(self) -> Result<Sfs, SfsError> {
        let Self { values, interned: _, ops, names, src, tgt, memory_deps, storage_deps, meta } =
            self;

        let ordered: FxHashSet<OpId> =
            memory_deps.iter().chain(&storage_deps).flat_map(|&(a, b)| [a, b]).collect();
        let sources: FxHashSet<ValueId> = src.iter().copied().collect();

        let mut producers = FxHashMap::default();
        let mut built = IndexVec::with_capacity(ops.len());
        for (op, output) in ops {
            let id = built.next_idx();
            if let Some(out) = output {
                if sources.contains(&out) {
                    return Err(SfsError::ProducedSourceValue(values[out].to_string(), op.name));
                }
                if producers.insert(out, id).is_some() {
                    return Err(SfsError::DuplicateProducer(values[out].to_string()));
                }
            }
            let kind = match (op.storage, output) {
                (true, None) => OpKind::Store,
                (true, Some(_)) => OpKind::Load,
                (false, _) if ordered.contains(&id) => OpKind::Load,
                (false, _) if op.inputs.is_empty() => OpKind::Nullary,
                (false, _) => OpKind::Pure { commutative: op.commutative },
            };
            built.push(Operation {
                name: op.name,
                mnemonic: op.mnemonic,
                opcode: op.opcode,
                kind,
                inputs: SmallVec::from_vec(op.inputs),
                output,
                gas: op.gas,
                size: op.size,
                push_value: op.push_value,
            });
        }

        if let Some(id) = find_cycle(&built, &producers) {
            return Err(SfsError::Cycle(built[id].name.clone()));
        }

        Ok(Sfs { src, tgt, values, ops: built, memory_deps, storage_deps, meta, producers, names })
    }
}

/// Returns an operation that transitively consumes its own output, if any.
fn find_cycle(
    ops: &IndexVec<OpId, Operation>,
    producers: &FxHashMap<ValueId, OpId>,
) -> Option<OpId> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        New,
        Open,
        Done,
    }

    let mut marks: IndexVec<OpId, Mark> = IndexVec::from_vec(vec![Mark::New; ops.len()]);
    let mut stack: Vec<(OpId, usize)> = Vec::new();
    for (root, _) in ops.iter_enumerated() {
        if marks[root] != Mark::New {
            continue;
        }
        marks[root] = Mark::Open;
        stack.push((root, 0));
        while let Some((id, next)) = stack.last_mut() {
            let id = *id;
            let Some(&input) = ops[id].inputs.get(*next) else {
                marks[id] = Mark::Done;
                stack.pop();
                continue;
            };
            *next += 1;
            let Some(&producer) = producers.get(&input) else { continue };
            match marks[producer] {
                Mark::Open => return Some(producer),
                Mark::Done => {}
                Mark::New => {
                    marks[producer] = Mark::Open;
                    stack.push((producer, 0));
                }
            }
        }
    }
    None
}
