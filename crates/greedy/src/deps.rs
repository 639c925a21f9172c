//! Merging of the memory-space and storage-space ordering constraints.
//!
//! Each constraint group is reduced to the operations that are actually scheduled (elided loads
//! are bypassed by transitive edges) and assigned longest-path positions. The queue of ordered
//! operations is then produced by a topological sort over both groups plus the data edges between
//! queued operations, so that an operation whose output feeds another queued operation always
//! comes first.

use crate::Liveness;
use gasol_sfs::{OpId, OpKind, Sfs};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{cmp::Reverse, collections::BinaryHeap};
use tracing::instrument;

/// The constraint group an ordering edge comes from. Memory-space wins ties.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Group {
    Memory,
    Storage,
}

/// Priority of a queued operation: earliest group position, loads before stores, memory group
/// first, then declaration order.
type Key = (usize, bool, Group, OpId);

/// Computes the order in which stores and ordered loads are flushed.
#[instrument(level = "debug", skip_all)]
pub fn merged_order(sfs: &Sfs, liveness: &Liveness) -> Vec<OpId> {
    let memory = reduce(&sfs.memory_deps, liveness);
    let storage = reduce(&sfs.storage_deps, liveness);

    let mut queued: Vec<OpId> = sfs
        .ops
        .iter_enumerated()
        .filter(|&(id, op)| {
            liveness.is_needed(id)
                && match op.kind {
                    OpKind::Store => true,
                    OpKind::Load => memory.touches(id) || storage.touches(id),
                    OpKind::Nullary | OpKind::Pure { .. } => false,
                }
        })
        .map(|(id, _)| id)
        .collect();
    queued.sort_unstable();
    if queued.is_empty() {
        return queued;
    }

    let memory_pos = memory.positions();
    let storage_pos = storage.positions();
    let key = |id: OpId| -> Key {
        let m = memory_pos.get(&id).copied();
        let s = storage_pos.get(&id).copied();
        let (pos, group) = match (m, s) {
            (Some(m), Some(s)) if s < m => (s, Group::Storage),
            (Some(m), _) => (m, Group::Memory),
            (None, Some(s)) => (s, Group::Storage),
            (None, None) => (0, Group::Storage),
        };
        (pos, sfs.op(id).is_storage(), group, id)
    };

    let mut edges: FxHashSet<(OpId, OpId)> =
        memory.edges.iter().chain(&storage.edges).copied().collect();
    edges.extend(data_edges(sfs, &queued));

    let order = toposort(&queued, &edges, key);
    tracing::debug!(len = order.len(), "merged ordering constraints");
    order
}

/// One constraint group, restricted to scheduled operations.
#[derive(Debug, Default)]
struct Reduced {
    nodes: FxHashSet<OpId>,
    edges: Vec<(OpId, OpId)>,
}

impl Reduced {
    fn touches(&self, id: OpId) -> bool {
        self.nodes.contains(&id)
    }

    /// Longest path from the roots of the group. Nodes on a cycle keep the longest position found
    /// before the iteration bound is hit.
    fn positions(&self) -> FxHashMap<OpId, usize> {
        let mut pos: FxHashMap<OpId, usize> = self.nodes.iter().map(|&id| (id, 0)).collect();
        for _ in 0..self.nodes.len() {
            let mut changed = false;
            for &(a, b) in &self.edges {
                let candidate = pos[&a] + 1;
                if candidate > pos[&b] && candidate <= self.nodes.len() {
                    pos.insert(b, candidate);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        pos
    }
}

/// Drops edges touching elided operations, keeping the order they implied.
fn reduce(deps: &[(OpId, OpId)], liveness: &Liveness) -> Reduced {
    let mut edges: FxHashSet<(OpId, OpId)> = deps.iter().copied().filter(|(a, b)| a != b).collect();
    let elided: FxHashSet<OpId> =
        deps.iter().flat_map(|&(a, b)| [a, b]).filter(|&id| !liveness.is_needed(id)).collect();
    let mut elided: Vec<OpId> = elided.into_iter().collect();
    elided.sort_unstable();
    for e in elided {
        let preds: Vec<OpId> = edges.iter().filter(|&&(_, b)| b == e).map(|&(a, _)| a).collect();
        let succs: Vec<OpId> = edges.iter().filter(|&&(a, _)| a == e).map(|&(_, b)| b).collect();
        edges.retain(|&(a, b)| a != e && b != e);
        for &p in &preds {
            for &s in &succs {
                if p != s {
                    edges.insert((p, s));
                }
            }
        }
    }
    let mut edges: Vec<_> = edges.into_iter().collect();
    edges.sort_unstable();
    let nodes = edges.iter().flat_map(|&(a, b)| [a, b]).collect();
    Reduced { nodes, edges }
}

/// `(p, q)` for every pair of queued operations where `p`'s output is used to compute `q`'s
/// inputs.
fn data_edges(sfs: &Sfs, queued: &[OpId]) -> Vec<(OpId, OpId)> {
    let is_queued: FxHashSet<OpId> = queued.iter().copied().collect();
    let mut edges = Vec::new();
    for &q in queued {
        let mut seen = FxHashSet::default();
        let mut stack: Vec<OpId> =
            sfs.op(q).inputs.iter().filter_map(|&v| sfs.producer(v)).collect();
        while let Some(p) = stack.pop() {
            if !seen.insert(p) {
                continue;
            }
            if is_queued.contains(&p) && p != q {
                edges.push((p, q));
            }
            stack.extend(sfs.op(p).inputs.iter().filter_map(|&v| sfs.producer(v)));
        }
    }
    edges
}

/// Kahn's algorithm, always picking the ready node with the smallest key.
///
/// On a cycle the remaining nodes are appended in key order.
fn toposort(
    nodes: &[OpId],
    edges: &FxHashSet<(OpId, OpId)>,
    key: impl Fn(OpId) -> Key,
) -> Vec<OpId> {
    let members: FxHashSet<OpId> = nodes.iter().copied().collect();
    let mut indegree: FxHashMap<OpId, usize> = nodes.iter().map(|&id| (id, 0)).collect();
    let mut succs: FxHashMap<OpId, Vec<OpId>> = FxHashMap::default();
    for &(a, b) in edges {
        if members.contains(&a) && members.contains(&b) {
            *indegree.entry(b).or_default() += 1;
            succs.entry(a).or_default().push(b);
        }
    }

    let mut heap: BinaryHeap<Reverse<Key>> =
        nodes.iter().filter(|&&id| indegree[&id] == 0).map(|&id| Reverse(key(id))).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse((.., id))) = heap.pop() {
        order.push(id);
        for &s in succs.get(&id).map(Vec::as_slice).unwrap_or_default() {
            let d = indegree.entry(s).or_default();
            *d -= 1;
            if *d == 0 {
                heap.push(Reverse(key(s)));
            }
        }
    }

    if order.len() < nodes.len() {
        let emitted: FxHashSet<OpId> = order.iter().copied().collect();
        let mut rest: Vec<Key> =
            nodes.iter().filter(|&&id| !emitted.contains(&id)).map(|&id| key(id)).collect();
        rest.sort_unstable();
        tracing::warn!(cyclic = rest.len(), "ordering constraints contain a cycle");
        order.extend(rest.into_iter().map(|(.., id)| id));
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use gasol_sfs::{NewOp, SfsBuilder, ValueId};

    fn names<'a>(sfs: &'a Sfs, order: &[OpId]) -> Vec<&'a str> {
        order.iter().map(|&id| sfs.op(id).name.as_str()).collect()
    }

    fn load(b: &mut SfsBuilder, name: &str, k: ValueId, l: ValueId) {
        b.op(NewOp { inputs: vec![k], outputs: vec![l], ..NewOp::new(name, "MLOAD") }).unwrap();
    }

    fn store(b: &mut SfsBuilder, name: &str, k: ValueId, v: ValueId) {
        b.op(NewOp { inputs: vec![k, v], storage: true, ..NewOp::new(name, "SSTORE") }).unwrap();
    }

    #[test]
    fn test_no_constraints() {
        let mut b = SfsBuilder::new();
        let (k, v) = (b.var("k"), b.var("v"));
        store(&mut b, "SSTORE_1", k, v);
        store(&mut b, "SSTORE_0", v, k);
        b.src(vec![k, v]);
        let sfs = b.build().unwrap();
        let order = merged_order(&sfs, &Liveness::new(&sfs));
        assert_eq!(names(&sfs, &order), ["SSTORE_1", "SSTORE_0"]);
    }

    #[test]
    fn test_constraint_overrides_declaration_order() {
        let mut b = SfsBuilder::new();
        let (k, v) = (b.var("k"), b.var("v"));
        store(&mut b, "SSTORE_0", k, v);
        store(&mut b, "SSTORE_1", v, k);
        b.storage_dep("SSTORE_1", "SSTORE_0").unwrap();
        b.src(vec![k, v]);
        let sfs = b.build().unwrap();
        let order = merged_order(&sfs, &Liveness::new(&sfs));
        assert_eq!(names(&sfs, &order), ["SSTORE_1", "SSTORE_0"]);
    }

    #[test]
    fn test_elided_load_keeps_transitive_order() {
        let mut b = SfsBuilder::new();
        let (k, v, l) = (b.var("k"), b.var("v"), b.var("l"));
        store(&mut b, "MSTORE_0", k, v);
        load(&mut b, "MLOAD_0", k, l);
        store(&mut b, "MSTORE_1", v, k);
        b.memory_dep("MSTORE_1", "MLOAD_0").unwrap();
        b.memory_dep("MLOAD_0", "MSTORE_0").unwrap();
        b.src(vec![k, v]);
        let sfs = b.build().unwrap();
        let order = merged_order(&sfs, &Liveness::new(&sfs));
        assert_eq!(names(&sfs, &order), ["MSTORE_1", "MSTORE_0"]);
    }

    #[test]
    fn test_data_edge_and_both_groups() {
        let mut b = SfsBuilder::new();
        let (k, v, l) = (b.var("k"), b.var("v"), b.var("l"));
        load(&mut b, "SLOAD_0", k, l);
        store(&mut b, "MSTORE_0", k, v);
        store(&mut b, "SSTORE_0", k, l);
        b.memory_dep("MSTORE_0", "SLOAD_0").unwrap();
        b.storage_dep("SLOAD_0", "SSTORE_0").unwrap();
        b.src(vec![k, v]);
        let sfs = b.build().unwrap();
        let order = merged_order(&sfs, &Liveness::new(&sfs));
        assert_eq!(names(&sfs, &order), ["MSTORE_0", "SLOAD_0", "SSTORE_0"]);
    }

    #[test]
    fn test_cycle_falls_back() {
        let mut b = SfsBuilder::new();
        let (k, v) = (b.var("k"), b.var("v"));
        store(&mut b, "SSTORE_0", k, v);
        store(&mut b, "SSTORE_1", v, k);
        b.storage_dep("SSTORE_0", "SSTORE_1").unwrap();
        b.storage_dep("SSTORE_1", "SSTORE_0").unwrap();
        b.src(vec![k, v]);
        let sfs = b.build().unwrap();
        assert_eq!(merged_order(&sfs, &Liveness::new(&sfs)).len(), 2);
    }
}
