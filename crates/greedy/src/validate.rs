//! Structural checks over a synthesized id sequence.
//!
//! Both checks only look at the id sequence, so validating the same sequence twice always gives
//! the same verdict.

use crate::Liveness;
use gasol_sfs::Sfs;
use rustc_hash::FxHashSet;
use tracing::instrument;

/// The validator's verdict on an id sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verdict {
    /// See [`accept`].
    pub accepted: bool,
    /// See [`correct`].
    pub correct: bool,
}

/// Runs both checks.
#[instrument(level = "debug", skip_all)]
pub fn validate(sfs: &Sfs, ids: &[String]) -> Verdict {
    Verdict { accepted: accept(sfs, ids), correct: correct(sfs, ids) }
}

/// Returns false if an expensive nullary operation appears more than once.
pub fn accept(sfs: &Sfs, ids: &[String]) -> bool {
    let mut seen = FxHashSet::default();
    ids.iter()
        .filter_map(|id| sfs.op_by_name(id))
        .filter(|&id| {
            let op = sfs.op(id);
            op.arity() == 0 && !op.is_small_nullary()
        })
        .all(|id| seen.insert(id))
}

/// Returns true if every operand that is used exactly once, or is small-nullary, is produced
/// within the `n` ids right before the `n`-ary operation consuming it.
///
/// The producer only has to fall inside that window, not directly before the consumer: in
/// `A B OP` both `A` and `B` count as immediate producers of the binary `OP`.
pub fn correct(sfs: &Sfs, ids: &[String]) -> bool {
    let liveness = Liveness::new(sfs);
    ids.iter().enumerate().all(|(k, id)| {
        let Some(id) = sfs.op_by_name(id) else { return true };
        let op = sfs.op(id);
        let window = &ids[k.saturating_sub(op.arity())..k];
        op.inputs.iter().all(|&input| {
            let Some(producer) = sfs.producer(input) else { return true };
            let producer = sfs.op(producer);
            if !producer.is_small_nullary() && liveness.uses(input) != 1 {
                return true;
            }
            window.contains(&producer.name)
        })
    })
}
