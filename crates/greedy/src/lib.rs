#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

use gasol_sfs::{Sfs, ValueId};
use tracing::{debug, instrument};

mod config;
pub use config::GreedyConfig;

mod deps;
pub use deps::merged_order;

mod error;
pub use error::GreedyError;

mod liveness;
pub use liveness::Liveness;

mod schedule;
pub use schedule::{Schedule, Solution};

pub mod stack;
pub use stack::{MAX_STACK_ACCESS, SimulationError, StackInstruction, StackModel};

mod synth;
use synth::Synthesizer;

pub mod validate;

/// Synthesizes a schedule for `sfs`.
///
/// Fails if the window cannot be respected, if an internal check fails, or if the validator
/// rejects the result. No partial schedule is ever returned.
#[instrument(level = "debug", skip_all)]
pub fn solve(sfs: &Sfs, config: &GreedyConfig) -> Result<Solution, GreedyError> {
    let schedule = Synthesizer::new(sfs).run(config.precompute)?;
    if config.verify {
        verify(sfs, &schedule)?;
    }

    let ids = schedule.ids(sfs);
    let verdict = validate::validate(sfs, &ids);
    if !verdict.accepted {
        return Err(GreedyError::Rejected);
    }
    let opcodes = schedule.opcodes(sfs, config.evm_version);
    debug!(len = schedule.len(), correct = verdict.correct, "solved");
    Ok(Solution { schedule, opcodes, ids, accepted: verdict.accepted, correct: verdict.correct })
}

/// Checks that `schedule` turns the source stack into the target stack, applies every store
/// exactly once and respects every ordering constraint.
pub fn verify(sfs: &Sfs, schedule: &Schedule) -> Result<(), GreedyError> {
    let stack = schedule.simulate(sfs).map_err(|e| GreedyError::invariant(e.to_string()))?;
    if stack != sfs.tgt {
        let show =
            |s: &[ValueId]| s.iter().map(|&v| sfs.display(v).to_string()).collect::<Vec<_>>();
        return Err(GreedyError::invariant(format!(
            "schedule yields {:?} instead of {:?}",
            show(stack.as_slice()),
            show(sfs.tgt.as_slice())
        )));
    }
    if let Some((id, n)) = schedule.misapplied_store(sfs) {
        return Err(GreedyError::invariant(format!(
            "store `{}` is applied {n} times",
            sfs.op(id).name
        )));
    }
    if !schedule.respects_order(sfs) {
        return Err(GreedyError::invariant("schedule breaks an ordering constraint"));
    }
    Ok(())
}
