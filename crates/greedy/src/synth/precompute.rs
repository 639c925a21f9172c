use super::Synthesizer;
use crate::{GreedyError, stack::StackInstruction};
use tracing::{debug, instrument};

impl Synthesizer<'_> {
    /// Solves the slots the source stack already satisfies, bottom-up.
    ///
    /// Dead values are popped off the top, slots already holding their value are frozen, and a
    /// top value that belongs in the next slot is swapped there. Stops at the first slot that
    /// needs real work.
    #[instrument(level = "debug", skip_all)]
    pub(super) fn precompute(&mut self) -> Result<(), GreedyError> {
        let start = self.schedule.len();
        let mut solved = 0usize;
        loop {
            self.pop_dead_tops()?;
            let Some(j) = self.next_slot() else { break };
            let value = self.sfs.tgt[j];
            if self.slot_holds(j, value) {
                self.solve(j)?;
                solved += 1;
                continue;
            }
            if let Some(depth) = self.slot_depth(j)
                && self.stack.top() == Some(value)
                && !self.is_frozen(0)
                && self.is_covered(value)
                && let Some(swap) = StackInstruction::swap_depth(depth)
            {
                self.emit(swap)?;
                self.solve(j)?;
                solved += 1;
                continue;
            }
            break;
        }
        debug!(emitted = self.schedule.len() - start, solved, "precomputed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{StackInstruction, synth::Synthesizer};
    use gasol_sfs::SfsBuilder;

    #[test]
    fn test_precompute_solves_overlap() {
        let mut b = SfsBuilder::new();
        let (a, x, c) = (b.var("a"), b.var("x"), b.var("c"));
        b.src(vec![x, a, c]).tgt(vec![a, c]);
        let sfs = b.build().unwrap();

        let mut synth = Synthesizer::new(&sfs);
        synth.precompute().unwrap();
        assert_eq!(synth.schedule, [StackInstruction::Pop]);
        assert_eq!(synth.next_slot(), None);
    }

    #[test]
    fn test_precompute_swaps_into_slot() {
        let mut b = SfsBuilder::new();
        let (a, b_, c) = (b.var("a"), b.var("b"), b.var("c"));
        b.src(vec![a, b_, c]).tgt(vec![c, b_, a]);
        let sfs = b.build().unwrap();

        let mut synth = Synthesizer::new(&sfs);
        synth.precompute().unwrap();
        assert_eq!(synth.schedule, [StackInstruction::Swap(2)]);
        assert_eq!(synth.next_slot(), None);
    }

    #[test]
    fn test_precompute_stops_on_missing_value() {
        let mut b = SfsBuilder::new();
        let (b_, c) = (b.var("b"), b.var("c"));
        b.src(vec![b_]).tgt(vec![c, b_]);
        let sfs = b.build().unwrap();

        let mut synth = Synthesizer::new(&sfs);
        synth.precompute().unwrap();
        assert!(synth.schedule.is_empty());
        assert_eq!(synth.next_slot(), Some(0));
    }
}
