use super::Synthesizer;
use crate::{GreedyError, stack::StackInstruction};
use smallvec::SmallVec;
use tracing::{debug, instrument};

impl Synthesizer<'_> {
    /// Sorts a stack holding exactly the target values into target order.
    ///
    /// A misplaced top is swapped into a mismatched position that wants it, which fixes that
    /// position for good. A correct top is exchanged with the first mismatched position. Solved
    /// positions always match, so they are never touched.
    #[instrument(level = "debug", skip_all)]
    pub(super) fn permute(&mut self) -> Result<(), GreedyError> {
        let sfs = self.sfs;
        let tgt = &sfs.tgt;
        let start = self.schedule.len();
        let mut steps = 0;
        loop {
            let stack = self.stack.as_slice();
            let mismatched: SmallVec<[usize; 16]> =
                (0..tgt.len()).filter(|&p| stack[p] != tgt[p]).collect();
            let Some(&first) = mismatched.first() else { break };
            if steps > 2 * tgt.len() {
                return Err(GreedyError::invariant("stack permutation does not converge"));
            }
            steps += 1;

            let depth = if first == 0 {
                mismatched.iter().copied().find(|&p| p > 0 && tgt[p] == stack[0])
            } else {
                Some(first)
            };
            let swap = depth.and_then(StackInstruction::swap_depth).ok_or_else(|| {
                GreedyError::invariant(format!("no reachable position to permute from {depth:?}"))
            })?;
            self.emit(swap)?;
        }

        for j in 0..self.solved.len() {
            if !self.solved[j] {
                self.solve(j)?;
            }
        }
        debug!(emitted = self.schedule.len() - start, "permuted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{StackInstruction, synth::Synthesizer};
    use gasol_sfs::SfsBuilder;

    #[test]
    fn test_rotation() {
        let mut b = SfsBuilder::new();
        let (x, y, z) = (b.var("x"), b.var("y"), b.var("z"));
        b.src(vec![x, y, z]).tgt(vec![y, z, x]);
        let sfs = b.build().unwrap();

        let mut synth = Synthesizer::new(&sfs);
        assert!(synth.is_permutation());
        synth.permute().unwrap();
        assert_eq!(synth.stack.as_slice(), [y, z, x]);
        assert_eq!(synth.schedule, [StackInstruction::Swap(2), StackInstruction::Swap(1)]);
        assert_eq!(synth.next_slot(), None);
    }

    #[test]
    fn test_duplicates() {
        let mut b = SfsBuilder::new();
        let (x, y) = (b.var("x"), b.var("y"));
        b.src(vec![x, y, x, y]).tgt(vec![y, x, y, x]);
        let sfs = b.build().unwrap();

        let mut synth = Synthesizer::new(&sfs);
        synth.permute().unwrap();
        assert_eq!(synth.stack.as_slice(), [y, x, y, x]);
    }
}
