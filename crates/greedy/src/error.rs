use thiserror::Error;

/// An error that aborts a synthesis attempt.
///
/// No partial schedule is returned alongside any of these.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GreedyError {
    /// Eviction could not bring a value into the DUP16/SWAP16 window.
    #[error("`{value}` at depth {depth} cannot be brought within reach of DUP16/SWAP16")]
    InfeasibleWindow { value: String, depth: usize },
    /// An internal bookkeeping assertion failed.
    #[error("internal invariant violated: {0}")]
    Invariant(String),
    /// The schedule was produced but the validator did not accept it.
    #[error("schedule rejected: an expensive nullary operation is computed more than once")]
    Rejected,
}

impl GreedyError {
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }
}
