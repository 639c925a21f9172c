use gasol_config::{EvmVersion, Opts};

/// Options for a single synthesis attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GreedyConfig {
    /// Target EVM version, used when rendering opcodes.
    pub evm_version: EvmVersion,
    /// Discard dead values and align overlapping slots before the main loop.
    pub precompute: bool,
    /// Simulate the produced schedule and check it against the target stack and ordering
    /// constraints.
    pub verify: bool,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self { evm_version: EvmVersion::default(), precompute: true, verify: true }
    }
}

impl GreedyConfig {
    /// Builds the configuration from command-line options.
    pub fn from_opts(opts: &Opts) -> Self {
        Self {
            evm_version: opts.evm_version,
            precompute: !opts.unstable.no_precompute,
            verify: !opts.unstable.no_verify,
        }
    }
}
