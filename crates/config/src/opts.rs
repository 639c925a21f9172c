//! GASOL CLI arguments.

use crate::{EvmVersion, OutputFormat};
use std::path::PathBuf;

#[cfg(feature = "clap")]
use clap::{Parser, ValueHint};

/// Greedy EVM basic-block superoptimizer.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "clap", derive(Parser))]
#[cfg_attr(feature = "clap", command(
    name = "gasol",
    version = crate::VERSION,
    arg_required_else_help = true,
))]
#[allow(clippy::manual_non_exhaustive)]
pub struct Opts {
    /// SFS files to optimize.
    ///
    /// `-` specifies standard input.
    #[cfg_attr(feature = "clap", arg(value_hint = ValueHint::FilePath))]
    pub input: Vec<PathBuf>,

    /// EVM version. Decides whether `PUSH0` is available.
    #[cfg_attr(feature = "clap", arg(long, value_enum, default_value_t))]
    pub evm_version: EvmVersion,

    /// How results are printed.
    #[cfg_attr(
        feature = "clap",
        arg(help_heading = "Display options", long, value_enum, default_value_t)
    )]
    pub format: OutputFormat,
    /// Pretty-print JSON output.
    #[cfg_attr(feature = "clap", arg(help_heading = "Display options", long))]
    pub pretty_json: bool,

    /// Unstable flags. WARNING: these are completely unstable, and may change at any time.
    ///
    /// See `-Zhelp` for more details.
    #[doc(hidden)]
    #[cfg_attr(feature = "clap", arg(id = "unstable-features", value_name = "FLAG", short = 'Z'))]
    pub _unstable: Vec<String>,

    /// Parsed unstable flags.
    #[cfg_attr(feature = "clap", arg(skip))]
    pub unstable: UnstableOpts,

    // Allows `Opts { x: y, ..Default::default() }`.
    #[doc(hidden)]
    #[cfg_attr(feature = "clap", arg(skip))]
    pub _non_exhaustive: (),
}

impl Opts {
    /// Finishes argument parsing.
    ///
    /// This currently only parses the `-Z` arguments into the `unstable` field.
    #[cfg(feature = "clap")]
    pub fn finish(&mut self) -> Result<(), clap::Error> {
        if !self._unstable.is_empty() {
            let hack = self._unstable.iter().map(|s| format!("--{s}"));
            self.unstable =
                UnstableOpts::try_parse_from(std::iter::once(String::new()).chain(hack))?;
        }
        Ok(())
    }
}

/// Internal options.
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "clap", derive(Parser))]
#[cfg_attr(feature = "clap", clap(
    disable_help_flag = true,
    before_help = concat!(
        "List of all unstable flags.\n",
        "WARNING: these are completely unstable, and may change at any time!\n",
        "   NOTE: the following flags should be passed on the command-line using `-Z`, not `--`",
    ),
    help_template = "{before-help}{all-args}"
))]
#[allow(clippy::manual_non_exhaustive)]
pub struct UnstableOpts {
    /// Skip the preprocessing pass that pops dead values and aligns the shared stack bottom.
    #[cfg_attr(feature = "clap", arg(long))]
    pub no_precompute: bool,

    /// Do not simulate the synthesized sequence against the target stack.
    #[cfg_attr(feature = "clap", arg(long))]
    pub no_verify: bool,

    /// Print the final stack of every block next to its result.
    #[cfg_attr(feature = "clap", arg(long))]
    pub print_stack: bool,

    /// Print help.
    #[cfg_attr(feature = "clap", arg(long, action = clap::ArgAction::Help))]
    pub help: (),

    // Allows `UnstableOpts { x: y, ..Default::default() }`.
    #[doc(hidden)]
    #[cfg_attr(feature = "clap", arg(skip))]
    pub _non_exhaustive: (),
}
