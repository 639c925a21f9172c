#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

use clap::Parser as _;
use gasol_config::{Opts, OutputFormat};
use gasol_greedy::{GreedyConfig, GreedyError, Solution};
use gasol_sfs::{Sfs, SfsError};
use serde::Serialize;
use std::{
    io::{self, Read},
    path::Path,
};
use tracing::{debug, instrument};

pub mod utils;

/// Parses command-line arguments, including `-Z` flags.
pub fn parse_args<I, T>(itr: I) -> Result<Opts, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let mut opts = Opts::try_parse_from(itr)?;
    opts.finish()?;
    Ok(opts)
}

/// A failure to optimize one block.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error(transparent)]
    Sfs(#[from] SfsError),
    #[error("failed to read standard input: {0}")]
    Stdin(#[source] io::Error),
    #[error(transparent)]
    Greedy(#[from] GreedyError),
}

/// Optimizes every input block, writing results to `out` and text-mode errors to `err`.
///
/// Returns `Ok(false)` if at least one block failed.
pub fn run(opts: &Opts, out: &mut dyn io::Write, err: &mut dyn io::Write) -> io::Result<bool> {
    let config = GreedyConfig::from_opts(opts);
    let mut ok = true;
    for path in &opts.input {
        let name = if *path == Path::new("-") {
            "<stdin>".to_string()
        } else {
            path.display().to_string()
        };
        let result = optimize(path, &config);
        if let Err(e) = &result {
            debug!(block = %name, error = %e, "failed");
        }
        ok &= result.is_ok();
        match opts.format {
            OutputFormat::Text => write_text(opts, &name, result, out, err)?,
            OutputFormat::Json => {
                let report = Report::new(opts, &name, result);
                utils::write_json(out, &report, opts.pretty_json)?;
            }
        }
    }
    Ok(ok)
}

/// Reads and optimizes a single block.
#[instrument(level = "debug", skip(config))]
pub fn optimize(path: &Path, config: &GreedyConfig) -> Result<(Sfs, Solution), BlockError> {
    let sfs = if path == Path::new("-") {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s).map_err(BlockError::Stdin)?;
        Sfs::from_json_str(&s)?
    } else {
        Sfs::from_json_file(path)?
    };
    let solution = gasol_greedy::solve(&sfs, config)?;
    Ok((sfs, solution))
}

fn write_text(
    opts: &Opts,
    name: &str,
    result: Result<(Sfs, Solution), BlockError>,
    out: &mut dyn io::Write,
    err: &mut dyn io::Write,
) -> io::Result<()> {
    match result {
        Ok((sfs, solution)) => {
            writeln!(out, "{name}: {}", solution.opcodes.join(" "))?;
            writeln!(out, "  ids: {}", solution.ids.join(" "))?;
            writeln!(out, "  length: {}, correct: {}", solution.len(), solution.correct)?;
            if opts.unstable.print_stack {
                writeln!(out, "  stack: {}", final_stack(&sfs, &solution).join(" "))?;
            }
            Ok(())
        }
        Err(e) => writeln!(err, "error: {name}: {e}"),
    }
}

fn final_stack(sfs: &Sfs, solution: &Solution) -> Vec<String> {
    match solution.schedule.simulate(sfs) {
        Ok(stack) => stack.iter().map(|&v| sfs.display(v).to_string()).collect(),
        Err(e) => vec![format!("<{e}>")],
    }
}

/// One line of JSON output.
#[derive(Serialize)]
#[serde(untagged)]
enum Report<'a> {
    Solved {
        block: &'a str,
        opcodes: Vec<String>,
        ids: Vec<String>,
        accepted: bool,
        correct: bool,
        length: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<Vec<String>>,
    },
    Failed {
        block: &'a str,
        error: String,
    },
}

impl<'a> Report<'a> {
    fn new(opts: &Opts, block: &'a str, result: Result<(Sfs, Solution), BlockError>) -> Self {
        match result {
            Ok((sfs, solution)) => Self::Solved {
                block,
                stack: opts.unstable.print_stack.then(|| final_stack(&sfs, &solution)),
                length: solution.len(),
                accepted: solution.accepted,
                correct: solution.correct,
                opcodes: solution.opcodes,
                ids: solution.ids,
            },
            Err(e) => Self::Failed { block, error: e.to_string() },
        }
    }
}
