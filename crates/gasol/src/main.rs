//! The main entry point for the GASOL optimizer.

#![allow(unused_crate_dependencies)]

use gasol_cli::{parse_args, run, utils};
use std::{io, process::ExitCode};

#[global_allocator]
static ALLOC: utils::Allocator = utils::new_allocator();

fn main() -> ExitCode {
    utils::init_logger();
    let opts = match parse_args(std::env::args_os()) {
        Ok(opts) => opts,
        Err(e) => e.exit(),
    };
    match run(&opts, &mut io::stdout().lock(), &mut io::stderr().lock()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
