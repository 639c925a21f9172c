//! Utility functions used by the GASOL CLI.

use std::io;

#[cfg(feature = "mimalloc")]
use mimalloc as _;

// Keep the system allocator in tests, where any extra startup cost slows down tests massively.
cfg_if::cfg_if! {
    if #[cfg(debug_assertions)] {
        type AllocatorInner = std::alloc::System;
    } else if #[cfg(feature = "mimalloc")] {
        type AllocatorInner = mimalloc::MiMalloc;
    } else {
        type AllocatorInner = std::alloc::System;
    }
}

/// The global allocator used by the optimizer.
pub type Allocator = AllocatorInner;

/// Create a new instance of the global allocator.
pub const fn new_allocator() -> Allocator {
    AllocatorInner {}
}

/// Initialize the tracing logger.
///
/// Log lines go to stderr. Verbosity is controlled by `RUST_LOG`.
pub fn init_logger() {
    #[cfg(not(feature = "tracing"))]
    {
        if std::env::var_os("RUST_LOG").is_some() {
            let msg = "`RUST_LOG` is set, but \"tracing\" support was not enabled at compile time";
            eprintln!("warning: {msg}");
        }
    }

    #[cfg(feature = "tracing")]
    if let Err(e) = try_init_logger() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn try_init_logger() -> Result<(), String> {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .try_init()
        .map_err(|e| e.to_string())
}

/// Writes `value` as JSON followed by a newline.
pub(crate) fn write_json<T: serde::Serialize>(
    out: &mut dyn io::Write,
    value: &T,
    pretty: bool,
) -> io::Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)?;
    } else {
        serde_json::to_writer(&mut *out, value)?;
    }
    writeln!(out)
}
