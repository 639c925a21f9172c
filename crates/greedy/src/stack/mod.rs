//! Stack model and instructions.
//!
//! ## Submodules
//!
//! - `model`: Stack state tracking value positions, and instruction simulation
//! - `instr`: The instructions a schedule is made of

mod instr;
mod model;

pub use instr::StackInstruction;
pub use model::{SimulationError, StackModel};

/// Maximum stack depth accessible via DUP/SWAP (DUP16, SWAP16).
pub const MAX_STACK_ACCESS: usize = 16;
