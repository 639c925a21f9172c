#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![allow(unused_crate_dependencies)]

#[doc(inline)]
pub use gasol_config as config;
#[doc(inline)]
pub use gasol_greedy as greedy;
#[doc(inline)]
pub use gasol_sfs as sfs;

#[cfg(feature = "cli")]
#[doc(inline)]
pub use gasol_cli as cli;

#[doc(no_inline)]
pub use gasol_greedy::{GreedyConfig, GreedyError, Solution, solve};
#[doc(no_inline)]
pub use gasol_sfs::Sfs;
