#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(test, allow(unused_crate_dependencies))]

pub use alloy_primitives::U256;
pub use index_vec::{self, Idx, IndexVec};
pub use rustc_hash::{FxHashMap, FxHashSet};

mod value;
pub use value::{Value, ValueId};

mod op;
pub use op::{OpId, OpKind, Operation, SMALL_NULLARY_MAX_GAS, SMALL_NULLARY_MAX_SIZE};

mod block;
pub use block::{BlockMeta, NewOp, Sfs, SfsBuilder};

mod error;
pub use error::SfsError;

mod json;
