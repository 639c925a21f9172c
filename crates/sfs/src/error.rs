use std::{io, path::PathBuf};

/// An error produced while reading or building an SFS.
#[derive(Debug, thiserror::Error)]
pub enum SfsError {
    #[error("couldn't read {0}: {1}")]
    ReadFile(PathBuf, #[source] io::Error),
    #[error("malformed SFS: {0}")]
    Json(#[from] serde_json::Error),
    #[error("operation `{0}` is defined twice")]
    DuplicateOp(String),
    #[error("operation `{0}` has {1} outputs, at most one is supported")]
    MultipleOutputs(String, usize),
    #[error("literal {0} cannot be the output of operation `{1}`")]
    LiteralOutput(String, String),
    #[error("value `{0}` is produced by more than one operation")]
    DuplicateProducer(String),
    #[error("value `{0}` is on the source stack but also produced by `{1}`")]
    ProducedSourceValue(String, String),
    #[error("operation `{0}` depends on its own output")]
    Cycle(String),
    #[error("`{0}` is not an unsigned 256-bit integer")]
    InvalidLiteral(String),
    #[error("dependence refers to unknown operation `{0}`")]
    UnknownOp(String),
}
