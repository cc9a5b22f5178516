//! Errors returned by this crate.

use thiserror::Error;

use shrinker_config::ConfigError;
use shrinker_dex::DexError;
use shrinker_distribute::DistributeError;
use shrinker_enqueue::EnqueueError;
use shrinker_graph::GraphError;
use shrinker_rename::RenameError;
use shrinker_zip::ZipError;

/// Top-level aggregate error, mirroring the teacher's `APKError`'s
/// transparent-wrapping shape: every phase's own error type gets one
/// `#[from]` variant here, surfaced at that phase's barrier join.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Enqueue(#[from] EnqueueError),

    #[error(transparent)]
    Rename(#[from] RenameError),

    #[error(transparent)]
    Distribute(#[from] DistributeError),

    #[error(transparent)]
    Dex(#[from] DexError),

    #[error(transparent)]
    Zip(#[from] ZipError),
}
