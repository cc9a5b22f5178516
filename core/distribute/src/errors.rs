//! Errors returned by this crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DistributeError {
    #[error("dex {dex_index} exceeds the 65536-reference limit while packing {class}")]
    CapacityExceeded { dex_index: u32, class: String },

    #[error("min-api {min_api} cannot target dex version {requested}")]
    MinApiMismatch { min_api: u32, requested: u32 },

    #[error("package-map entry for package {0:?} has no assigned dex")]
    UnmappedPackage(String),

    #[error("I/O error writing distributed output")]
    Io(#[from] std::io::Error),
}
