//! Errors returned by this crate.
//!
//! This module contains the definitions for all error types returned by the
//! program-graph data model: interning failures and class-shape invariant
//! violations.

use thiserror::Error;

use crate::TypeId;

/// Errors that may occur while building or mutating the program graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("class descriptor is not syntactically valid: {0:?}")]
    InvalidDescriptor(String),

    #[error("class {0:?} extends itself")]
    SelfSuperType(TypeId),

    #[error("class {0:?} implements itself")]
    SelfInterface(TypeId),

    #[error("direct/virtual method partition violated for {0:?}: a constructor, static, or private method was placed in the virtual methods vector")]
    BadDirectVirtualPartition(TypeId),

    #[error("type {0:?} has no known definition and is not a primitive or array")]
    MissingDefinition(TypeId),
}
