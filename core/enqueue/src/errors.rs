//! Errors raised by the root-set builder and the enqueuer.

use shrinker_graph::{FieldId, MethodId, TypeId};

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// A distinct missing class/method/field reference. Recorded once per
    /// item; surfaced as a warning under `-ignorewarnings` /
    /// `ignore-missing-classes`, fatal otherwise (§7).
    #[error("missing reference to {kind} {descriptor}")]
    MissingReference { kind: &'static str, descriptor: String },

    /// `invoke-interface` targeting a non-interface method, or
    /// `invoke-virtual` on an interface (§7, fatal unconditionally).
    #[error("ambiguous dispatch on method {0}")]
    AmbiguousDispatch(MethodId),

    #[error("class extends itself: {0}")]
    SelfReference(TypeId),

    #[error("field resolution failed for {0}")]
    UnresolvedField(FieldId),
}
