//! Errors raised by the class- and method-name minifiers.

use shrinker_graph::TypeId;

#[derive(Debug, thiserror::Error)]
pub enum RenameError {
    /// Every candidate the dictionary/identifier iterator produced collided
    /// with an already-used name; practically unreachable (the iterator is
    /// infinite) but kept as a defensive bound on the retry loop.
    #[error("exhausted naming candidates for {0}")]
    NamingExhausted(TypeId),
}
