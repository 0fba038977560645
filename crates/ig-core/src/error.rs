use thiserror::Error;

use crate::node::NodeId;

/// Boxed backend failure carried by [`Error::StoreUnavailable`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("forward-reference cycle detected at node {0}")]
    CycleDetected(NodeId),

    #[error("incompatible leaves: '{left}' does not unify with '{right}'")]
    IncompatibleLeaves { left: String, right: String },

    /// Stored data breaks an invariant: duplicate ids, an idea and node that
    /// disagree, an unreadable row. Retrying cannot fix it.
    #[error("store integrity violation: {0}")]
    Integrity(String),

    #[error("node store unavailable: {0}")]
    StoreUnavailable(#[source] BoxError),
}

impl Error {
    /// Wrap any backend failure as a store error.
    pub fn store(e: impl Into<BoxError>) -> Self {
        Error::StoreUnavailable(e.into())
    }

    /// Only store failures can change on retry. Structural errors are final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
