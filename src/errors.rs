//! Error types for partition construction, maintenance, and proposals.

use thiserror::Error;

/// Errors surfaced by the partition core and the chain driver.
///
/// Nothing inside the crate retries or downgrades these; they go straight
/// back to whoever is stepping the chain.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The partition could not be set up as requested.
    ///
    /// Raised when the assignment does not cover every node, when an updater
    /// name is reserved or registered twice, or when a registry needs an
    /// attribute column the topology does not carry.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A field was requested under a name no updater was registered for.
    #[error("unknown field `{0}`")]
    UnknownField(String),

    /// The incremental and from-scratch forms of an updater disagree.
    #[error("updater `{name}` disagrees with its from-scratch value")]
    InconsistentUpdater { name: String },

    /// The partition has no cut edges to sample a flip from.
    #[error("no proposal available: the partition has no cut edges")]
    NoProposalAvailable,

    /// A node index outside the topology.
    #[error("node {node} is out of range for a graph with {len} nodes")]
    NodeOutOfRange { node: usize, len: usize },

    /// Lookup of an attribute column the topology does not declare.
    #[error("missing attribute `{0}`")]
    MissingAttribute(String),

    /// A partisan score is undefined for the given election, e.g. an
    /// efficiency gap over more than two parties.
    #[error("cannot compute score: {0}")]
    Score(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("matrix market error: {0}")]
    MatrixMarket(#[from] sprs::io::IoError),

    #[error("parse error: {0}")]
    Parse(String),
}
