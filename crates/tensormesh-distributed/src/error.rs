//! Distributed Error Types
//!
//! Errors for shard resolution and communication groups.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use thiserror::Error;

/// Result type for distributed operations.
pub type DistributedResult<T> = Result<T, DistributedError>;

/// Errors raised by shard resolution and communication groups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistributedError {
    /// A shard spec disagrees with the size of its communication group.
    #[error("Shard count mismatch: spec wants {expected} shards, group has {actual} ranks")]
    ShardCountMismatch {
        /// Shard count requested by the spec.
        expected: usize,
        /// Actual communication group size.
        actual: usize,
    },

    /// A rank index outside the shard count.
    #[error("Invalid rank {rank} for shard count {shard_count}")]
    InvalidRank {
        /// The offending rank.
        rank: usize,
        /// Number of shards.
        shard_count: usize,
    },

    /// The communication group handle is unusable for this operation.
    #[error("Communication group error: {0}")]
    CommGroupError(String),
}
