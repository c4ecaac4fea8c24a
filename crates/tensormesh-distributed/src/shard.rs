//! Shard Resolution - Partitioning Tensors Across Ranks
//!
//! `ShardSpec` describes how one axis of a tensor is partitioned across a
//! fixed set of ranks; `DeviceMesh` ties specs to an actual communication
//! group and validates that the two agree.
//!
//! Uneven axes are split floor-per-shard with the final shard absorbing
//! the remainder (`axis_len = 10, shard_count = 3` gives slices of
//! `{3, 3, 4}`). Mis-sized shards are a correctness hazard, so this policy
//! is explicit and tested rather than implied.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use crate::comm_group::CommGroup;
use crate::error::{DistributedError, DistributedResult};

// =============================================================================
// ShardDim
// =============================================================================

/// Which axis of a 2-D parameter is partitioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShardDim {
    /// Partition along rows (axis 0).
    Rows,
    /// Partition along columns (axis 1).
    Cols,
}

impl ShardDim {
    /// Returns the axis index this dimension refers to.
    #[must_use]
    pub fn axis(&self) -> usize {
        match self {
            ShardDim::Rows => 0,
            ShardDim::Cols => 1,
        }
    }
}

// =============================================================================
// ShardSpec
// =============================================================================

/// Describes one rank's share of a partitioned axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    /// The partitioned axis.
    pub dim: ShardDim,
    /// Total number of shards.
    pub shard_count: usize,
    /// This participant's shard index.
    pub local_rank: usize,
}

impl ShardSpec {
    /// Creates a spec, validating the rank against the shard count.
    pub fn new(dim: ShardDim, shard_count: usize, local_rank: usize) -> DistributedResult<Self> {
        if shard_count == 0 || local_rank >= shard_count {
            return Err(DistributedError::InvalidRank {
                rank: local_rank,
                shard_count,
            });
        }
        Ok(Self {
            dim,
            shard_count,
            local_rank,
        })
    }

    /// Returns `(start, len)` of this rank's slice of an axis.
    ///
    /// Every shard gets `floor(axis_len / shard_count)` indices; the final
    /// shard additionally absorbs `axis_len % shard_count`. The resulting
    /// ranges are contiguous, non-overlapping and cover `[0, axis_len)`.
    #[must_use]
    pub fn local_slice(&self, axis_len: usize) -> (usize, usize) {
        let base = axis_len / self.shard_count;
        let start = self.local_rank * base;
        let len = if self.local_rank == self.shard_count - 1 {
            base + axis_len % self.shard_count
        } else {
            base
        };
        (start, len)
    }
}

// =============================================================================
// DeviceMesh
// =============================================================================

/// A communication group together with the shard layout derived from it.
///
/// Layers are constructed against a mesh; the mesh is also the unit of
/// rebinding when a module tree is moved to a different group.
#[derive(Clone, Debug)]
pub struct DeviceMesh {
    group: CommGroup,
}

impl DeviceMesh {
    /// Creates a mesh over a communication group.
    #[must_use]
    pub fn new(group: CommGroup) -> Self {
        Self { group }
    }

    /// Creates a single-rank mesh for unsharded use.
    #[must_use]
    pub fn single() -> Self {
        Self::new(CommGroup::single())
    }

    /// Returns the communication group.
    #[must_use]
    pub fn group(&self) -> &CommGroup {
        &self.group
    }

    /// Returns this participant's rank.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.group.rank()
    }

    /// Returns the number of ranks.
    #[must_use]
    pub fn size(&self) -> usize {
        self.group.size()
    }

    /// Derives the shard spec for this rank along `dim`.
    #[must_use]
    pub fn shard_spec(&self, dim: ShardDim) -> ShardSpec {
        ShardSpec {
            dim,
            shard_count: self.size(),
            local_rank: self.rank(),
        }
    }

    /// Resolves a requested spec against the group size.
    pub fn validate(&self, spec: &ShardSpec) -> DistributedResult<()> {
        if spec.shard_count != self.size() {
            return Err(DistributedError::ShardCountMismatch {
                expected: spec.shard_count,
                actual: self.size(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation() {
        assert!(ShardSpec::new(ShardDim::Rows, 4, 3).is_ok());
        assert!(ShardSpec::new(ShardDim::Rows, 4, 4).is_err());
        assert!(ShardSpec::new(ShardDim::Rows, 0, 0).is_err());
    }

    #[test]
    fn test_even_slices() {
        let lens: Vec<usize> = (0..4)
            .map(|r| ShardSpec::new(ShardDim::Rows, 4, r).unwrap().local_slice(8).1)
            .collect();
        assert_eq!(lens, vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_uneven_slices_last_shard_absorbs_remainder() {
        let slices: Vec<(usize, usize)> = (0..3)
            .map(|r| ShardSpec::new(ShardDim::Rows, 3, r).unwrap().local_slice(10))
            .collect();
        assert_eq!(slices, vec![(0, 3), (3, 3), (6, 4)]);
    }

    #[test]
    fn test_slices_partition_axis() {
        for &(axis_len, shard_count) in &[(12usize, 4usize), (10, 3), (7, 2), (5, 5), (3, 4)] {
            let mut covered = 0usize;
            for r in 0..shard_count {
                let spec = ShardSpec::new(ShardDim::Cols, shard_count, r).unwrap();
                let (start, len) = spec.local_slice(axis_len);
                assert_eq!(start, covered, "{axis_len}/{shard_count} rank {r}");
                covered += len;
            }
            assert_eq!(covered, axis_len);
        }
    }

    #[test]
    fn test_mesh_shard_spec() {
        let mesh = DeviceMesh::single();
        let spec = mesh.shard_spec(ShardDim::Rows);
        assert_eq!(spec.shard_count, 1);
        assert_eq!(spec.local_rank, 0);
        assert!(mesh.validate(&spec).is_ok());
    }

    #[test]
    fn test_mesh_rejects_mismatched_spec() {
        let mesh = DeviceMesh::single();
        let spec = ShardSpec::new(ShardDim::Rows, 2, 0).unwrap();
        assert_eq!(
            mesh.validate(&spec).unwrap_err(),
            DistributedError::ShardCountMismatch {
                expected: 2,
                actual: 1
            }
        );
    }
}
