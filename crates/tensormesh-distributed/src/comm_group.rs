//! CommGroup - Tensor-Level Collective Operations
//!
//! Wraps a collective backend with tensor-aware helpers. A `CommGroup` is
//! the opaque handle the sharded layers hold for the lifetime of their
//! module; cloning shares the underlying backend.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use std::sync::Arc;

use tensormesh_tensor::Tensor;

use crate::backend::{CollectiveBackend, ReduceOp, ThreadBackend};
use crate::error::{DistributedError, DistributedResult};

// =============================================================================
// CommGroup
// =============================================================================

/// A group of ranks that exchange tensors through collectives.
pub struct CommGroup {
    backend: Arc<dyn CollectiveBackend>,
}

impl CommGroup {
    /// Creates a group over a backend.
    pub fn new(backend: Arc<dyn CollectiveBackend>) -> Self {
        Self { backend }
    }

    /// Creates a single-rank group backed by an in-process world.
    #[must_use]
    pub fn single() -> Self {
        Self::new(Arc::new(ThreadBackend::single()))
    }

    /// Returns the backend.
    #[must_use]
    pub fn backend(&self) -> &dyn CollectiveBackend {
        self.backend.as_ref()
    }

    /// Returns the rank of this participant.
    #[must_use]
    pub fn rank(&self) -> usize {
        self.backend.rank()
    }

    /// Returns the number of ranks in the group.
    #[must_use]
    pub fn size(&self) -> usize {
        self.backend.world_size()
    }

    /// Fails with `CommGroupError` when the group size is not `expected`.
    pub fn ensure_size(&self, expected: usize) -> DistributedResult<()> {
        if self.size() != expected {
            return Err(DistributedError::CommGroupError(format!(
                "group has {} ranks, operation requires {expected}",
                self.size()
            )));
        }
        Ok(())
    }

    /// All-reduce-sums a tensor in place across the group.
    pub fn all_reduce_sum(&self, tensor: &mut Tensor<f32>) {
        let mut data = tensor.to_vec();
        self.backend.all_reduce(&mut data, ReduceOp::Sum);
        tensor.as_mut_slice().copy_from_slice(&data);
    }

    /// Broadcasts a tensor from `root` in place across the group.
    pub fn broadcast(&self, tensor: &mut Tensor<f32>, root: usize) {
        let mut data = tensor.to_vec();
        self.backend.broadcast(&mut data, root);
        tensor.as_mut_slice().copy_from_slice(&data);
    }

    /// All-gathers a tensor across the group.
    ///
    /// Output shape is `[world_size, ...input_shape]`, rank-major.
    pub fn all_gather(&self, tensor: &Tensor<f32>) -> DistributedResult<Tensor<f32>> {
        let send = tensor.to_vec();
        let mut recv = vec![0.0f32; send.len() * self.size()];
        self.backend.all_gather(&send, &mut recv);

        let mut shape = vec![self.size()];
        shape.extend_from_slice(tensor.shape());
        Tensor::from_vec(recv, &shape)
            .map_err(|e| DistributedError::CommGroupError(e.to_string()))
    }

    /// Blocks until every rank reaches the barrier.
    pub fn barrier(&self) {
        self.backend.barrier();
    }
}

impl Clone for CommGroup {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl core::fmt::Debug for CommGroup {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommGroup")
            .field("backend", &self.backend.name())
            .field("rank", &self.rank())
            .field("size", &self.size())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_group() {
        let group = CommGroup::single();
        assert_eq!(group.rank(), 0);
        assert_eq!(group.size(), 1);
        assert!(group.ensure_size(1).is_ok());
        assert!(group.ensure_size(2).is_err());
    }

    #[test]
    fn test_all_reduce_sum_tensor() {
        let world = ThreadBackend::create_world(2);

        let handles: Vec<_> = world
            .into_iter()
            .map(|backend| {
                thread::spawn(move || {
                    let group = CommGroup::new(Arc::new(backend));
                    let mut t =
                        Tensor::from_vec(vec![group.rank() as f32 + 1.0; 3], &[3]).unwrap();
                    group.all_reduce_sum(&mut t);
                    t.to_vec()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![3.0, 3.0, 3.0]);
        }
    }

    #[test]
    fn test_all_gather_shape() {
        let group = CommGroup::single();
        let t = Tensor::from_vec(vec![1.0f32, 2.0], &[2]).unwrap();
        let gathered = group.all_gather(&t).unwrap();
        assert_eq!(gathered.shape(), &[1, 2]);
    }

    #[test]
    fn test_clone_shares_backend() {
        let group = CommGroup::single();
        let clone = group.clone();
        assert_eq!(group.rank(), clone.rank());
        assert_eq!(group.size(), clone.size());
    }
}
