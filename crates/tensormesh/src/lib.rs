//! # TensorMesh - Quantized, Device-Sharded Linear Algebra
//!
//! TensorMesh is the numeric core behind tensor-parallel neural-network
//! layers: a group-wise quantization codec, shard resolution against a
//! collective communication group, and linear layers in the two
//! tensor-parallel directions, dense and quantized, composed through a
//! small module interface.
//!
//! ## Core Pieces
//!
//! - **Tensors**: owned, contiguous, row-major arrays with layer math
//! - **Quantization**: 2/3/4/8-bit group-wise affine codec with a fused
//!   quantized matmul that never materializes the decoded weight
//! - **Sharding**: `ShardSpec`/`DeviceMesh` with an explicit remainder
//!   policy, `CommGroup` over a pluggable collective backend
//! - **Layers**: `Linear`, `QuantizedLinear`, `QuantizedEmbedding`,
//!   `AllToShardedLinear`, `ShardedToAllLinear` and their quantized
//!   variants, composed with `Sequential`
//! - **State**: dotted-name parameter format with partial-failure loading
//!   and byte-identical round-trips for packed codes
//!
//! ## Quick Start
//!
//! ```
//! use tensormesh::prelude::*;
//!
//! let mesh = DeviceMesh::single();
//! let model = Sequential::new()
//!     .add(AllToShardedLinear::new(8, 16, true, &mesh).unwrap())
//!     .add(ShardedToAllLinear::new(16, 4, true, &mesh).unwrap());
//!
//! let x = Tensor::from_vec(vec![0.5f32; 8], &[1, 8]).unwrap();
//! let y = model.forward(&x).unwrap();
//! assert_eq!(y.shape(), &[1, 4]);
//! ```
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]

// =============================================================================
// Crate Re-exports
// =============================================================================

/// Core types: dtypes, scalar traits, errors.
pub use tensormesh_core as core;

/// Owned row-major tensors.
pub use tensormesh_tensor as tensor;

/// Group-wise affine quantization codec.
pub use tensormesh_quant as quant;

/// Collectives and shard resolution.
pub use tensormesh_distributed as distributed;

/// Parameter state format.
pub use tensormesh_serialize as serialize;

/// Module system and layers.
pub use tensormesh_nn as nn;

// =============================================================================
// Prelude
// =============================================================================

/// Common imports for working with TensorMesh.
pub mod prelude {
    pub use tensormesh_core::{DType, Error, Result};

    pub use tensormesh_tensor::Tensor;

    pub use tensormesh_quant::{
        dequantize, quantize, quantized_matmul, QuantError, QuantizedTensor,
    };

    pub use tensormesh_distributed::{
        CollectiveBackend, CommGroup, DeviceMesh, DistributedError, ReduceOp, ShardDim,
        ShardSpec, ThreadBackend,
    };

    pub use tensormesh_serialize::{StateDict, StateEntry};

    pub use tensormesh_nn::{
        AllToShardedLinear, Linear, LoadReport, Module, NnError, Parameter,
        QuantizedAllToShardedLinear, QuantizedEmbedding, QuantizedLinear,
        QuantizedShardedToAllLinear, Sequential, ShardedToAllLinear,
    };
}
