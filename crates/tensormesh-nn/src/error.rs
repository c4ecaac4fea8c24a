//! Layer Error Types
//!
//! Errors for layer construction, forward evaluation and state loading.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use thiserror::Error;

use tensormesh_distributed::DistributedError;
use tensormesh_quant::QuantError;

/// Result type for layer operations.
pub type NnResult<T> = Result<T, NnError>;

/// Errors raised by layer construction and forward evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NnError {
    /// Tensor-level failure (shapes, indexing).
    #[error(transparent)]
    Tensor(#[from] tensormesh_core::Error),

    /// Quantization codec failure.
    #[error(transparent)]
    Quant(#[from] QuantError),

    /// Shard or communication group failure.
    #[error(transparent)]
    Distributed(#[from] DistributedError),

    /// Quantization groups do not align with the shard boundary.
    ///
    /// The group axis is the reduction axis; a sharded layer whose local
    /// slice of that axis is not a whole number of groups cannot store its
    /// shard in quantized form.
    #[error(
        "Quantization groups of {group_size} do not align with a local reduction axis of {in_features}"
    )]
    GroupAlignment {
        /// Local length of the reduction axis.
        in_features: usize,
        /// Requested group size.
        group_size: usize,
    },
}

/// Per-entry errors collected while loading a state dictionary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The entry names no parameter of the target module.
    #[error("no parameter with this name")]
    NameNotFound,

    /// The entry's shape fits neither the local nor the full parameter.
    #[error("shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Shape of the target parameter.
        expected: Vec<usize>,
        /// Shape carried by the entry.
        actual: Vec<usize>,
    },

    /// Re-encoding the entry for the target parameter failed.
    #[error(transparent)]
    Quant(#[from] QuantError),

    /// Rebuilding a tensor from the entry failed.
    #[error(transparent)]
    Tensor(#[from] tensormesh_core::Error),
}
