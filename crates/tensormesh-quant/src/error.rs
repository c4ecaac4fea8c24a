//! Quantization Error Types
//!
//! Error types for quantization operations.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use thiserror::Error;

/// Result type for quantization operations.
pub type QuantResult<T> = Result<T, QuantError>;

/// Errors that can occur during quantization.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantError {
    /// Unsupported bit width.
    #[error("Invalid bit width: {0} (supported: 2, 3, 4, 8)")]
    InvalidBitWidth(usize),

    /// Group size does not evenly divide the grouped axis.
    #[error("Group size {group_size} does not evenly divide axis of length {axis}")]
    GroupSize {
        /// Length of the grouped (last) axis.
        axis: usize,
        /// Requested group size.
        group_size: usize,
    },

    /// Shape mismatch between operands.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Packed data length disagrees with the declared layout.
    #[error("Data length mismatch: expected {expected}, got {actual}")]
    DataLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Underlying tensor error.
    #[error(transparent)]
    Tensor(#[from] tensormesh_core::Error),
}
