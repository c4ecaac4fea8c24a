//! Error Types - TensorMesh Core Error Handling
//!
//! Provides the shared error type for tensor-level operations: shape
//! mismatches, invalid dimensions, and invalid operations.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// The main error type for tensor-level TensorMesh operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Shape mismatch between tensors.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// The expected shape.
        expected: Vec<usize>,
        /// The actual shape.
        actual: Vec<usize>,
    },

    /// Invalid dimension index.
    #[error("Invalid dimension: index {index} for tensor with {ndim} dimensions")]
    InvalidDimension {
        /// The invalid dimension index.
        index: usize,
        /// Number of dimensions in the tensor.
        ndim: usize,
    },

    /// Index out of bounds along a dimension.
    #[error("Index out of bounds: index {index} for dimension of size {size}")]
    IndexOutOfBounds {
        /// The invalid index.
        index: usize,
        /// The size of the dimension.
        size: usize,
    },

    /// Invalid operation for the given tensor.
    #[error("Invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Operation not supported on empty tensors.
    #[error("Operation not supported on empty tensor")]
    EmptyTensor,
}

// =============================================================================
// Result Type
// =============================================================================

/// A specialized Result type for TensorMesh operations.
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// Helper Functions
// =============================================================================

impl Error {
    /// Creates a new shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// Creates a new invalid operation error.
    #[must_use]
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
