//! Creation Functions - Free-Function Tensor Constructors
//!
//! Convenience constructors mirroring the method-style API on `Tensor`.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use tensormesh_core::dtype::Numeric;

use crate::tensor::Tensor;

/// Creates a tensor filled with zeros.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor<f32> {
    Tensor::zeros(shape)
}

/// Creates a tensor filled with ones.
#[must_use]
pub fn ones(shape: &[usize]) -> Tensor<f32> {
    Tensor::full(shape, 1.0)
}

/// Creates a tensor filled with a constant value.
#[must_use]
pub fn full<T: Numeric>(shape: &[usize], value: T) -> Tensor<T> {
    Tensor::full(shape, value)
}

/// Creates an identity matrix of the given size.
#[must_use]
pub fn eye(size: usize) -> Tensor<f32> {
    let mut data = vec![0.0f32; size * size];
    for i in 0..size {
        data[i * size + i] = 1.0;
    }
    Tensor::from_vec(data, &[size, size]).expect("square shape matches buffer")
}

// =============================================================================
// Tests
// =============================================================================
