//! Weight Initialization - Parameter Initialization Strategies
//!
//! Random initializers used by the layer constructors. Every constructor
//! takes its configuration explicitly; there are no process-wide default
//! dtypes or devices to consult.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use rand::Rng;
use tensormesh_tensor::Tensor;

// =============================================================================
// Basic Initializers
// =============================================================================

/// Creates a tensor filled with zeros.
#[must_use]
pub fn zeros(shape: &[usize]) -> Tensor<f32> {
    Tensor::zeros(shape)
}

/// Creates a tensor with uniform random values in `[low, high)`.
#[must_use]
pub fn uniform_range(shape: &[usize], low: f32, high: f32) -> Tensor<f32> {
    let mut rng = rand::thread_rng();
    let numel: usize = shape.iter().product();
    let data: Vec<f32> = (0..numel).map(|_| rng.gen_range(low..high)).collect();
    Tensor::from_vec(data, shape).expect("buffer sized from shape")
}

// =============================================================================
// Fan-Scaled Initializers
// =============================================================================

/// Kaiming uniform initialization for a `[fan_out, fan_in]` weight.
///
/// Samples from `U(-bound, bound)` with `bound = sqrt(6 / fan_in)`.
#[must_use]
pub fn kaiming_uniform(fan_out: usize, fan_in: usize) -> Tensor<f32> {
    let bound = (6.0 / fan_in.max(1) as f32).sqrt();
    uniform_range(&[fan_out, fan_in], -bound, bound)
}

/// Xavier uniform initialization for a `[fan_out, fan_in]` weight.
///
/// Samples from `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`.
#[must_use]
pub fn xavier_uniform(fan_out: usize, fan_in: usize) -> Tensor<f32> {
    let a = (6.0 / (fan_in + fan_out).max(1) as f32).sqrt();
    uniform_range(&[fan_out, fan_in], -a, a)
}

/// Scaled uniform initialization for an embedding table.
#[must_use]
pub fn embedding_uniform(vocab: usize, dims: usize) -> Tensor<f32> {
    let bound = 1.0 / (dims.max(1) as f32).sqrt();
    uniform_range(&[vocab, dims], -bound, bound)
}

// =============================================================================
// Tests
// =============================================================================
