//! TensorMesh Quant - Group-Wise Affine Quantization
//!
//! Converts f32 weight tensors to compact low-bit codes and back, and
//! multiplies activations against packed weights without materializing
//! the dequantized matrix. Supports code widths of 2, 3, 4 and 8 bits
//! with per-group scale/bias metadata.
//!
//! The codec only produces layouts usable directly in matrix
//! multiplication (groups run along the reduction axis); it is not a
//! general-purpose compression format.
//!
//! # Example
//! ```
//! use tensormesh_quant::{dequantize, quantize};
//! use tensormesh_tensor::Tensor;
//!
//! let w = Tensor::from_vec((0..32).map(|x| x as f32).collect(), &[4, 8]).unwrap();
//! let q = quantize(&w, 4, 8).unwrap();
//! let restored = dequantize(&q).unwrap();
//! assert_eq!(restored.shape(), &[4, 8]);
//! ```
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_range_loop)]

pub mod dequantize;
pub mod error;
pub mod matmul;
pub mod packing;
pub mod quantize;
pub mod types;

pub use dequantize::{dequantize, dequantize_group};
pub use error::{QuantError, QuantResult};
pub use matmul::quantized_matmul;
pub use quantize::quantize;
pub use types::{is_supported_bit_width, QuantizedTensor, SUPPORTED_BITS};

// =============================================================================
// Constants
// =============================================================================

/// Default elements per quantization group.
pub const DEFAULT_GROUP_SIZE: usize = 32;

// =============================================================================
// Tests
// =============================================================================
