//! TensorMesh Tensor - N-Dimensional Arrays
//!
//! Owned, contiguous, row-major tensors and the shape utilities the rest
//! of the workspace builds on.
//!
//! # Key Features
//! - **Tensor<T>**: generic over element type via the core scalar traits
//! - **Shape utilities**: numel, stride computation, linear indexing
//! - **Layer math**: matmul, transpose, narrow, broadcast bias add
//!
//! # Example
//! ```
//! use tensormesh_tensor::Tensor;
//!
//! let x = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
//! let y = x.matmul(&x).unwrap();
//! assert_eq!(y.shape(), &[2, 2]);
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

pub mod creation;
pub mod shape;
pub mod tensor;

pub use creation::{eye, full, ones, zeros};
pub use shape::{contiguous_strides, linear_index, numel};
pub use tensor::Tensor;
