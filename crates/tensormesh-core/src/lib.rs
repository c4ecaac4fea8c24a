//! TensorMesh Core - Shared Types and Errors
//!
//! Foundation crate for the TensorMesh workspace. Provides:
//!
//! - **DType**: runtime element-type tags (f16, bf16, f32, f64, i8)
//! - **Scalar / Numeric**: the trait ladder tensor element types implement
//! - **Error / Result**: the shared tensor-level error type
//!
//! Higher layers (tensors, quantization, sharding, layers) build on these
//! types; this crate has no tensor logic of its own.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod dtype;
pub mod error;

pub use dtype::{DType, Numeric, Scalar};
pub use error::{Error, Result};
