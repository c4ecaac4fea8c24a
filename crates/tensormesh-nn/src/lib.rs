//! TensorMesh NN - Module System and Sharded Layers
//!
//! The layer catalog and composition interface of TensorMesh.
//!
//! # Features
//!
//! ## Composition
//! - **Module**: forward / parameter enumeration / state loading / mesh
//!   rebinding, implemented independently by every layer
//! - **Sequential**: ordered container with index-prefixed dotted names
//! - **LoadReport**: partial-failure state loading
//!
//! ## Layers
//! - **Linear**: dense y = xW^T + b
//! - **QuantizedLinear / QuantizedEmbedding**: packed-weight variants
//! - **AllToShardedLinear / ShardedToAllLinear**: the two tensor-parallel
//!   directions (no-communication column shard, one-all-reduce row shard)
//! - **QuantizedAllToShardedLinear / QuantizedShardedToAllLinear**:
//!   sharded layers whose local shard lives in quantized storage
//!
//! Configuration (mesh, quantization layout) is passed explicitly into
//! every constructor; there is no process-wide default state.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_range_loop)]

pub mod error;
pub mod init;
pub mod layers;
pub mod module;
pub mod parameter;
pub mod sequential;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{LoadError, NnError, NnResult};
pub use layers::{
    AllToShardedLinear, Linear, QuantizedAllToShardedLinear, QuantizedEmbedding, QuantizedLinear,
    QuantizedShardedToAllLinear, ShardedToAllLinear,
};
pub use module::{load_into_parameters, LoadFailure, LoadReport, Module};
pub use parameter::Parameter;
pub use sequential::Sequential;
