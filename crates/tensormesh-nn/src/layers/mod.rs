//! Layer Catalog
//!
//! Concrete layers implementing the [`crate::module::Module`] interface.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

pub mod distributed;
pub mod linear;
pub mod quantized;

pub use distributed::{
    AllToShardedLinear, QuantizedAllToShardedLinear, QuantizedShardedToAllLinear,
    ShardedToAllLinear,
};
pub use linear::Linear;
pub use quantized::{QuantizedEmbedding, QuantizedLinear};
