//! TensorMesh Serialize - Parameter State Format
//!
//! The on-the-wire shape of parameter state: dotted names mapped to raw or
//! quantized tensors, with deterministic ordering and byte-identical
//! round-trips for packed quantization codes.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod checkpoint;
pub mod state_dict;

pub use checkpoint::{from_json, to_json, CheckpointError};
pub use state_dict::{StateDict, StateEntry};
