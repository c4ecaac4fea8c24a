//! Checkpoint Persistence
//!
//! JSON serialization for `StateDict`, for hosts that persist parameter
//! state to disk or ship it over a wire. The format is the serde view of
//! the state dictionary; packed quantization codes round-trip
//! byte-identically.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use thiserror::Error;

use crate::state_dict::StateDict;

/// Errors raised while persisting or restoring a checkpoint.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// JSON encoding or decoding failed.
    #[error("Checkpoint serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializes a state dictionary to a JSON string.
pub fn to_json(state: &StateDict) -> Result<String, CheckpointError> {
    Ok(serde_json::to_string(state)?)
}

/// Restores a state dictionary from a JSON string.
pub fn from_json(json: &str) -> Result<StateDict, CheckpointError> {
    Ok(serde_json::from_str(json)?)
}

// =============================================================================
// Tests
// =============================================================================
