//! State Dictionary - Parameter State Format
//!
//! Maps dotted parameter names to serialized tensors, either raw (shape +
//! flat f32 data) or quantized (packed codes + group metadata). The packed
//! code bytes of an unmodified quantized entry survive save → load → save
//! byte-identically.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tensormesh_core::Result;
use tensormesh_quant::{QuantResult, QuantizedTensor};
use tensormesh_tensor::Tensor;

// =============================================================================
// StateEntry
// =============================================================================

/// One serialized parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateEntry {
    /// A raw f32 tensor.
    Dense {
        /// Shape of the tensor.
        shape: Vec<usize>,
        /// Flattened row-major values.
        values: Vec<f32>,
    },
    /// A group-wise quantized tensor.
    Quantized {
        /// Logical shape of the original tensor.
        shape: Vec<usize>,
        /// Code width in bits.
        bits: usize,
        /// Elements per quantization group.
        group_size: usize,
        /// Bit-packed codes, preserved byte-identically across round-trips.
        packed: Vec<u8>,
        /// Per-group scales.
        scales: Vec<f32>,
        /// Per-group zero points.
        biases: Vec<f32>,
    },
}

impl StateEntry {
    /// Creates a dense entry from a tensor.
    #[must_use]
    pub fn from_dense(tensor: &Tensor<f32>) -> Self {
        Self::Dense {
            shape: tensor.shape().to_vec(),
            values: tensor.to_vec(),
        }
    }

    /// Creates a quantized entry from a packed tensor.
    #[must_use]
    pub fn from_quantized(quantized: &QuantizedTensor) -> Self {
        Self::Quantized {
            shape: quantized.shape.clone(),
            bits: quantized.bits,
            group_size: quantized.group_size,
            packed: quantized.packed.clone(),
            scales: quantized.scales.clone(),
            biases: quantized.biases.clone(),
        }
    }

    /// Returns the logical shape of the entry.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Dense { shape, .. } | Self::Quantized { shape, .. } => shape,
        }
    }

    /// Returns true if this entry stores packed codes.
    #[must_use]
    pub fn is_quantized(&self) -> bool {
        matches!(self, Self::Quantized { .. })
    }

    /// Rebuilds a dense tensor from a dense entry.
    ///
    /// Returns `None` for quantized entries.
    pub fn as_dense_tensor(&self) -> Option<Result<Tensor<f32>>> {
        match self {
            Self::Dense { shape, values } => Some(Tensor::from_vec(values.clone(), shape)),
            Self::Quantized { .. } => None,
        }
    }

    /// Rebuilds a `QuantizedTensor` from a quantized entry, revalidating
    /// the layout.
    ///
    /// Returns `None` for dense entries.
    pub fn as_quantized_tensor(&self) -> Option<QuantResult<QuantizedTensor>> {
        match self {
            Self::Dense { .. } => None,
            Self::Quantized {
                shape,
                bits,
                group_size,
                packed,
                scales,
                biases,
            } => Some(QuantizedTensor::new(
                shape.clone(),
                *bits,
                *group_size,
                packed.clone(),
                scales.clone(),
                biases.clone(),
            )),
        }
    }
}

// =============================================================================
// StateDict
// =============================================================================

/// Parameter state for a module tree, keyed by dotted name.
///
/// Backed by a `BTreeMap` so iteration and serialization order are
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    entries: BTreeMap<String, StateEntry>,
}

impl StateDict {
    /// Creates an empty state dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, replacing any previous one with the same name.
    pub fn insert(&mut self, name: impl Into<String>, entry: StateEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Gets an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&StateEntry> {
        self.entries.get(name)
    }

    /// Checks whether the dictionary contains a name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes an entry.
    pub fn remove(&mut self, name: &str) -> Option<StateEntry> {
        self.entries.remove(name)
    }

    /// Iterates entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &StateEntry)> {
        self.entries.iter()
    }

    /// Iterates entry names in order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Returns the subset of entries under `prefix`, with the prefix
    /// stripped from the keys.
    ///
    /// Used by containers to route state to a child module.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &str) -> StateDict {
        let mut stripped = StateDict::new();
        for (name, entry) in &self.entries {
            if let Some(rest) = name.strip_prefix(prefix) {
                stripped.insert(rest, entry.clone());
            }
        }
        stripped
    }

    /// Returns a copy with `prefix` prepended to every key.
    #[must_use]
    pub fn add_prefix(&self, prefix: &str) -> StateDict {
        let mut prefixed = StateDict::new();
        for (name, entry) in &self.entries {
            prefixed.insert(format!("{prefix}{name}"), entry.clone());
        }
        prefixed
    }

    /// Merges another dictionary into this one, overwriting duplicates.
    pub fn merge(&mut self, other: StateDict) {
        self.entries.extend(other.entries);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_entry_roundtrip() {
        let t = Tensor::from_vec(vec![1.0f32, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let entry = StateEntry::from_dense(&t);
        let restored = entry.as_dense_tensor().unwrap().unwrap();
        assert_eq!(restored, t);
    }

    #[test]
    fn test_quantized_entry_roundtrip() {
        let t = Tensor::from_vec((0..16).map(|x| x as f32).collect(), &[2, 8]).unwrap();
        let q = tensormesh_quant::quantize(&t, 4, 8).unwrap();
        let entry = StateEntry::from_quantized(&q);
        let restored = entry.as_quantized_tensor().unwrap().unwrap();
        assert_eq!(restored, q);
        assert_eq!(restored.packed, q.packed);
    }

    #[test]
    fn test_entry_kind_probes() {
        let t = Tensor::<f32>::zeros(&[4]);
        let dense = StateEntry::from_dense(&t);
        assert!(!dense.is_quantized());
        assert!(dense.as_quantized_tensor().is_none());
        assert_eq!(dense.shape(), &[4]);
    }

    #[test]
    fn test_state_dict_operations() {
        let mut state = StateDict::new();
        state.insert("linear.weight", StateEntry::from_dense(&Tensor::zeros(&[4, 2])));
        state.insert("linear.bias", StateEntry::from_dense(&Tensor::zeros(&[4])));

        assert_eq!(state.len(), 2);
        assert!(state.contains("linear.weight"));
        assert!(!state.contains("weight"));
    }

    #[test]
    fn test_strip_prefix_routes_children() {
        let mut state = StateDict::new();
        state.insert("0.weight", StateEntry::from_dense(&Tensor::zeros(&[2, 2])));
        state.insert("1.weight", StateEntry::from_dense(&Tensor::zeros(&[2, 2])));

        let child = state.strip_prefix("0.");
        assert_eq!(child.len(), 1);
        assert!(child.contains("weight"));
    }

    #[test]
    fn test_iteration_order_is_sorted() {
        let mut state = StateDict::new();
        state.insert("b", StateEntry::from_dense(&Tensor::zeros(&[1])));
        state.insert("a", StateEntry::from_dense(&Tensor::zeros(&[1])));
        let keys: Vec<&String> = state.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
    }
}
