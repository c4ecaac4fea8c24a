//! Quantized Layers - Packed-Weight Linear and Embedding
//!
//! Unsharded layers whose weights live in group-wise quantized storage.
//! The linear variant multiplies through the fused quantized matmul; the
//! embedding decodes only the rows it addresses.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use tensormesh_quant::{dequantize_group, quantize, quantized_matmul};
use tensormesh_tensor::Tensor;

use crate::error::NnResult;
use crate::init::{embedding_uniform, kaiming_uniform, zeros};
use crate::layers::linear::Linear;
use crate::module::Module;
use crate::parameter::Parameter;

// =============================================================================
// QuantizedLinear
// =============================================================================

/// A linear layer with a quantized weight matrix.
///
/// Computes y = xW^T + b with `W` stored as packed codes; the dequantized
/// weight is never materialized during forward evaluation.
pub struct QuantizedLinear {
    /// Packed weight of logical shape `[out_features, in_features]`.
    pub weight: Parameter,
    /// Bias vector of shape `[out_features]`, kept dense.
    pub bias: Option<Parameter>,
    in_features: usize,
    out_features: usize,
    bits: usize,
    group_size: usize,
}

impl QuantizedLinear {
    /// Creates a freshly initialized quantized linear layer.
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        bits: usize,
        group_size: usize,
    ) -> NnResult<Self> {
        let weight = kaiming_uniform(out_features, in_features);
        let bias = bias.then(|| zeros(&[out_features]));
        Self::from_weights(weight, bias, bits, group_size)
    }

    /// Quantizes an existing dense layer.
    pub fn from_linear(linear: &Linear, bits: usize, group_size: usize) -> NnResult<Self> {
        let weight = linear.weight.dense()?.clone();
        let bias = match linear.bias {
            Some(ref b) => Some(b.dense()?.clone()),
            None => None,
        };
        Self::from_weights(weight, bias, bits, group_size)
    }

    /// Builds the layer from a dense weight, quantizing it.
    pub fn from_weights(
        weight: Tensor<f32>,
        bias: Option<Tensor<f32>>,
        bits: usize,
        group_size: usize,
    ) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "quantized linear weight must be 2-D [out_features, in_features]",
            )
            .into());
        }
        let out_features = weight.shape()[0];
        let in_features = weight.shape()[1];

        let quantized = quantize(&weight, bits, group_size)?;

        Ok(Self {
            weight: Parameter::Quantized(quantized),
            bias: bias.map(Parameter::Dense),
            in_features,
            out_features,
            bits,
            group_size,
        })
    }

    /// Returns the input feature dimension.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output feature dimension.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns the code width in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.bits
    }

    /// Returns the quantization group size.
    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }
}

impl Module for QuantizedLinear {
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        let weight = self.weight.quantized()?;
        let bias = match self.bias {
            Some(ref b) => Some(b.dense()?),
            None => None,
        };
        Ok(quantized_matmul(input, weight, bias)?)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        let mut params = vec![("weight".to_string(), &self.weight)];
        if let Some(ref bias) = self.bias {
            params.push(("bias".to_string(), bias));
        }
        params
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        let mut params = vec![("weight".to_string(), &mut self.weight)];
        if let Some(ref mut bias) = self.bias {
            params.push(("bias".to_string(), bias));
        }
        params
    }

    fn name(&self) -> &'static str {
        "QuantizedLinear"
    }
}

// =============================================================================
// QuantizedEmbedding
// =============================================================================

/// An embedding table stored in quantized form.
///
/// Forward treats input values as row indices and decodes only the
/// addressed rows; quantization groups never span rows because the group
/// size divides the last axis.
pub struct QuantizedEmbedding {
    /// Packed table of logical shape `[vocab_size, dims]`.
    pub weight: Parameter,
    vocab_size: usize,
    dims: usize,
}

impl QuantizedEmbedding {
    /// Creates a freshly initialized quantized embedding.
    pub fn new(vocab_size: usize, dims: usize, bits: usize, group_size: usize) -> NnResult<Self> {
        Self::from_weights(embedding_uniform(vocab_size, dims), bits, group_size)
    }

    /// Builds the table from dense weights, quantizing them.
    pub fn from_weights(weight: Tensor<f32>, bits: usize, group_size: usize) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "embedding weight must be 2-D [vocab_size, dims]",
            )
            .into());
        }
        let vocab_size = weight.shape()[0];
        let dims = weight.shape()[1];
        let quantized = quantize(&weight, bits, group_size)?;

        Ok(Self {
            weight: Parameter::Quantized(quantized),
            vocab_size,
            dims,
        })
    }

    /// Returns the vocabulary size.
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// Returns the embedding width.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.dims
    }
}

impl Module for QuantizedEmbedding {
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        let table = self.weight.quantized()?;
        let groups_per_row = self.dims / table.group_size;

        let mut out = Vec::with_capacity(input.numel() * self.dims);
        for &value in input.as_slice() {
            let index = value.round();
            if index < 0.0 || index as usize >= self.vocab_size {
                return Err(tensormesh_core::Error::IndexOutOfBounds {
                    index: index.max(0.0) as usize,
                    size: self.vocab_size,
                }
                .into());
            }
            let row = index as usize;
            for g in 0..groups_per_row {
                out.extend_from_slice(&dequantize_group(table, row * groups_per_row + g));
            }
        }

        let mut shape = input.shape().to_vec();
        shape.push(self.dims);
        Ok(Tensor::from_vec(out, &shape)?)
    }

    fn named_parameters(&self) -> Vec<(String, &Parameter)> {
        vec![("weight".to_string(), &self.weight)]
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Parameter)> {
        vec![("weight".to_string(), &mut self.weight)]
    }

    fn name(&self) -> &'static str {
        "QuantizedEmbedding"
    }
}

// =============================================================================
// Tests
// =============================================================================
