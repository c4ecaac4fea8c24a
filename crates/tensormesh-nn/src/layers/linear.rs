//! Linear Layer - Fully Connected Layer
//!
//! Applies a linear transformation: y = xW^T + b
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use tensormesh_tensor::Tensor;

use crate::error::NnResult;
use crate::init::{kaiming_uniform, zeros};
use crate::module::Module;
use crate::parameter::Parameter;

// =============================================================================
// Linear
// =============================================================================

/// Applies a linear transformation to the input.
///
/// y = xW^T + b
///
/// # Shape
/// - Input: `[batch, in_features]`
/// - Output: `[batch, out_features]`
/// - Weight: `[out_features, in_features]`
pub struct Linear {
    /// Weight matrix of shape `[out_features, in_features]`.
    pub weight: Parameter,
    /// Bias vector of shape `[out_features]`.
    pub bias: Option<Parameter>,
    in_features: usize,
    out_features: usize,
}

impl Linear {
    /// Creates a new Linear layer with bias.
    #[must_use]
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Self::with_bias(in_features, out_features, true)
    }

    /// Creates a new Linear layer with optional bias.
    #[must_use]
    pub fn with_bias(in_features: usize, out_features: usize, bias: bool) -> Self {
        let weight = Parameter::Dense(kaiming_uniform(out_features, in_features));
        let bias = bias.then(|| Parameter::Dense(zeros(&[out_features])));

        Self {
            weight,
            bias,
            in_features,
            out_features,
        }
    }

    /// Creates a Linear layer from existing weight and bias tensors.
    pub fn from_weights(weight: Tensor<f32>, bias: Option<Tensor<f32>>) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "linear weight must be 2-D [out_features, in_features]",
            )
            .into());
        }
        let out_features = weight.shape()[0];
        let in_features = weight.shape()[1];
        if let Some(ref b) = bias {
            if b.shape() != [out_features] {
                return Err(
                    tensormesh_core::Error::shape_mismatch(&[out_features], b.shape()).into(),
                );
            }
        }

        Ok(Self {
            weight: Parameter::Dense(weight),
            bias: bias.map(Parameter::Dense),
            in_features,
            out_features,
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
}

impl Module for Linear {
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        let weight = self.weight.dense()?;
        let mut output = input.matmul(&weight.transpose()?)?;

        if let Some(ref bias) = self.bias {
            output = output.add_row(bias.dense()?)?;
        }

        Ok(output)
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
        "Linear"
    }
}

impl core::fmt::Debug for Linear {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Linear")
            .field("in_features", &self.in_features)
            .field("out_features", &self.out_features)
            .field("bias", &self.bias.is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
