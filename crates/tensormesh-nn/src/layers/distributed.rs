//! Distributed Layers - Device-Sharded Linear Layers
//!
//! The two tensor-parallel directions of y = xW^T + b, dense and
//! quantized:
//!
//! - **AllToSharded**: `W` is column-sharded (its `[out, in]` storage is
//!   row-sharded). Every rank sees the full input and produces its slice
//!   of the output; the forward pass needs no communication. The layer
//!   never concatenates its own output.
//! - **ShardedToAll**: `W` is row-sharded (its storage is column-sharded).
//!   Every rank sees only its input slice; partial products are combined
//!   with one all-reduce and the result is replicated on every rank.
//!
//! Pairing one of each parallelizes a two-layer block with exactly one
//! all-reduce regardless of the intermediate width, which is why the two
//! directions exist instead of a single generic sharded linear.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use tensormesh_distributed::{CommGroup, DeviceMesh, DistributedError, ShardDim, ShardSpec};
use tensormesh_quant::{quantize, quantized_matmul};
use tensormesh_serialize::{StateDict, StateEntry};
use tensormesh_tensor::Tensor;

use crate::error::{LoadError, NnError, NnResult};
use crate::init::{kaiming_uniform, zeros};
use crate::module::{LoadReport, Module};
use crate::parameter::{rebuild_quantized, Parameter};

// =============================================================================
// Shared Helpers
// =============================================================================

/// Rejects quantization layouts whose groups do not tile the local
/// reduction axis. Checked at construction so a misaligned shard never
/// exists.
fn ensure_group_alignment(in_features: usize, group_size: usize) -> NnResult<()> {
    if group_size == 0 || in_features % group_size != 0 {
        return Err(NnError::GroupAlignment {
            in_features,
            group_size,
        });
    }
    Ok(())
}

/// Applies a state entry to a sharded parameter.
///
/// The entry may carry either the local shard shape (applied directly) or
/// the full logical shape, in which case this rank's slice along `axis`
/// is cut out first. Quantized full-shape entries are dequantized before
/// slicing; packed groups are never sliced directly, so the slice is
/// re-encoded against the target's own layout.
fn assign_sharded(
    param: &mut Parameter,
    entry: &StateEntry,
    spec: &ShardSpec,
    axis: usize,
    full_len: usize,
) -> Result<(), LoadError> {
    let local_shape = param.shape().to_vec();
    if entry.shape() == local_shape.as_slice() {
        return param.assign(entry);
    }

    let mut full_shape = local_shape.clone();
    full_shape[axis] = full_len;
    if entry.shape() != full_shape.as_slice() {
        return Err(LoadError::ShapeMismatch {
            expected: local_shape,
            actual: entry.shape().to_vec(),
        });
    }

    let full = match entry {
        StateEntry::Dense { shape, values } => Tensor::from_vec(values.clone(), shape)?,
        StateEntry::Quantized { .. } => {
            tensormesh_quant::dequantize(&rebuild_quantized(entry)?)?
        }
    };

    let (start, len) = spec.local_slice(full_len);
    let local = full.narrow(axis, start, len)?;
    param.assign(&StateEntry::from_dense(&local))
}

/// Reassembles a replicated `[m, out]` tensor from per-rank `[m, local]`
/// column shards.
///
/// All shards must be equally sized (the gather primitive exchanges
/// fixed-size buffers), so the full width must divide evenly.
fn join_column_shards(group: &CommGroup, local: &Tensor<f32>) -> NnResult<Tensor<f32>> {
    if local.ndim() != 2 {
        return Err(tensormesh_core::Error::invalid_operation(
            "join requires a 2-D [batch, local_out] shard",
        )
        .into());
    }
    let gathered = group.all_gather(local)?;
    let k = group.size();
    let (m, n_local) = (local.shape()[0], local.shape()[1]);

    let data = gathered.as_slice();
    let mut out = vec![0.0f32; m * n_local * k];
    for r in 0..k {
        for i in 0..m {
            let src = &data[(r * m + i) * n_local..(r * m + i + 1) * n_local];
            let dst_base = i * (k * n_local) + r * n_local;
            out[dst_base..dst_base + n_local].copy_from_slice(src);
        }
    }

    Ok(Tensor::from_vec(out, &[m, k * n_local])?)
}

/// Routes `weight`/`bias` entries of a sharded layer through
/// [`assign_sharded`], collecting a partial-failure report.
fn load_sharded_state(
    weight: (&mut Parameter, usize, usize),
    bias: Option<(&mut Parameter, Option<(usize, usize)>)>,
    spec: &ShardSpec,
    state: &StateDict,
) -> LoadReport {
    let (weight_param, weight_axis, weight_full) = weight;
    let mut bias = bias;
    let mut report = LoadReport::default();

    for (name, entry) in state.iter() {
        let result = match name.as_str() {
            "weight" => assign_sharded(weight_param, entry, spec, weight_axis, weight_full),
            "bias" => match bias {
                Some((ref mut bias_param, sharding)) => match sharding {
                    // Bias sharded along the output axis.
                    Some((axis, full_len)) => {
                        assign_sharded(bias_param, entry, spec, axis, full_len)
                    }
                    // Bias replicated on every rank.
                    None => bias_param.assign(entry),
                },
                None => Err(LoadError::NameNotFound),
            },
            _ => Err(LoadError::NameNotFound),
        };
        match result {
            Ok(()) => report.record_applied(name),
            Err(error) => report.record_failure(name, error),
        }
    }

    report
}

// =============================================================================
// AllToShardedLinear
// =============================================================================

/// Column-sharded linear layer: full input in, output shard out.
///
/// The local weight holds `local_slice(out_features)` rows of the logical
/// `[out_features, in_features]` matrix. Forward evaluation is pure local
/// compute; callers either keep the output sharded for the next layer or
/// reassemble it with [`AllToShardedLinear::join_outputs`].
pub struct AllToShardedLinear {
    /// Local weight shard `[local_out, in_features]`.
    pub weight: Parameter,
    /// Local bias shard `[local_out]`.
    pub bias: Option<Parameter>,
    spec: ShardSpec,
    group: CommGroup,
    in_features: usize,
    out_features: usize,
}

impl AllToShardedLinear {
    /// Creates a freshly initialized layer sharded over `mesh`.
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        let spec = mesh.shard_spec(ShardDim::Rows);
        let (_, local_out) = spec.local_slice(out_features);

        Ok(Self {
            weight: Parameter::Dense(kaiming_uniform(local_out, in_features)),
            bias: bias.then(|| Parameter::Dense(zeros(&[local_out]))),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Builds this rank's layer by slicing a full `[out, in]` weight.
    pub fn from_full_weights(
        weight: Tensor<f32>,
        bias: Option<Tensor<f32>>,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "sharded linear weight must be 2-D [out_features, in_features]",
            )
            .into());
        }
        let out_features = weight.shape()[0];
        let in_features = weight.shape()[1];

        let spec = mesh.shard_spec(ShardDim::Rows);
        let (start, len) = spec.local_slice(out_features);

        let local_weight = weight.narrow(0, start, len)?;
        let local_bias = match bias {
            Some(b) => Some(b.narrow(0, start, len)?),
            None => None,
        };

        Ok(Self {
            weight: Parameter::Dense(local_weight),
            bias: local_bias.map(Parameter::Dense),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Returns the full output width.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns the input width.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns this rank's output width.
    #[must_use]
    pub fn local_out_features(&self) -> usize {
        self.weight.shape()[0]
    }

    /// Returns the shard layout.
    #[must_use]
    pub fn shard_spec(&self) -> &ShardSpec {
        &self.spec
    }

    /// Reassembles the replicated output from this rank's forward result.
    ///
    /// Collective: every rank must call this with its own shard. Requires
    /// evenly sized shards.
    pub fn join_outputs(&self, local: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        if self.out_features % self.spec.shard_count != 0 {
            return Err(DistributedError::CommGroupError(
                "all-gather requires equally sized output shards".to_string(),
            )
            .into());
        }
        join_column_shards(&self.group, local)
    }
}

impl Module for AllToShardedLinear {
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

    fn load_state(&mut self, state: &StateDict) -> LoadReport {
        let out = self.out_features;
        load_sharded_state(
            (&mut self.weight, 0, out),
            self.bias.as_mut().map(|b| (b, Some((0, out)))),
            &self.spec,
            state,
        )
    }

    fn rebind(&mut self, mesh: &DeviceMesh) -> NnResult<()> {
        if mesh.size() != self.spec.shard_count {
            return Err(DistributedError::ShardCountMismatch {
                expected: self.spec.shard_count,
                actual: mesh.size(),
            }
            .into());
        }
        self.spec.local_rank = mesh.rank();
        self.group = mesh.group().clone();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "AllToShardedLinear"
    }
}

// =============================================================================
// ShardedToAllLinear
// =============================================================================

/// Row-sharded linear layer: input shard in, replicated output out.
///
/// The local weight holds `local_slice(in_features)` columns of the
/// logical `[out_features, in_features]` matrix. Forward computes the
/// local partial product, all-reduce-sums it across the group, then adds
/// the replicated bias once, after the reduction.
pub struct ShardedToAllLinear {
    /// Local weight shard `[out_features, local_in]`.
    pub weight: Parameter,
    /// Replicated bias `[out_features]`.
    pub bias: Option<Parameter>,
    spec: ShardSpec,
    group: CommGroup,
    in_features: usize,
    out_features: usize,
}

impl ShardedToAllLinear {
    /// Creates a freshly initialized layer sharded over `mesh`.
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        let spec = mesh.shard_spec(ShardDim::Cols);
        let (_, local_in) = spec.local_slice(in_features);

        Ok(Self {
            weight: Parameter::Dense(kaiming_uniform(out_features, local_in)),
            bias: bias.then(|| Parameter::Dense(zeros(&[out_features]))),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Builds this rank's layer by slicing a full `[out, in]` weight.
    pub fn from_full_weights(
        weight: Tensor<f32>,
        bias: Option<Tensor<f32>>,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "sharded linear weight must be 2-D [out_features, in_features]",
            )
            .into());
        }
        let out_features = weight.shape()[0];
        let in_features = weight.shape()[1];

        let spec = mesh.shard_spec(ShardDim::Cols);
        let (start, len) = spec.local_slice(in_features);
        let local_weight = weight.narrow(1, start, len)?;

        if let Some(ref b) = bias {
            if b.shape() != [out_features] {
                return Err(
                    tensormesh_core::Error::shape_mismatch(&[out_features], b.shape()).into(),
                );
            }
        }

        Ok(Self {
            weight: Parameter::Dense(local_weight),
            bias: bias.map(Parameter::Dense),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Returns the full input width.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns the output width.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns this rank's input width.
    #[must_use]
    pub fn local_in_features(&self) -> usize {
        self.weight.shape()[1]
    }

    /// Returns the shard layout.
    #[must_use]
    pub fn shard_spec(&self) -> &ShardSpec {
        &self.spec
    }
}

impl Module for ShardedToAllLinear {
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        self.group.ensure_size(self.spec.shard_count)?;

        let weight = self.weight.dense()?;
        let mut output = input.matmul(&weight.transpose()?)?;

        // Collective: one blocking all-reduce combines the partial
        // products; the bias is added once, after the sum.
        self.group.all_reduce_sum(&mut output);

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

    fn load_state(&mut self, state: &StateDict) -> LoadReport {
        let in_features = self.in_features;
        load_sharded_state(
            (&mut self.weight, 1, in_features),
            self.bias.as_mut().map(|b| (b, None)),
            &self.spec,
            state,
        )
    }

    fn rebind(&mut self, mesh: &DeviceMesh) -> NnResult<()> {
        if mesh.size() != self.spec.shard_count {
            return Err(DistributedError::ShardCountMismatch {
                expected: self.spec.shard_count,
                actual: mesh.size(),
            }
            .into());
        }
        self.spec.local_rank = mesh.rank();
        self.group = mesh.group().clone();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "ShardedToAllLinear"
    }
}

// =============================================================================
// QuantizedAllToShardedLinear
// =============================================================================

/// [`AllToShardedLinear`] with the local shard stored quantized.
///
/// Per-rank memory shrinks by the quantization ratio; the communication
/// pattern is unchanged (none in forward).
pub struct QuantizedAllToShardedLinear {
    /// Packed local weight shard `[local_out, in_features]`.
    pub weight: Parameter,
    /// Local bias shard `[local_out]`, kept dense.
    pub bias: Option<Parameter>,
    spec: ShardSpec,
    group: CommGroup,
    in_features: usize,
    out_features: usize,
}

impl QuantizedAllToShardedLinear {
    /// Creates a freshly initialized quantized layer sharded over `mesh`.
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        bits: usize,
        group_size: usize,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        // Groups run along the (unsharded) reduction axis.
        ensure_group_alignment(in_features, group_size)?;

        let spec = mesh.shard_spec(ShardDim::Rows);
        let (_, local_out) = spec.local_slice(out_features);
        let weight = quantize(&kaiming_uniform(local_out, in_features), bits, group_size)?;

        Ok(Self {
            weight: Parameter::Quantized(weight),
            bias: bias.then(|| Parameter::Dense(zeros(&[local_out]))),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Builds this rank's layer by slicing a full dense `[out, in]` weight
    /// and quantizing the local slice.
    pub fn from_full_weights(
        weight: Tensor<f32>,
        bias: Option<Tensor<f32>>,
        bits: usize,
        group_size: usize,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "sharded linear weight must be 2-D [out_features, in_features]",
            )
            .into());
        }
        let out_features = weight.shape()[0];
        let in_features = weight.shape()[1];
        ensure_group_alignment(in_features, group_size)?;

        let spec = mesh.shard_spec(ShardDim::Rows);
        let (start, len) = spec.local_slice(out_features);

        let local_weight = quantize(&weight.narrow(0, start, len)?, bits, group_size)?;
        let local_bias = match bias {
            Some(b) => Some(b.narrow(0, start, len)?),
            None => None,
        };

        Ok(Self {
            weight: Parameter::Quantized(local_weight),
            bias: local_bias.map(Parameter::Dense),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Returns the full output width.
    #[must_use]
    pub fn out_features(&self) -> usize {
        self.out_features
    }

    /// Returns this rank's output width.
    #[must_use]
    pub fn local_out_features(&self) -> usize {
        self.weight.shape()[0]
    }

    /// Reassembles the replicated output from this rank's forward result.
    ///
    /// Collective: every rank must call this with its own shard. Requires
    /// evenly sized shards.
    pub fn join_outputs(&self, local: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        if self.out_features % self.spec.shard_count != 0 {
            return Err(DistributedError::CommGroupError(
                "all-gather requires equally sized output shards".to_string(),
            )
            .into());
        }
        join_column_shards(&self.group, local)
    }
}

impl Module for QuantizedAllToShardedLinear {
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

    fn load_state(&mut self, state: &StateDict) -> LoadReport {
        let out = self.out_features;
        load_sharded_state(
            (&mut self.weight, 0, out),
            self.bias.as_mut().map(|b| (b, Some((0, out)))),
            &self.spec,
            state,
        )
    }

    fn rebind(&mut self, mesh: &DeviceMesh) -> NnResult<()> {
        if mesh.size() != self.spec.shard_count {
            return Err(DistributedError::ShardCountMismatch {
                expected: self.spec.shard_count,
                actual: mesh.size(),
            }
            .into());
        }
        self.spec.local_rank = mesh.rank();
        self.group = mesh.group().clone();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "QuantizedAllToShardedLinear"
    }
}

// =============================================================================
// QuantizedShardedToAllLinear
// =============================================================================

/// [`ShardedToAllLinear`] with the local shard stored quantized.
///
/// The quantization group axis is the sharded reduction axis, so the
/// local slice must be a whole number of groups; this is checked at
/// construction and reported as a group-alignment error.
#[derive(Debug)]
pub struct QuantizedShardedToAllLinear {
    /// Packed local weight shard `[out_features, local_in]`.
    pub weight: Parameter,
    /// Replicated bias `[out_features]`, kept dense.
    pub bias: Option<Parameter>,
    spec: ShardSpec,
    group: CommGroup,
    in_features: usize,
    out_features: usize,
}

impl QuantizedShardedToAllLinear {
    /// Creates a freshly initialized quantized layer sharded over `mesh`.
    pub fn new(
        in_features: usize,
        out_features: usize,
        bias: bool,
        bits: usize,
        group_size: usize,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        let spec = mesh.shard_spec(ShardDim::Cols);
        let (_, local_in) = spec.local_slice(in_features);
        ensure_group_alignment(local_in, group_size)?;

        let weight = quantize(&kaiming_uniform(out_features, local_in), bits, group_size)?;

        Ok(Self {
            weight: Parameter::Quantized(weight),
            bias: bias.then(|| Parameter::Dense(zeros(&[out_features]))),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Builds this rank's layer by slicing a full dense `[out, in]` weight
    /// and quantizing the local slice.
    ///
    /// The slice is always re-encoded from the dense view; pre-quantized
    /// groups are never sliced.
    pub fn from_full_weights(
        weight: Tensor<f32>,
        bias: Option<Tensor<f32>>,
        bits: usize,
        group_size: usize,
        mesh: &DeviceMesh,
    ) -> NnResult<Self> {
        if weight.ndim() != 2 {
            return Err(tensormesh_core::Error::invalid_operation(
                "sharded linear weight must be 2-D [out_features, in_features]",
            )
            .into());
        }
        let out_features = weight.shape()[0];
        let in_features = weight.shape()[1];

        let spec = mesh.shard_spec(ShardDim::Cols);
        let (start, len) = spec.local_slice(in_features);
        ensure_group_alignment(len, group_size)?;

        let local_weight = quantize(&weight.narrow(1, start, len)?, bits, group_size)?;

        if let Some(ref b) = bias {
            if b.shape() != [out_features] {
                return Err(
                    tensormesh_core::Error::shape_mismatch(&[out_features], b.shape()).into(),
                );
            }
        }

        Ok(Self {
            weight: Parameter::Quantized(local_weight),
            bias: bias.map(Parameter::Dense),
            spec,
            group: mesh.group().clone(),
            in_features,
            out_features,
        })
    }

    /// Returns the full input width.
    #[must_use]
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Returns this rank's input width.
    #[must_use]
    pub fn local_in_features(&self) -> usize {
        self.weight.shape()[1]
    }
}

impl Module for QuantizedShardedToAllLinear {
    fn forward(&self, input: &Tensor<f32>) -> NnResult<Tensor<f32>> {
        self.group.ensure_size(self.spec.shard_count)?;

        let weight = self.weight.quantized()?;
        let mut output = quantized_matmul(input, weight, None)?;

        self.group.all_reduce_sum(&mut output);

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

    fn load_state(&mut self, state: &StateDict) -> LoadReport {
        let in_features = self.in_features;
        load_sharded_state(
            (&mut self.weight, 1, in_features),
            self.bias.as_mut().map(|b| (b, None)),
            &self.spec,
            state,
        )
    }

    fn rebind(&mut self, mesh: &DeviceMesh) -> NnResult<()> {
        if mesh.size() != self.spec.shard_count {
            return Err(DistributedError::ShardCountMismatch {
                expected: self.spec.shard_count,
                actual: mesh.size(),
            }
            .into());
        }
        self.spec.local_rank = mesh.rank();
        self.group = mesh.group().clone();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "QuantizedShardedToAllLinear"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tensormesh_distributed::ThreadBackend;

    fn full_weight(out: usize, inp: usize) -> Tensor<f32> {
        Tensor::from_vec(
            (0..out * inp).map(|v| ((v * 13 % 7) as f32) - 3.0).collect(),
            &[out, inp],
        )
        .unwrap()
    }

    fn mesh_world(k: usize) -> Vec<DeviceMesh> {
        ThreadBackend::create_world(k)
            .into_iter()
            .map(|b| DeviceMesh::new(CommGroup::new(Arc::new(b))))
            .collect()
    }

    #[test]
    fn test_all_to_sharded_single_rank_equals_linear() {
        let mesh = DeviceMesh::single();
        let w = full_weight(4, 6);
        let b = Tensor::from_vec(vec![0.5f32; 4], &[4]).unwrap();

        let sharded =
            AllToShardedLinear::from_full_weights(w.clone(), Some(b.clone()), &mesh).unwrap();
        let reference = crate::layers::linear::Linear::from_weights(w, Some(b)).unwrap();

        let x = Tensor::from_vec((0..12).map(|v| v as f32 * 0.25).collect(), &[2, 6]).unwrap();
        assert_eq!(
            sharded.forward(&x).unwrap().to_vec(),
            reference.forward(&x).unwrap().to_vec()
        );
    }

    #[test]
    fn test_all_to_sharded_shards_cover_output() {
        // No collective runs in the forward pass, so the ranks can be
        // evaluated sequentially.
        let meshes = mesh_world(2);
        let w = full_weight(6, 4);
        let x = Tensor::from_vec((0..8).map(|v| v as f32 * 0.5).collect(), &[2, 4]).unwrap();

        let reference = crate::layers::linear::Linear::from_weights(w.clone(), None)
            .unwrap()
            .forward(&x)
            .unwrap();

        let mut widths = Vec::new();
        for mesh in &meshes {
            let layer = AllToShardedLinear::from_full_weights(w.clone(), None, mesh).unwrap();
            let local = layer.forward(&x).unwrap();
            widths.push(local.shape()[1]);

            // The local output equals the matching column slice of the
            // unsharded result.
            let (start, len) = layer.shard_spec().local_slice(6);
            let expected = reference.narrow(1, start, len).unwrap();
            assert_eq!(local.to_vec(), expected.to_vec());
        }
        assert_eq!(widths.iter().sum::<usize>(), 6);
    }

    #[test]
    fn test_sharded_to_all_single_rank_equals_linear() {
        let mesh = DeviceMesh::single();
        let w = full_weight(3, 8);
        let b = Tensor::from_vec(vec![1.0f32, -1.0, 0.0], &[3]).unwrap();

        let sharded =
            ShardedToAllLinear::from_full_weights(w.clone(), Some(b.clone()), &mesh).unwrap();
        let reference = crate::layers::linear::Linear::from_weights(w, Some(b)).unwrap();

        let x = Tensor::from_vec((0..16).map(|v| v as f32 * 0.125).collect(), &[2, 8]).unwrap();
        assert_eq!(
            sharded.forward(&x).unwrap().to_vec(),
            reference.forward(&x).unwrap().to_vec()
        );
    }

    #[test]
    fn test_uneven_sharding_widths() {
        let meshes = mesh_world(3);
        let w = full_weight(10, 4);

        let widths: Vec<usize> = meshes
            .iter()
            .map(|mesh| {
                AllToShardedLinear::from_full_weights(w.clone(), None, mesh)
                    .unwrap()
                    .local_out_features()
            })
            .collect();
        assert_eq!(widths, vec![3, 3, 4]);
    }

    #[test]
    fn test_quantized_group_alignment_checked_at_construction() {
        // 2 ranks x 6 local columns: group of 4 does not tile 6.
        let meshes = mesh_world(2);
        let result = QuantizedShardedToAllLinear::new(12, 4, false, 4, 4, &meshes[0]);
        assert!(matches!(
            result.unwrap_err(),
            NnError::GroupAlignment {
                in_features: 6,
                group_size: 4
            }
        ));
    }

    #[test]
    fn test_quantized_all_to_sharded_forward_close_to_dense() {
        let mesh = DeviceMesh::single();
        let w = full_weight(4, 8);
        let layer =
            QuantizedAllToShardedLinear::from_full_weights(w.clone(), None, 8, 8, &mesh).unwrap();
        let reference = crate::layers::linear::Linear::from_weights(w, None).unwrap();

        let x = Tensor::from_vec((0..16).map(|v| v as f32 * 0.1).collect(), &[2, 8]).unwrap();
        let got = layer.forward(&x).unwrap();
        let expected = reference.forward(&x).unwrap();
        for (a, b) in got.as_slice().iter().zip(expected.as_slice()) {
            assert!((a - b).abs() < 0.3, "{a} vs {b}");
        }
    }

    #[test]
    fn test_load_full_checkpoint_slices_locally() {
        let meshes = mesh_world(2);
        let w = full_weight(6, 4);
        let b = Tensor::from_vec((0..6).map(|v| v as f32).collect(), &[6]).unwrap();

        for mesh in &meshes {
            let mut layer = AllToShardedLinear::new(4, 6, true, mesh).unwrap();

            let mut state = StateDict::new();
            state.insert("weight", StateEntry::from_dense(&w));
            state.insert("bias", StateEntry::from_dense(&b));

            let report = layer.load_state(&state);
            assert!(report.is_complete(), "failures: {:?}", report.failures);

            let (start, len) = layer.shard_spec().local_slice(6);
            assert_eq!(
                layer.weight.dense().unwrap().to_vec(),
                w.narrow(0, start, len).unwrap().to_vec()
            );
            assert_eq!(
                layer.bias.as_ref().unwrap().dense().unwrap().to_vec(),
                b.narrow(0, start, len).unwrap().to_vec()
            );
        }
    }

    #[test]
    fn test_load_full_quantized_checkpoint_requantizes_per_shard() {
        let meshes = mesh_world(2);
        let w = full_weight(4, 8);
        let full_q = quantize(&w, 8, 8).unwrap();

        for mesh in &meshes {
            let mut layer = QuantizedShardedToAllLinear::new(8, 4, false, 8, 4, mesh).unwrap();

            let mut state = StateDict::new();
            state.insert("weight", StateEntry::from_quantized(&full_q));

            let report = layer.load_state(&state);
            assert!(report.is_complete(), "failures: {:?}", report.failures);

            // The local shard is re-encoded with the layer's own layout,
            // not sliced from the checkpoint's packed groups.
            let stored = layer.weight.quantized().unwrap();
            assert_eq!(stored.group_size, 4);
            assert_eq!(stored.shape, vec![4, 4]);
        }
    }

    #[test]
    fn test_load_rejects_unrelated_shapes() {
        let mesh = DeviceMesh::single();
        let mut layer = AllToShardedLinear::new(4, 6, false, &mesh).unwrap();

        let mut state = StateDict::new();
        state.insert("weight", StateEntry::from_dense(&Tensor::zeros(&[5, 5])));

        let report = layer.load_state(&state);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            LoadError::ShapeMismatch { .. }
        ));
    }

    #[test]
    fn test_rebind_same_size_is_idempotent() {
        let mesh = DeviceMesh::single();
        let mut layer = ShardedToAllLinear::new(8, 4, true, &mesh).unwrap();

        let other = DeviceMesh::single();
        layer.rebind(&other).unwrap();
        layer.rebind(&other).unwrap();
        assert_eq!(layer.shard_spec().local_rank, 0);

        let x = Tensor::from_vec((0..8).map(|v| v as f32).collect(), &[1, 8]).unwrap();
        assert!(layer.forward(&x).is_ok());
    }

    #[test]
    fn test_rebind_rejects_size_change() {
        let meshes = mesh_world(2);
        let mut layer = ShardedToAllLinear::new(8, 4, false, &meshes[0]).unwrap();

        let single = DeviceMesh::single();
        assert!(matches!(
            layer.rebind(&single).unwrap_err(),
            NnError::Distributed(DistributedError::ShardCountMismatch { .. })
        ));
    }
}
