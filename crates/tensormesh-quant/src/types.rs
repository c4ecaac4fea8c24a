//! Quantization Types
//!
//! The packed quantized tensor representation.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use core::fmt;

use crate::error::{QuantError, QuantResult};
use crate::packing::{packed_len, unpack_code};

/// Bit widths accepted by the codec.
pub const SUPPORTED_BITS: [usize; 4] = [2, 3, 4, 8];

/// Returns true if `bits` is a supported code width.
#[must_use]
pub fn is_supported_bit_width(bits: usize) -> bool {
    SUPPORTED_BITS.contains(&bits)
}

// =============================================================================
// Quantized Tensor
// =============================================================================

/// A tensor stored as group-wise affine-quantized codes.
///
/// Elements are grouped in contiguous runs of `group_size` along the last
/// axis; each group carries one `scale` and one `bias` (the group minimum).
/// An element decodes as `code * scale + bias`, except that a group with
/// `scale == 0` (all elements equal) decodes to `bias` everywhere.
///
/// Codes are bit-packed per the layout documented in [`crate::packing`].
#[derive(Clone, PartialEq)]
pub struct QuantizedTensor {
    /// Logical shape of the original tensor.
    pub shape: Vec<usize>,
    /// Code width in bits.
    pub bits: usize,
    /// Elements per quantization group.
    pub group_size: usize,
    /// Bit-packed codes.
    pub packed: Vec<u8>,
    /// Per-group scale factors.
    pub scales: Vec<f32>,
    /// Per-group zero points (group minima).
    pub biases: Vec<f32>,
}

impl QuantizedTensor {
    /// Assembles a quantized tensor from its parts, validating the layout.
    pub fn new(
        shape: Vec<usize>,
        bits: usize,
        group_size: usize,
        packed: Vec<u8>,
        scales: Vec<f32>,
        biases: Vec<f32>,
    ) -> QuantResult<Self> {
        if !is_supported_bit_width(bits) {
            return Err(QuantError::InvalidBitWidth(bits));
        }
        let numel: usize = shape.iter().product();
        let last_axis = shape.last().copied().unwrap_or(1);
        if group_size == 0 || (numel > 0 && last_axis % group_size != 0) {
            return Err(QuantError::GroupSize {
                axis: last_axis,
                group_size,
            });
        }
        let num_groups = numel / group_size;
        if scales.len() != num_groups || biases.len() != num_groups {
            return Err(QuantError::DataLength {
                expected: num_groups,
                actual: scales.len().max(biases.len()),
            });
        }
        if packed.len() != packed_len(numel, bits) {
            return Err(QuantError::DataLength {
                expected: packed_len(numel, bits),
                actual: packed.len(),
            });
        }
        Ok(Self {
            shape,
            bits,
            group_size,
            packed,
            scales,
            biases,
        })
    }

    /// Returns the logical number of elements.
    #[must_use]
    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }

    /// Returns the number of quantization groups.
    #[must_use]
    pub fn num_groups(&self) -> usize {
        self.scales.len()
    }

    /// Returns the number of quantization levels (`2^bits - 1` is the
    /// maximum code).
    #[must_use]
    pub fn levels(&self) -> usize {
        (1 << self.bits) - 1
    }

    /// Reads the code at flat element index `i`.
    #[must_use]
    pub fn code(&self, i: usize) -> u8 {
        unpack_code(&self.packed, i, self.bits)
    }

    /// Returns the stored size in bytes (codes + group metadata).
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.packed.len() + (self.scales.len() + self.biases.len()) * core::mem::size_of::<f32>()
    }

    /// Returns the compression ratio relative to f32 storage.
    #[must_use]
    pub fn compression_ratio(&self) -> f32 {
        let original = self.numel() * core::mem::size_of::<f32>();
        if self.size_bytes() == 0 {
            return 1.0;
        }
        original as f32 / self.size_bytes() as f32
    }
}

impl fmt::Debug for QuantizedTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantizedTensor")
            .field("shape", &self.shape)
            .field("bits", &self.bits)
            .field("group_size", &self.group_size)
            .field("num_groups", &self.num_groups())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
