//! Data Types - TensorMesh Type System
//!
//! Defines the element types supported by TensorMesh tensors and the trait
//! ladder for type-safe operations. Supports floating point (f16, bf16,
//! f32, f64) and 8-bit signed integers; packed sub-byte quantization codes
//! live in their own container and are not tensor element types.
//!
//! @version 0.1.0
//! @author TensorMesh Development Team

use core::fmt::{Debug, Display};
use core::ops::{Add, AddAssign, Div, Mul, Sub};

use half::{bf16, f16};
use num_traits::{NumCast, One, Zero};

// =============================================================================
// DType Enum
// =============================================================================

/// Runtime representation of tensor element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// 16-bit floating point (half precision).
    F16,
    /// 16-bit brain floating point.
    BF16,
    /// 32-bit floating point (single precision).
    F32,
    /// 64-bit floating point (double precision).
    F64,
    /// 8-bit signed integer.
    I8,
}

impl DType {
    /// Returns the size in bytes of this element type.
    #[must_use]
    pub const fn size_of(self) -> usize {
        match self {
            Self::I8 => 1,
            Self::F16 | Self::BF16 => 2,
            Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// Returns true if this is a floating point type.
    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::BF16 | Self::F32 | Self::F64)
    }

    /// Returns the name of this element type as a string.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I8 => "i8",
        }
    }
}

impl Default for DType {
    fn default() -> Self {
        Self::F32
    }
}

impl Display for DType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Scalar Trait
// =============================================================================

/// Trait for all scalar types that can be stored in a tensor.
pub trait Scalar:
    Copy + Clone + Debug + Display + Default + PartialEq + PartialOrd + Send + Sync + 'static
{
    /// The runtime dtype for this scalar type.
    const DTYPE: DType;

    /// Returns the dtype for this type.
    #[must_use]
    fn dtype() -> DType {
        Self::DTYPE
    }
}

// =============================================================================
// Numeric Trait
// =============================================================================

/// Trait for scalar types that support arithmetic.
pub trait Numeric:
    Scalar
    + Add<Output = Self>
    + AddAssign
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Zero
    + One
    + NumCast
{
}

impl<T> Numeric for T where
    T: Scalar
        + Add<Output = T>
        + AddAssign
        + Sub<Output = T>
        + Mul<Output = T>
        + Div<Output = T>
        + Zero
        + One
        + NumCast
{
}

// =============================================================================
// Scalar Implementations
// =============================================================================

macro_rules! impl_scalar {
    ($ty:ty, $dtype:expr) => {
        impl Scalar for $ty {
            const DTYPE: DType = $dtype;
        }
    };
}

impl_scalar!(f16, DType::F16);
impl_scalar!(bf16, DType::BF16);
impl_scalar!(f32, DType::F32);
impl_scalar!(f64, DType::F64);
impl_scalar!(i8, DType::I8);

// =============================================================================
// Tests
// =============================================================================
