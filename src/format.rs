//! Element data types and dimension descriptors.
//!
//! This module provides the type vocabulary shared by arrays, the
//! conversion kernel and the pool:
//!
//! - [`DataType`]: the closed set of 8 fixed-width numeric element kinds
//! - [`Dimension`]: per-axis descriptor (size, offset, binning, reverse)
//! - [`ArrayInfo`]: derived size information for an array shape
//! - [`ColorMode`]: pixel layout tag carried as a "ColorMode" attribute
//! - [`Scalar`]: sealed trait connecting Rust primitives to [`DataType`]
//!
//! # Design Principles
//!
//! - **Type safety**: element kinds are an enum, never integer codes
//! - **Zero-cost**: everything here is small and `Copy`
//! - **Explicit**: no implicit widening or narrowing anywhere

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Compile-time cap on the number of array dimensions.
pub const MAX_DIMS: usize = 10;

// ============================================================================
// DataType
// ============================================================================

/// Element type of an array.
///
/// The set is closed: signed and unsigned integers of 8, 16 and 32 bits,
/// plus 32- and 64-bit floats. Each kind has a fixed byte size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Signed 8-bit integer.
    #[default]
    Int8,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// 32-bit float.
    Float32,
    /// 64-bit float.
    Float64,
}

impl DataType {
    /// All element kinds, in code order.
    pub const ALL: [DataType; 8] = [
        DataType::Int8,
        DataType::UInt8,
        DataType::Int16,
        DataType::UInt16,
        DataType::Int32,
        DataType::UInt32,
        DataType::Float32,
        DataType::Float64,
    ];

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Float64 => 8,
        }
    }

    /// Whether this is a floating-point kind.
    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Whether this kind can represent negative values.
    pub fn is_signed(self) -> bool {
        !matches!(self, DataType::UInt8 | DataType::UInt16 | DataType::UInt32)
    }

    /// Numeric code of this kind (position in [`DataType::ALL`]).
    ///
    /// Drivers use this where an element kind crosses a non-typed boundary
    /// such as a parameter record.
    pub fn code(self) -> i32 {
        DataType::ALL.iter().position(|&t| t == self).unwrap_or(0) as i32
    }

    /// Look up an element kind by numeric code.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedType`] for codes outside `0..8`.
    pub fn from_code(code: i32) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|i| DataType::ALL.get(i).copied())
            .ok_or_else(|| Error::UnsupportedType(format!("code {code}")))
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int8 => "Int8",
            DataType::UInt8 => "UInt8",
            DataType::Int16 => "Int16",
            DataType::UInt16 => "UInt16",
            DataType::Int32 => "Int32",
            DataType::UInt32 => "UInt32",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
        };
        f.write_str(name)
    }
}

impl FromStr for DataType {
    type Err = Error;

    /// Case-insensitive lookup by kind name ("Int8", "uint16", ...).
    fn from_str(s: &str) -> Result<Self> {
        DataType::ALL
            .iter()
            .find(|t| t.to_string().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::UnsupportedType(s.to_string()))
    }
}

// ============================================================================
// Scalar
// ============================================================================

mod sealed {
    pub trait Sealed {}
}

/// A Rust primitive that is a valid array element.
///
/// Implemented exactly for the 8 kinds in [`DataType`]; the trait is sealed.
/// Used by the typed element views on arrays and by the conversion kernel.
pub trait Scalar:
    sealed::Sealed + Copy + Default + PartialEq + Send + Sync + 'static
{
    /// The [`DataType`] this primitive corresponds to.
    const DATA_TYPE: DataType;

    /// Binning accumulation: wrapping addition for integer kinds, plain
    /// addition for floats.
    fn accumulate(self, other: Self) -> Self;
}

macro_rules! impl_scalar_int {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}
        impl Scalar for $ty {
            const DATA_TYPE: DataType = DataType::$kind;

            #[inline]
            fn accumulate(self, other: Self) -> Self {
                self.wrapping_add(other)
            }
        }
    )*};
}

macro_rules! impl_scalar_float {
    ($($ty:ty => $kind:ident),* $(,)?) => {$(
        impl sealed::Sealed for $ty {}
        impl Scalar for $ty {
            const DATA_TYPE: DataType = DataType::$kind;

            #[inline]
            fn accumulate(self, other: Self) -> Self {
                self + other
            }
        }
    )*};
}

impl_scalar_int!(
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
);
impl_scalar_float!(f32 => Float32, f64 => Float64);

// ============================================================================
// Dimension
// ============================================================================

/// Descriptor for one axis of an array or of a conversion template.
///
/// For a freshly allocated array every axis has `offset = 0`, `binning = 1`
/// and `reverse = false`. The other fields only take effect as a conversion
/// template (see [`ArrayPool::convert`](crate::pool::ArrayPool::convert)),
/// where the descriptor selects a sub-region of the input axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimension {
    /// Number of elements along this axis.
    pub size: usize,
    /// Starting index into the input along this axis.
    pub offset: usize,
    /// Number of input elements summed per output element.
    pub binning: usize,
    /// Traverse the input axis from high to low.
    pub reverse: bool,
}

impl Dimension {
    /// A plain axis of `size` elements: `offset = 0`, `binning = 1`,
    /// `reverse = false`.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            offset: 0,
            binning: 1,
            reverse: false,
        }
    }
}

impl Default for Dimension {
    fn default() -> Self {
        Self::new(0)
    }
}

// ============================================================================
// ArrayInfo
// ============================================================================

/// Derived size information for an array shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayInfo {
    /// Bytes per element for the array's [`DataType`].
    pub bytes_per_element: usize,
    /// Total number of elements (product of the axis sizes; 1 for a
    /// zero-dimensional array).
    pub n_elements: usize,
    /// Total payload size in bytes.
    pub total_bytes: usize,
}

// ============================================================================
// ColorMode
// ============================================================================

/// Pixel layout of an image array, carried as the "ColorMode" attribute.
///
/// The RGB modes name which axis holds the 3 color samples; when a
/// conversion collapses that axis the pool rewrites the attribute to
/// [`ColorMode::Mono`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    /// Single-channel data.
    Mono = 0,
    /// Raw Bayer mosaic.
    Bayer = 1,
    /// RGB with color as the first (fastest) axis.
    Rgb1 = 2,
    /// RGB with color as the middle axis.
    Rgb2 = 3,
    /// RGB with color as the last axis.
    Rgb3 = 4,
}

impl ColorMode {
    /// The attribute value as stored on an array.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Look up a color mode by attribute value.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(ColorMode::Mono),
            1 => Some(ColorMode::Bayer),
            2 => Some(ColorMode::Rgb1),
            3 => Some(ColorMode::Rgb2),
            4 => Some(ColorMode::Rgb3),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::Int8.size(), 1);
        assert_eq!(DataType::UInt8.size(), 1);
        assert_eq!(DataType::Int16.size(), 2);
        assert_eq!(DataType::UInt16.size(), 2);
        assert_eq!(DataType::Int32.size(), 4);
        assert_eq!(DataType::UInt32.size(), 4);
        assert_eq!(DataType::Float32.size(), 4);
        assert_eq!(DataType::Float64.size(), 8);
    }

    #[test]
    fn test_data_type_codes_round_trip() {
        for kind in DataType::ALL {
            assert_eq!(DataType::from_code(kind.code()).unwrap(), kind);
        }
        assert!(DataType::from_code(-1).is_err());
        assert!(DataType::from_code(8).is_err());
    }

    #[test]
    fn test_data_type_from_str_is_case_insensitive() {
        assert_eq!("uint16".parse::<DataType>().unwrap(), DataType::UInt16);
        assert_eq!("FLOAT64".parse::<DataType>().unwrap(), DataType::Float64);
        assert!("complex64".parse::<DataType>().is_err());
    }

    #[test]
    fn test_data_type_classification() {
        assert!(DataType::Float32.is_float());
        assert!(!DataType::Int32.is_float());
        assert!(DataType::Int8.is_signed());
        assert!(DataType::Float64.is_signed());
        assert!(!DataType::UInt32.is_signed());
    }

    #[test]
    fn test_dimension_new_defaults() {
        let dim = Dimension::new(42);
        assert_eq!(dim.size, 42);
        assert_eq!(dim.offset, 0);
        assert_eq!(dim.binning, 1);
        assert!(!dim.reverse);
    }

    #[test]
    fn test_color_mode_round_trip() {
        for mode in [
            ColorMode::Mono,
            ColorMode::Bayer,
            ColorMode::Rgb1,
            ColorMode::Rgb2,
            ColorMode::Rgb3,
        ] {
            assert_eq!(ColorMode::from_i32(mode.as_i32()), Some(mode));
        }
        assert_eq!(ColorMode::from_i32(99), None);
    }

    #[test]
    fn test_scalar_accumulate_wraps_integers() {
        assert_eq!(250u8.accumulate(10), 4);
        assert_eq!(1.5f32.accumulate(2.25), 3.75);
    }
}
