//! # Aperture
//!
//! Array pool, typed conversion kernel and attribute sidecar for detector
//! and area-imaging data pipelines.
//!
//! Drivers acquire typed N-dimensional arrays from a central
//! [`ArrayPool`], fill them with sampled data and hand them to consumers.
//! The pool bounds both the number of buffer objects and their cumulative
//! memory footprint, and recycles freed buffers so the acquisition hot
//! path stays free of allocator churn.
//!
//! ## Features
//!
//! - **Bounded pool**: hard caps on buffer count and cumulative memory,
//!   errors instead of waits
//! - **Explicit lifecycle**: reference-counted handles with
//!   [`reserve`](array::Array::reserve)/[`release`](array::Array::release)
//!   and an RAII backstop on drop
//! - **Conversion kernel**: element-type conversion plus N-dimensional
//!   sub-region, integer binning and axis reversal, monomorphized over the
//!   8×8 element-type cross product
//! - **Attribute sidecar**: ordered, case-insensitive, typed metadata
//!   copied alongside the array through convert/copy
//!
//! ## Quick Start
//!
//! ```rust
//! use aperture::{ArrayPool, DataType, Dimension, PoolConfig};
//!
//! let pool = ArrayPool::new(PoolConfig::new().with_max_buffers(16));
//!
//! // Acquire a 4x3 frame and fill it (axis 0 varies fastest).
//! let mut frame = pool.alloc(&[4, 3], DataType::UInt8, 0)?;
//! frame.set_unique_id(1);
//! frame.set_timestamp_now();
//! frame.elements_mut::<u8>()?
//!     .copy_from_slice(&[0, 10, 20, 30, 1, 11, 21, 31, 2, 12, 22, 32]);
//!
//! // Bin pairs of elements along the first axis into a wider type.
//! let template = [
//!     Dimension { size: 4, offset: 0, binning: 2, reverse: false },
//!     Dimension::new(3),
//! ];
//! let binned = pool.convert(&frame, &template, DataType::UInt16)?;
//! assert_eq!(binned.dims()[0].size, 2);
//! assert_eq!(binned.elements::<u16>()?, &[10, 50, 12, 52, 14, 54]);
//!
//! // Hand off: a consumer that keeps the frame reserves its own handle.
//! let retained = frame.reserve()?;
//! drop(frame);
//! assert_eq!(retained.ref_count(), 1);
//! # Ok::<(), aperture::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod array;
pub mod attribute;
mod convert;
pub mod error;
pub mod format;
pub mod memory;
pub mod pool;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::array::Array;
    pub use crate::attribute::{AttrKind, AttrScalar, AttrValue, Attribute, AttributeList};
    pub use crate::error::{Error, Result};
    pub use crate::format::{ArrayInfo, ColorMode, DataType, Dimension, Scalar, MAX_DIMS};
    pub use crate::memory::DataBuffer;
    pub use crate::pool::{ArrayPool, PoolConfig, PoolStats};
}

pub use array::Array;
pub use attribute::{AttrKind, AttrScalar, AttrValue, Attribute, AttributeList};
pub use error::{Error, Result};
pub use format::{ArrayInfo, ColorMode, DataType, Dimension, Scalar, MAX_DIMS};
pub use memory::DataBuffer;
pub use pool::{ArrayPool, PoolConfig, PoolStats};
