//! Error types for aperture.

use crate::attribute::AttrKind;
use thiserror::Error;

/// Result type alias using aperture's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pool, array and attribute operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The pool's buffer-count cap would be exceeded.
    #[error("buffer limit reached: {num_buffers} buffers (max {max_buffers})")]
    BufferLimit {
        /// Buffers constructed by the pool so far.
        num_buffers: usize,
        /// Configured buffer cap.
        max_buffers: usize,
    },

    /// The pool's memory cap would be exceeded.
    #[error("memory limit reached: {requested} bytes requested, {memory_size}/{max_memory} bytes in use")]
    MemoryLimit {
        /// Bytes the allocation asked for.
        requested: usize,
        /// Bytes currently charged to the pool.
        memory_size: usize,
        /// Configured memory cap in bytes.
        max_memory: usize,
    },

    /// A buffer is smaller than the requested shape requires.
    #[error("buffer too small: required {required} bytes, got {provided}")]
    BufferTooSmall {
        /// Bytes the shape and element type require.
        required: usize,
        /// Bytes actually available.
        provided: usize,
    },

    /// A dimension descriptor or computed output shape is invalid.
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// A data type code or name outside the supported set.
    #[error("unsupported data type: {0}")]
    UnsupportedType(String),

    /// Reserve/release called on an array owned by a different pool.
    #[error("array is not owned by this pool")]
    NotOwner,

    /// A typed read disagreed with the stored type.
    #[error("type mismatch: requested {requested}, stored {stored}")]
    TypeMismatch {
        /// Type the caller asked for.
        requested: AttrKind,
        /// Type actually stored.
        stored: AttrKind,
    },

    /// The array's owning pool no longer exists.
    #[error("array has no owning pool")]
    NoOwner,

    /// An invalid argument, such as an empty attribute name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
