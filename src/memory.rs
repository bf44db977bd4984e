//! Byte storage for array payloads.
//!
//! [`DataBuffer`] is the owned backing store behind every array: a plain
//! heap allocation with 8-byte alignment so the buffer can be viewed as a
//! slice of any element kind up to `f64` without unaligned access. Freshly
//! grown buffers are zero-initialized; recycled buffers keep their previous
//! contents.

use std::slice;

use crate::format::Scalar;

/// Owned, 8-byte-aligned byte storage.
///
/// The buffer is backed by `u64` words, which guarantees the base pointer
/// is sufficiently aligned for every [`Scalar`] kind. The byte length is
/// tracked separately and need not be a multiple of 8.
#[derive(Default)]
pub struct DataBuffer {
    words: Vec<u64>,
    len: usize,
}

impl DataBuffer {
    /// An empty buffer. Does not allocate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `len` zero-initialized bytes.
    pub fn zeroed(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Allocate a buffer holding a copy of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = Self::zeroed(bytes.len());
        buf.as_bytes_mut().copy_from_slice(bytes);
        buf
    }

    /// Length of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has zero length.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The buffer contents as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        // The word storage holds at least `len` bytes.
        unsafe { slice::from_raw_parts(self.words.as_ptr().cast(), self.len) }
    }

    /// The buffer contents as a mutable byte slice.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), self.len) }
    }

    /// View the first `n` elements as a typed slice.
    ///
    /// # Panics
    ///
    /// Panics if `n` elements of `T` do not fit in the buffer.
    pub(crate) fn as_slice_of<T: Scalar>(&self, n: usize) -> &[T] {
        assert!(
            n * std::mem::size_of::<T>() <= self.len,
            "typed view of {n} elements exceeds buffer length {}",
            self.len
        );
        // Base pointer is 8-byte aligned; bounds checked above.
        unsafe { slice::from_raw_parts(self.words.as_ptr().cast(), n) }
    }

    /// View the first `n` elements as a mutable typed slice.
    ///
    /// # Panics
    ///
    /// Panics if `n` elements of `T` do not fit in the buffer.
    pub(crate) fn as_mut_slice_of<T: Scalar>(&mut self, n: usize) -> &mut [T] {
        assert!(
            n * std::mem::size_of::<T>() <= self.len,
            "typed view of {n} elements exceeds buffer length {}",
            self.len
        );
        unsafe { slice::from_raw_parts_mut(self.words.as_mut_ptr().cast(), n) }
    }
}

impl std::fmt::Debug for DataBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBuffer").field("len", &self.len).finish()
    }
}
