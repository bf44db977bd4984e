//! Bounded array pool with recycling and reference-count lifecycle.
//!
//! The pool owns every array it constructs. Allocation revives an array
//! from the free list when one is available (resizing its backing buffer
//! only if needed), constructs a fresh one otherwise, and fails when the
//! configured buffer or memory cap would be exceeded. Released arrays keep
//! their buffers, so a steady-state pipeline allocates nothing on the hot
//! path.
//!
//! # Caps
//!
//! `max_buffers` bounds the number of array objects ever constructed;
//! `max_memory` bounds the cumulative bytes of pool-allocated backing
//! buffers. Both are hard ceilings: exceeding them yields errors, never
//! waits.
//!
//! # Locking
//!
//! One mutex per pool guards the free list, the counters and every owned
//! array's reference count. Payload access never takes it: conversion and
//! copy read the input and write the output unlocked under the producer
//! exclusivity contract (see [`crate::array`]).

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use smallvec::SmallVec;

use crate::array::{Array, ArrayInner, Dims};
use crate::attribute::AttrValue;
use crate::convert;
use crate::error::{Error, Result};
use crate::format::{ColorMode, DataType, Dimension, MAX_DIMS};
use crate::memory::DataBuffer;

/// Attribute rewritten when a conversion collapses the color axis.
const COLOR_MODE_KEY: &str = "ColorMode";

// ============================================================================
// PoolConfig / PoolStats
// ============================================================================

/// Configuration for an [`ArrayPool`].
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Name used in log events and reports.
    pub name: String,
    /// Maximum number of arrays the pool may construct; `None` = unlimited.
    pub max_buffers: Option<usize>,
    /// Maximum cumulative bytes of pool-allocated buffers; `None` =
    /// unlimited.
    pub max_memory: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: "array-pool".to_string(),
            max_buffers: None,
            max_memory: None,
        }
    }
}

impl PoolConfig {
    /// Configuration with no caps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Cap the number of arrays.
    pub fn with_max_buffers(mut self, max_buffers: usize) -> Self {
        self.max_buffers = Some(max_buffers);
        self
    }

    /// Cap the cumulative buffer memory in bytes.
    pub fn with_max_memory(mut self, max_memory: usize) -> Self {
        self.max_memory = Some(max_memory);
        self
    }
}

/// Snapshot of pool usage.
#[derive(Clone, Debug)]
pub struct PoolStats {
    /// Arrays constructed by the pool (never destroyed before the pool).
    pub num_buffers: usize,
    /// Configured buffer cap.
    pub max_buffers: Option<usize>,
    /// Cumulative bytes of pool-allocated backing buffers.
    pub memory_size: usize,
    /// Configured memory cap.
    pub max_memory: Option<usize>,
    /// Arrays currently on the free list.
    pub num_free: usize,
    /// Allocations satisfied by recycling a freed array.
    pub recycled: u64,
}

// ============================================================================
// PoolInner
// ============================================================================

/// Shared pool state, referenced weakly by every owned array.
pub(crate) struct PoolInner {
    name: String,
    max_buffers: Option<usize>,
    max_memory: Option<usize>,
    state: Mutex<PoolState>,
}

struct PoolState {
    num_buffers: usize,
    memory_size: usize,
    free: VecDeque<Arc<ArrayInner>>,
    recycled: u64,
}

impl PoolInner {
    /// Increment an owned array's reference count.
    pub(crate) fn bump_ref(&self, inner: &ArrayInner) {
        let _state = self.state.lock().unwrap();
        inner.ref_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement an owned array's reference count, re-queueing it on the
    /// free list when the last reference goes away.
    pub(crate) fn release_ref(&self, inner: &Arc<ArrayInner>) {
        let mut state = self.state.lock().unwrap();
        let count = inner.ref_count.fetch_sub(1, Ordering::AcqRel) - 1;
        if count == 0 {
            state.free.push_back(inner.clone());
        } else if count < 0 {
            tracing::error!(
                pool = %self.name,
                count,
                "reference count underflow; array not re-queued"
            );
            debug_assert!(count >= 0, "array reference count underflow");
        }
    }
}

// ============================================================================
// ArrayPool
// ============================================================================

/// Bounded, recycling pool of [`Array`] buffers.
///
/// Cloning the pool handle is cheap and shares the same pool. Arrays hold
/// only a weak back-reference, so dropping every pool handle destroys the
/// pool (and its free arrays) even while consumer handles are still alive;
/// those arrays are freed with their last handle.
#[derive(Clone)]
pub struct ArrayPool {
    inner: Arc<PoolInner>,
}

impl Default for ArrayPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl ArrayPool {
    /// Create a pool with the given configuration.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                name: config.name,
                max_buffers: config.max_buffers,
                max_memory: config.max_memory,
                state: Mutex::new(PoolState {
                    num_buffers: 0,
                    memory_size: 0,
                    free: VecDeque::new(),
                    recycled: 0,
                }),
            }),
        }
    }

    /// The pool's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Whether `array` was allocated by (and is still owned by) this pool.
    pub fn owns(&self, array: &Array) -> bool {
        array
            .inner_arc()
            .owner
            .upgrade()
            .is_some_and(|pool| Arc::ptr_eq(&pool, &self.inner))
    }

    /// Allocate an array of the given shape and element type, with
    /// reference count 1.
    ///
    /// `data_size` of 0 requests exactly the bytes the shape requires; a
    /// larger value pre-sizes the backing buffer. A freshly grown buffer is
    /// zero-initialized; a recycled one keeps its previous contents.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDimension`]: more than [`MAX_DIMS`] dimensions, or
    ///   an axis of size 0
    /// - [`Error::BufferLimit`] / [`Error::MemoryLimit`]: a pool cap would
    ///   be exceeded
    /// - [`Error::BufferTooSmall`]: `data_size` is less than the shape
    ///   requires
    pub fn alloc(&self, dims: &[usize], data_type: DataType, data_size: usize) -> Result<Array> {
        self.alloc_impl(dims, data_type, data_size, None)
    }

    /// Allocate an array backed by a caller-provided buffer.
    ///
    /// The buffer is adopted without copying; the pool takes exclusive
    /// ownership and will drop it when the storage is later replaced.
    /// Externally-provided bytes are never charged against the pool's
    /// memory cap.
    ///
    /// # Errors
    ///
    /// As [`ArrayPool::alloc`]; [`Error::BufferTooSmall`] if the buffer is
    /// smaller than the shape requires.
    pub fn alloc_with_buffer(
        &self,
        dims: &[usize],
        data_type: DataType,
        buffer: DataBuffer,
    ) -> Result<Array> {
        self.alloc_impl(dims, data_type, 0, Some(buffer))
    }

    fn alloc_impl(
        &self,
        dims: &[usize],
        data_type: DataType,
        data_size: usize,
        external: Option<DataBuffer>,
    ) -> Result<Array> {
        if dims.len() > MAX_DIMS {
            return Err(Error::InvalidDimension(format!(
                "{} dimensions exceed the cap of {MAX_DIMS}",
                dims.len()
            )));
        }
        if let Some(axis) = dims.iter().position(|&size| size == 0) {
            return Err(Error::InvalidDimension(format!("axis {axis} has size 0")));
        }

        let mut state = self.inner.state.lock().unwrap();

        let candidate = match state.free.pop_front() {
            Some(array) => {
                state.recycled += 1;
                array
            }
            None => {
                if let Some(max) = self.inner.max_buffers {
                    if state.num_buffers >= max {
                        tracing::error!(
                            pool = %self.inner.name,
                            num_buffers = state.num_buffers,
                            max_buffers = max,
                            "allocation failed: buffer limit reached"
                        );
                        return Err(Error::BufferLimit {
                            num_buffers: state.num_buffers,
                            max_buffers: max,
                        });
                    }
                }
                state.num_buffers += 1;
                Arc::new(ArrayInner::new(Arc::downgrade(&self.inner)))
            }
        };

        // ref_count == 0 and the array is off the free list, so nothing
        // else can observe the body while the pool mutex is held.
        let body = unsafe { candidate.body_mut() };
        body.data_type = data_type;
        body.dims.clear();
        body.dims.extend(dims.iter().map(|&size| Dimension::new(size)));

        let required = body.info().total_bytes;
        let provided = match &external {
            Some(buffer) => buffer.len(),
            None if data_size == 0 => required,
            None => data_size,
        };
        if provided < required {
            tracing::error!(
                pool = %self.inner.name,
                required,
                provided,
                "allocation failed: buffer too small"
            );
            state.free.push_back(candidate.clone());
            return Err(Error::BufferTooSmall { required, provided });
        }

        match external {
            Some(buffer) => {
                // Adopt the caller's storage; the array's previous pooled
                // buffer is dropped and un-charged.
                if !body.external {
                    state.memory_size -= body.storage.len();
                }
                body.storage = buffer;
                body.external = true;
            }
            None => {
                if body.storage.len() < provided {
                    if !body.external {
                        state.memory_size -= body.storage.len();
                    }
                    body.storage = DataBuffer::new();
                    body.external = false;
                    if let Some(max) = self.inner.max_memory {
                        if state.memory_size + provided > max {
                            tracing::error!(
                                pool = %self.inner.name,
                                requested = provided,
                                memory_size = state.memory_size,
                                max_memory = max,
                                "allocation failed: memory limit reached"
                            );
                            state.free.push_back(candidate.clone());
                            return Err(Error::MemoryLimit {
                                requested: provided,
                                memory_size: state.memory_size,
                                max_memory: max,
                            });
                        }
                    }
                    body.storage = DataBuffer::zeroed(provided);
                    state.memory_size += provided;
                }
                // An existing buffer at least as large is kept as-is,
                // previous contents included.
            }
        }

        // A recycled array must not leak the previous frame's metadata.
        candidate.attributes.lock().unwrap().clear();
        candidate.ref_count.store(1, Ordering::Release);
        drop(state);

        tracing::debug!(
            pool = %self.inner.name,
            %data_type,
            ndims = dims.len(),
            bytes = provided,
            "allocated array"
        );
        Ok(Array::from_inner(candidate))
    }

    /// Take an additional reference on an array owned by this pool.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] if the array belongs to another pool.
    pub fn reserve(&self, array: &Array) -> Result<Array> {
        if !self.owns(array) {
            tracing::error!(pool = %self.inner.name, "reserve: array not owned by this pool");
            return Err(Error::NotOwner);
        }
        array.reserve()
    }

    /// Give back a reference on an array owned by this pool. When the last
    /// reference is released the array returns to the free list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotOwner`] if the array belongs to another pool.
    /// The handle is consumed either way; on error the reference is still
    /// released with the true owner when the handle drops.
    pub fn release(&self, array: Array) -> Result<()> {
        if !self.owns(&array) {
            tracing::error!(pool = %self.inner.name, "release: array not owned by this pool");
            return Err(Error::NotOwner);
        }
        array.release()
    }

    /// Allocate a copy of `input` with identical shape and element type.
    ///
    /// Identity, dimension descriptors and attributes are always copied;
    /// the payload only when `copy_data` is set.
    ///
    /// # Errors
    ///
    /// As [`ArrayPool::alloc`].
    pub fn copy(&self, input: &Array, copy_data: bool) -> Result<Array> {
        let sizes: SmallVec<[usize; MAX_DIMS]> =
            input.dims().iter().map(|d| d.size).collect();
        let mut output = self.alloc(&sizes, input.data_type(), 0)?;
        self.copy_into(input, &mut output, copy_data)?;
        Ok(output)
    }

    /// Copy `input` into an existing array, replacing the destination's
    /// shape, element type, identity and attributes.
    ///
    /// Copying an array into itself is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BufferTooSmall`] if the destination's buffer cannot
    /// hold the input's payload.
    pub fn copy_into(&self, input: &Array, output: &mut Array, copy_data: bool) -> Result<()> {
        if Arc::ptr_eq(input.inner_arc(), output.inner_arc()) {
            return Ok(());
        }
        let in_body = input.body();
        let info = in_body.info();
        let capacity = output.data_size();
        if capacity < info.total_bytes {
            return Err(Error::BufferTooSmall {
                required: info.total_bytes,
                provided: capacity,
            });
        }

        let out_body = output.body_mut();
        out_body.unique_id = in_body.unique_id;
        out_body.timestamp = in_body.timestamp;
        out_body.data_type = in_body.data_type;
        out_body.dims = in_body.dims.clone();
        if copy_data {
            let n = info.total_bytes.min(out_body.storage.len());
            out_body.storage.as_bytes_mut()[..n]
                .copy_from_slice(&in_body.storage.as_bytes()[..n]);
        }

        output.attributes().clear();
        input.copy_attributes_to(output);
        Ok(())
    }

    /// Produce a new array from `input` with an independent choice of
    /// element type, per-axis size, origin offset, integer binning and
    /// axis reversal.
    ///
    /// `out_dims` is a template with one descriptor per input axis. Each
    /// descriptor's `offset` selects the input-space origin, `binning` the
    /// number of input elements summed (unnormalized) per output element,
    /// `reverse` the traversal direction, and `size` the input-region
    /// extent; the output axis has `size / binning` elements. When the
    /// template leaves every axis untouched the conversion reduces to a
    /// byte copy (same element type) or a flat cast.
    ///
    /// The output's dimension descriptors compose the input's with the
    /// template: offsets add, binnings multiply, reversals XOR. A
    /// "ColorMode" attribute of an RGB mode is rewritten to Mono when the
    /// conversion collapses the corresponding color axis.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidDimension`]: template length differs from the
    ///   input's `ndims`, a `binning` is 0, a computed output size is 0, or
    ///   a selected region exceeds the input axis
    /// - allocation failures as [`ArrayPool::alloc`]
    pub fn convert(
        &self,
        input: &Array,
        out_dims: &[Dimension],
        data_type: DataType,
    ) -> Result<Array> {
        let in_body = input.body();
        let ndims = in_body.dims.len();
        if out_dims.len() != ndims {
            return Err(Error::InvalidDimension(format!(
                "template has {} dimensions, input has {ndims}",
                out_dims.len()
            )));
        }

        // Normalize the template: the output axis size is the selected
        // input extent divided by the binning.
        let mut template = Dims::new();
        let mut unchanged = true;
        for (axis, requested) in out_dims.iter().enumerate() {
            let mut t = *requested;
            if t.binning == 0 {
                return Err(Error::InvalidDimension(format!(
                    "axis {axis}: binning must be at least 1"
                )));
            }
            t.size /= t.binning;
            if t.size == 0 {
                return Err(Error::InvalidDimension(format!(
                    "axis {axis}: output size is 0 (size={}, binning={})",
                    requested.size, requested.binning
                )));
            }
            let in_size = in_body.dims[axis].size;
            let end = t.offset + t.size * t.binning;
            if end > in_size {
                return Err(Error::InvalidDimension(format!(
                    "axis {axis}: selected region {}..{end} exceeds input size {in_size}",
                    t.offset
                )));
            }
            if t.size != in_size || t.offset != 0 || t.binning != 1 || t.reverse {
                unchanged = false;
            }
            template.push(t);
        }

        let sizes: SmallVec<[usize; MAX_DIMS]> = template.iter().map(|t| t.size).collect();
        let mut output = self.alloc(&sizes, data_type, 0)?;
        {
            let out_body = output.body_mut();
            out_body.unique_id = in_body.unique_id;
            out_body.timestamp = in_body.timestamp;
        }
        input.copy_attributes_to(&output);

        let total_bytes = output.info().total_bytes;
        if unchanged && in_body.data_type == data_type {
            output.data_mut()[..total_bytes]
                .copy_from_slice(&in_body.storage.as_bytes()[..total_bytes]);
        } else if unchanged {
            let n = output.info().n_elements;
            convert::cast_elements(
                &in_body.storage,
                in_body.data_type,
                &mut output.body_mut().storage,
                data_type,
                n,
            );
        } else {
            convert::bin_region(
                &in_body.storage,
                in_body.data_type,
                &in_body.dims,
                &mut output.body_mut().storage,
                data_type,
                &template,
            );
        }

        // Compose the output's shape metadata from the input's descriptors
        // and the template.
        {
            let out_body = output.body_mut();
            for (axis, t) in template.iter().enumerate() {
                let dim = &mut out_body.dims[axis];
                dim.offset = in_body.dims[axis].offset + t.offset;
                dim.binning = in_body.dims[axis].binning * t.binning;
                dim.reverse = in_body.dims[axis].reverse ^ t.reverse;
            }
        }

        // An RGB frame whose color axis no longer has 3 samples is mono.
        let mut attrs = output.attributes();
        if let Some(attr) = attrs.find_mut(COLOR_MODE_KEY) {
            if let Ok(code) = attr.get::<i32>() {
                let color_axis = match ColorMode::from_i32(code) {
                    Some(ColorMode::Rgb1) => Some(0),
                    Some(ColorMode::Rgb2) => Some(1),
                    Some(ColorMode::Rgb3) => Some(2),
                    _ => None,
                };
                if let Some(axis) = color_axis {
                    if sizes.get(axis).map_or(true, |&size| size != 3) {
                        attr.set_value(AttrValue::Int32(ColorMode::Mono.as_i32()));
                    }
                }
            }
        }
        drop(attrs);

        Ok(output)
    }

    /// Snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().unwrap();
        PoolStats {
            num_buffers: state.num_buffers,
            max_buffers: self.inner.max_buffers,
            memory_size: state.memory_size,
            max_memory: self.inner.max_memory,
            num_free: state.free.len(),
            recycled: state.recycled,
        }
    }

    /// Human-readable summary of the pool's counters.
    pub fn report(&self) -> String {
        let stats = self.stats();
        format!(
            "ArrayPool {}:\n  num_buffers={}, max_buffers={}\n  memory_size={}, max_memory={}\n  num_free={}\n",
            self.inner.name,
            stats.num_buffers,
            fmt_cap(stats.max_buffers),
            stats.memory_size,
            fmt_cap(stats.max_memory),
            stats.num_free
        )
    }
}

impl std::fmt::Debug for ArrayPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("ArrayPool")
            .field("name", &self.inner.name)
            .field("num_buffers", &stats.num_buffers)
            .field("memory_size", &stats.memory_size)
            .field("num_free", &stats.num_free)
            .finish()
    }
}

fn fmt_cap(cap: Option<usize>) -> String {
    cap.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
}
