//! Array handles: typed N-dimensional buffers with identity and attributes.
//!
//! An [`Array`] is a handle to a buffer owned by an
//! [`ArrayPool`](crate::pool::ArrayPool). The pool hands out a handle with
//! reference count 1; [`Array::reserve`] creates additional handles (one
//! count each) and [`Array::release`] (or simply dropping a handle) gives a
//! count back. When the count reaches zero the buffer returns to the pool's
//! free list for reuse.
//!
//! # Access contract
//!
//! The producer that allocated an array has exclusive access until it hands
//! the array off to consumers; after handoff consumers treat the payload as
//! read-only. Mutating methods therefore take `&mut self` on the handle,
//! and neither reads nor writes take a lock. The attribute list is the one
//! exception: it has its own mutex (see [`Array::attributes`]) so metadata
//! can be amended on one array without contending with pool-level activity
//! on another.

use std::cell::UnsafeCell;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

use smallvec::SmallVec;

use crate::attribute::AttributeList;
use crate::error::{Error, Result};
use crate::format::{ArrayInfo, DataType, Dimension, Scalar, MAX_DIMS};
use crate::memory::DataBuffer;
use crate::pool::PoolInner;

/// Inline dimension storage up to the compile-time cap.
pub(crate) type Dims = SmallVec<[Dimension; MAX_DIMS]>;

// ============================================================================
// ArrayBody / ArrayInner
// ============================================================================

/// Shape, identity and payload of an array.
///
/// Written by the pool at allocation time (while the array is off the free
/// list with no outstanding handles) and by the producer before handoff;
/// read-only afterwards.
pub(crate) struct ArrayBody {
    pub(crate) data_type: DataType,
    pub(crate) dims: Dims,
    pub(crate) unique_id: i32,
    pub(crate) timestamp: f64,
    pub(crate) storage: DataBuffer,
    /// Storage was supplied by the caller and is not charged to the pool.
    pub(crate) external: bool,
}

impl ArrayBody {
    pub(crate) fn info(&self) -> ArrayInfo {
        let bytes_per_element = self.data_type.size();
        let n_elements: usize = self.dims.iter().map(|d| d.size).product();
        ArrayInfo {
            bytes_per_element,
            n_elements,
            total_bytes: n_elements * bytes_per_element,
        }
    }
}

/// Shared state behind every array handle.
pub(crate) struct ArrayInner {
    /// The owning pool. Weak so an array cannot keep its pool alive.
    pub(crate) owner: Weak<PoolInner>,
    /// Explicit reference count. Mutated only under the pool mutex; atomic
    /// so diagnostic reads need no lock.
    pub(crate) ref_count: AtomicI32,
    body: UnsafeCell<ArrayBody>,
    pub(crate) attributes: Mutex<AttributeList>,
}

impl ArrayInner {
    pub(crate) fn new(owner: Weak<PoolInner>) -> Self {
        Self {
            owner,
            ref_count: AtomicI32::new(0),
            body: UnsafeCell::new(ArrayBody {
                data_type: DataType::default(),
                dims: Dims::new(),
                unique_id: 0,
                timestamp: 0.0,
                storage: DataBuffer::new(),
                external: false,
            }),
            attributes: Mutex::new(AttributeList::new()),
        }
    }

    pub(crate) fn body(&self) -> &ArrayBody {
        // Shared reads are valid under the access contract: the body is
        // only written while no other handle can observe it.
        unsafe { &*self.body.get() }
    }

    /// Mutable access to the body.
    ///
    /// # Safety
    ///
    /// The caller must hold exclusive access: either the array has
    /// `ref_count == 0` and is being reset under the pool mutex, or the
    /// caller is the producer holding the sole handle before handoff.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn body_mut(&self) -> &mut ArrayBody {
        unsafe { &mut *self.body.get() }
    }
}

// ArrayInner is shared across producer and consumer threads. The body is
// written only while exclusive per the access contract above; the attribute
// list has its own mutex; the refcount is atomic.
unsafe impl Send for ArrayInner {}
unsafe impl Sync for ArrayInner {}

// ============================================================================
// Array
// ============================================================================

/// Handle to a pooled, typed, N-dimensional buffer.
///
/// Handles are not `Clone`: additional references are taken explicitly with
/// [`Array::reserve`] and returned with [`Array::release`]. Dropping a
/// handle without an explicit release releases it, so a reference can never
/// leak or be double-counted.
pub struct Array {
    inner: Option<Arc<ArrayInner>>,
}

impl Array {
    pub(crate) fn from_inner(inner: Arc<ArrayInner>) -> Self {
        Self { inner: Some(inner) }
    }

    pub(crate) fn inner_arc(&self) -> &Arc<ArrayInner> {
        self.inner.as_ref().expect("array handle already released")
    }

    pub(crate) fn body(&self) -> &ArrayBody {
        self.inner_arc().body()
    }

    pub(crate) fn body_mut(&mut self) -> &mut ArrayBody {
        // Exclusive by the access contract: mutation goes through the
        // producer's `&mut` handle.
        unsafe { self.inner_arc().body_mut() }
    }

    /// The element type of the payload.
    pub fn data_type(&self) -> DataType {
        self.body().data_type
    }

    /// Number of dimensions.
    pub fn ndims(&self) -> usize {
        self.body().dims.len()
    }

    /// The dimension descriptors.
    pub fn dims(&self) -> &[Dimension] {
        &self.body().dims
    }

    /// Identity stamp set by the producer.
    pub fn unique_id(&self) -> i32 {
        self.body().unique_id
    }

    /// Set the identity stamp.
    pub fn set_unique_id(&mut self, unique_id: i32) {
        self.body_mut().unique_id = unique_id;
    }

    /// Wallclock timestamp in seconds, set by the producer.
    pub fn timestamp(&self) -> f64 {
        self.body().timestamp
    }

    /// Set the timestamp.
    pub fn set_timestamp(&mut self, timestamp: f64) {
        self.body_mut().timestamp = timestamp;
    }

    /// Stamp the current wallclock time in seconds.
    pub fn set_timestamp_now(&mut self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.set_timestamp(now);
    }

    /// Derived size information for the current shape and element type.
    pub fn info(&self) -> ArrayInfo {
        self.body().info()
    }

    /// Size of the backing buffer in bytes. At least
    /// [`info().total_bytes`](ArrayInfo::total_bytes); a recycled buffer
    /// may be larger than the current shape requires.
    pub fn data_size(&self) -> usize {
        self.body().storage.len()
    }

    /// Whether the backing buffer was supplied by the caller rather than
    /// allocated by the pool.
    pub fn is_externally_backed(&self) -> bool {
        self.body().external
    }

    /// The payload as raw bytes (the full backing buffer).
    pub fn data(&self) -> &[u8] {
        self.body().storage.as_bytes()
    }

    /// The payload as mutable raw bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.body_mut().storage.as_bytes_mut()
    }

    /// The payload as a typed slice of `info().n_elements` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `T` is not the array's element
    /// type. There is no implicit conversion; use
    /// [`ArrayPool::convert`](crate::pool::ArrayPool::convert) instead.
    pub fn elements<T: Scalar>(&self) -> Result<&[T]> {
        let body = self.body();
        if T::DATA_TYPE != body.data_type {
            return Err(Error::TypeMismatch {
                requested: T::DATA_TYPE.into(),
                stored: body.data_type.into(),
            });
        }
        let n = body.info().n_elements;
        Ok(body.storage.as_slice_of(n))
    }

    /// The payload as a mutable typed slice of `info().n_elements` elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TypeMismatch`] if `T` is not the array's element
    /// type.
    pub fn elements_mut<T: Scalar>(&mut self) -> Result<&mut [T]> {
        let body = self.body_mut();
        if T::DATA_TYPE != body.data_type {
            return Err(Error::TypeMismatch {
                requested: T::DATA_TYPE.into(),
                stored: body.data_type.into(),
            });
        }
        let n = body.info().n_elements;
        Ok(body.storage.as_mut_slice_of(n))
    }

    /// Lock and return the array's attribute list.
    ///
    /// All attribute operations (add, find, iterate, delete, clear) go
    /// through the returned guard.
    pub fn attributes(&self) -> MutexGuard<'_, AttributeList> {
        self.inner_arc().attributes.lock().unwrap()
    }

    /// Upsert every attribute of this array into `dest` (appending new
    /// ones in order, updating existing ones in place). `dest` is not
    /// cleared first.
    pub fn copy_attributes_to(&self, dest: &Array) {
        if Arc::ptr_eq(self.inner_arc(), dest.inner_arc()) {
            return;
        }
        let snapshot: Vec<_> = self.attributes().iter().cloned().collect();
        let mut dst = dest.attributes();
        for attr in &snapshot {
            dst.add_copy(attr);
        }
    }

    /// Current reference count (diagnostic).
    pub fn ref_count(&self) -> i32 {
        self.inner_arc().ref_count.load(Ordering::Acquire)
    }

    /// Take an additional reference, returning a new handle.
    ///
    /// Consumers that retain an array beyond a callback reserve it before
    /// returning and release the new handle when done.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoOwner`] if the owning pool no longer exists.
    pub fn reserve(&self) -> Result<Array> {
        let inner = self.inner_arc();
        let pool = inner.owner.upgrade().ok_or_else(|| {
            tracing::error!("reserve: array has no owning pool");
            Error::NoOwner
        })?;
        pool.bump_ref(inner);
        Ok(Array::from_inner(inner.clone()))
    }

    /// Give this reference back, consuming the handle. When the last
    /// reference is released the array returns to the pool's free list.
    ///
    /// Dropping a handle has the same effect; the explicit form exists so
    /// call sites can make the handoff protocol visible.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoOwner`] if the owning pool no longer exists (the
    /// array is then freed with this last handle).
    pub fn release(mut self) -> Result<()> {
        let inner = self.inner.take().expect("array handle already released");
        match inner.owner.upgrade() {
            Some(pool) => {
                pool.release_ref(&inner);
                Ok(())
            }
            None => {
                tracing::error!("release: array has no owning pool");
                Err(Error::NoOwner)
            }
        }
    }

    /// Human-readable description of the array. With `details > 5` the
    /// attribute list is included.
    pub fn report(&self, details: i32) -> String {
        let body = self.body();
        let attrs = self.attributes();
        let mut out = String::new();
        let _ = writeln!(out, "Array:");
        let sizes: Vec<usize> = body.dims.iter().map(|d| d.size).collect();
        let _ = writeln!(out, "  ndims={} dims={:?}", body.dims.len(), sizes);
        let _ = writeln!(
            out,
            "  data_type={}, data_size={}",
            body.data_type,
            body.storage.len()
        );
        let _ = writeln!(
            out,
            "  unique_id={}, timestamp={}",
            body.unique_id, body.timestamp
        );
        let _ = writeln!(out, "  number of attributes={}", attrs.len());
        if details > 5 {
            for attr in attrs.iter() {
                let _ = writeln!(out, "  {attr:?}");
            }
        }
        out
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Some(pool) = inner.owner.upgrade() {
                pool.release_ref(&inner);
            }
        }
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let body = self.body();
        let sizes: Vec<usize> = body.dims.iter().map(|d| d.size).collect();
        f.debug_struct("Array")
            .field("data_type", &body.data_type)
            .field("dims", &sizes)
            .field("data_size", &body.storage.len())
            .field("unique_id", &body.unique_id)
            .field("timestamp", &body.timestamp)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
