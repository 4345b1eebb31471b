//! Single-producer single-consumer (SPSC) wait-free bounded queue.
//!
//! Strict FIFO between exactly one producer and one consumer, with an O(1)
//! occupancy query. The producer owns the tail and the consumer owns the
//! head as plain (non-atomic) indices; the shared atomic size counter is
//! the only synchronization between the two sides, so the hot path is one
//! slot access plus one acq-rel read-modify-write.
//!
//! # Example
//!
//! ```
//! use handoff_queue::spsc;
//!
//! let (mut tx, mut rx) = spsc::ring_buffer::<u64>(1024).unwrap();
//!
//! // Two pushes into 1024 slots: the queue cannot fill.
//! unsafe {
//!     tx.push(1);
//!     tx.push(2);
//! }
//! assert_eq!(rx.len(), 2);
//!
//! assert_eq!(rx.pop(), Some(1));
//! assert_eq!(rx.pop(), Some(2));
//! assert_eq!(rx.len(), 0);
//! ```
//!
//! # Size query
//!
//! [`len`](Consumer::len) is an acquire load of the size counter and is safe
//! from either handle while the other side runs. It is conservative from the
//! consumer's perspective: a push between its slot write and its size
//! increment is reported on the next query.
//!
//! # Full-queue contract
//!
//! As with the MPSC queue, [`Producer::push`] is `unsafe` and must never be
//! called on a full queue; debug builds assert the pre-increment size
//! against the capacity.

mod ring;

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::NewError;
use ring::{RingBuffer, Slot};

/// Creates a new wait-free SPSC ring buffer with the given capacity.
///
/// `capacity` must be a power of two and at least 2; it is not rounded.
///
/// # Errors
///
/// Returns [`NewError::InvalidCapacity`] for a capacity that is not a
/// power of two, and [`NewError::AllocationFailed`] if the ring storage
/// cannot be allocated.
///
/// # Example
///
/// ```
/// use handoff_queue::{NewError, spsc};
///
/// let (tx, rx) = spsc::ring_buffer::<u64>(16)?;
/// assert_eq!(tx.capacity(), 16);
/// assert_eq!(rx.len(), 0);
/// # Ok::<(), NewError>(())
/// ```
pub fn ring_buffer<T>(capacity: usize) -> Result<(Producer<T>, Consumer<T>), NewError> {
    let inner = RingBuffer::<T>::allocate(capacity)?;

    let inner_ref = unsafe { inner.as_ref() };

    Ok((
        Producer {
            inner,
            buffer: inner_ref.buffer_ptr(),
            mask: inner_ref.mask(),
            size: inner_ref.size_ptr(),
            tail: 0,
        },
        Consumer {
            inner,
            buffer: inner_ref.buffer_ptr(),
            mask: inner_ref.mask(),
            size: inner_ref.size_ptr(),
            head: 0,
        },
    ))
}

/// The producing half of an SPSC ring buffer.
///
/// Owned by exactly one thread at a time (`Send` but not `Sync`); the tail
/// index lives in this handle and is never shared.
pub struct Producer<T> {
    inner: NonNull<RingBuffer<T>>,

    // Cached hot fields - avoid indirection on the push path
    buffer: *mut Slot<T>,
    mask: usize,
    size: *const AtomicUsize,

    /// Our write position (authoritative, plain).
    tail: usize,
}

// Safety: the producer may move to another thread but never be shared.
unsafe impl<T: Send> Send for Producer<T> {}

impl<T> Producer<T> {
    /// Pushes a value into the ring buffer.
    ///
    /// The value is written into the tail slot and published by the acq-rel
    /// increment of the size counter.
    ///
    /// # Safety
    ///
    /// The queue must not be full: the caller sizes the queue so that
    /// [`len`](Self::len) can never reach [`capacity`](Self::capacity) at a
    /// push. Debug builds assert the pre-increment size.
    #[inline]
    pub unsafe fn push(&mut self, value: T) {
        let slot = unsafe { &*self.buffer.add(self.tail & self.mask) };
        unsafe {
            slot.value.get().cast::<T>().write(value);
        }
        self.tail = self.tail.wrapping_add(1);

        let occupied = unsafe { &*self.size }.fetch_add(1, Ordering::AcqRel);
        debug_assert!(occupied <= self.mask, "push into a full queue");
    }

    /// Constructs a value directly in the tail slot's storage.
    ///
    /// # Safety
    ///
    /// Same contract as [`push`](Self::push): the queue must not be full.
    #[inline]
    pub unsafe fn push_with(&mut self, init: impl FnOnce() -> T) {
        let slot = unsafe { &*self.buffer.add(self.tail & self.mask) };
        unsafe {
            slot.value.get().cast::<T>().write(init());
        }
        self.tail = self.tail.wrapping_add(1);

        let occupied = unsafe { &*self.size }.fetch_add(1, Ordering::AcqRel);
        debug_assert!(occupied <= self.mask, "push into a full queue");
    }

    /// Returns the number of values currently in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        unsafe { &*self.size }.load(Ordering::Acquire)
    }

    /// Returns `true` if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the capacity of the ring buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Drop for Producer<T> {
    fn drop(&mut self) {
        unsafe {
            RingBuffer::release(self.inner);
        }
    }
}

impl<T> fmt::Debug for Producer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// The consuming half of an SPSC ring buffer.
///
/// Owned by exactly one thread at a time (`Send` but not `Sync`); the head
/// index lives in this handle and is never shared in steady state.
pub struct Consumer<T> {
    inner: NonNull<RingBuffer<T>>,

    buffer: *mut Slot<T>,
    mask: usize,
    size: *const AtomicUsize,

    /// Our read position (authoritative, plain).
    head: usize,
}

// Safety: the consumer may move to another thread but never be shared.
unsafe impl<T: Send> Send for Consumer<T> {}

impl<T> Consumer<T> {
    /// Pops the value at the head of the buffer, or `None` if it is empty.
    ///
    /// The acquire load of the size counter synchronizes with the
    /// producer's publishing increment, making the slot contents visible
    /// before they are read.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let size = unsafe { &*self.size };
        if size.load(Ordering::Acquire) == 0 {
            return None;
        }

        let slot = unsafe { &*self.buffer.add(self.head & self.mask) };
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        self.head = self.head.wrapping_add(1);

        size.fetch_sub(1, Ordering::AcqRel);
        Some(value)
    }

    /// Returns the number of values currently in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        unsafe { &*self.size }.load(Ordering::Acquire)
    }

    /// Returns `true` if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the capacity of the ring buffer.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }
}

impl<T> Drop for Consumer<T> {
    fn drop(&mut self) {
        unsafe {
            // Record our resting position so the last handle can find the
            // live range at teardown.
            self.inner.as_ref().store_head(self.head);
            RingBuffer::release(self.inner);
        }
    }
}

impl<T> fmt::Debug for Consumer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
