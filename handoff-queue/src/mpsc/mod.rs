//! Multi-producer single-consumer (MPSC) wait-free bounded queue.
//!
//! Any number of producers push concurrently; a single consumer pops. A
//! producer claims its slot with one relaxed `fetch_add` on the tail — no
//! CAS loop, no retry — so every push finishes in a bounded number of steps
//! no matter how contended the queue is or whether another producer has
//! stalled mid-publish.
//!
//! # Example
//!
//! ```
//! use handoff_queue::mpsc;
//! use std::thread;
//!
//! let (tx, mut rx) = mpsc::channel::<u64>(1024).unwrap();
//!
//! // Clone the sender for a second producer.
//! let tx2 = tx.clone();
//!
//! let h1 = thread::spawn(move || {
//!     for i in 0..100 {
//!         // 200 pushes into 1024 slots: the queue cannot fill.
//!         unsafe { tx.push(i) };
//!     }
//! });
//!
//! let h2 = thread::spawn(move || {
//!     for i in 100..200 {
//!         unsafe { tx2.push(i) };
//!     }
//! });
//!
//! let mut received = Vec::new();
//! while received.len() < 200 {
//!     if let Some(val) = rx.pop() {
//!         received.push(val);
//!     }
//! }
//!
//! h1.join().unwrap();
//! h2.join().unwrap();
//!
//! assert_eq!(received.len(), 200);
//! assert!(rx.is_empty());
//! ```
//!
//! # Ordering
//!
//! Values pushed by one producer thread are popped in that producer's push
//! order. Across producers there is no total order: two racing producers may
//! publish their slots in the opposite order to their tail reservations, and
//! the consumer simply sees the later slot as empty until its flag is set.
//!
//! # Full-queue contract
//!
//! [`Sender::push`] is `unsafe`: there is deliberately no full-queue check
//! on the hot path, so the caller must size the queue such that it can never
//! fill. Debug builds catch an over-capacity push with an assertion on the
//! slot flag.

mod ring;

use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::NewError;
use ring::{RingBuffer, Slot};

/// Creates a new wait-free MPSC queue with the given capacity.
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
/// use handoff_queue::{NewError, mpsc};
///
/// let (tx, _rx) = mpsc::channel::<String>(128)?;
/// assert_eq!(tx.capacity(), 128);
///
/// assert!(mpsc::channel::<String>(100).is_err());
/// # Ok::<(), NewError>(())
/// ```
pub fn channel<T>(capacity: usize) -> Result<(Sender<T>, Receiver<T>), NewError> {
    let inner = RingBuffer::<T>::allocate(capacity)?;

    let inner_ref = unsafe { inner.as_ref() };

    Ok((
        Sender {
            inner,
            // Cache hot fields to avoid indirection on every push
            buffer: inner_ref.buffer_ptr(),
            mask: inner_ref.mask(),
            tail: inner_ref.tail_ptr(),
        },
        Receiver {
            inner,
            buffer: inner_ref.buffer_ptr(),
            mask: inner_ref.mask(),
            head: inner_ref.head_ptr(),
        },
    ))
}

/// The producing side of the MPSC queue.
///
/// Clone it freely: every clone is another producer on the same ring, and a
/// `&Sender` can be shared across threads.
pub struct Sender<T> {
    inner: NonNull<RingBuffer<T>>,

    // Cached hot fields - avoid indirection on the push path
    buffer: *mut Slot<T>,
    mask: usize,
    tail: *const AtomicUsize,
}

// Safety: producers synchronize through the tail counter and the per-slot
// flags; any number of threads may push through shared references.
unsafe impl<T: Send> Send for Sender<T> {}
unsafe impl<T: Send> Sync for Sender<T> {}

impl<T> Sender<T> {
    /// Pushes a value into the queue.
    ///
    /// Wait-free: one relaxed `fetch_add` claims the slot, the value is
    /// written, and a release store of the slot flag publishes it to the
    /// consumer.
    ///
    /// # Safety
    ///
    /// The queue must not be full. The caller sizes the queue so that the
    /// number of values pushed and not yet popped can never reach
    /// [`capacity`](Self::capacity); an over-capacity push writes into a
    /// slot that may still hold a live value the consumer is reading. Debug
    /// builds catch the violation with an assertion on the slot flag.
    #[inline]
    pub unsafe fn push(&self, value: T) {
        let tail = unsafe { &*self.tail };
        let claimed = tail.fetch_add(1, Ordering::Relaxed);
        let slot = unsafe { &*self.buffer.add(claimed & self.mask) };

        unsafe {
            slot.value.get().cast::<T>().write(value);
        }

        debug_assert_eq!(
            slot.used.load(Ordering::Acquire),
            0,
            "push into a full queue, or a producer-consumer collision"
        );
        slot.used.store(1, Ordering::Release);
    }

    /// Constructs a value directly in the claimed slot's storage.
    ///
    /// The in-place counterpart of [`push`](Self::push) for values that are
    /// expensive to move through the stack.
    ///
    /// # Safety
    ///
    /// Same contract as [`push`](Self::push): the queue must not be full.
    #[inline]
    pub unsafe fn push_with(&self, init: impl FnOnce() -> T) {
        let tail = unsafe { &*self.tail };
        let claimed = tail.fetch_add(1, Ordering::Relaxed);
        let slot = unsafe { &*self.buffer.add(claimed & self.mask) };

        unsafe {
            slot.value.get().cast::<T>().write(init());
        }

        debug_assert_eq!(
            slot.used.load(Ordering::Acquire),
            0,
            "push into a full queue, or a producer-consumer collision"
        );
        slot.used.store(1, Ordering::Release);
    }

    /// Returns the capacity of the queue.
    #[inline]
    pub fn capacity(&self) -> usize {
        unsafe { self.inner.as_ref().capacity() }
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        RingBuffer::acquire(self.inner);

        Self {
            inner: self.inner,
            buffer: self.buffer,
            mask: self.mask,
            tail: self.tail,
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        unsafe {
            RingBuffer::release(self.inner);
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

/// The consuming side of the MPSC queue.
///
/// There is exactly one consumer: the `Receiver` cannot be cloned or shared,
/// and both [`pop`](Self::pop) and [`is_empty`](Self::is_empty) take
/// `&mut self`.
pub struct Receiver<T> {
    inner: NonNull<RingBuffer<T>>,

    buffer: *mut Slot<T>,
    mask: usize,
    head: *const AtomicUsize,
}

// Safety: the receiver may move to another thread but never be shared
// (not Sync) - consumer-side calls must come from one thread at a time.
unsafe impl<T: Send> Send for Receiver<T> {}

impl<T> Receiver<T> {
    /// Pops the value at the head of the queue, if one is published.
    ///
    /// The head is advanced with a relaxed `fetch_add`; if the claimed slot
    /// turns out to be empty — including the case where a producer has
    /// reserved it but not yet published — the reservation is rolled back
    /// with a `fetch_sub` and `None` is returned, so the same logical
    /// position is retried on the next call.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        let head = unsafe { &*self.head };
        let claimed = head.fetch_add(1, Ordering::Relaxed);
        let slot = unsafe { &*self.buffer.add(claimed & self.mask) };

        if slot.used.load(Ordering::Acquire) == 0 {
            head.fetch_sub(1, Ordering::Relaxed);
            return None;
        }

        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.used.store(0, Ordering::Relaxed);
        Some(value)
    }

    /// Returns whether [`pop`](Self::pop) would currently fail.
    ///
    /// Counts as a consumer-side operation (hence `&mut self`): it reads the
    /// head position and must not race a concurrent `pop`.
    #[inline]
    pub fn is_empty(&mut self) -> bool {
        let head = unsafe { &*self.head }.load(Ordering::Relaxed);
        let slot = unsafe { &*self.buffer.add(head & self.mask) };
        slot.used.load(Ordering::Acquire) == 0
    }

    /// Returns the capacity of the queue.
    #[inline]
    pub fn capacity(&self) -> usize {
        unsafe { self.inner.as_ref().capacity() }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        unsafe {
            RingBuffer::release(self.inner);
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}
