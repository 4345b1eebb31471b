//! The backing ring for the MPSC queue.
//!
//! Producers claim slots by incrementing the tail; each slot's `used` flag
//! carries the producer-to-consumer happens-before edge.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::NewError;
use crate::storage::RawRing;

/// A slot in the ring.
///
/// `used == 0` means the slot holds no live value; `used == 1` means a
/// producer has published a value the consumer has not taken yet. The value
/// field is cache-line aligned so adjacent slots never share a line.
#[repr(C, align(64))]
pub(crate) struct Slot<T> {
    pub(crate) value: UnsafeCell<MaybeUninit<T>>,
    pub(crate) used: AtomicUsize,
}

/// The backing storage for an MPSC queue.
///
/// Memory layout:
/// ```text
/// ┌───────────────────────────────────────────────────────┐
/// │ head (cache-line padded) - consumer read position     │
/// ├───────────────────────────────────────────────────────┤
/// │ tail (cache-line padded) - producer claim position    │
/// ├───────────────────────────────────────────────────────┤
/// │ Slot[0]: { value, used }                              │
/// │ Slot[1]: { value, used }                              │
/// │ ...                                                   │
/// └───────────────────────────────────────────────────────┘
/// ```
///
/// Head and tail are monotonically increasing counters, reduced modulo the
/// capacity by masking at use. Wraparound of the raw counter is harmless:
/// the counter width is a multiple of the power-of-two capacity.
#[repr(C)]
pub(crate) struct RingBuffer<T> {
    /// Consumer's read position. Producers never touch this.
    head: CachePadded<AtomicUsize>,
    /// Producer claim position (producers fetch-add on this).
    tail: CachePadded<AtomicUsize>,

    ring: RawRing<Slot<T>>,

    ref_count: AtomicUsize,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Allocates a ring with initial ref_count 2 (one sender + one receiver).
    ///
    /// The zero-filled allocation leaves every slot's `used` flag clear.
    pub(crate) fn allocate(capacity: usize) -> Result<NonNull<Self>, NewError> {
        let ring = RawRing::allocate(capacity)?;

        let rb = Box::new(Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            ring,
            ref_count: AtomicUsize::new(2),
        });

        Ok(unsafe { NonNull::new_unchecked(Box::into_raw(rb)) })
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.ring.mask()
    }

    #[inline]
    pub(crate) fn buffer_ptr(&self) -> *mut Slot<T> {
        self.ring.base_ptr()
    }

    #[inline]
    pub(crate) fn head_ptr(&self) -> *const AtomicUsize {
        &*self.head
    }

    #[inline]
    pub(crate) fn tail_ptr(&self) -> *const AtomicUsize {
        &*self.tail
    }

    // === Lifecycle ===

    pub(crate) fn acquire(this: NonNull<Self>) {
        unsafe {
            this.as_ref().ref_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Drops one reference; the last release destroys live elements and
    /// frees the ring.
    ///
    /// # Safety
    ///
    /// `this` must come from [`allocate`](Self::allocate) and each reference
    /// may be released exactly once.
    pub(crate) unsafe fn release(this: NonNull<Self>) {
        let inner = unsafe { this.as_ref() };

        if inner.ref_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            unsafe {
                Self::drop_live_elements(this);
                drop(Box::from_raw(this.as_ptr()));
            }
        }
    }

    /// A set `used` flag is the single source of truth for a live value, so
    /// teardown scans flags rather than the head..tail range.
    unsafe fn drop_live_elements(this: NonNull<Self>) {
        let inner = unsafe { this.as_ref() };

        for i in 0..inner.capacity() {
            let slot = inner.ring.slot(i);
            unsafe {
                if (*slot).used.load(Ordering::Relaxed) != 0 {
                    ptr::drop_in_place((*slot).value.get().cast::<T>());
                }
            }
        }
    }
}
