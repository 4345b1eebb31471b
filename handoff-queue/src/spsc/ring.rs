//! The backing ring for the SPSC queue.
//!
//! There is no per-slot state: the atomic size counter is the only
//! publication edge between the producer and the consumer.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::NewError;
use crate::storage::RawRing;

/// A slot holding one value.
///
/// Cache-line aligned so adjacent slots never share a line between the
/// producer writing one and the consumer reading its neighbour.
#[repr(align(64))]
pub(crate) struct Slot<T> {
    pub(crate) value: UnsafeCell<MaybeUninit<T>>,
}

/// The backing storage for an SPSC queue.
///
/// The live head and tail indices are plain fields owned by the consumer
/// and producer handles; only the size counter is shared in steady state.
/// The `head` mirror here is written once, when the consumer drops, so the
/// last handle can locate the live range `head .. head+size` at teardown.
#[repr(C)]
pub(crate) struct RingBuffer<T> {
    /// Occupied-slot count; RMW'd by both sides, sole source of truth for
    /// emptiness.
    size: CachePadded<AtomicUsize>,
    /// Consumer's resting read position, recorded at consumer drop.
    head: CachePadded<AtomicUsize>,

    ring: RawRing<Slot<T>>,

    ref_count: AtomicUsize,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Allocates a ring with initial ref_count 2 (producer + consumer).
    pub(crate) fn allocate(capacity: usize) -> Result<NonNull<Self>, NewError> {
        let ring = RawRing::allocate(capacity)?;

        let rb = Box::new(Self {
            size: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
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
    pub(crate) fn size_ptr(&self) -> *const AtomicUsize {
        &*self.size
    }

    #[cfg(test)]
    pub(crate) fn head_ptr(&self) -> *const AtomicUsize {
        &*self.head
    }

    /// Records the consumer's final read position for teardown.
    #[inline]
    pub(crate) fn store_head(&self, head: usize) {
        self.head.store(head, Ordering::Relaxed);
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

    /// Live values occupy `head, head+1, .., head+size-1` (masked). The
    /// consumer recorded its head before releasing its reference, and the
    /// ref-count release ordering makes that store visible here.
    unsafe fn drop_live_elements(this: NonNull<Self>) {
        let inner = unsafe { this.as_ref() };
        let head = inner.head.load(Ordering::Relaxed);
        let size = inner.size.load(Ordering::Relaxed);

        for i in 0..size {
            let slot = inner.ring.slot(head.wrapping_add(i));
            unsafe {
                ptr::drop_in_place((*slot).value.get().cast::<T>());
            }
        }
    }
}
