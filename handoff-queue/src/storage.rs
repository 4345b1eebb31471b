//! Raw aligned ring storage shared by both queue implementations.
//!
//! A `RawRing` is a single zeroed allocation holding `capacity`
//! uninitialized slots. It owns the allocation only: running element
//! destructors is the queue's job, driven by its own occupancy protocol
//! (the MPSC used-flags, the SPSC size counter).

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use crate::NewError;

/// A power-of-two ring of uninitialized slots in one allocation.
///
/// `S` is the slot type; both queues use `#[repr(align(64))]` slots, so the
/// allocation alignment is at least a cache line and the zero-fill leaves
/// every MPSC slot flag clear.
pub(crate) struct RawRing<S> {
    ptr: NonNull<S>,
    capacity: usize,
    mask: usize,
}

impl<S> RawRing<S> {
    /// Allocates a zero-filled ring of `capacity` slots.
    ///
    /// `capacity` must be a power of two and at least 2 (so that masked
    /// indices wrap correctly and empty is distinguishable from full).
    pub(crate) fn allocate(capacity: usize) -> Result<Self, NewError> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(NewError::InvalidCapacity(capacity));
        }

        let layout = Self::layout(capacity).ok_or(NewError::AllocationFailed)?;

        let ptr = if layout.size() == 0 {
            // Zero-sized slots (e.g. a ZST element in a flagless ring):
            // nothing to allocate, mirror what Vec does.
            NonNull::dangling()
        } else {
            let raw = unsafe { alloc::alloc_zeroed(layout) };
            NonNull::new(raw.cast::<S>()).ok_or(NewError::AllocationFailed)?
        };

        Ok(Self {
            ptr,
            capacity,
            mask: capacity - 1,
        })
    }

    fn layout(capacity: usize) -> Option<Layout> {
        Layout::array::<S>(capacity).ok().map(|l| l.pad_to_align())
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn mask(&self) -> usize {
        self.mask
    }

    /// Base pointer to the slot array, for hot-field caching in handles.
    #[inline]
    pub(crate) fn base_ptr(&self) -> *mut S {
        self.ptr.as_ptr()
    }

    /// Pointer to the slot at `index & mask`.
    #[inline]
    pub(crate) fn slot(&self, index: usize) -> *mut S {
        unsafe { self.ptr.as_ptr().add(index & self.mask) }
    }
}

impl<S> Drop for RawRing<S> {
    fn drop(&mut self) {
        let layout = Self::layout(self.capacity).expect("layout was valid at allocation");
        if layout.size() != 0 {
            unsafe {
                alloc::dealloc(self.ptr.as_ptr().cast::<u8>(), layout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(64))]
    struct Padded(#[allow(dead_code)] u64);

    #[test]
    fn rejects_invalid_capacities() {
        for capacity in [0, 1, 3, 5, 100, 1000] {
            assert_eq!(
                RawRing::<Padded>::allocate(capacity).err(),
                Some(NewError::InvalidCapacity(capacity)),
                "capacity {capacity} should be rejected"
            );
        }
    }

    #[test]
    fn accepts_power_of_two_capacities() {
        for capacity in [2, 16, 1024] {
            let ring = RawRing::<Padded>::allocate(capacity).unwrap();
            assert_eq!(ring.capacity(), capacity);
            assert_eq!(ring.mask(), capacity - 1);
        }
    }

    #[test]
    fn slots_are_cache_line_aligned() {
        let ring = RawRing::<Padded>::allocate(16).unwrap();
        for i in 0..16 {
            assert_eq!(ring.slot(i) as usize % 64, 0);
        }
    }

    #[test]
    fn index_wraps_through_mask() {
        let ring = RawRing::<Padded>::allocate(8).unwrap();
        assert_eq!(ring.slot(0), ring.slot(8));
        assert_eq!(ring.slot(3), ring.slot(11));
    }

    #[test]
    fn allocation_is_zeroed() {
        let ring = RawRing::<[u8; 64]>::allocate(4).unwrap();
        for i in 0..4 {
            let bytes = unsafe { &*ring.slot(i) };
            assert!(bytes.iter().all(|&b| b == 0));
        }
    }
}
