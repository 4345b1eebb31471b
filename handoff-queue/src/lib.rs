//! Wait-free bounded queues for hot-path handoff between threads.
//!
//! `handoff-queue` provides two single-allocation ring queues for
//! latency-critical pipelines (network packet delivery between I/O workers
//! and a processing thread, market data fan-in, and similar):
//!
//! - [`mpsc`] — any number of producers, exactly one consumer. Producers
//!   claim slots with a single `fetch_add` and publish through a per-slot
//!   flag, so a stalled producer never blocks the others.
//! - [`spsc`] — exactly one producer and one consumer, plus an O(1)
//!   [`len`](spsc::Consumer::len) query backed by an atomic size counter.
//!
//! Every operation is *wait-free*: it completes in a bounded number of its
//! own steps regardless of what other threads are doing. Nothing spins,
//! yields, sleeps, or blocks, and no memory is allocated after construction.
//!
//! # Quick Start
//!
//! ```
//! use handoff_queue::mpsc;
//!
//! let (tx, mut rx) = mpsc::channel::<u64>(1024)?;
//!
//! // Two pushes into a 1024-slot queue: it cannot fill (see `Sender::push`).
//! unsafe {
//!     tx.push(1);
//!     tx.push(2);
//! }
//!
//! assert_eq!(rx.pop(), Some(1));
//! assert_eq!(rx.pop(), Some(2));
//! assert_eq!(rx.pop(), None);
//! # Ok::<(), handoff_queue::NewError>(())
//! ```
//!
//! # Sizing
//!
//! Capacity must be a power of two (at least 2) and is never rounded or
//! resized. The queues trade the full-queue check away for hot-path speed:
//! pushing into a full queue is a contract violation, caught by a debug
//! assertion and undefined in release builds. Size the queue so the number
//! of values in flight can never reach capacity.
//!
//! # Memory Layout
//!
//! Each queue is one zeroed, cache-line-aligned allocation of `capacity`
//! slots. The head and tail counters (and the SPSC size counter) live on
//! their own cache lines, and every slot's value field is 64-byte aligned,
//! so producers and the consumer never write the same line in steady state.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, missing_debug_implementations)]

use core::fmt;

pub mod mpsc;
pub mod spsc;

mod storage;

/// Error returned when a queue cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewError {
    /// The requested capacity is not a power of two, or is below 2.
    InvalidCapacity(usize),
    /// The global allocator could not provide the ring storage.
    AllocationFailed,
}

impl fmt::Display for NewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCapacity(capacity) => {
                write!(f, "capacity must be a power of two and at least 2, got {capacity}")
            }
            Self::AllocationFailed => write!(f, "ring storage allocation failed"),
        }
    }
}

impl std::error::Error for NewError {}
