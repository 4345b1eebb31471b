//! Thread rendezvous and timing primitives for exercising `handoff-queue`.
//!
//! These are measurement and coordination scaffolding for tests and
//! benchmarks: a one-shot barrier to line worker threads up before a
//! contended section, a scoped timer, and a windowed average for
//! throughput loops. Nothing here is wait-free or meant for production
//! hot paths — the barrier spins.
//!
//! # Example
//!
//! ```
//! use handoff_harness::SyncBarrier;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let barrier = Arc::new(SyncBarrier::new(2));
//!
//! let workers: Vec<_> = (0..2)
//!     .map(|id| {
//!         let barrier = Arc::clone(&barrier);
//!         thread::spawn(move || {
//!             barrier.arrive(id);
//!             // ... contended section runs here on both threads at once
//!         })
//!     })
//!     .collect();
//!
//! barrier.release();
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_utils::{Backoff, CachePadded};

/// A one-shot rendezvous barrier for lining up worker threads.
///
/// Each worker calls [`arrive`](Self::arrive) with its id and spins until a
/// coordinator calls [`release`](Self::release), which itself waits for
/// every worker to have arrived. Arrival flags are cache-line padded so the
/// spinning workers do not interfere with each other.
#[derive(Debug)]
pub struct SyncBarrier {
    arrived: Box<[CachePadded<AtomicBool>]>,
    start: AtomicBool,
}

impl SyncBarrier {
    /// Creates a barrier for `threads` workers.
    ///
    /// # Panics
    ///
    /// Panics if `threads` is zero.
    pub fn new(threads: usize) -> Self {
        assert!(threads > 0, "barrier needs at least one worker");

        let arrived = (0..threads)
            .map(|_| CachePadded::new(AtomicBool::new(false)))
            .collect();

        Self {
            arrived,
            start: AtomicBool::new(false),
        }
    }

    /// Signals that worker `thread_id` is ready and waits for the release.
    ///
    /// # Panics
    ///
    /// Panics if `thread_id` is out of range.
    pub fn arrive(&self, thread_id: usize) {
        self.arrived[thread_id].store(true, Ordering::Release);

        let backoff = Backoff::new();
        while !self.start.load(Ordering::Acquire) {
            backoff.snooze();
        }
    }

    /// Waits for every worker to arrive, then releases them all at once.
    pub fn release(&self) {
        for flag in &self.arrived {
            let backoff = Backoff::new();
            while !flag.load(Ordering::Acquire) {
                backoff.snooze();
            }
        }

        self.start.store(true, Ordering::Release);
    }
}

/// A scoped wall-clock timer for micro-measurements.
///
/// # Example
///
/// ```
/// use handoff_harness::ScopedTimer;
///
/// let timer = ScopedTimer::start();
/// // ... timed section
/// let elapsed = timer.elapsed_ms();
/// assert!(elapsed >= 0.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ScopedTimer {
    start: Instant,
}

impl ScopedTimer {
    /// Starts the timer.
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since [`start`](Self::start).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1e3
    }
}

/// A fixed-window running average, reported when dropped.
///
/// Records the last `window` samples and prints their mean on drop; used by
/// throughput loops that time each iteration with a [`ScopedTimer`].
pub struct StatsAverage {
    name: String,
    window: usize,
    values: Vec<f64>,
    index: usize,
}

impl StatsAverage {
    /// Creates an averager named `name` keeping the last `window` samples.
    ///
    /// # Panics
    ///
    /// Panics if `window` is zero.
    pub fn new(name: impl Into<String>, window: usize) -> Self {
        assert!(window > 0, "window must be non-zero");

        Self {
            name: name.into(),
            window,
            values: Vec::with_capacity(window),
            index: 0,
        }
    }

    /// Records one sample, evicting the oldest once the window is full.
    pub fn record(&mut self, value: f64) {
        if self.values.len() < self.window {
            self.values.push(value);
        } else {
            self.values[self.index] = value;
        }
        self.index = (self.index + 1) % self.window;
    }

    /// Mean of the recorded samples, or `None` before the first record.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        Some(self.values.iter().sum::<f64>() / self.values.len() as f64)
    }
}

impl Drop for StatsAverage {
    fn drop(&mut self) {
        if let Some(mean) = self.mean() {
            println!("{}: {:.3}", self.name, mean);
        }
    }
}

impl fmt::Debug for StatsAverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsAverage")
            .field("name", &self.name)
            .field("window", &self.window)
            .field("samples", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn barrier_releases_all_workers() {
        let barrier = Arc::new(SyncBarrier::new(4));
        let passed = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|id| {
                let barrier = Arc::clone(&barrier);
                let passed = Arc::clone(&passed);
                thread::spawn(move || {
                    barrier.arrive(id);
                    passed.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        barrier.release();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(passed.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn release_waits_for_arrivals() {
        let barrier = Arc::new(SyncBarrier::new(1));

        let worker = {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.arrive(0))
        };

        // Returns only after the worker has arrived.
        barrier.release();
        worker.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn zero_workers_panics() {
        let _ = SyncBarrier::new(0);
    }

    #[test]
    fn timer_elapsed_is_monotonic() {
        let timer = ScopedTimer::start();
        let first = timer.elapsed_ms();
        let second = timer.elapsed_ms();

        assert!(first >= 0.0);
        assert!(second >= first);
    }

    #[test]
    fn stats_average_windows() {
        let mut stats = StatsAverage::new("test", 2);
        assert_eq!(stats.mean(), None);

        stats.record(1.0);
        assert_eq!(stats.mean(), Some(1.0));

        stats.record(3.0);
        assert_eq!(stats.mean(), Some(2.0));

        // Third sample evicts the first.
        stats.record(5.0);
        assert_eq!(stats.mean(), Some(4.0));
    }
}
