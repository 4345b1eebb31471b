//! Latency distribution and contended throughput profile for the MPSC queue.
//!
//! Run: cargo build --release --bench profile_mpsc
//! Profile: sudo perf stat -e cycles,instructions,cache-misses ./target/release/deps/profile_mpsc-*

use std::sync::Arc;
use std::thread;

use handoff_harness::{ScopedTimer, StatsAverage, SyncBarrier};
use handoff_queue::mpsc;
use hdrhistogram::Histogram;

const WARMUP: u64 = 100_000;
const SAMPLES: u64 = 1_000_000;
const PRODUCERS: u64 = 2;
// Power of two so the drain ring (2x the total burst) is a valid capacity.
const PUSHES_PER_PRODUCER: u64 = 1 << 18;
const ITERATIONS: usize = 4;

fn main() {
    cycle_latency();
    contended_push_throughput();
}

/// Uncontended push+pop cycle latency distribution.
fn cycle_latency() {
    let (tx, mut rx) = mpsc::channel::<u64>(1024).unwrap();

    let mut hist = Histogram::<u64>::new_with_max(1_000_000, 3).unwrap();

    for i in 0..WARMUP + SAMPLES {
        let start = rdtsc();

        unsafe { tx.push(i) };
        let value = rx.pop().unwrap();

        let elapsed = rdtsc() - start;
        std::hint::black_box(value);

        if i >= WARMUP {
            hist.record(elapsed).unwrap();
        }
    }

    println!(
        "mpsc push+pop cycle (cycles): p50={} p99={} p99.9={} max={}",
        hist.value_at_quantile(0.50),
        hist.value_at_quantile(0.99),
        hist.value_at_quantile(0.999),
        hist.max()
    );
}

/// Two producers pushing flat out into a ring sized for the full burst,
/// drained by the main thread between iterations.
fn contended_push_throughput() {
    let capacity = (PRODUCERS * PUSHES_PER_PRODUCER * 2) as usize;
    let mut stats = StatsAverage::new("mpsc contended push ms", ITERATIONS);

    for _ in 0..ITERATIONS {
        let (tx, mut rx) = mpsc::channel::<u64>(capacity).unwrap();
        let barrier = Arc::new(SyncBarrier::new(PRODUCERS as usize));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|id| {
                let tx = tx.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.arrive(id as usize);
                    for i in 0..PUSHES_PER_PRODUCER {
                        unsafe { tx.push(id << 32 | i) };
                    }
                })
            })
            .collect();

        let timer = ScopedTimer::start();
        barrier.release();
        for producer in producers {
            producer.join().unwrap();
        }
        stats.record(timer.elapsed_ms());

        let mut drained = 0u64;
        while rx.pop().is_some() {
            drained += 1;
        }
        assert_eq!(drained, PRODUCERS * PUSHES_PER_PRODUCER);
    }
}

#[inline]
fn rdtsc() -> u64 {
    #[cfg(target_arch = "x86_64")]
    unsafe {
        let mut aux: u32 = 0;
        core::arch::x86_64::__rdtscp(&mut aux)
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        use std::time::Instant;
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        START.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}
