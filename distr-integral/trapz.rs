//! Trapezoidal-rule numerical integration, parallelised across threads within one
//! worker's sandboxed task execution.
//!
//! Grounded in `examples/original_source/src/integral.c`'s `integrate_trapz`: split
//! `[a, b]` into `n` sub-intervals, partition the index range `0..n` across `threads`
//! worker threads as evenly as possible, sum `0.5 * (f(x1) + f(x2)) * h` per
//! sub-interval. `f(x) = 4 / (1 + x^2)`, so integrating over `[0, 1]` approximates π.
//!
//! This is intra-task parallelism, available to applications internally, layered
//! *inside* the already process-isolated sandbox the worker's
//! outer timeout enforces — if these threads don't finish in time, the sandbox's
//! parent process simply kills the whole child, so the cancellation token here is a
//! cooperative optimisation (stop wasting CPU) rather than the safety mechanism.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// How many sub-intervals a worker thread processes before checking for
/// cancellation. Checking every iteration (as the C original does via `gettimeofday`)
/// is needlessly expensive for a flag read; this amortises it.
const CHECK_GRANULARITY: u64 = 4096;

fn f(x: f64) -> f64 {
    4.0 / (1.0 + x * x)
}

/// Shared flag a long-running computation polls to decide whether to bail out early.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Integrate `f` over `[a, b]` using `n` trapezoids, split across `threads` worker
/// threads. Returns `(value, was_cancelled)`; on cancellation the partial sum
/// accumulated so far is still returned (matching the C original, which returns
/// whatever partial work each thread completed before observing the timeout flag).
pub fn integrate_trapz(a: f64, b: f64, n: u64, threads: u32, cancel: &CancellationToken) -> (f64, bool) {
    if n == 0 || b <= a {
        return (0.0, false);
    }
    let threads = (threads.max(1) as u64).min(n) as u32;
    let h = (b - a) / n as f64;

    let base = n / threads as u64;
    let rem = n % threads as u64;

    let handles: Vec<_> = (0..threads)
        .scan(0u64, |cursor, t| {
            let span = base + if (t as u64) < rem { 1 } else { 0 };
            let begin = *cursor;
            let end = begin + span;
            *cursor = end;
            Some((begin, end))
        })
        .map(|(begin, end)| {
            let cancel = cancel.clone();
            thread::spawn(move || {
                let mut sum = 0.0;
                let mut i = begin;
                while i < end {
                    let batch_end = end.min(i + CHECK_GRANULARITY);
                    while i < batch_end {
                        let x1 = a + i as f64 * h;
                        let x2 = x1 + h;
                        sum += 0.5 * (f(x1) + f(x2)) * h;
                        i += 1;
                    }
                    if cancel.is_cancelled() {
                        return sum;
                    }
                }
                sum
            })
        })
        .collect();

    let mut total = 0.0;
    for handle in handles {
        total += handle.join().expect("integration worker thread panicked");
    }
    (total, cancel.is_cancelled())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrates_to_pi() {
        let cancel = CancellationToken::new();
        let (value, cancelled) = integrate_trapz(0.0, 1.0, 1_000_000, 4, &cancel);
        assert!(!cancelled);
        assert!((value - std::f64::consts::PI).abs() < 1e-6);
    }

    #[test]
    fn single_thread_matches_multi_thread() {
        let cancel = CancellationToken::new();
        let (single, _) = integrate_trapz(0.0, 1.0, 100_000, 1, &cancel);
        let (multi, _) = integrate_trapz(0.0, 1.0, 100_000, 8, &cancel);
        assert!((single - multi).abs() < 1e-9);
    }

    #[test]
    fn empty_interval_is_zero() {
        let cancel = CancellationToken::new();
        let (value, cancelled) = integrate_trapz(1.0, 1.0, 100, 2, &cancel);
        assert_eq!(value, 0.0);
        assert!(!cancelled);
    }

    #[test]
    fn cancellation_before_start_still_returns_a_value() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (_value, cancelled) = integrate_trapz(0.0, 1.0, 1_000_000, 4, &cancel);
        assert!(cancelled);
    }
}
