//! Thread manager: the start/stop barrier and the shared run accumulator.
//!
//! Every worker thread of a round calls [`ThreadManager::start_stop_barrier`]
//! exactly twice: once entering the measured region and once leaving it.
//! The last thread to arrive runs the phase-end hook (starting or
//! stopping the perf probe) before anyone is released, so the region is
//! bracketed by a single start and a single stop even when threads
//! finish at staggered times.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

use crate::counters::Counters;

/// Results of one round, summed over all worker threads.
#[derive(Debug, Default, Clone)]
pub struct RunAccumulator {
    pub iterations: u64,
    pub real_time_used: f64,
    /// Wall time of the slowest thread.
    pub max_real_time: f64,
    pub cpu_time_used: f64,
    pub manual_time_used: f64,
    pub bytes_processed: u64,
    pub items_processed: u64,
    pub complexity_n: i64,
    pub counters: Counters,
    pub report_label: String,
    pub has_error: bool,
    pub error_message: String,
}

struct BarrierState {
    entered: usize,
    phase: usize,
}

/// Coordinates the N worker threads of one measured round.
pub struct ThreadManager {
    num_threads: usize,
    barrier: Mutex<BarrierState>,
    barrier_cv: Condvar,

    alive: Mutex<usize>,
    alive_cv: Condvar,

    /// Set by `SkipWithError`; read on the iteration fast path.
    error_flag: AtomicBool,

    /// The benchmark mutex: per-thread contributions land here.
    pub results: Mutex<RunAccumulator>,
}

impl ThreadManager {
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0);
        Self {
            num_threads,
            barrier: Mutex::new(BarrierState {
                entered: 0,
                phase: 0,
            }),
            barrier_cv: Condvar::new(),
            alive: Mutex::new(num_threads),
            alive_cv: Condvar::new(),
            error_flag: AtomicBool::new(false),
            results: Mutex::new(RunAccumulator::default()),
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Rendezvous of all N threads. The last arrival runs `hook` before
    /// the others are released and is the only caller that gets `true`.
    pub fn start_stop_barrier<F: FnOnce()>(&self, hook: F) -> bool {
        let mut state = self.barrier.lock().unwrap();
        let phase = state.phase;
        state.entered += 1;
        if state.entered == self.num_threads {
            state.entered = 0;
            // Hook runs under the barrier lock: nothing passes the
            // barrier until it completes.
            hook();
            state.phase = state.phase.wrapping_add(1);
            self.barrier_cv.notify_all();
            true
        } else {
            while state.phase == phase {
                state = self.barrier_cv.wait(state).unwrap();
            }
            false
        }
    }

    /// Raise the shared cancellation flag. Every thread's iteration
    /// predicate observes it at its next check.
    pub fn signal_error(&self) {
        self.error_flag.store(true, Ordering::Relaxed);
    }

    #[inline(always)]
    pub fn has_error_signal(&self) -> bool {
        self.error_flag.load(Ordering::Relaxed)
    }

    /// Called by each worker after it has pushed its contribution.
    pub fn notify_thread_complete(&self) {
        let mut alive = self.alive.lock().unwrap();
        *alive -= 1;
        if *alive == 0 {
            self.alive_cv.notify_all();
        }
    }

    /// Park until every worker has completed. Establishes the
    /// happens-before between the workers' pushes and the runner's read.
    pub fn wait_for_all_threads(&self) {
        let mut alive = self.alive.lock().unwrap();
        while *alive != 0 {
            alive = self.alive_cv.wait(alive).unwrap();
        }
    }

    /// Tear down the manager and hand back the accumulated results.
    pub fn into_results(self) -> RunAccumulator {
        self.results.into_inner().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn barrier_releases_all_threads() {
        let manager = Arc::new(ThreadManager::new(4));
        let hook_runs = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let m = Arc::clone(&manager);
            let h = Arc::clone(&hook_runs);
            handles.push(std::thread::spawn(move || {
                m.start_stop_barrier(|| {
                    h.fetch_add(1, Ordering::SeqCst);
                })
            }));
        }
        let lasts = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&last| last)
            .count();
        assert_eq!(lasts, 1, "exactly one thread is the last arrival");
        assert_eq!(hook_runs.load(Ordering::SeqCst), 1, "hook runs once");
    }

    #[test]
    fn barrier_phases_alternate() {
        let manager = Arc::new(ThreadManager::new(2));
        let m = Arc::clone(&manager);
        let t = std::thread::spawn(move || {
            m.start_stop_barrier(|| {});
            m.start_stop_barrier(|| {});
        });
        manager.start_stop_barrier(|| {});
        manager.start_stop_barrier(|| {});
        t.join().unwrap();
    }

    #[test]
    fn wait_for_all_threads_blocks_until_done() {
        let manager = Arc::new(ThreadManager::new(2));
        let m = Arc::clone(&manager);
        let t = std::thread::spawn(move || {
            m.results.lock().unwrap().iterations += 7;
            m.notify_thread_complete();
        });
        manager.results.lock().unwrap().iterations += 3;
        manager.notify_thread_complete();
        manager.wait_for_all_threads();
        assert_eq!(manager.results.lock().unwrap().iterations, 10);
        t.join().unwrap();
    }

    #[test]
    fn error_signal_is_visible() {
        let manager = ThreadManager::new(1);
        assert!(!manager.has_error_signal());
        manager.signal_error();
        assert!(manager.has_error_signal());
    }
}
