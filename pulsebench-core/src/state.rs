//! Per-thread iteration driver handed to benchmark bodies.
//!
//! The only thing a body sees is a `&mut State`. Its hot loop is
//! `while state.keep_running() { ... }`: a counter decrement plus one
//! relaxed load of the shared error flag. Everything else (barriers,
//! timers, error plumbing) happens on the cold start/finish edges.

use crate::counters::Counters;
use crate::manager::ThreadManager;
use crate::perf::PerfProbe;
use crate::timer::ThreadTimer;

/// Execution handle for one thread of one measured round.
///
/// Hot fields live at the head of the struct so the iteration fast path
/// touches a single cache line; the layout is pinned with `repr(C)` and
/// checked below.
#[repr(C)]
pub struct State<'a> {
    total_iterations: u64,
    batch_leftover: u64,
    /// Iteration budget of this round.
    pub max_iterations: u64,
    started: bool,
    finished: bool,
    error_occurred: bool,

    range: &'a [i64],
    complexity_n: i64,
    bytes_processed: u64,
    items_processed: u64,

    /// User counters; merged into the run under the benchmark mutex.
    pub counters: Counters,

    thread_index: usize,
    threads: usize,

    timer: &'a mut ThreadTimer,
    manager: &'a ThreadManager,
    perf: Option<&'a PerfProbe>,
}

// The iteration fast path reads total_iterations and the flags; keep
// them within the first cache line.
const _: () = assert!(std::mem::offset_of!(State<'static>, error_occurred) < 64);

impl<'a> State<'a> {
    pub(crate) fn new(
        max_iterations: u64,
        range: &'a [i64],
        thread_index: usize,
        threads: usize,
        timer: &'a mut ThreadTimer,
        manager: &'a ThreadManager,
        perf: Option<&'a PerfProbe>,
    ) -> Self {
        assert!(max_iterations != 0, "at least one iteration must be run");
        assert!(
            thread_index < threads,
            "thread_index must be less than threads"
        );
        Self {
            total_iterations: 0,
            batch_leftover: 0,
            max_iterations,
            started: false,
            finished: false,
            error_occurred: false,
            range,
            complexity_n: 0,
            bytes_processed: 0,
            items_processed: 0,
            counters: Counters::new(),
            thread_index,
            threads,
            timer,
            manager,
            perf,
        }
    }

    /// The iteration predicate. Returns `true` while the body should run
    /// another iteration. The first call enters the start barrier; the
    /// call that observes exhaustion (or an error) enters the stop
    /// barrier and returns `false`. Calling it again after `false` is a
    /// usage error and panics.
    #[inline(always)]
    pub fn keep_running(&mut self) -> bool {
        self.keep_running_internal(1, false)
    }

    /// Batched variant: consumes `n` iterations per `true`. The final
    /// batch may overrun the budget; the overrun is accounted into the
    /// reported iteration total.
    #[inline(always)]
    pub fn keep_running_batch(&mut self, n: u64) -> bool {
        self.keep_running_internal(n, true)
    }

    #[inline(always)]
    fn keep_running_internal(&mut self, n: u64, is_batch: bool) -> bool {
        if self.total_iterations >= n && !self.manager.has_error_signal() {
            self.total_iterations -= n;
            return true;
        }
        self.keep_running_slow(n, is_batch)
    }

    #[cold]
    fn keep_running_slow(&mut self, n: u64, is_batch: bool) -> bool {
        if !self.started {
            self.start_keep_running();
            if !self.error_signalled() && self.total_iterations >= n {
                self.total_iterations -= n;
                return true;
            }
        }
        if is_batch && self.total_iterations != 0 && !self.error_signalled() {
            self.batch_leftover = n - self.total_iterations;
            self.total_iterations = 0;
            return true;
        }
        self.finish_keep_running();
        false
    }

    fn start_keep_running(&mut self) {
        assert!(
            !self.started && !self.finished,
            "the iteration loop was already started"
        );
        self.started = true;
        self.total_iterations = if self.error_signalled() {
            0
        } else {
            self.max_iterations
        };
        let perf = self.perf;
        self.manager.start_stop_barrier(|| {
            if let Some(p) = perf {
                p.start();
            }
        });
        if !self.error_signalled() {
            self.timer.start_timer();
        }
    }

    fn finish_keep_running(&mut self) {
        assert!(
            self.started && (!self.finished || self.error_occurred),
            "keep_running called again after the iteration loop finished"
        );
        if self.timer.running() {
            self.timer.stop_timer();
        }
        self.total_iterations = 0;
        self.finished = true;
        let perf = self.perf;
        let manager = self.manager;
        self.manager.start_stop_barrier(|| {
            if let Some(p) = perf {
                let mut results = manager.results.lock().unwrap();
                p.stop_and_merge(&mut results.counters);
            }
        });
    }

    /// Rendezvous even when the body bailed without draining the loop,
    /// so sibling workers are not stranded in a barrier.
    pub(crate) fn complete(&mut self) {
        if !self.started {
            self.start_keep_running();
        }
        if !self.finished {
            self.finish_keep_running();
        }
    }

    /// Stop the timer around a section that must not be measured. Only
    /// thread 0 may pause in multi-threaded runs.
    pub fn pause_timing(&mut self) {
        self.check_timing_transition();
        self.timer.stop_timer();
    }

    /// Restart the timer after [`State::pause_timing`].
    pub fn resume_timing(&mut self) {
        self.check_timing_transition();
        self.timer.start_timer();
    }

    fn check_timing_transition(&self) {
        assert!(
            self.started && !self.finished && !self.error_occurred,
            "timing can only be toggled inside the iteration loop"
        );
        assert!(
            self.threads == 1 || self.thread_index == 0,
            "pause_timing/resume_timing may only be called from thread 0 of a multi-threaded benchmark"
        );
    }

    /// Mark the run as errored. The first message wins; every thread's
    /// predicate returns `false` at its next check.
    pub fn skip_with_error(&mut self, msg: &str) {
        self.error_occurred = true;
        {
            let mut results = self.manager.results.lock().unwrap();
            if !results.has_error {
                results.error_message = msg.to_string();
                results.has_error = true;
            }
        }
        self.manager.signal_error();
        self.total_iterations = 0;
        if self.timer.running() {
            self.timer.stop_timer();
        }
    }

    /// Report a manually measured iteration time (manual-time mode).
    pub fn set_iteration_time(&mut self, seconds: f64) {
        self.timer.set_iteration_time(seconds);
    }

    /// Attach a label shown alongside the results.
    pub fn set_label(&mut self, label: &str) {
        let mut results = self.manager.results.lock().unwrap();
        results.report_label = label.to_string();
    }

    pub fn set_bytes_processed(&mut self, bytes: u64) {
        self.bytes_processed = bytes;
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    pub fn set_items_processed(&mut self, items: u64) {
        self.items_processed = items;
    }

    pub fn items_processed(&self) -> u64 {
        self.items_processed
    }

    /// Input size used by the asymptotic-complexity fit.
    pub fn set_complexity_n(&mut self, n: i64) {
        self.complexity_n = n;
    }

    pub fn complexity_n(&self) -> i64 {
        self.complexity_n
    }

    /// The argument tuple of this instance.
    pub fn range(&self, index: usize) -> i64 {
        *self
            .range
            .get(index)
            .unwrap_or_else(|| panic!("range({index}) out of bounds for this benchmark"))
    }

    /// Iterations actually consumed so far.
    pub fn iterations(&self) -> u64 {
        if !self.started {
            return 0;
        }
        self.max_iterations - self.total_iterations + self.batch_leftover
    }

    pub fn error_occurred(&self) -> bool {
        self.error_occurred
    }

    pub(crate) fn error_signalled(&self) -> bool {
        self.error_occurred || self.manager.has_error_signal()
    }

    pub fn thread_index(&self) -> usize {
        self.thread_index
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}
