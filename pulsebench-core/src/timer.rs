//! Per-thread pausable timer.
//!
//! One `ThreadTimer` lives on each worker thread for the duration of a
//! measured round. It accumulates elapsed real time and thread-CPU time
//! across start/stop pairs, plus manually reported per-iteration times
//! for benchmarks that time themselves.

use crate::clock;

#[derive(Debug, Default)]
pub struct ThreadTimer {
    running: bool,
    start_real_time: f64,
    start_cpu_time: f64,

    // Accumulated across all start/stop pairs of the round.
    real_time_used: f64,
    cpu_time_used: f64,
    manual_time_used: f64,
}

impl ThreadTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin (or resume) accumulating time.
    pub fn start_timer(&mut self) {
        self.running = true;
        self.start_real_time = clock::wall_time();
        self.start_cpu_time = clock::thread_cpu_time();
    }

    /// Stop accumulating and fold the elapsed interval in.
    pub fn stop_timer(&mut self) {
        assert!(self.running, "stop_timer called on a stopped timer");
        self.running = false;
        self.real_time_used += clock::wall_time() - self.start_real_time;
        // Scheduler clock drift can make the thread-CPU delta read
        // fractionally negative; clamp rather than poison the sum.
        self.cpu_time_used += (clock::thread_cpu_time() - self.start_cpu_time).max(0.0);
    }

    /// Record a manually measured iteration (manual-time mode).
    pub fn set_iteration_time(&mut self, seconds: f64) {
        self.manual_time_used += seconds;
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn real_time_used(&self) -> f64 {
        assert!(!self.running, "timer must be stopped before reading");
        self.real_time_used
    }

    pub fn cpu_time_used(&self) -> f64 {
        assert!(!self.running, "timer must be stopped before reading");
        self.cpu_time_used
    }

    pub fn manual_time_used(&self) -> f64 {
        assert!(!self.running, "timer must be stopped before reading");
        self.manual_time_used
    }
}
