//! The per-instance runner: iteration-count convergence and repetitions.
//!
//! One runner owns one instance. Each repetition runs the sizing loop:
//! execute a round with a candidate iteration count, and either accept
//! it (time budget met) or grow the count and retry. Rounds execute the
//! body on N worker threads bracketed by the manager's barriers; worker
//! 0 runs on the calling thread so single-threaded benchmarks never pay
//! a spawn.

use crate::benchmark::MAX_ITERATIONS;
use crate::clock;
use crate::counters::{finish_counters, increment_counters};
use crate::instance::BenchmarkInstance;
use crate::manager::{RunAccumulator, ThreadManager};
use crate::perf::PerfProbe;
use crate::run::{Run, RunResults, RunType};
use crate::state::State;
use crate::timer::ThreadTimer;

/// Accept a round once it reaches this fraction of the time budget;
/// the slack stops the loop from oscillating just under the target.
const MIN_TIME_SLACK: f64 = 0.9;
/// Growth multiplier bounds: always make real progress, never explode
/// from a near-zero measurement.
const GROW_MIN: f64 = 1.4;
const GROW_MAX: f64 = 10.0;
/// Sizing rounds allowed per repetition before giving up.
const MAX_SIZING_ROUNDS: u32 = 10;

/// Global flag values a runner needs; defaults mirror the CLI defaults.
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub min_time: f64,
    pub repetitions: usize,
    pub report_aggregates_only: bool,
    pub display_aggregates_only: bool,
    pub perf_counter_names: Vec<String>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            min_time: 0.5,
            repetitions: 1,
            report_aggregates_only: false,
            display_aggregates_only: false,
            perf_counter_names: Vec::new(),
        }
    }
}

struct IterationResults {
    acc: RunAccumulator,
    /// Mode-selected elapsed time the sizing loop compares against the
    /// budget.
    seconds: f64,
}

/// Executes all repetitions of one benchmark instance.
pub struct BenchmarkRunner {
    instance: BenchmarkInstance,
    min_time: f64,
    repeats: usize,
    has_explicit_iteration_count: bool,
    perf_counter_names: Vec<String>,
    num_repetitions_done: usize,
    run_results: RunResults,
}

impl BenchmarkRunner {
    pub fn new(instance: BenchmarkInstance, options: &RunnerOptions) -> Self {
        let min_time = if instance.min_time() > 0.0 {
            instance.min_time()
        } else {
            options.min_time
        };
        let repeats = if instance.repetitions() > 0 {
            instance.repetitions()
        } else {
            options.repetitions
        };
        let mut run_results = RunResults {
            display_report_aggregates_only: options.report_aggregates_only
                || options.display_aggregates_only,
            file_report_aggregates_only: options.report_aggregates_only,
            ..RunResults::default()
        };
        // A per-family mode overrides the global flags.
        if let Some(mode) = instance.aggregation_report_mode() {
            run_results.display_report_aggregates_only = mode.display_aggregates_only;
            run_results.file_report_aggregates_only = mode.report_aggregates_only;
        }
        let has_explicit_iteration_count = instance.fixed_iterations() != 0;
        Self {
            instance,
            min_time,
            repeats,
            has_explicit_iteration_count,
            perf_counter_names: options.perf_counter_names.clone(),
            num_repetitions_done: 0,
            run_results,
        }
    }

    pub fn instance(&self) -> &BenchmarkInstance {
        &self.instance
    }

    pub fn repeats(&self) -> usize {
        self.repeats
    }

    pub fn has_repeats_remaining(&self) -> bool {
        self.num_repetitions_done < self.repeats
    }

    /// Run the sizing loop to convergence and record one repetition.
    /// Returns the repetition's run (also kept for final reporting).
    pub fn do_one_repetition(&mut self) -> Run {
        assert!(self.has_repeats_remaining(), "all repetitions already ran");

        let mut iters: u64 = if self.has_explicit_iteration_count {
            self.instance.fixed_iterations()
        } else {
            1
        };
        let mut round = 0u32;
        let mut convergence_failed = false;
        let results = loop {
            let results = self.do_n_iterations(iters);
            round += 1;

            // Fixed-count and errored rounds are never resized.
            if self.has_explicit_iteration_count || results.acc.has_error {
                break results;
            }
            if results.seconds >= MIN_TIME_SLACK * self.min_time || iters >= MAX_ITERATIONS {
                break results;
            }
            if round >= MAX_SIZING_ROUNDS {
                convergence_failed = true;
                break results;
            }

            let multiplier = (self.min_time / results.seconds.max(1e-9)).clamp(GROW_MIN, GROW_MAX);
            iters = ((iters as f64 * multiplier).ceil() as u64).clamp(iters + 1, MAX_ITERATIONS);
            tracing::debug!(
                benchmark = self.instance.name(),
                round,
                next_iterations = iters,
                measured_seconds = results.seconds,
                "round below time budget, growing iteration count"
            );
        };

        let mut report = self.create_run_report(&results);
        if convergence_failed && !report.error_occurred {
            report.error_occurred = true;
            report.error_message = format!(
                "failed to reach the {:.3}s time budget within {} sizing rounds",
                self.min_time, MAX_SIZING_ROUNDS
            );
        }
        self.num_repetitions_done += 1;
        self.run_results.non_aggregates.push(report.clone());
        report
    }

    /// Hand back everything recorded; valid only after the last
    /// repetition.
    pub fn take_results(&mut self) -> RunResults {
        assert!(!self.has_repeats_remaining(), "repetitions still pending");
        std::mem::take(&mut self.run_results)
    }

    /// One measured round with a candidate iteration count.
    fn do_n_iterations(&self, iters: u64) -> IterationResults {
        let threads = self.instance.threads();
        let manager = ThreadManager::new(threads);
        let probe = PerfProbe::from_names(&self.perf_counter_names);
        let process_cpu_start = self
            .instance
            .measure_process_cpu_time()
            .then(clock::process_cpu_time);

        std::thread::scope(|scope| {
            for thread_index in 1..threads {
                let manager = &manager;
                let probe = probe.as_ref();
                let instance = &self.instance;
                scope.spawn(move || run_in_thread(instance, iters, thread_index, manager, probe));
            }
            run_in_thread(&self.instance, iters, 0, &manager, probe.as_ref());
            manager.wait_for_all_threads();
        });

        let mut acc = manager.into_results();
        if let Some(start) = process_cpu_start {
            // Whole-process CPU burned across the round, including
            // threads the benchmark spawned itself.
            acc.cpu_time_used = (clock::process_cpu_time() - start).max(0.0);
        }
        let seconds = if self.instance.use_manual_time() {
            acc.manual_time_used
        } else if self.instance.use_real_time() {
            acc.max_real_time
        } else {
            acc.cpu_time_used
        };
        IterationResults { acc, seconds }
    }

    fn create_run_report(&self, results: &IterationResults) -> Run {
        let acc = &results.acc;
        let instance = &self.instance;
        let mut run = Run {
            run_name: instance.name().to_string(),
            family_index: instance.family_index(),
            per_family_instance_index: instance.per_family_instance_index(),
            run_type: RunType::Iteration,
            repetitions: self.repeats,
            repetition_index: Some(self.num_repetitions_done),
            threads: instance.threads(),
            iterations: acc.iterations,
            time_unit: instance.time_unit(),
            report_label: acc.report_label.clone(),
            error_occurred: acc.has_error,
            error_message: acc.error_message.clone(),
            ..Run::default()
        };
        if run.error_occurred {
            return run;
        }

        run.real_accumulated_time = if instance.use_manual_time() {
            acc.manual_time_used / instance.threads() as f64
        } else {
            // Wall time of the slowest thread.
            acc.max_real_time
        };
        run.cpu_accumulated_time = acc.cpu_time_used;
        run.complexity_n = if acc.complexity_n != 0 {
            acc.complexity_n
        } else {
            instance.args().first().copied().unwrap_or(0)
        };
        if acc.bytes_processed > 0 && run.cpu_accumulated_time > 0.0 {
            run.bytes_per_second = acc.bytes_processed as f64 / run.cpu_accumulated_time;
        }
        if acc.items_processed > 0 && run.cpu_accumulated_time > 0.0 {
            run.items_per_second = acc.items_processed as f64 / run.cpu_accumulated_time;
        }
        let mut counters = acc.counters.clone();
        finish_counters(
            &mut counters,
            acc.iterations,
            run.cpu_accumulated_time,
            instance.threads(),
        );
        run.counters = counters;
        run
    }
}

fn run_in_thread(
    instance: &BenchmarkInstance,
    iters: u64,
    thread_index: usize,
    manager: &ThreadManager,
    perf: Option<&PerfProbe>,
) {
    let mut timer = ThreadTimer::new();
    let mut state = State::new(
        iters,
        instance.args(),
        thread_index,
        instance.threads(),
        &mut timer,
        manager,
        perf,
    );
    instance.run(&mut state);
    state.complete();

    let iterations = state.iterations();
    let complexity_n = state.complexity_n();
    let bytes_processed = state.bytes_processed();
    let items_processed = state.items_processed();
    let counters = std::mem::take(&mut state.counters);
    drop(state);

    let mut results = manager.results.lock().unwrap();
    results.iterations += iterations;
    results.real_time_used += timer.real_time_used();
    results.max_real_time = results.max_real_time.max(timer.real_time_used());
    results.cpu_time_used += timer.cpu_time_used();
    results.manual_time_used += timer.manual_time_used();
    results.bytes_processed += bytes_processed;
    results.items_processed += items_processed;
    results.complexity_n = results.complexity_n.max(complexity_n);
    increment_counters(&mut results.counters, &counters);
    drop(results);
    manager.notify_thread_complete();
}
