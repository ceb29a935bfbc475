//! Measurement records produced by the runner and consumed by the
//! statistics, complexity and reporting layers.

use crate::benchmark::TimeUnit;
use crate::counters::Counters;

/// Whether a run is a real measurement or a synthetic aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunType {
    Iteration,
    Aggregate,
}

/// One completed (instance, repetition) measurement, or a synthetic
/// aggregate derived from a set of them.
#[derive(Debug, Clone)]
pub struct Run {
    /// Canonical instance name (without aggregate suffix).
    pub run_name: String,
    pub family_index: usize,
    pub per_family_instance_index: usize,
    pub run_type: RunType,
    /// `mean` / `median` / `stddev` / user statistic / `BigO` / `RMS`.
    pub aggregate_name: String,
    /// The time fields carry a complexity coefficient, not a time.
    pub report_big_o: bool,
    /// The time fields carry a normalized RMS ratio.
    pub report_rms: bool,
    pub repetitions: usize,
    /// Absent on aggregates.
    pub repetition_index: Option<usize>,
    pub threads: usize,
    /// Summed over worker threads; 0 on aggregates (their time fields
    /// are already per-iteration).
    pub iterations: u64,
    pub real_accumulated_time: f64,
    pub cpu_accumulated_time: f64,
    pub time_unit: TimeUnit,
    pub bytes_per_second: f64,
    pub items_per_second: f64,
    pub counters: Counters,
    pub report_label: String,
    pub error_occurred: bool,
    pub error_message: String,
    /// Input size used by the complexity fit.
    pub complexity_n: i64,
}

impl Default for Run {
    fn default() -> Self {
        Self {
            run_name: String::new(),
            family_index: 0,
            per_family_instance_index: 0,
            run_type: RunType::Iteration,
            aggregate_name: String::new(),
            report_big_o: false,
            report_rms: false,
            repetitions: 1,
            repetition_index: None,
            threads: 1,
            iterations: 0,
            real_accumulated_time: 0.0,
            cpu_accumulated_time: 0.0,
            time_unit: TimeUnit::default(),
            bytes_per_second: 0.0,
            items_per_second: 0.0,
            counters: Counters::new(),
            report_label: String::new(),
            error_occurred: false,
            error_message: String::new(),
            complexity_n: 0,
        }
    }
}

impl Run {
    /// Display name; aggregates append their statistic name.
    pub fn benchmark_name(&self) -> String {
        if self.run_type == RunType::Aggregate {
            format!("{}_{}", self.run_name, self.aggregate_name)
        } else {
            self.run_name.clone()
        }
    }

    /// Per-iteration real time in this run's time unit.
    pub fn adjusted_real_time(&self) -> f64 {
        self.time_unit.multiplier() * self.real_seconds_per_iteration()
    }

    /// Per-iteration CPU time in this run's time unit.
    pub fn adjusted_cpu_time(&self) -> f64 {
        self.time_unit.multiplier() * self.cpu_seconds_per_iteration()
    }

    /// Per-iteration real time in seconds (unit-free, used by folds).
    pub fn real_seconds_per_iteration(&self) -> f64 {
        if self.iterations == 0 {
            self.real_accumulated_time
        } else {
            self.real_accumulated_time / self.iterations as f64
        }
    }

    /// Per-iteration CPU time in seconds.
    pub fn cpu_seconds_per_iteration(&self) -> f64 {
        if self.iterations == 0 {
            self.cpu_accumulated_time
        } else {
            self.cpu_accumulated_time / self.iterations as f64
        }
    }
}

/// Everything reported for one instance: measurements plus aggregates.
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    pub non_aggregates: Vec<Run>,
    pub aggregates_only: Vec<Run>,
    pub display_report_aggregates_only: bool,
    pub file_report_aggregates_only: bool,
}

/// Accumulator for the runs of one family with a complexity hypothesis.
/// Fitted and destroyed once `num_runs_done == num_runs_total`.
#[derive(Debug, Default)]
pub struct PerFamilyReports {
    pub runs: Vec<Run>,
    pub num_runs_total: usize,
    pub num_runs_done: usize,
}
