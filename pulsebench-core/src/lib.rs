//! PulseBench Core - Measurement Engine
//!
//! This crate holds the execution half of the harness:
//! - registry of benchmark families and their expansion into instances
//! - the per-thread `State` iteration driver handed to benchmark bodies
//! - pausable thread timers over wall/CPU clocks
//! - the start/stop barrier coordinating worker threads
//! - the per-instance runner with its iteration-count sizing loop
//!
//! Reporting and statistics live in `pulsebench-report` and
//! `pulsebench-stats`; the CLI driver in `pulsebench-cli` ties the
//! layers together.

mod benchmark;
mod clock;
mod counters;
mod instance;
mod manager;
mod perf;
mod registry;
mod run;
mod runner;
mod state;
mod timer;

pub use benchmark::{
    create_dense_range, create_range, statistics_mean, statistics_median, statistics_stddev,
    AggregationReportMode, Benchmark, BenchmarkFn, Complexity, Statistics, StatisticsFn, TimeUnit,
    MAX_ITERATIONS,
};
pub use clock::{process_cpu_time, thread_cpu_time, wall_time};
pub use counters::{finish_counters, increment_counters, Counter, CounterUnit, Counters};
pub use instance::BenchmarkInstance;
pub use manager::{RunAccumulator, ThreadManager};
pub use perf::{CounterProbe, CycleCounterProbe, PerfProbe, HAS_CYCLE_COUNTER};
pub use registry::{
    clear_registered_benchmarks, find_benchmarks, register_benchmark, register_collected,
    with_registry, FilterError, Registration, Registry,
};
pub use run::{PerFamilyReports, Run, RunResults, RunType};
pub use runner::{BenchmarkRunner, RunnerOptions};
pub use state::State;
pub use timer::ThreadTimer;

// Re-exported for the registration macros in the facade crate.
#[doc(hidden)]
pub use inventory;

/// Anchor to prevent LTO from stripping statically registered
/// benchmarks.
#[used]
#[doc(hidden)]
pub static REGISTRY_ANCHOR: fn() = || {
    for _ in inventory::iter::<Registration> {}
};
