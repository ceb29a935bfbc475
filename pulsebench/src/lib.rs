#![warn(missing_docs)]
//! # PulseBench
//!
//! A microbenchmark harness linked into your program. Register
//! benchmark bodies, and the harness sizes each one to a time budget,
//! runs it across argument grids and thread counts, folds repetitions
//! into statistics and asymptotic fits, and reports to the console or
//! to JSON/CSV files.
//!
//! ## Quick start
//!
//! ```ignore
//! use pulsebench::prelude::*;
//!
//! fn bm_sum(state: &mut State) {
//!     let data: Vec<u64> = (0..1024).collect();
//!     while state.keep_running() {
//!         std::hint::black_box(data.iter().sum::<u64>());
//!     }
//! }
//! pulsebench::benchmark!(bm_sum);
//!
//! pulsebench::main!();
//! ```
//!
//! ## Arguments and threads
//!
//! ```ignore
//! fn bm_search(state: &mut State) {
//!     let n = state.range(0) as usize;
//!     // ...
//! }
//! pulsebench::benchmark!(bm_search, |b| {
//!     b.range(8, 8 << 10).threads(4).complexity(Complexity::OLogN);
//! });
//! ```

// Core measurement engine.
pub use pulsebench_core::{
    clear_registered_benchmarks, create_dense_range, create_range, find_benchmarks,
    register_benchmark, register_collected, statistics_mean, statistics_median, statistics_stddev,
    with_registry, AggregationReportMode, Benchmark, BenchmarkInstance, BenchmarkRunner, Complexity,
    Counter, CounterProbe, CounterUnit, Counters, FilterError, PerFamilyReports, Registration,
    Registry, Run, RunResults, RunType, RunnerOptions, State, Statistics, StatisticsFn,
    ThreadTimer, TimeUnit, HAS_CYCLE_COUNTER, MAX_ITERATIONS,
};

// Aggregation.
pub use pulsebench_stats::{aggregate_runs, big_o_string, compute_big_o};

// Reporting.
pub use pulsebench_report::{
    add_custom_context, ConsoleReporter, Context, CsvReporter, JsonReporter, OutputFormat, Reporter,
};

// Driver.
pub use pulsebench_cli::{run, run_benchmarks, run_with_flags, Flags, PulseConfig};

/// Internal re-exports for the registration macros.
#[doc(hidden)]
pub mod internal {
    pub use pulsebench_core::inventory;
}

/// Register a benchmark function at startup.
///
/// The one-argument form registers the function under its own name;
/// the two-argument form additionally applies a configuration function
/// to the family builder.
#[macro_export]
macro_rules! benchmark {
    ($func:path) => {
        $crate::internal::inventory::submit! {
            $crate::Registration::new(stringify!($func), $func)
        }
    };
    ($func:path, $configure:expr) => {
        $crate::internal::inventory::submit! {
            $crate::Registration::with_config(stringify!($func), $func, $configure)
        }
    };
}

/// Generate a `main` that parses harness flags and runs every
/// registered benchmark.
#[macro_export]
macro_rules! main {
    () => {
        fn main() {
            if let Err(err) = $crate::run() {
                ::std::eprintln!("pulsebench: {err:#}");
                ::std::process::exit(1);
            }
        }
    };
}

/// Convenient imports for benchmark binaries.
pub mod prelude {
    pub use crate::{benchmark, main};
    pub use crate::{Benchmark, Complexity, Counter, State, TimeUnit};
}
