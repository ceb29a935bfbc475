//! PulseBench CLI - Harness Driver
//!
//! Flag parsing, configuration layering and the outer run loop. Call
//! [`run`] from a benchmark binary's `main` (usually via the
//! `pulsebench::main!` macro) to parse flags and execute every
//! registered benchmark matching the filter.

mod config;
mod driver;

pub use config::{apply_config, OutputSection, PulseConfig, RunnerSection};
pub use driver::{run_benchmarks, run_with_flags};

use clap::Parser;

/// Harness flags. Every flag can also be set through an upper-cased
/// `BENCHMARK_*` environment variable; explicit flags win.
#[derive(Parser, Debug, Clone)]
#[command(name = "pulsebench")]
#[command(about = "PulseBench - microbenchmark harness", disable_help_subcommand = true)]
pub struct Flags {
    /// Print the matched benchmark names and exit without running.
    #[arg(
        long = "benchmark_list_tests",
        env = "BENCHMARK_LIST_TESTS",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub benchmark_list_tests: bool,

    /// Regex selecting the benchmarks to run. A leading '-' inverts the
    /// match; "" and "all" mean everything.
    #[arg(
        long = "benchmark_filter",
        env = "BENCHMARK_FILTER",
        default_value = "."
    )]
    pub benchmark_filter: String,

    /// Minimum measured seconds per repetition before a result counts.
    #[arg(
        long = "benchmark_min_time",
        env = "BENCHMARK_MIN_TIME",
        default_value_t = 0.5
    )]
    pub benchmark_min_time: f64,

    /// Repetitions per benchmark instance; above 1, aggregate rows are
    /// reported too.
    #[arg(
        long = "benchmark_repetitions",
        env = "BENCHMARK_REPETITIONS",
        default_value_t = 1
    )]
    pub benchmark_repetitions: usize,

    /// Shuffle repetition order across all benchmarks.
    #[arg(
        long = "benchmark_enable_random_interleaving",
        env = "BENCHMARK_ENABLE_RANDOM_INTERLEAVING",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub benchmark_enable_random_interleaving: bool,

    /// Report only aggregate rows (all reporters).
    #[arg(
        long = "benchmark_report_aggregates_only",
        env = "BENCHMARK_REPORT_AGGREGATES_ONLY",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub benchmark_report_aggregates_only: bool,

    /// Report only aggregate rows on the display reporter; file output
    /// keeps everything.
    #[arg(
        long = "benchmark_display_aggregates_only",
        env = "BENCHMARK_DISPLAY_AGGREGATES_ONLY",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub benchmark_display_aggregates_only: bool,

    /// Display format: console, json or csv.
    #[arg(
        long = "benchmark_format",
        env = "BENCHMARK_FORMAT",
        default_value = "console"
    )]
    pub benchmark_format: String,

    /// File to write a second report to.
    #[arg(long = "benchmark_out", env = "BENCHMARK_OUT")]
    pub benchmark_out: Option<std::path::PathBuf>,

    /// Format of the file report: console, json or csv.
    #[arg(
        long = "benchmark_out_format",
        env = "BENCHMARK_OUT_FORMAT",
        default_value = "json"
    )]
    pub benchmark_out_format: String,

    /// Console color: auto, true/yes/1 or false/no/0.
    #[arg(
        long = "benchmark_color",
        env = "BENCHMARK_COLOR",
        default_value = "auto"
    )]
    pub benchmark_color: String,

    /// Render user counters as table columns.
    #[arg(
        long = "benchmark_counters_tabular",
        env = "BENCHMARK_COUNTERS_TABULAR",
        action = clap::ArgAction::Set,
        num_args = 0..=1,
        default_missing_value = "true",
        default_value_t = false
    )]
    pub benchmark_counters_tabular: bool,

    /// Extra context as comma-separated key=value pairs.
    #[arg(
        long = "benchmark_context",
        env = "BENCHMARK_CONTEXT",
        default_value = ""
    )]
    pub benchmark_context: String,

    /// Hardware counters to sample across the measured region.
    #[arg(
        long = "benchmark_perf_counters",
        env = "BENCHMARK_PERF_COUNTERS",
        value_delimiter = ','
    )]
    pub benchmark_perf_counters: Vec<String>,

    /// Log verbosity (0 = warnings, 1 = info, 2+ = debug).
    #[arg(long = "v", env = "BENCHMARK_VERBOSITY", default_value_t = 0)]
    pub verbosity: u32,

    /// Absorbs cargo bench's --bench flag.
    #[arg(long, hide = true)]
    pub bench: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Flags::parse_from(["pulsebench"])
    }
}

/// Parse flags from the process arguments and run every matching
/// benchmark. Returns the number of matched instances.
pub fn run() -> anyhow::Result<usize> {
    let mut flags = Flags::parse();
    init_logging(flags.verbosity);
    if let Some(file_config) = PulseConfig::discover() {
        apply_config(&mut flags, &file_config);
    }
    driver::validate_flags(&flags);
    run_with_flags(&flags)
}

fn init_logging(verbosity: u32) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("pulsebench={level}")));
    // A second init (tests, embedding programs) is fine to ignore.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .ok();
}
