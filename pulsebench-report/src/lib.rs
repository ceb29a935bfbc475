//! PulseBench Report - Output Sinks
//!
//! A reporter receives the run context once, then batches of runs (one
//! batch of measurements and one of aggregates per instance), then a
//! finalize call. Three implementations ship here:
//! - console: tabular, optionally colored
//! - JSON: one document with `context` and `benchmarks`
//! - CSV: fixed-column rows (kept for spreadsheet pipelines)

mod console;
mod context;
mod csv;
mod json;

use std::io::Write;

use pulsebench_core::Run;

pub use console::{is_color_terminal, ConsoleReporter};
pub use context::{add_custom_context, custom_context, CacheInfo, Context};
pub use csv::CsvReporter;
pub use json::JsonReporter;

/// A sink for benchmark results.
pub trait Reporter {
    /// Called once before any runs; returning `false` aborts the whole
    /// harness run.
    fn report_context(&mut self, context: &Context) -> bool;

    /// Called with one instance's measurements, then again with its
    /// aggregates (when any exist).
    fn report_runs(&mut self, runs: &[Run]);

    /// Called after the last instance.
    fn finalize(&mut self) {}

    fn output(&mut self) -> &mut dyn Write;

    fn error_output(&mut self) -> &mut dyn Write;
}

/// Reporter kind selected by the format flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Console,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unexpected format: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_known_names() {
        assert_eq!("console".parse::<OutputFormat>().unwrap(), OutputFormat::Console);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
