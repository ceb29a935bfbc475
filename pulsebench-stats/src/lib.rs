//! PulseBench Stats - Aggregation over Runs
//!
//! Two folds over the measurements the runner produces:
//! - [`aggregate_runs`]: per-statistic synthetic runs (mean / median /
//!   stddev / user statistics) across the repetitions of one instance
//! - [`compute_big_o`]: least-squares asymptotic-complexity fit across
//!   the instances of one family, emitting the `BigO`/`RMS` run pair

mod complexity;
mod statistics;

pub use complexity::{big_o_string, compute_big_o, fitting_curve, minimal_least_sq, LeastSq};
pub use statistics::aggregate_runs;
