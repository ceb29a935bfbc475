//! Benchmark families and their builder surface.
//!
//! A [`Benchmark`] is a registered family: one body plus the argument
//! tuples, thread counts, timing mode and reporting options it should be
//! run under. The registry later expands a family into concrete
//! instances (one per args × threads point).

use std::fmt;
use std::sync::Arc;

use crate::state::State;

/// Hard cap on iteration counts the sizing loop may request.
pub const MAX_ITERATIONS: u64 = 1_000_000_000;

/// Spacing factor for `range`-generated arguments.
const DEFAULT_RANGE_MULTIPLIER: i64 = 8;

/// Unit used when reporting times for a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeUnit {
    #[default]
    Nanosecond,
    Microsecond,
    Millisecond,
    Second,
}

impl TimeUnit {
    /// Factor converting seconds into this unit.
    pub fn multiplier(self) -> f64 {
        match self {
            TimeUnit::Nanosecond => 1e9,
            TimeUnit::Microsecond => 1e6,
            TimeUnit::Millisecond => 1e3,
            TimeUnit::Second => 1.0,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            TimeUnit::Nanosecond => "ns",
            TimeUnit::Microsecond => "us",
            TimeUnit::Millisecond => "ms",
            TimeUnit::Second => "s",
        }
    }
}

/// Asymptotic complexity hypothesis for a family of input sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Complexity {
    /// No fit requested.
    #[default]
    None,
    /// Try every built-in class, keep the one with minimal RMS.
    Auto,
    O1,
    ON,
    ONSquared,
    ONCubed,
    OLogN,
    ONLogN,
    OSqrtN,
    OExp,
    /// User-provided curve `f(n)`.
    Lambda(fn(i64) -> f64),
}

/// Fold applied to a per-metric sample vector across repetitions.
pub type StatisticsFn = fn(&[f64]) -> f64;

/// A named statistic computed over the repetitions of an instance.
#[derive(Debug, Clone)]
pub struct Statistics {
    pub name: String,
    pub compute: StatisticsFn,
}

/// Where aggregate rows should replace per-repetition rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AggregationReportMode {
    pub display_aggregates_only: bool,
    pub report_aggregates_only: bool,
}

/// Type-erased benchmark body.
pub type BenchmarkFn = Arc<dyn Fn(&mut State) + Send + Sync + 'static>;

/// Arithmetic mean.
pub fn statistics_mean(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    v.iter().sum::<f64>() / v.len() as f64
}

/// Sort-and-middle median; mean of the two middles for even counts.
pub fn statistics_median(v: &[f64]) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    let mut sorted = v.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Bessel-corrected sample standard deviation; 0 for n < 2.
pub fn statistics_stddev(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = statistics_mean(v);
    let variance = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (v.len() - 1) as f64;
    variance.sqrt()
}

/// One registered benchmark family.
pub struct Benchmark {
    pub(crate) name: String,
    pub(crate) func: BenchmarkFn,
    pub(crate) args: Vec<Vec<i64>>,
    pub(crate) arg_names: Vec<String>,
    pub(crate) thread_counts: Vec<usize>,
    pub(crate) time_unit: TimeUnit,
    pub(crate) range_multiplier: i64,
    pub(crate) min_time: f64,
    pub(crate) iterations: u64,
    pub(crate) repetitions: usize,
    pub(crate) measure_process_cpu_time: bool,
    pub(crate) use_real_time: bool,
    pub(crate) use_manual_time: bool,
    pub(crate) aggregation_report_mode: Option<AggregationReportMode>,
    pub(crate) complexity: Complexity,
    pub(crate) statistics: Vec<Statistics>,
}

impl fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Benchmark")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("thread_counts", &self.thread_counts)
            .field("repetitions", &self.repetitions)
            .finish_non_exhaustive()
    }
}

impl Benchmark {
    /// New family with the default statistics set (mean, median, stddev).
    pub fn new(name: impl Into<String>, func: impl Fn(&mut State) + Send + Sync + 'static) -> Self {
        let mut b = Self {
            name: name.into(),
            func: Arc::new(func),
            args: Vec::new(),
            arg_names: Vec::new(),
            thread_counts: Vec::new(),
            time_unit: TimeUnit::default(),
            range_multiplier: DEFAULT_RANGE_MULTIPLIER,
            min_time: 0.0,
            iterations: 0,
            repetitions: 0,
            measure_process_cpu_time: false,
            use_real_time: false,
            use_manual_time: false,
            aggregation_report_mode: None,
            complexity: Complexity::None,
            statistics: Vec::new(),
        };
        b.compute_statistics("mean", statistics_mean);
        b.compute_statistics("median", statistics_median);
        b.compute_statistics("stddev", statistics_stddev);
        b
    }

    /// Arity of the registered argument tuples; `None` until any args or
    /// arg names have been set.
    pub fn args_cnt(&self) -> Option<usize> {
        match self.args.first() {
            Some(first) => Some(first.len()),
            None if self.arg_names.is_empty() => None,
            None => Some(self.arg_names.len()),
        }
    }

    fn check_arity(&self, arity: usize) {
        assert!(
            self.args_cnt().map_or(true, |c| c == arity),
            "benchmark '{}': argument tuples must all have the same arity",
            self.name
        );
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the family body against one per-thread state.
    pub fn run(&self, state: &mut State) {
        (self.func)(state);
    }

    // ── argument configuration ──────────────────────────────────────────

    pub fn arg(&mut self, x: i64) -> &mut Self {
        self.check_arity(1);
        self.args.push(vec![x]);
        self
    }

    pub fn args(&mut self, args: &[i64]) -> &mut Self {
        self.check_arity(args.len());
        self.args.push(args.to_vec());
        self
    }

    /// Multiplicatively spaced single-argument range `[start, limit]`.
    pub fn range(&mut self, start: i64, limit: i64) -> &mut Self {
        self.check_arity(1);
        for arg in create_range(start, limit, self.range_multiplier) {
            self.args.push(vec![arg]);
        }
        self
    }

    /// Every `step`th value in `[start, limit]` as a single argument.
    pub fn dense_range(&mut self, start: i64, limit: i64, step: i64) -> &mut Self {
        self.check_arity(1);
        for arg in create_dense_range(start, limit, step) {
            self.args.push(vec![arg]);
        }
        self
    }

    /// Multiplicatively spaced ranges per tuple position, combined as a
    /// Cartesian product.
    pub fn ranges(&mut self, ranges: &[(i64, i64)]) -> &mut Self {
        self.check_arity(ranges.len());
        let lists: Vec<Vec<i64>> = ranges
            .iter()
            .map(|&(lo, hi)| create_range(lo, hi, self.range_multiplier))
            .collect();
        self.args_product(&lists)
    }

    /// Cartesian product of explicit per-position value lists.
    pub fn args_product(&mut self, lists: &[Vec<i64>]) -> &mut Self {
        self.check_arity(lists.len());
        if lists.iter().any(|l| l.is_empty()) {
            return self;
        }
        let mut indices = vec![0usize; lists.len()];
        let total: usize = lists.iter().map(|l| l.len()).product();
        for _ in 0..total {
            self.args
                .push(lists.iter().zip(&indices).map(|(l, &i)| l[i]).collect());
            for pos in 0..lists.len() {
                indices[pos] = (indices[pos] + 1) % lists[pos].len();
                if indices[pos] != 0 {
                    break;
                }
            }
        }
        self
    }

    pub fn arg_name(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.check_arity(1);
        self.arg_names = vec![name];
        self
    }

    pub fn arg_names(&mut self, names: &[&str]) -> &mut Self {
        self.check_arity(names.len());
        self.arg_names = names.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn range_multiplier(&mut self, multiplier: i64) -> &mut Self {
        assert!(multiplier > 1, "range multiplier must be greater than 1");
        self.range_multiplier = multiplier;
        self
    }

    // ── thread configuration ────────────────────────────────────────────

    pub fn threads(&mut self, t: usize) -> &mut Self {
        assert!(t > 0, "thread count must be positive");
        self.thread_counts.push(t);
        self
    }

    /// Thread counts doubling from `min` up to and including `max`.
    pub fn thread_range(&mut self, min: usize, max: usize) -> &mut Self {
        assert!(min > 0, "thread count must be positive");
        assert!(max >= min, "thread range must be non-empty");
        let mut counts: Vec<i64> = Vec::new();
        add_range(&mut counts, min as i64, max as i64, 2);
        for t in counts {
            self.thread_counts.push(t as usize);
        }
        self
    }

    pub fn dense_thread_range(&mut self, min: usize, max: usize, stride: usize) -> &mut Self {
        assert!(min > 0, "thread count must be positive");
        assert!(max >= min, "thread range must be non-empty");
        assert!(stride >= 1, "stride must be at least 1");
        let mut t = min;
        while t < max {
            self.thread_counts.push(t);
            t += stride;
        }
        self.thread_counts.push(max);
        self
    }

    pub fn thread_per_cpu(&mut self) -> &mut Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.thread_counts.push(cpus);
        self
    }

    // ── timing configuration ────────────────────────────────────────────

    pub fn unit(&mut self, unit: TimeUnit) -> &mut Self {
        self.time_unit = unit;
        self
    }

    /// Per-repetition time budget for the sizing loop. Exclusive with a
    /// fixed iteration count.
    pub fn min_time(&mut self, t: f64) -> &mut Self {
        assert!(t > 0.0, "min_time must be positive");
        assert!(
            self.iterations == 0,
            "min_time and a fixed iteration count are mutually exclusive"
        );
        self.min_time = t;
        self
    }

    /// Fixed iteration count, bypassing the sizing loop.
    pub fn iterations(&mut self, n: u64) -> &mut Self {
        assert!(n > 0, "iteration count must be positive");
        assert!(
            self.min_time == 0.0,
            "min_time and a fixed iteration count are mutually exclusive"
        );
        self.iterations = n;
        self
    }

    pub fn repetitions(&mut self, n: usize) -> &mut Self {
        assert!(n > 0, "repetition count must be positive");
        self.repetitions = n;
        self
    }

    /// Replaces the whole mode: `false` also resets any earlier
    /// `display_aggregates_only(true)`.
    pub fn report_aggregates_only(&mut self, value: bool) -> &mut Self {
        self.aggregation_report_mode = Some(AggregationReportMode {
            report_aggregates_only: value,
            display_aggregates_only: value,
        });
        self
    }

    pub fn display_aggregates_only(&mut self, value: bool) -> &mut Self {
        let mode = self.aggregation_report_mode.get_or_insert_with(Default::default);
        mode.display_aggregates_only = value;
        self
    }

    /// Measure whole-process CPU time instead of summed thread CPU time.
    pub fn measure_process_cpu_time(&mut self) -> &mut Self {
        self.measure_process_cpu_time = true;
        self
    }

    pub fn use_real_time(&mut self) -> &mut Self {
        assert!(
            !self.use_manual_time,
            "use_real_time and use_manual_time are mutually exclusive"
        );
        self.use_real_time = true;
        self
    }

    pub fn use_manual_time(&mut self) -> &mut Self {
        assert!(
            !self.use_real_time,
            "use_real_time and use_manual_time are mutually exclusive"
        );
        self.use_manual_time = true;
        self
    }

    pub fn complexity(&mut self, complexity: Complexity) -> &mut Self {
        self.complexity = complexity;
        self
    }

    /// Fit against a user-provided curve.
    pub fn complexity_with(&mut self, f: fn(i64) -> f64) -> &mut Self {
        self.complexity = Complexity::Lambda(f);
        self
    }

    /// Add a user statistic computed across repetitions.
    pub fn compute_statistics(&mut self, name: impl Into<String>, f: StatisticsFn) -> &mut Self {
        self.statistics.push(Statistics {
            name: name.into(),
            compute: f,
        });
        self
    }

    pub fn statistics(&self) -> &[Statistics] {
        &self.statistics
    }
}

fn add_range(dst: &mut Vec<i64>, lo: i64, hi: i64, mult: i64) {
    assert!(lo >= 0, "range start must be non-negative");
    assert!(hi >= lo, "range must be non-empty");
    assert!(mult >= 2, "range multiplier must be at least 2");
    dst.push(lo);
    let mut i: i64 = 1;
    while i < i64::MAX / mult {
        if i >= hi {
            break;
        }
        if i > lo {
            dst.push(i);
        }
        i *= mult;
    }
    if hi != lo {
        dst.push(hi);
    }
}

/// Multiplicatively spaced values in `[lo, hi]`.
pub fn create_range(lo: i64, hi: i64, mult: i64) -> Vec<i64> {
    let mut out = Vec::new();
    add_range(&mut out, lo, hi, mult);
    out
}

/// Every `step`th value in `[start, limit]`.
pub fn create_dense_range(start: i64, limit: i64, step: i64) -> Vec<i64> {
    assert!(start <= limit, "range must be non-empty");
    assert!(step > 0, "step must be positive");
    let mut out = Vec::new();
    let mut arg = start;
    while arg <= limit {
        out.push(arg);
        arg += step;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut State) {}

    #[test]
    fn default_statistics_present() {
        let b = Benchmark::new("bm", noop);
        let names: Vec<&str> = b.statistics().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["mean", "median", "stddev"]);
    }

    #[test]
    fn range_is_multiplicative() {
        let mut b = Benchmark::new("bm", noop);
        b.range_multiplier(2).range(1, 8);
        let args: Vec<i64> = b.args.iter().map(|a| a[0]).collect();
        assert_eq!(args, [1, 2, 4, 8]);
    }

    #[test]
    fn range_includes_unaligned_limit() {
        assert_eq!(create_range(1, 10, 2), vec![1, 2, 4, 8, 10]);
    }

    #[test]
    fn dense_range_steps() {
        assert_eq!(create_dense_range(0, 10, 5), vec![0, 5, 10]);
    }

    #[test]
    fn args_product_covers_grid() {
        let mut b = Benchmark::new("bm", noop);
        b.args_product(&[vec![1, 2], vec![10, 20, 30]]);
        assert_eq!(b.args.len(), 6);
        assert!(b.args.contains(&vec![2, 30]));
        assert!(b.args.contains(&vec![1, 10]));
    }

    #[test]
    fn thread_range_doubles() {
        let mut b = Benchmark::new("bm", noop);
        b.thread_range(1, 8);
        assert_eq!(b.thread_counts, [1, 2, 4, 8]);
    }

    #[test]
    fn dense_thread_range_includes_max() {
        let mut b = Benchmark::new("bm", noop);
        b.dense_thread_range(1, 6, 2);
        assert_eq!(b.thread_counts, [1, 3, 5, 6]);
    }

    #[test]
    fn report_aggregates_only_overwrites_the_mode() {
        let mut b = Benchmark::new("bm", noop);
        b.display_aggregates_only(true).report_aggregates_only(false);
        let mode = b.aggregation_report_mode.unwrap();
        assert!(!mode.display_aggregates_only);
        assert!(!mode.report_aggregates_only);

        let mut b = Benchmark::new("bm", noop);
        b.report_aggregates_only(true);
        let mode = b.aggregation_report_mode.unwrap();
        assert!(mode.display_aggregates_only);
        assert!(mode.report_aggregates_only);
    }

    #[test]
    #[should_panic(expected = "mutually exclusive")]
    fn min_time_conflicts_with_iterations() {
        let mut b = Benchmark::new("bm", noop);
        b.iterations(10).min_time(0.5);
    }

    #[test]
    #[should_panic(expected = "mutually exclusive")]
    fn real_time_conflicts_with_manual_time() {
        let mut b = Benchmark::new("bm", noop);
        b.use_manual_time().use_real_time();
    }

    #[test]
    #[should_panic(expected = "same arity")]
    fn mixed_arity_rejected() {
        let mut b = Benchmark::new("bm", noop);
        b.args(&[1, 2]).arg(3);
    }

    #[test]
    fn stddev_is_bessel_corrected() {
        assert_eq!(statistics_stddev(&[2.0]), 0.0);
        let sd = statistics_stddev(&[1.0, 2.0, 3.0, 4.0]);
        assert!((sd - 1.2909944487).abs() < 1e-9);
    }

    #[test]
    fn median_of_even_count_averages_middles() {
        assert_eq!(statistics_median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(statistics_median(&[5.0, 1.0, 3.0]), 3.0);
    }
}
