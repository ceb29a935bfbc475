//! A benchmark instance: one (family, args, threads) binding.

use std::sync::Arc;

use crate::benchmark::{
    AggregationReportMode, Benchmark, Complexity, Statistics, TimeUnit,
};
use crate::state::State;

/// One concrete, immutable point of a family's args × threads grid.
#[derive(Clone, Debug)]
pub struct BenchmarkInstance {
    family: Arc<Benchmark>,
    family_index: usize,
    per_family_instance_index: usize,
    args: Vec<i64>,
    threads: usize,
    name: String,
}

impl BenchmarkInstance {
    pub(crate) fn new(
        family: Arc<Benchmark>,
        family_index: usize,
        per_family_instance_index: usize,
        args: Vec<i64>,
        threads: usize,
    ) -> Self {
        let name = render_name(&family, &args, threads);
        Self {
            family,
            family_index,
            per_family_instance_index,
            args,
            threads,
            name,
        }
    }

    /// Canonical instance name:
    /// `family[/arg|/arg_name:arg...][/threads:n]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family_index(&self) -> usize {
        self.family_index
    }

    pub fn per_family_instance_index(&self) -> usize {
        self.per_family_instance_index
    }

    pub fn args(&self) -> &[i64] {
        &self.args
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.family.time_unit
    }

    pub fn min_time(&self) -> f64 {
        self.family.min_time
    }

    pub fn fixed_iterations(&self) -> u64 {
        self.family.iterations
    }

    pub fn repetitions(&self) -> usize {
        self.family.repetitions
    }

    pub fn use_real_time(&self) -> bool {
        self.family.use_real_time
    }

    pub fn use_manual_time(&self) -> bool {
        self.family.use_manual_time
    }

    pub fn measure_process_cpu_time(&self) -> bool {
        self.family.measure_process_cpu_time
    }

    pub fn aggregation_report_mode(&self) -> Option<AggregationReportMode> {
        self.family.aggregation_report_mode
    }

    pub fn complexity(&self) -> Complexity {
        self.family.complexity
    }

    pub fn statistics(&self) -> &[Statistics] {
        self.family.statistics()
    }

    /// Invoke the family body with this thread's state.
    pub fn run(&self, state: &mut State) {
        self.family.run(state);
    }
}

fn render_name(family: &Benchmark, args: &[i64], threads: usize) -> String {
    let mut name = family.name.clone();
    for (i, arg) in args.iter().enumerate() {
        name.push('/');
        match family.arg_names.get(i).filter(|n| !n.is_empty()) {
            Some(arg_name) => {
                name.push_str(arg_name);
                name.push(':');
                name.push_str(&arg.to_string());
            }
            None => name.push_str(&arg.to_string()),
        }
    }
    // The threads suffix appears only when the family asked for explicit
    // thread counts.
    if !family.thread_counts.is_empty() {
        name.push_str("/threads:");
        name.push_str(&threads.to_string());
    }
    name
}
