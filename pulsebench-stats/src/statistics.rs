//! Aggregate runs across the repetitions of one instance.

use pulsebench_core::{Counter, Counters, Run, RunType, Statistics};

/// Compute one synthetic run per statistic descriptor over a set of
/// repetition runs.
///
/// Statistics fold per-iteration values: real time, CPU time, byte and
/// item rates, and every user counter. Errored repetitions are excluded
/// from the folds; fewer than two clean repetitions produce no
/// aggregates at all.
pub fn aggregate_runs(reports: &[Run], statistics: &[Statistics]) -> Vec<Run> {
    let clean: Vec<&Run> = reports.iter().filter(|r| !r.error_occurred).collect();
    if clean.len() < 2 {
        return Vec::new();
    }
    let first = clean[0];

    let real_times: Vec<f64> = clean.iter().map(|r| r.real_seconds_per_iteration()).collect();
    let cpu_times: Vec<f64> = clean.iter().map(|r| r.cpu_seconds_per_iteration()).collect();
    let bytes_rates: Vec<f64> = clean.iter().map(|r| r.bytes_per_second).collect();
    let items_rates: Vec<f64> = clean.iter().map(|r| r.items_per_second).collect();

    // Union of counter names; a counter missing from some repetition
    // contributes only the values it actually has. Flags and unit come
    // from the first sighting.
    let mut counter_samples: std::collections::BTreeMap<String, (Counter, Vec<f64>)> =
        std::collections::BTreeMap::new();
    for run in &clean {
        for (name, counter) in &run.counters {
            counter_samples
                .entry(name.clone())
                .or_insert_with(|| (*counter, Vec::new()))
                .1
                .push(counter.value);
        }
    }

    // A label is kept only when every repetition agrees on it.
    let label = if clean.iter().all(|r| r.report_label == first.report_label) {
        first.report_label.clone()
    } else {
        String::new()
    };

    let mut aggregates = Vec::with_capacity(statistics.len());
    for stat in statistics {
        let mut counters = Counters::new();
        for (name, (prototype, values)) in &counter_samples {
            let mut folded = *prototype;
            folded.value = (stat.compute)(values);
            counters.insert(name.clone(), folded);
        }
        aggregates.push(Run {
            run_name: first.run_name.clone(),
            family_index: first.family_index,
            per_family_instance_index: first.per_family_instance_index,
            run_type: RunType::Aggregate,
            aggregate_name: stat.name.clone(),
            repetitions: first.repetitions,
            repetition_index: None,
            threads: first.threads,
            // Aggregate time fields are already per-iteration.
            iterations: 0,
            real_accumulated_time: (stat.compute)(&real_times),
            cpu_accumulated_time: (stat.compute)(&cpu_times),
            time_unit: first.time_unit,
            bytes_per_second: (stat.compute)(&bytes_rates),
            items_per_second: (stat.compute)(&items_rates),
            counters,
            report_label: label.clone(),
            ..Run::default()
        });
    }
    aggregates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsebench_core::{statistics_mean, statistics_median, statistics_stddev, TimeUnit};

    fn default_statistics() -> Vec<Statistics> {
        vec![
            Statistics {
                name: "mean".into(),
                compute: statistics_mean,
            },
            Statistics {
                name: "median".into(),
                compute: statistics_median,
            },
            Statistics {
                name: "stddev".into(),
                compute: statistics_stddev,
            },
        ]
    }

    fn repetition(index: usize, real_seconds: f64) -> Run {
        Run {
            run_name: "bm_stat/8".into(),
            repetitions: 3,
            repetition_index: Some(index),
            iterations: 100,
            real_accumulated_time: real_seconds * 100.0,
            cpu_accumulated_time: real_seconds * 100.0,
            time_unit: TimeUnit::Nanosecond,
            ..Run::default()
        }
    }

    #[test]
    fn equal_runs_collapse_to_the_value() {
        let reports = vec![repetition(0, 2e-6), repetition(1, 2e-6), repetition(2, 2e-6)];
        let aggregates = aggregate_runs(&reports, &default_statistics());
        assert_eq!(aggregates.len(), 3);
        let names: Vec<String> = aggregates.iter().map(|r| r.benchmark_name()).collect();
        assert_eq!(
            names,
            ["bm_stat/8_mean", "bm_stat/8_median", "bm_stat/8_stddev"]
        );
        assert!((aggregates[0].real_accumulated_time - 2e-6).abs() < 1e-15);
        assert!((aggregates[1].real_accumulated_time - 2e-6).abs() < 1e-15);
        assert!(aggregates[2].real_accumulated_time.abs() < 1e-15);
    }

    #[test]
    fn aggregates_are_per_iteration_records() {
        let reports = vec![repetition(0, 1e-6), repetition(1, 3e-6)];
        let aggregates = aggregate_runs(&reports, &default_statistics());
        let mean = &aggregates[0];
        assert_eq!(mean.iterations, 0);
        assert_eq!(mean.run_type, RunType::Aggregate);
        assert_eq!(mean.repetition_index, None);
        assert!((mean.real_accumulated_time - 2e-6).abs() < 1e-15);
    }

    #[test]
    fn single_run_produces_no_aggregates() {
        let reports = vec![repetition(0, 1e-6)];
        assert!(aggregate_runs(&reports, &default_statistics()).is_empty());
    }

    #[test]
    fn errored_repetitions_are_excluded() {
        let mut bad = repetition(1, 9e-6);
        bad.error_occurred = true;
        let reports = vec![repetition(0, 2e-6), bad, repetition(2, 2e-6)];
        let aggregates = aggregate_runs(&reports, &default_statistics());
        assert!((aggregates[0].real_accumulated_time - 2e-6).abs() < 1e-15);
    }

    #[test]
    fn user_statistic_folds_every_metric() {
        fn max_stat(v: &[f64]) -> f64 {
            v.iter().cloned().fold(f64::MIN, f64::max)
        }
        let stats = vec![Statistics {
            name: "max".into(),
            compute: max_stat,
        }];
        let mut fast = repetition(0, 1e-6);
        fast.bytes_per_second = 100.0;
        let mut slow = repetition(1, 5e-6);
        slow.bytes_per_second = 40.0;
        let aggregates = aggregate_runs(&[fast, slow], &stats);
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].aggregate_name, "max");
        assert!((aggregates[0].real_accumulated_time - 5e-6).abs() < 1e-15);
        assert!((aggregates[0].bytes_per_second - 100.0).abs() < 1e-12);
    }

    #[test]
    fn counters_fold_with_flags_preserved() {
        let mut a = repetition(0, 1e-6);
        a.counters
            .insert("ops".into(), Counter::new(10.0, Counter::RATE));
        let mut b = repetition(1, 1e-6);
        b.counters
            .insert("ops".into(), Counter::new(30.0, Counter::RATE));
        let aggregates = aggregate_runs(&[a, b], &default_statistics());
        let mean_ops = &aggregates[0].counters["ops"];
        assert!((mean_ops.value - 20.0).abs() < 1e-12);
        assert_eq!(mean_ops.flags, Counter::RATE);
    }

    #[test]
    fn disagreeing_labels_are_dropped() {
        let mut a = repetition(0, 1e-6);
        a.report_label = "x".into();
        let mut b = repetition(1, 1e-6);
        b.report_label = "y".into();
        let aggregates = aggregate_runs(&[a, b], &default_statistics());
        assert!(aggregates[0].report_label.is_empty());
    }
}
