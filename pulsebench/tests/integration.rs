//! End-to-end tests for the harness: registry filtering, the driver
//! loop, aggregation and error propagation, all through the public API.

use std::io::Write;
use std::sync::{Arc, Mutex};

use pulsebench::{
    run_benchmarks, Benchmark, Complexity, Context, Counter, Flags, Registry, Reporter, Run,
    RunType, State,
};

/// In-memory byte sink usable as a reporter stream.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Reporter that records every batch it receives.
struct TestReporter {
    contexts: usize,
    batches: Vec<Vec<Run>>,
    out: SharedBuf,
    err: SharedBuf,
}

impl TestReporter {
    fn new() -> Self {
        Self {
            contexts: 0,
            batches: Vec::new(),
            out: SharedBuf::default(),
            err: SharedBuf::default(),
        }
    }

    fn all_runs(&self) -> Vec<&Run> {
        self.batches.iter().flatten().collect()
    }
}

impl Reporter for TestReporter {
    fn report_context(&mut self, _context: &Context) -> bool {
        self.contexts += 1;
        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        self.batches.push(runs.to_vec());
    }

    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    fn error_output(&mut self) -> &mut dyn Write {
        &mut self.err
    }
}

fn trivial(state: &mut State) {
    while state.keep_running() {
        std::hint::black_box(1 + 1);
    }
}

fn register_fast(registry: &mut Registry, name: &str) {
    let mut b = Benchmark::new(name, trivial);
    b.iterations(10);
    registry.register(b);
}

fn list_flags(filter: &str) -> Flags {
    let mut flags = Flags::default();
    flags.benchmark_filter = filter.to_string();
    flags.benchmark_list_tests = true;
    flags
}

#[test]
fn filter_narrows_to_matching_names() {
    let mut registry = Registry::new();
    for name in ["NoPrefix", "BM_Foo", "BM_Bar", "BM_FooBar", "BM_FooBa"] {
        register_fast(&mut registry, name);
    }
    let mut reporter = TestReporter::new();
    let count = run_benchmarks(&registry, &list_flags("BM_Foo"), &mut reporter, None);
    assert_eq!(count, 3);
    let out_text = reporter.out.text();
    let lines: Vec<&str> = out_text.lines().map(str::trim).collect();
    assert_eq!(lines, ["BM_Foo", "BM_FooBar", "BM_FooBa"]);
    assert!(
        reporter.batches.is_empty(),
        "list-only mode must not report runs"
    );
}

#[test]
fn negative_filter_inverts_the_match() {
    let mut registry = Registry::new();
    for name in ["NoPrefix", "BM_Foo", "BM_Bar"] {
        register_fast(&mut registry, name);
    }
    let mut reporter = TestReporter::new();
    let count = run_benchmarks(&registry, &list_flags("-BM_"), &mut reporter, None);
    assert_eq!(count, 1);
    assert_eq!(reporter.out.text().trim(), "NoPrefix");
}

#[test]
fn family_indices_are_dense_across_runs() {
    let mut registry = Registry::new();
    for name in ["NoPrefix", "BM_Foo", "BM_Bar", "BM_FooBar", "BM_FooBa"] {
        register_fast(&mut registry, name);
    }
    let mut reporter = TestReporter::new();
    let mut flags = Flags::default();
    flags.benchmark_filter = "BM_Foo".to_string();
    let count = run_benchmarks(&registry, &flags, &mut reporter, None);
    assert_eq!(count, 3);
    assert_eq!(reporter.contexts, 1);
    let indices: Vec<usize> = reporter.all_runs().iter().map(|r| r.family_index).collect();
    assert_eq!(indices, [0, 1, 2]);
}

#[test]
fn bad_filter_reports_zero_instances() {
    let mut registry = Registry::new();
    register_fast(&mut registry, "bm_one");
    let mut reporter = TestReporter::new();
    let mut flags = Flags::default();
    flags.benchmark_filter = "*oops".to_string();
    let count = run_benchmarks(&registry, &flags, &mut reporter, None);
    assert_eq!(count, 0);
    assert!(reporter.err.text().contains("could not compile"));
    assert!(reporter.batches.is_empty());
}

#[test]
fn empty_and_all_specs_match_everything() {
    let mut registry = Registry::new();
    register_fast(&mut registry, "bm_a");
    register_fast(&mut registry, "bm_b");
    for spec in ["", "all"] {
        let mut reporter = TestReporter::new();
        let count = run_benchmarks(&registry, &list_flags(spec), &mut reporter, None);
        assert_eq!(count, 2, "spec {spec:?}");
    }
}

#[test]
fn repetitions_produce_sorted_aggregates() {
    let mut registry = Registry::new();
    register_fast(&mut registry, "bm_rep");
    let mut reporter = TestReporter::new();
    let mut flags = Flags::default();
    flags.benchmark_repetitions = 3;
    run_benchmarks(&registry, &flags, &mut reporter, None);

    assert_eq!(reporter.batches.len(), 2);
    let measurements = &reporter.batches[0];
    assert_eq!(measurements.len(), 3);
    let indices: Vec<Option<usize>> = measurements.iter().map(|r| r.repetition_index).collect();
    assert_eq!(indices, [Some(0), Some(1), Some(2)]);
    assert!(measurements.iter().all(|r| r.run_type == RunType::Iteration));
    assert!(measurements.iter().all(|r| r.repetitions == 3));

    let aggregates = &reporter.batches[1];
    let names: Vec<String> = aggregates.iter().map(|r| r.benchmark_name()).collect();
    assert_eq!(names, ["bm_rep_mean", "bm_rep_median", "bm_rep_stddev"]);
    assert!(aggregates
        .iter()
        .all(|r| r.family_index == measurements[0].family_index));
}

#[test]
fn report_aggregates_only_suppresses_measurements() {
    let mut registry = Registry::new();
    register_fast(&mut registry, "bm_agg");
    let mut reporter = TestReporter::new();
    let mut flags = Flags::default();
    flags.benchmark_repetitions = 3;
    flags.benchmark_report_aggregates_only = true;
    run_benchmarks(&registry, &flags, &mut reporter, None);
    assert_eq!(reporter.batches.len(), 1);
    assert!(reporter.batches[0]
        .iter()
        .all(|r| r.run_type == RunType::Aggregate));
}

#[test]
fn random_interleaving_reports_each_runner_once_after_last_ticket() {
    std::env::set_var("BENCHMARK_SHUFFLE_SEED", "7");
    let mut registry = Registry::new();
    register_fast(&mut registry, "bm_ia");
    register_fast(&mut registry, "bm_ib");
    let mut reporter = TestReporter::new();
    let mut flags = Flags::default();
    flags.benchmark_repetitions = 3;
    flags.benchmark_enable_random_interleaving = true;
    let count = run_benchmarks(&registry, &flags, &mut reporter, None);
    assert_eq!(count, 2);

    // One measurement batch and one aggregate batch per instance, each
    // measurement batch complete: a runner reports only after its last
    // ticket, however the tickets were interleaved.
    let measurement_batches: Vec<&Vec<Run>> = reporter
        .batches
        .iter()
        .filter(|b| b[0].run_type == RunType::Iteration)
        .collect();
    assert_eq!(measurement_batches.len(), 2);
    for batch in measurement_batches {
        assert_eq!(batch.len(), 3);
        let name = &batch[0].run_name;
        assert!(batch.iter().all(|r| &r.run_name == name));
        let mut indices: Vec<usize> = batch.iter().filter_map(|r| r.repetition_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, [0, 1, 2]);
    }
}

#[test]
fn skip_with_error_stops_all_threads_and_reports_once() {
    fn failing(state: &mut State) {
        let mut first = true;
        while state.keep_running() {
            if first && state.thread_index() == 0 {
                first = false;
                state.skip_with_error("x");
            }
        }
    }
    let mut registry = Registry::new();
    let mut b = Benchmark::new("bm_fail", failing);
    b.iterations(10_000_000).threads(4);
    registry.register(b);

    let mut reporter = TestReporter::new();
    run_benchmarks(&registry, &Flags::default(), &mut reporter, None);

    let runs = reporter.all_runs();
    assert_eq!(runs.len(), 1);
    assert!(runs[0].error_occurred);
    assert_eq!(runs[0].error_message, "x");
    // The shared error flag stops the sibling threads well before they
    // burn their full budget.
    assert!(runs[0].iterations < 4 * 10_000_000);
}

#[test]
fn paused_sections_are_excluded_from_real_time() {
    fn pausing(state: &mut State) {
        while state.keep_running() {
            state.pause_timing();
            std::thread::sleep(std::time::Duration::from_millis(20));
            state.resume_timing();
            std::hint::black_box(2 + 2);
        }
    }
    let mut registry = Registry::new();
    let mut b = Benchmark::new("bm_pause", pausing);
    b.iterations(3).use_real_time();
    registry.register(b);

    let mut reporter = TestReporter::new();
    run_benchmarks(&registry, &Flags::default(), &mut reporter, None);

    let runs = reporter.all_runs();
    assert_eq!(runs.len(), 1);
    // Three 20ms sleeps happened inside pauses; none of it may appear.
    assert!(
        runs[0].real_accumulated_time < 0.03,
        "paused time leaked into the measurement: {}s",
        runs[0].real_accumulated_time
    );
}

#[test]
fn complexity_family_emits_big_o_and_rms_once_complete() {
    fn scaled(state: &mut State) {
        let n = state.range(0);
        while state.keep_running() {
            state.set_iteration_time(n as f64 * 1e-5);
        }
    }
    let mut registry = Registry::new();
    let mut b = Benchmark::new("bm_linear", scaled);
    b.arg(16)
        .arg(64)
        .arg(256)
        .arg(1024)
        .iterations(4)
        .use_manual_time()
        .complexity(Complexity::ON);
    registry.register(b);

    let mut reporter = TestReporter::new();
    let count = run_benchmarks(&registry, &Flags::default(), &mut reporter, None);
    assert_eq!(count, 4);

    let all = reporter.all_runs();
    let big_o = all
        .iter()
        .find(|r| r.aggregate_name == "BigO")
        .expect("BigO run emitted after the family completed");
    assert!(big_o.report_big_o);
    assert_eq!(big_o.run_name, "bm_linear");
    assert_eq!(big_o.report_label, "N");
    // Manual time was exactly n * 1e-5 per iteration.
    assert!((big_o.real_accumulated_time - 1e-5).abs() < 1e-8);

    let rms = all
        .iter()
        .find(|r| r.aggregate_name == "RMS")
        .expect("RMS run emitted alongside BigO");
    assert!(rms.report_rms);
    assert!(rms.real_accumulated_time < 1e-3);

    // The fit rides on the last instance's aggregate batch.
    let last = reporter.batches.last().unwrap();
    assert!(last.iter().any(|r| r.aggregate_name == "BigO"));
}

#[test]
fn json_reporter_documents_the_whole_run() {
    let mut registry = Registry::new();
    register_fast(&mut registry, "bm_json");
    let buf = SharedBuf::default();
    let mut reporter = pulsebench::JsonReporter::new(Box::new(buf.clone()));
    let mut flags = Flags::default();
    flags.benchmark_repetitions = 2;
    let count = run_benchmarks(&registry, &flags, &mut reporter, None);
    assert_eq!(count, 1);

    let doc: serde_json::Value = serde_json::from_str(&buf.text()).unwrap();
    assert!(doc["context"]["num_cpus"].as_u64().unwrap() >= 1);
    let benchmarks = doc["benchmarks"].as_array().unwrap();
    // Two repetitions plus mean/median/stddev.
    assert_eq!(benchmarks.len(), 5);
    assert_eq!(benchmarks[0]["name"], "bm_json");
    assert_eq!(benchmarks[0]["run_type"], "iteration");
    assert_eq!(benchmarks[0]["repetition_index"], 0);
    assert_eq!(benchmarks[2]["run_type"], "aggregate");
    assert_eq!(benchmarks[2]["aggregate_name"], "mean");
    assert_eq!(benchmarks[2]["name"], "bm_json_mean");
}

#[test]
fn counters_flow_to_reported_runs() {
    fn counted(state: &mut State) {
        let mut ops = 0.0;
        while state.keep_running() {
            ops += 1.0;
        }
        state
            .counters
            .insert("ops".into(), Counter::new(ops, Counter::AVG_ITERATIONS));
    }
    let mut registry = Registry::new();
    let mut b = Benchmark::new("bm_ops", counted);
    b.iterations(32);
    registry.register(b);

    let mut reporter = TestReporter::new();
    run_benchmarks(&registry, &Flags::default(), &mut reporter, None);
    let runs = reporter.all_runs();
    assert!((runs[0].counters["ops"].value - 1.0).abs() < 1e-12);
}
