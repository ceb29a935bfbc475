//! JSON reporter: one document with `context` and `benchmarks`.

use std::io::Write;

use pulsebench_core::{Run, RunType};
use serde_json::{json, Map, Value};

use crate::{Context, Reporter};

/// Accumulates rows and writes the whole document on finalize, so the
/// output is a single well-formed object regardless of how many
/// `report_runs` batches arrive.
pub struct JsonReporter {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    context: Value,
    benchmarks: Vec<Value>,
}

impl JsonReporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            err: Box::new(std::io::stderr()),
            context: Value::Null,
            benchmarks: Vec::new(),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl Reporter for JsonReporter {
    fn report_context(&mut self, context: &Context) -> bool {
        let mut ctx = Map::new();
        ctx.insert("date".into(), json!(context.date));
        ctx.insert("executable".into(), json!(context.executable_name));
        ctx.insert("host_name".into(), json!(context.host_name));
        ctx.insert("num_cpus".into(), json!(context.num_cpus));
        ctx.insert("mhz_per_cpu".into(), json!(context.mhz_per_cpu));
        ctx.insert(
            "cpu_scaling_enabled".into(),
            json!(context.cpu_scaling_enabled),
        );
        ctx.insert(
            "caches".into(),
            Value::Array(
                context
                    .caches
                    .iter()
                    .map(|c| {
                        json!({
                            "type": c.typ,
                            "level": c.level,
                            "size": c.size,
                            "num_sharing": c.num_sharing,
                        })
                    })
                    .collect(),
            ),
        );
        ctx.insert("load_avg".into(), json!(context.load_avg));
        ctx.insert(
            "library_build_type".into(),
            json!(context.library_build_type),
        );
        for (key, value) in &context.extra {
            ctx.insert(key.clone(), json!(value));
        }
        self.context = Value::Object(ctx);
        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        for run in runs {
            self.benchmarks.push(run_to_json(run));
        }
    }

    fn finalize(&mut self) {
        let document = json!({
            "context": self.context,
            "benchmarks": self.benchmarks,
        });
        if let Ok(text) = serde_json::to_string_pretty(&document) {
            let _ = writeln!(self.out, "{text}");
        }
        let _ = self.out.flush();
    }

    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    fn error_output(&mut self) -> &mut dyn Write {
        &mut self.err
    }
}

fn run_to_json(run: &Run) -> Value {
    let mut row = Map::new();
    row.insert("name".into(), json!(run.benchmark_name()));
    row.insert("family_index".into(), json!(run.family_index));
    row.insert(
        "per_family_instance_index".into(),
        json!(run.per_family_instance_index),
    );
    row.insert("run_name".into(), json!(run.run_name));
    match run.run_type {
        RunType::Iteration => {
            row.insert("run_type".into(), json!("iteration"));
        }
        RunType::Aggregate => {
            row.insert("run_type".into(), json!("aggregate"));
            row.insert("aggregate_name".into(), json!(run.aggregate_name));
        }
    }
    row.insert("repetitions".into(), json!(run.repetitions));
    if let Some(index) = run.repetition_index {
        row.insert("repetition_index".into(), json!(index));
    }
    row.insert("threads".into(), json!(run.threads));
    row.insert("iterations".into(), json!(run.iterations));
    row.insert("error_occurred".into(), json!(run.error_occurred));
    if run.error_occurred {
        row.insert("error_message".into(), json!(run.error_message));
        return Value::Object(row);
    }
    if run.report_big_o {
        row.insert("big_o".into(), json!(run.report_label));
    }
    row.insert("real_time".into(), json!(run.adjusted_real_time()));
    row.insert("cpu_time".into(), json!(run.adjusted_cpu_time()));
    row.insert("time_unit".into(), json!(run.time_unit.suffix()));
    if run.bytes_per_second > 0.0 {
        row.insert("bytes_per_second".into(), json!(run.bytes_per_second));
    }
    if run.items_per_second > 0.0 {
        row.insert("items_per_second".into(), json!(run.items_per_second));
    }
    if !run.report_label.is_empty() && !run.report_big_o {
        row.insert("label".into(), json!(run.report_label));
    }
    for (name, counter) in &run.counters {
        row.insert(name.clone(), json!(counter.value));
    }
    Value::Object(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulsebench_core::{Counter, TimeUnit};

    fn sample_run() -> Run {
        Run {
            run_name: "bm_json/16".into(),
            family_index: 2,
            per_family_instance_index: 1,
            repetitions: 3,
            repetition_index: Some(1),
            threads: 2,
            iterations: 500,
            real_accumulated_time: 1e-3,
            cpu_accumulated_time: 5e-4,
            time_unit: TimeUnit::Nanosecond,
            ..Run::default()
        }
    }

    #[test]
    fn iteration_row_has_stable_fields() {
        let row = run_to_json(&sample_run());
        assert_eq!(row["name"], "bm_json/16");
        assert_eq!(row["run_name"], "bm_json/16");
        assert_eq!(row["run_type"], "iteration");
        assert_eq!(row["family_index"], 2);
        assert_eq!(row["per_family_instance_index"], 1);
        assert_eq!(row["repetitions"], 3);
        assert_eq!(row["repetition_index"], 1);
        assert_eq!(row["threads"], 2);
        assert_eq!(row["iterations"], 500);
        assert_eq!(row["time_unit"], "ns");
        assert_eq!(row["error_occurred"], false);
        let real = row["real_time"].as_f64().unwrap();
        assert!((real - 2_000.0).abs() < 1e-9);
    }

    #[test]
    fn aggregate_row_names_its_statistic() {
        let mut run = sample_run();
        run.run_type = RunType::Aggregate;
        run.aggregate_name = "mean".into();
        run.repetition_index = None;
        let row = run_to_json(&run);
        assert_eq!(row["run_type"], "aggregate");
        assert_eq!(row["aggregate_name"], "mean");
        assert_eq!(row["name"], "bm_json/16_mean");
        assert!(row.get("repetition_index").is_none());
    }

    #[test]
    fn error_row_carries_message_and_no_times() {
        let mut run = sample_run();
        run.error_occurred = true;
        run.error_message = "x".into();
        let row = run_to_json(&run);
        assert_eq!(row["error_occurred"], true);
        assert_eq!(row["error_message"], "x");
        assert!(row.get("real_time").is_none());
    }

    #[test]
    fn counters_merge_into_the_row() {
        let mut run = sample_run();
        run.counters
            .insert("misses".into(), Counter::new(17.5, Counter::DEFAULTS));
        let row = run_to_json(&run);
        assert_eq!(row["misses"].as_f64().unwrap(), 17.5);
    }

    #[test]
    fn document_shape_is_context_plus_benchmarks() {
        #[derive(Clone, Default)]
        struct SharedBuf(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);
        impl Write for SharedBuf {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buf = SharedBuf::default();
        let mut reporter = JsonReporter::new(Box::new(buf.clone()));
        let context = Context::capture("bench_bin", 10);
        assert!(reporter.report_context(&context));
        reporter.report_runs(&[sample_run()]);
        reporter.finalize();

        let bytes = buf.0.lock().unwrap().clone();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["context"]["date"].is_string());
        assert_eq!(doc["context"]["executable"], "bench_bin");
        assert_eq!(doc["benchmarks"].as_array().unwrap().len(), 1);
    }
}
