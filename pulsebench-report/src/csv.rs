//! CSV reporter. Deprecated in favor of JSON but kept for spreadsheet
//! pipelines; the column set is fixed.

use std::io::Write;

use pulsebench_core::Run;

use crate::{Context, Reporter};

const HEADER: &str =
    "name,iterations,real_time,cpu_time,time_unit,bytes_per_second,items_per_second,label,error_occurred,error_message";

pub struct CsvReporter {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    printed_header: bool,
}

impl CsvReporter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            err: Box::new(std::io::stderr()),
            printed_header: false,
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

impl Reporter for CsvReporter {
    fn report_context(&mut self, context: &Context) -> bool {
        crate::console::print_basic_context(&mut self.err, context);
        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        if !self.printed_header {
            self.printed_header = true;
            let _ = writeln!(self.out, "{HEADER}");
        }
        for run in runs {
            let _ = writeln!(self.out, "{}", render_row(run));
        }
        let _ = self.out.flush();
    }

    fn finalize(&mut self) {
        let _ = self.out.flush();
    }

    fn output(&mut self) -> &mut dyn Write {
        &mut self.out
    }

    fn error_output(&mut self) -> &mut dyn Write {
        &mut self.err
    }
}

fn render_row(run: &Run) -> String {
    let mut fields: Vec<String> = Vec::with_capacity(10);
    fields.push(escape(&run.benchmark_name()));
    if run.error_occurred {
        // Metric columns stay empty on errors so the row still lines up.
        fields.extend(std::iter::repeat(String::new()).take(7));
        fields.push("true".into());
        fields.push(escape(&run.error_message));
        return fields.join(",");
    }
    fields.push(run.iterations.to_string());
    fields.push(format_value(run.adjusted_real_time()));
    fields.push(format_value(run.adjusted_cpu_time()));
    fields.push(run.time_unit.suffix().to_string());
    fields.push(if run.bytes_per_second > 0.0 {
        format_value(run.bytes_per_second)
    } else {
        String::new()
    });
    fields.push(if run.items_per_second > 0.0 {
        format_value(run.items_per_second)
    } else {
        String::new()
    });
    fields.push(escape(&run.report_label));
    fields.push("false".into());
    fields.push(String::new());
    fields.join(",")
}

fn format_value(v: f64) -> String {
    format!("{v}")
}

/// Quote a field when it contains a separator, quote or newline.
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
