//! Console reporter: the tabular, optionally colored display output.

use std::io::{IsTerminal, Write};

use pulsebench_core::{Counter, CounterUnit, Run, TimeUnit};

use crate::{Context, Reporter};

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";

/// Whether stdout is a terminal that plausibly understands ANSI colors.
pub fn is_color_terminal() -> bool {
    if !std::io::stdout().is_terminal() {
        return false;
    }
    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => false,
    }
}

/// Tabular reporter writing to an arbitrary stream (stdout by default).
pub struct ConsoleReporter {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    color: bool,
    tabular: bool,
    name_field_width: usize,
    printed_header: bool,
}

impl ConsoleReporter {
    pub fn new(out: Box<dyn Write + Send>, color: bool, tabular: bool) -> Self {
        Self {
            out,
            err: Box::new(std::io::stderr()),
            color,
            tabular,
            name_field_width: 10,
            printed_header: false,
        }
    }

    pub fn stdout(color: bool, tabular: bool) -> Self {
        Self::new(Box::new(std::io::stdout()), color, tabular)
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.color {
            format!("{code}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn print_header(&mut self, first: &Run) {
        let mut header = format!(
            "{:<width$} {:>13} {:>13} {:>10}",
            "Benchmark",
            "Time",
            "CPU",
            "Iterations",
            width = self.name_field_width
        );
        if self.tabular {
            for name in first.counters.keys() {
                header.push_str(&format!(" {name:>12}"));
            }
        }
        let rule = "-".repeat(header.len());
        let _ = writeln!(self.out, "{rule}");
        let _ = writeln!(self.out, "{header}");
        let _ = writeln!(self.out, "{rule}");
    }

    fn print_run(&mut self, run: &Run) {
        let name = self.paint(GREEN, &format!(
            "{:<width$}",
            run.benchmark_name(),
            width = self.name_field_width
        ));
        let _ = write!(self.out, "{name}");

        if run.error_occurred {
            let msg = self.paint(RED, &format!("ERROR OCCURRED: '{}'", run.error_message));
            let _ = writeln!(self.out, " {msg}");
            return;
        }

        let (real, cpu) = if run.report_big_o {
            let big_o = run.report_label.as_str();
            (
                format!("{:10.2} {}", run.real_accumulated_time, big_o),
                format!("{:10.2} {}", run.cpu_accumulated_time, big_o),
            )
        } else if run.report_rms {
            (
                format!("{:10.0} %", run.real_accumulated_time * 100.0),
                format!("{:10.0} %", run.cpu_accumulated_time * 100.0),
            )
        } else {
            let unit = run.time_unit.suffix();
            (
                format!("{} {}", format_time(run.adjusted_real_time()), unit),
                format!("{} {}", format_time(run.adjusted_cpu_time()), unit),
            )
        };
        let real = self.paint(YELLOW, &real);
        let cpu = self.paint(YELLOW, &cpu);
        let _ = write!(self.out, " {real} {cpu}");

        if run.iterations != 0 {
            let iters = self.paint(CYAN, &format!("{:>10}", run.iterations));
            let _ = write!(self.out, " {iters}");
        } else if !run.report_big_o && !run.report_rms {
            let _ = write!(self.out, " {:>10}", "");
        }

        if self.tabular {
            let values: Vec<String> = run
                .counters
                .values()
                .map(|c| format!("{:>12}", format_counter(c, run.time_unit)))
                .collect();
            for v in values {
                let _ = write!(self.out, " {v}");
            }
        } else {
            let parts: Vec<String> = run
                .counters
                .iter()
                .map(|(name, c)| format!("{name}={}", format_counter(c, run.time_unit)))
                .collect();
            for part in parts {
                let _ = write!(self.out, " {part}");
            }
        }

        if !run.bytes_per_second.is_nan() && run.bytes_per_second > 0.0 {
            let _ = write!(self.out, " {}/s", human_readable(run.bytes_per_second, 1024.0));
        }
        if run.items_per_second > 0.0 {
            let _ = write!(
                self.out,
                " {} items/s",
                human_readable(run.items_per_second, 1000.0)
            );
        }
        if !run.report_label.is_empty() && !run.report_big_o {
            let _ = write!(self.out, " {}", run.report_label);
        }
        let _ = writeln!(self.out);
    }
}

impl Reporter for ConsoleReporter {
    fn report_context(&mut self, context: &Context) -> bool {
        self.name_field_width = context.name_field_width;
        self.printed_header = false;
        print_basic_context(&mut self.err, context);
        true
    }

    fn report_runs(&mut self, runs: &[Run]) {
        if runs.is_empty() {
            return;
        }
        if !self.printed_header {
            self.printed_header = true;
            self.print_header(&runs[0]);
        }
        for run in runs {
            self.print_run(run);
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

/// The context block printed above the result table.
pub(crate) fn print_basic_context(out: &mut dyn Write, context: &Context) {
    let _ = writeln!(out, "{}", context.date);
    let _ = writeln!(out, "Running {}", context.executable_name);
    let _ = writeln!(
        out,
        "Run on {} ({} X {:.0} MHz CPU s)",
        context.host_name, context.num_cpus, context.mhz_per_cpu
    );
    if !context.caches.is_empty() {
        let _ = writeln!(out, "CPU Caches:");
        for cache in &context.caches {
            let _ = writeln!(
                out,
                "  L{} {} {} KiB (x{})",
                cache.level,
                cache.typ,
                cache.size / 1024,
                cache.num_sharing
            );
        }
    }
    if !context.load_avg.is_empty() {
        let loads: Vec<String> = context.load_avg.iter().map(|l| format!("{l:.2}")).collect();
        let _ = writeln!(out, "Load Average: {}", loads.join(", "));
    }
    for (key, value) in &context.extra {
        let _ = writeln!(out, "{key}: {value}");
    }
    if context.cpu_scaling_enabled {
        let _ = writeln!(
            out,
            "***WARNING*** CPU scaling is enabled, the benchmark real time measurements may be noisy and will incur extra overhead."
        );
    }
    if context.library_build_type == "debug" {
        let _ = writeln!(
            out,
            "***WARNING*** Library was built as DEBUG. Timings may be affected."
        );
    }
}

/// Right-aligned time with precision scaled to magnitude.
pub(crate) fn format_time(value: f64) -> String {
    if value < 1.0 {
        format!("{value:10.3}")
    } else if value < 10.0 {
        format!("{value:10.2}")
    } else if value < 100.0 {
        format!("{value:10.1}")
    } else {
        format!("{value:10.0}")
    }
}

/// `1.5k` / `2.3M` style humanization.
pub(crate) fn human_readable(value: f64, base: f64) -> String {
    const SUFFIXES: [&str; 5] = ["", "k", "M", "G", "T"];
    let mut value = value;
    let mut suffix = 0;
    while value.abs() >= base && suffix + 1 < SUFFIXES.len() {
        value /= base;
        suffix += 1;
    }
    if suffix == 0 && value == value.trunc() {
        format!("{value:.0}")
    } else {
        format!("{:.4}{}", value, SUFFIXES[suffix])
    }
}

fn format_counter(c: &Counter, unit: TimeUnit) -> String {
    if c.unit == CounterUnit::Time {
        format!("{}{}", format_time(c.value * unit.multiplier()).trim_start(), unit.suffix())
    } else if c.is_percentage() {
        format!("{:.2}%", c.value * 100.0)
    } else if c.is_rate() {
        format!("{}/s", human_readable(c.value, 1000.0))
    } else {
        human_readable(c.value, 1000.0)
    }
}
