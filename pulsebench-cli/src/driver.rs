//! The outer run loop: find instances, drive repetition tickets,
//! aggregate, report.

use std::collections::HashMap;
use std::io::Write;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use pulsebench_core::{
    BenchmarkInstance, BenchmarkRunner, Complexity, PerFamilyReports, Registry, RunResults,
    RunnerOptions,
};
use pulsebench_report::{
    add_custom_context, is_color_terminal, ConsoleReporter, Context, CsvReporter, JsonReporter,
    OutputFormat, Reporter,
};
use pulsebench_stats::{aggregate_runs, compute_big_o};

use crate::Flags;

/// Check flag values that clap cannot: format and color enumerations
/// and the context pair syntax. Invalid values print usage and exit 1
/// before anything runs.
pub(crate) fn validate_flags(flags: &Flags) {
    for format in [&flags.benchmark_format, &flags.benchmark_out_format] {
        if format.parse::<OutputFormat>().is_err() {
            print_usage_and_exit(&format!("unexpected format: '{format}'"));
        }
    }
    if flags.benchmark_color != "auto" && truthy(&flags.benchmark_color).is_none() {
        print_usage_and_exit(&format!(
            "unexpected --benchmark_color value: '{}'",
            flags.benchmark_color
        ));
    }
    for pair in context_pairs(&flags.benchmark_context) {
        if pair.is_err() {
            print_usage_and_exit("invalid --benchmark_context pair, expected key=value");
        }
    }
}

fn print_usage_and_exit(message: &str) -> ! {
    eprintln!("{message}");
    eprintln!(
        "pulsebench [--benchmark_list_tests={{true|false}}]\n\
         \x20         [--benchmark_filter=<regex>]\n\
         \x20         [--benchmark_min_time=<min_time>]\n\
         \x20         [--benchmark_repetitions=<num_repetitions>]\n\
         \x20         [--benchmark_enable_random_interleaving={{true|false}}]\n\
         \x20         [--benchmark_report_aggregates_only={{true|false}}]\n\
         \x20         [--benchmark_display_aggregates_only={{true|false}}]\n\
         \x20         [--benchmark_format=<console|json|csv>]\n\
         \x20         [--benchmark_out=<filename>]\n\
         \x20         [--benchmark_out_format=<json|console|csv>]\n\
         \x20         [--benchmark_color={{auto|true|false}}]\n\
         \x20         [--benchmark_counters_tabular={{true|false}}]\n\
         \x20         [--benchmark_context=<key>=<value>,...]\n\
         \x20         [--benchmark_perf_counters=<counter>,...]\n\
         \x20         [--v=<verbosity>]"
    );
    std::process::exit(1);
}

fn truthy(value: &str) -> Option<bool> {
    match value {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn context_pairs(spec: &str) -> impl Iterator<Item = Result<(String, String), ()>> + '_ {
    spec.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => Err(()),
        })
}

/// Build reporters per the flags and run the process-wide registry.
pub fn run_with_flags(flags: &Flags) -> anyhow::Result<usize> {
    for pair in context_pairs(&flags.benchmark_context).flatten() {
        add_custom_context(pair.0, pair.1);
    }

    let color = match flags.benchmark_color.as_str() {
        "auto" => is_color_terminal(),
        value => truthy(value).unwrap_or(false),
    };
    let display_format: OutputFormat = flags
        .benchmark_format
        .parse()
        .unwrap_or(OutputFormat::Console);
    let mut display = create_reporter(
        display_format,
        Box::new(std::io::stdout()),
        color,
        flags.benchmark_counters_tabular,
    );

    let mut file_reporter: Option<Box<dyn Reporter>> = None;
    if let Some(path) = &flags.benchmark_out {
        let file = match std::fs::File::create(path) {
            Ok(file) => file,
            Err(err) => {
                eprintln!("invalid file name: '{}': {err}", path.display());
                std::process::exit(1);
            }
        };
        let out_format: OutputFormat = flags
            .benchmark_out_format
            .parse()
            .unwrap_or(OutputFormat::Json);
        file_reporter = Some(create_reporter(
            out_format,
            Box::new(file),
            false,
            flags.benchmark_counters_tabular,
        ));
    }

    pulsebench_core::register_collected();
    let count = match file_reporter {
        Some(ref mut fr) => pulsebench_core::with_registry(|registry| {
            run_benchmarks(registry, flags, display.as_mut(), Some(&mut **fr))
        }),
        None => pulsebench_core::with_registry(|registry| {
            run_benchmarks(registry, flags, display.as_mut(), None)
        }),
    };
    Ok(count)
}

fn create_reporter(
    format: OutputFormat,
    out: Box<dyn Write + Send>,
    color: bool,
    tabular: bool,
) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Console => Box::new(ConsoleReporter::new(out, color, tabular)),
        OutputFormat::Json => Box::new(JsonReporter::new(out)),
        OutputFormat::Csv => Box::new(CsvReporter::new(out)),
    }
}

/// Run every instance of `registry` matching the filter, reporting to
/// `display` (and `file` when attached). Returns the matched instance
/// count; a filter that will not compile reports to the error stream
/// and returns 0.
pub fn run_benchmarks(
    registry: &Registry,
    flags: &Flags,
    display: &mut dyn Reporter,
    file: Option<&mut dyn Reporter>,
) -> usize {
    let mut spec = flags.benchmark_filter.as_str();
    if spec.is_empty() || spec == "all" {
        spec = ".";
    }

    let benchmarks = match registry.find(spec) {
        Ok(benchmarks) => benchmarks,
        Err(err) => {
            let _ = writeln!(display.error_output(), "{err}");
            return 0;
        }
    };
    if benchmarks.is_empty() {
        let _ = writeln!(
            display.error_output(),
            "Failed to match any benchmarks against regex: {spec}"
        );
        return 0;
    }

    if flags.benchmark_list_tests {
        for benchmark in &benchmarks {
            let _ = writeln!(display.output(), "{}", benchmark.name());
        }
        return benchmarks.len();
    }

    run_matched(&benchmarks, flags, display, file);
    benchmarks.len()
}

fn run_matched(
    benchmarks: &[BenchmarkInstance],
    flags: &Flags,
    display: &mut dyn Reporter,
    mut file: Option<&mut dyn Reporter>,
) {
    // Name column width: longest instance name, widened by the longest
    // statistic name when aggregate rows can appear.
    let mut might_have_aggregates = flags.benchmark_repetitions > 1;
    let mut name_field_width = 10usize;
    let mut stat_field_width = 0usize;
    for benchmark in benchmarks {
        name_field_width = name_field_width.max(benchmark.name().len());
        might_have_aggregates |= benchmark.repetitions() > 1;
        for stat in benchmark.statistics() {
            stat_field_width = stat_field_width.max(stat.name.len());
        }
    }
    if might_have_aggregates {
        name_field_width += 1 + stat_field_width;
    }

    let executable = std::env::args().next().unwrap_or_else(|| "unknown".into());
    let context = Context::capture(&executable, name_field_width);
    match file {
        Some(ref mut f) => {
            let proceed = display.report_context(&context) && f.report_context(&context);
            if proceed {
                tracing::info!(instances = benchmarks.len(), "running benchmarks");
                drive_tickets(benchmarks, flags, display, Some(&mut **f));
            }
            display.finalize();
            f.finalize();
        }
        None => {
            let proceed = display.report_context(&context);
            if proceed {
                tracing::info!(instances = benchmarks.len(), "running benchmarks");
                drive_tickets(benchmarks, flags, display, None);
            }
            display.finalize();
        }
    }
}

fn drive_tickets(
    benchmarks: &[BenchmarkInstance],
    flags: &Flags,
    display: &mut dyn Reporter,
    mut file: Option<&mut dyn Reporter>,
) {
    let options = RunnerOptions {
        min_time: flags.benchmark_min_time,
        repetitions: flags.benchmark_repetitions.max(1),
        report_aggregates_only: flags.benchmark_report_aggregates_only,
        display_aggregates_only: flags.benchmark_display_aggregates_only,
        perf_counter_names: flags.benchmark_perf_counters.clone(),
    };

    let mut per_family: HashMap<usize, PerFamilyReports> = HashMap::new();
    let mut runners: Vec<BenchmarkRunner> = Vec::with_capacity(benchmarks.len());
    for instance in benchmarks {
        let runner = BenchmarkRunner::new(instance.clone(), &options);
        if !matches!(instance.complexity(), Complexity::None) {
            per_family
                .entry(instance.family_index())
                .or_default()
                .num_runs_total += runner.repeats();
        }
        runners.push(runner);
    }

    let mut tickets = repetition_tickets(&runners);
    if flags.benchmark_enable_random_interleaving {
        shuffle_tickets(&mut tickets, &mut shuffle_rng());
    }

    for index in tickets {
        let runner = &mut runners[index];
        let run = runner.do_one_repetition();
        let family_index = runner.instance().family_index();
        let complexity = runner.instance().complexity();
        if !matches!(complexity, Complexity::None) {
            let reports = per_family
                .get_mut(&family_index)
                .expect("complexity family accumulator was registered above");
            reports.num_runs_done += 1;
            reports.runs.push(run);
        }
        if runner.has_repeats_remaining() {
            continue;
        }

        // The runner's last repetition just completed; fold statistics
        // and, once the whole family is done, the complexity fit.
        let mut results = runner.take_results();
        results.aggregates_only =
            aggregate_runs(&results.non_aggregates, runner.instance().statistics());
        if !matches!(complexity, Complexity::None) {
            let family_done = per_family
                .get(&family_index)
                .map(|r| r.num_runs_done == r.num_runs_total)
                .unwrap_or(false);
            if family_done {
                let reports = per_family.remove(&family_index).unwrap();
                results
                    .aggregates_only
                    .extend(compute_big_o(&reports.runs, complexity));
            }
        }
        match file {
            Some(ref mut f) => report(display, Some(&mut **f), &results),
            None => report(display, None, &results),
        }
    }
}

/// One ticket per (runner, repetition); processed in order.
fn repetition_tickets(runners: &[BenchmarkRunner]) -> Vec<usize> {
    let mut tickets = Vec::new();
    for (index, runner) in runners.iter().enumerate() {
        tickets.extend(std::iter::repeat(index).take(runner.repeats()));
    }
    tickets
}

fn shuffle_tickets(tickets: &mut [usize], rng: &mut impl Rng) {
    tickets.shuffle(rng);
}

/// A single seeded PRNG per run; `BENCHMARK_SHUFFLE_SEED` pins it for
/// reproducible orders.
fn shuffle_rng() -> StdRng {
    match std::env::var("BENCHMARK_SHUFFLE_SEED")
        .ok()
        .and_then(|s| s.parse().ok())
    {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn report(display: &mut dyn Reporter, file: Option<&mut dyn Reporter>, results: &RunResults) {
    report_one(display, results.display_report_aggregates_only, results);
    if let Some(f) = file {
        report_one(f, results.file_report_aggregates_only, results);
    }
}

fn report_one(reporter: &mut dyn Reporter, aggregates_only: bool, results: &RunResults) {
    // With nothing aggregated, fall back to the measurements.
    let aggregates_only = aggregates_only && !results.aggregates_only.is_empty();
    if !aggregates_only {
        reporter.report_runs(&results.non_aggregates);
    }
    if !results.aggregates_only.is_empty() {
        reporter.report_runs(&results.aggregates_only);
    }
}
