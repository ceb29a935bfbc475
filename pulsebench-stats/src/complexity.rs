//! Asymptotic-complexity fitting over a family of input sizes.
//!
//! Fits `time = coef · f(n)` by least squares for a hypothesis curve
//! `f`, reporting the coefficient and the RMS of the residuals
//! normalized by the mean time. `Auto` tries every built-in curve and
//! keeps the best fit.

use pulsebench_core::{Complexity, Run, RunType};

/// Result of one least-squares fit.
#[derive(Debug, Clone, Copy)]
pub struct LeastSq {
    pub coef: f64,
    /// Root-mean-square of residuals divided by mean time.
    pub rms: f64,
    pub complexity: Complexity,
}

fn curve_1(_: i64) -> f64 {
    1.0
}
fn curve_n(n: i64) -> f64 {
    n as f64
}
fn curve_n_squared(n: i64) -> f64 {
    (n as f64).powi(2)
}
fn curve_n_cubed(n: i64) -> f64 {
    (n as f64).powi(3)
}
fn curve_log_n(n: i64) -> f64 {
    (n as f64).max(1.0).log2()
}
fn curve_n_log_n(n: i64) -> f64 {
    n as f64 * (n as f64).max(1.0).log2()
}
fn curve_sqrt_n(n: i64) -> f64 {
    (n as f64).sqrt()
}
fn curve_exp(n: i64) -> f64 {
    // The exponent is clamped so the squared sums inside the fit stay
    // finite; beyond this the class is hopeless anyway.
    (n as f64).min(500.0).exp2()
}

/// The shape function for a hypothesis.
pub fn fitting_curve(complexity: Complexity) -> fn(i64) -> f64 {
    match complexity {
        Complexity::ON => curve_n,
        Complexity::ONSquared => curve_n_squared,
        Complexity::ONCubed => curve_n_cubed,
        Complexity::OLogN => curve_log_n,
        Complexity::ONLogN => curve_n_log_n,
        Complexity::OSqrtN => curve_sqrt_n,
        Complexity::OExp => curve_exp,
        Complexity::Lambda(f) => f,
        _ => curve_1,
    }
}

/// Human rendering of a fitted class, shown in the run label.
pub fn big_o_string(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::O1 => "(1)",
        Complexity::ON => "N",
        Complexity::ONSquared => "N^2",
        Complexity::ONCubed => "N^3",
        Complexity::OLogN => "lgN",
        Complexity::ONLogN => "NlgN",
        Complexity::OSqrtN => "sqrt(N)",
        Complexity::OExp => "2^N",
        Complexity::Lambda(_) => "f(N)",
        _ => "",
    }
}

/// Least-squares fit of `time = coef · curve(n)`.
pub fn minimal_least_sq(n: &[i64], time: &[f64], complexity: Complexity) -> LeastSq {
    assert_eq!(n.len(), time.len(), "mismatched sample vectors");
    assert!(!n.is_empty(), "cannot fit an empty sample set");
    let curve = fitting_curve(complexity);

    let mut sigma_gn_squared = 0.0;
    let mut sigma_time = 0.0;
    let mut sigma_time_gn = 0.0;
    for (&ni, &ti) in n.iter().zip(time) {
        let gn = curve(ni);
        sigma_gn_squared += gn * gn;
        sigma_time += ti;
        sigma_time_gn += ti * gn;
    }

    let coef = if sigma_gn_squared > 0.0 {
        sigma_time_gn / sigma_gn_squared
    } else {
        0.0
    };

    let mut rms = 0.0;
    for (&ni, &ti) in n.iter().zip(time) {
        let fit = coef * curve(ni);
        rms += (ti - fit).powi(2);
    }
    let mean = sigma_time / n.len() as f64;
    let rms = if mean > 0.0 {
        (rms / n.len() as f64).sqrt() / mean
    } else {
        0.0
    };

    LeastSq {
        coef,
        rms,
        complexity,
    }
}

/// Every built-in class is a candidate for `Auto`.
const AUTO_CANDIDATES: [Complexity; 8] = [
    Complexity::O1,
    Complexity::ON,
    Complexity::ONSquared,
    Complexity::ONCubed,
    Complexity::OLogN,
    Complexity::ONLogN,
    Complexity::OSqrtN,
    Complexity::OExp,
];

fn best_fit(n: &[i64], time: &[f64]) -> LeastSq {
    let mut best = minimal_least_sq(n, time, AUTO_CANDIDATES[0]);
    for &candidate in &AUTO_CANDIDATES[1..] {
        let fit = minimal_least_sq(n, time, candidate);
        if fit.rms < best.rms {
            best = fit;
        }
    }
    best
}

/// Fit a family's runs and emit the `BigO`/`RMS` synthetic run pair.
///
/// `reports` holds every non-aggregate run of the family (any order;
/// the caller ensures the family is complete). Errored runs are
/// skipped; fewer than two clean runs produce nothing.
pub fn compute_big_o(reports: &[Run], complexity: Complexity) -> Vec<Run> {
    if matches!(complexity, Complexity::None) {
        return Vec::new();
    }
    let clean: Vec<&Run> = reports.iter().filter(|r| !r.error_occurred).collect();
    if clean.len() < 2 {
        return Vec::new();
    }

    let n: Vec<i64> = clean.iter().map(|r| r.complexity_n).collect();
    let real_time: Vec<f64> = clean.iter().map(|r| r.real_seconds_per_iteration()).collect();
    let cpu_time: Vec<f64> = clean.iter().map(|r| r.cpu_seconds_per_iteration()).collect();

    // CPU time picks the class; real time is fitted against the same
    // class so the two coefficients are comparable.
    let cpu_fit = match complexity {
        Complexity::Auto => best_fit(&n, &cpu_time),
        other => minimal_least_sq(&n, &cpu_time, other),
    };
    let real_fit = minimal_least_sq(&n, &real_time, cpu_fit.complexity);

    let first = clean[0];
    let family_name = first
        .run_name
        .split('/')
        .next()
        .unwrap_or(&first.run_name)
        .to_string();

    let big_o = Run {
        run_name: family_name.clone(),
        family_index: first.family_index,
        per_family_instance_index: first.per_family_instance_index,
        run_type: RunType::Aggregate,
        aggregate_name: "BigO".into(),
        report_big_o: true,
        repetitions: first.repetitions,
        repetition_index: None,
        threads: first.threads,
        iterations: 0,
        real_accumulated_time: real_fit.coef,
        cpu_accumulated_time: cpu_fit.coef,
        time_unit: first.time_unit,
        report_label: big_o_string(cpu_fit.complexity).to_string(),
        ..Run::default()
    };
    let rms = Run {
        run_name: family_name,
        family_index: first.family_index,
        per_family_instance_index: first.per_family_instance_index,
        run_type: RunType::Aggregate,
        aggregate_name: "RMS".into(),
        report_rms: true,
        repetitions: first.repetitions,
        repetition_index: None,
        threads: first.threads,
        iterations: 0,
        real_accumulated_time: real_fit.rms,
        cpu_accumulated_time: cpu_fit.rms,
        time_unit: first.time_unit,
        ..Run::default()
    };
    vec![big_o, rms]
}
