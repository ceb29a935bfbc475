//! Configuration loading from pulsebench.toml.
//!
//! A `pulsebench.toml` discovered by walking up from the current
//! directory supplies defaults for the run; explicitly passed CLI flags
//! (and their environment overrides) win over the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Flags;

/// File-sourced harness configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PulseConfig {
    /// Measurement defaults.
    #[serde(default)]
    pub runner: RunnerSection,
    /// Reporting defaults.
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerSection {
    /// Per-repetition time budget in seconds.
    #[serde(default)]
    pub min_time: Option<f64>,
    #[serde(default)]
    pub repetitions: Option<usize>,
    #[serde(default)]
    pub enable_random_interleaving: Option<bool>,
    #[serde(default)]
    pub report_aggregates_only: Option<bool>,
    #[serde(default)]
    pub display_aggregates_only: Option<bool>,
    #[serde(default)]
    pub perf_counters: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputSection {
    /// Display format: console, json or csv.
    #[serde(default)]
    pub format: Option<String>,
    /// File to attach a second reporter to.
    #[serde(default)]
    pub out: Option<PathBuf>,
    #[serde(default)]
    pub out_format: Option<String>,
    /// Console color: auto, true/yes/1 or false/no/0.
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub counters_tabular: Option<bool>,
}

impl PulseConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Walk up from the current directory looking for pulsebench.toml.
    pub fn discover() -> Option<Self> {
        let mut dir = std::env::current_dir().ok()?;
        loop {
            let config_path = dir.join("pulsebench.toml");
            if config_path.exists() {
                return Self::load(&config_path).ok();
            }
            if !dir.pop() {
                break;
            }
        }
        None
    }
}

/// Layer file configuration under the flags. Clap has already applied
/// its own defaults, so "explicitly set" is detected by comparing
/// against those defaults: a flag still at its default yields to the
/// file.
pub fn apply_config(flags: &mut Flags, config: &PulseConfig) {
    let defaults = Flags::default();

    if flags.benchmark_min_time == defaults.benchmark_min_time {
        if let Some(min_time) = config.runner.min_time {
            flags.benchmark_min_time = min_time;
        }
    }
    if flags.benchmark_repetitions == defaults.benchmark_repetitions {
        if let Some(repetitions) = config.runner.repetitions {
            flags.benchmark_repetitions = repetitions;
        }
    }
    if !flags.benchmark_enable_random_interleaving {
        if let Some(value) = config.runner.enable_random_interleaving {
            flags.benchmark_enable_random_interleaving = value;
        }
    }
    if !flags.benchmark_report_aggregates_only {
        if let Some(value) = config.runner.report_aggregates_only {
            flags.benchmark_report_aggregates_only = value;
        }
    }
    if !flags.benchmark_display_aggregates_only {
        if let Some(value) = config.runner.display_aggregates_only {
            flags.benchmark_display_aggregates_only = value;
        }
    }
    if flags.benchmark_perf_counters.is_empty() {
        if let Some(counters) = &config.runner.perf_counters {
            flags.benchmark_perf_counters = counters.clone();
        }
    }
    if flags.benchmark_format == defaults.benchmark_format {
        if let Some(format) = &config.output.format {
            flags.benchmark_format = format.clone();
        }
    }
    if flags.benchmark_out.is_none() {
        flags.benchmark_out.clone_from(&config.output.out);
    }
    if flags.benchmark_out_format == defaults.benchmark_out_format {
        if let Some(format) = &config.output.out_format {
            flags.benchmark_out_format = format.clone();
        }
    }
    if flags.benchmark_color == defaults.benchmark_color {
        if let Some(color) = &config.output.color {
            flags.benchmark_color = color.clone();
        }
    }
    if !flags.benchmark_counters_tabular {
        if let Some(value) = config.output.counters_tabular {
            flags.benchmark_counters_tabular = value;
        }
    }
}
