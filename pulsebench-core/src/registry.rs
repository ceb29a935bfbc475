//! Family registry and instance expansion.
//!
//! Families land in a registry (usually the process-wide one), and
//! [`Registry::find`] expands them into the Cartesian product of
//! argument tuples and thread counts, filtered by a regex spec. Tests
//! use private `Registry` values; the global instance exists for the
//! static-registration path.

use std::sync::{Arc, Mutex, Once, OnceLock};

use thiserror::Error;

use crate::benchmark::Benchmark;
use crate::instance::BenchmarkInstance;
use crate::state::State;

/// A family expanding to more points than this triggers a warning.
const MAX_FAMILY_SIZE: usize = 100;

/// Filter compilation failure.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("could not compile benchmark filter '{spec}': {source}")]
    BadRegex {
        spec: String,
        #[source]
        source: regex::Error,
    },
}

/// An ordered collection of benchmark families.
#[derive(Default)]
pub struct Registry {
    families: Vec<Arc<Benchmark>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a family; returns its registration index.
    pub fn register(&mut self, benchmark: Benchmark) -> usize {
        let index = self.families.len();
        self.families.push(Arc::new(benchmark));
        index
    }

    /// Drop all registered families.
    pub fn clear(&mut self) {
        self.families.clear();
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Expand all families into instances whose names match `spec`.
    ///
    /// A leading `-` inverts the match. Families without arguments get a
    /// single empty tuple; families without thread counts run with one
    /// thread. Family indices are assigned in the order families first
    /// contribute a kept instance, so they are dense over the result.
    /// An empty result is not an error; a filter that will not compile
    /// is.
    pub fn find(&self, spec: &str) -> Result<Vec<BenchmarkInstance>, FilterError> {
        let (pattern, negate) = match spec.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (spec, false),
        };
        let re = regex::Regex::new(pattern).map_err(|source| FilterError::BadRegex {
            spec: spec.to_string(),
            source,
        })?;

        let one_thread = [1usize];
        let empty_args = [Vec::new()];
        let mut benchmarks = Vec::new();
        let mut next_family_index = 0;

        for family in &self.families {
            let family_index = next_family_index;
            let mut per_family_instance_index = 0;

            let args: &[Vec<i64>] = if family.args_cnt().is_none() {
                &empty_args
            } else {
                &family.args
            };
            let thread_counts: &[usize] = if family.thread_counts.is_empty() {
                &one_thread
            } else {
                &family.thread_counts
            };

            let family_size = args.len() * thread_counts.len();
            if family_size > MAX_FAMILY_SIZE {
                tracing::warn!(
                    family = family.name(),
                    points = family_size,
                    "benchmark family expands to a very large number of instances"
                );
            }

            for arg_tuple in args {
                for &num_threads in thread_counts {
                    let instance = BenchmarkInstance::new(
                        Arc::clone(family),
                        family_index,
                        per_family_instance_index,
                        arg_tuple.clone(),
                        num_threads,
                    );
                    if re.is_match(instance.name()) != negate {
                        benchmarks.push(instance);
                        per_family_instance_index += 1;
                        // Bump only once the family is known to
                        // contribute at least one instance.
                        if next_family_index == family_index {
                            next_family_index += 1;
                        }
                    }
                }
            }
        }
        Ok(benchmarks)
    }
}

// ── process-wide registry ───────────────────────────────────────────────

fn global() -> &'static Mutex<Registry> {
    static GLOBAL: OnceLock<Mutex<Registry>> = OnceLock::new();
    GLOBAL.get_or_init(|| Mutex::new(Registry::new()))
}

/// Register a family with the process-wide registry.
pub fn register_benchmark(benchmark: Benchmark) -> usize {
    global().lock().unwrap().register(benchmark)
}

/// Drop every family in the process-wide registry (used by tests).
pub fn clear_registered_benchmarks() {
    global().lock().unwrap().clear();
}

/// Expand the process-wide registry against a filter spec.
pub fn find_benchmarks(spec: &str) -> Result<Vec<BenchmarkInstance>, FilterError> {
    global().lock().unwrap().find(spec)
}

/// Run `f` with the process-wide registry locked. The harness driver
/// holds the lock for a whole run; nothing else runs concurrently.
pub fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    f(&mut global().lock().unwrap())
}

// ── static registration ─────────────────────────────────────────────────

/// A benchmark submitted at link time via the `benchmark!` macro.
pub struct Registration {
    pub name: &'static str,
    pub func: fn(&mut State),
    pub configure: Option<fn(&mut Benchmark)>,
}

impl Registration {
    pub const fn new(name: &'static str, func: fn(&mut State)) -> Self {
        Self {
            name,
            func,
            configure: None,
        }
    }

    pub const fn with_config(
        name: &'static str,
        func: fn(&mut State),
        configure: fn(&mut Benchmark),
    ) -> Self {
        Self {
            name,
            func,
            configure: Some(configure),
        }
    }
}

inventory::collect!(Registration);

/// Move every statically submitted benchmark into the process-wide
/// registry. Idempotent; called once by the harness entry point.
pub fn register_collected() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        for reg in inventory::iter::<Registration> {
            let mut benchmark = Benchmark::new(reg.name, reg.func);
            if let Some(configure) = reg.configure {
                configure(&mut benchmark);
            }
            register_benchmark(benchmark);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut State) {}

    fn registry_with(names: &[&str]) -> Registry {
        let mut registry = Registry::new();
        for name in names {
            registry.register(Benchmark::new(*name, noop));
        }
        registry
    }

    #[test]
    fn expansion_is_args_times_threads() {
        let mut registry = Registry::new();
        let mut b = Benchmark::new("bm_grid", noop);
        b.arg(1).arg(2).arg(3).threads(1).threads(4);
        registry.register(b);
        let found = registry.find(".").unwrap();
        assert_eq!(found.len(), 6);
    }

    #[test]
    fn no_args_yields_single_instance() {
        let registry = registry_with(&["bm_plain"]);
        let found = registry.find(".").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "bm_plain");
        assert_eq!(found[0].threads(), 1);
    }

    #[test]
    fn prefix_filter_matches_substring() {
        let registry = registry_with(&["NoPrefix", "BM_Foo", "BM_Bar", "BM_FooBar", "BM_FooBa"]);
        let names: Vec<String> = registry
            .find("BM_Foo")
            .unwrap()
            .iter()
            .map(|i| i.name().to_string())
            .collect();
        assert_eq!(names, ["BM_Foo", "BM_FooBar", "BM_FooBa"]);
    }

    #[test]
    fn family_indices_are_dense_over_matches() {
        let registry = registry_with(&["NoPrefix", "BM_Foo", "BM_Bar", "BM_FooBar"]);
        let found = registry.find("BM_").unwrap();
        let indices: Vec<usize> = found.iter().map(|i| i.family_index()).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn negative_filter_inverts() {
        let registry = registry_with(&["NoPrefix", "BM_Foo", "BM_Bar"]);
        let found = registry.find("-BM_").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "NoPrefix");
    }

    #[test]
    fn unmatched_filter_returns_empty_not_error() {
        let registry = registry_with(&["bm_one"]);
        assert!(registry.find("nothing_matches").unwrap().is_empty());
    }

    #[test]
    fn bad_regex_is_an_error() {
        let registry = registry_with(&["bm_one"]);
        let err = registry.find("*oops").unwrap_err();
        assert!(matches!(err, FilterError::BadRegex { .. }));
    }

    #[test]
    fn clear_drops_families() {
        let mut registry = registry_with(&["bm_one", "bm_two"]);
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.find(".").unwrap().is_empty());
    }

    #[test]
    fn per_family_instance_indices_count_matches() {
        let mut registry = Registry::new();
        let mut b = Benchmark::new("bm_sized", noop);
        b.arg(1).arg(2).arg(3);
        registry.register(b);
        let found = registry.find(".").unwrap();
        let per: Vec<usize> = found.iter().map(|i| i.per_family_instance_index()).collect();
        assert_eq!(per, [0, 1, 2]);
    }
}
