//! Hardware counter probe.
//!
//! The harness treats counter sources as an opaque capability behind
//! [`CounterProbe`]: something that can bracket a measured region and
//! hand back a delta. The built-in implementation reads the CPU cycle
//! counter (RDTSCP on x86_64, CNTVCT_EL0 on AArch64); richer sources
//! such as libpfm events plug in by implementing the trait.

use std::sync::Mutex;

use crate::counters::{increment_counters, Counter, Counters};

/// Read the CPU cycle/tick counter (platform-specific).
#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_cycles() -> u64 {
    // SAFETY: RDTSCP is available on all x86_64 CPUs since ~2006.
    // It waits for all prior instructions to complete before reading
    // the cycle counter.
    unsafe {
        let mut _aux: u32 = 0;
        std::arch::x86_64::__rdtscp(&mut _aux)
    }
}

/// Read the virtual counter timer on AArch64 (comparable to x86 TSC).
#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_cycles() -> u64 {
    let cnt: u64;
    // SAFETY: CNTVCT_EL0 is accessible from EL0 on all AArch64
    // implementations and increases monotonically at a fixed frequency.
    unsafe {
        std::arch::asm!("mrs {}, cntvct_el0", out(reg) cnt, options(nostack, nomem));
    }
    cnt
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_cycles() -> u64 {
    0
}

/// Whether this platform provides a real cycle counter.
pub const HAS_CYCLE_COUNTER: bool = cfg!(target_arch = "x86_64") || cfg!(target_arch = "aarch64");

/// One named hardware counter source.
pub trait CounterProbe: Send {
    fn name(&self) -> &str;
    /// Mark the start of a measured region.
    fn begin(&mut self);
    /// Close the region and return the counter delta across it.
    fn end(&mut self) -> f64;
}

/// Built-in cycle counter, registered under the name `cycles`.
#[derive(Debug, Default)]
pub struct CycleCounterProbe {
    start: u64,
}

impl CounterProbe for CycleCounterProbe {
    fn name(&self) -> &str {
        "cycles"
    }

    fn begin(&mut self) {
        self.start = read_cycles();
    }

    fn end(&mut self) -> f64 {
        read_cycles().saturating_sub(self.start) as f64
    }
}

/// The set of probes sampled across one measured region.
///
/// Shared by all worker threads of a round; start/stop happen on
/// whichever thread arrives last at the barrier, so the probes live
/// behind a mutex. This is cold-path only.
pub struct PerfProbe {
    inner: Mutex<ProbeSet>,
}

struct ProbeSet {
    probes: Vec<Box<dyn CounterProbe>>,
    running: bool,
}

impl PerfProbe {
    /// Build a probe set from requested counter names. Unknown names are
    /// skipped with a warning; an empty result means no probe at all.
    pub fn from_names(names: &[String]) -> Option<Self> {
        let mut probes: Vec<Box<dyn CounterProbe>> = Vec::new();
        for name in names {
            match name.as_str() {
                "cycles" => probes.push(Box::<CycleCounterProbe>::default()),
                other => {
                    tracing::warn!(counter = other, "unsupported perf counter, skipping");
                }
            }
        }
        if probes.is_empty() {
            None
        } else {
            Some(Self {
                inner: Mutex::new(ProbeSet {
                    probes,
                    running: false,
                }),
            })
        }
    }

    pub fn start(&self) {
        let mut set = self.inner.lock().unwrap();
        for p in &mut set.probes {
            p.begin();
        }
        set.running = true;
    }

    /// Stop all probes and fold the measured deltas into `counters`.
    /// Deltas are tagged `AVG_ITERATIONS` so reporters show a
    /// per-iteration figure. A stop without a matching start is a no-op
    /// (the errored-run path).
    pub fn stop_and_merge(&self, counters: &mut Counters) {
        let mut set = self.inner.lock().unwrap();
        if !set.running {
            return;
        }
        set.running = false;
        let mut measured = Counters::new();
        for p in &mut set.probes {
            measured.insert(
                p.name().to_string(),
                Counter::new(p.end(), Counter::AVG_ITERATIONS),
            );
        }
        increment_counters(counters, &measured);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_yield_no_probe() {
        assert!(PerfProbe::from_names(&["branch-misses".into()]).is_none());
    }

    #[test]
    fn cycles_probe_measures_region() {
        let probe = match PerfProbe::from_names(&["cycles".into()]) {
            Some(p) => p,
            None => return,
        };
        let mut counters = Counters::new();
        probe.start();
        let mut sum = 0u64;
        for i in 0..100_000u64 {
            sum = sum.wrapping_add(std::hint::black_box(i));
        }
        std::hint::black_box(sum);
        probe.stop_and_merge(&mut counters);
        let c = &counters["cycles"];
        if HAS_CYCLE_COUNTER {
            assert!(c.value > 0.0);
        }
        assert_eq!(c.flags, Counter::AVG_ITERATIONS);
    }

    #[test]
    fn stop_without_start_is_noop() {
        let probe = PerfProbe::from_names(&["cycles".into()]).unwrap();
        let mut counters = Counters::new();
        probe.stop_and_merge(&mut counters);
        assert!(counters.is_empty());
    }
}
