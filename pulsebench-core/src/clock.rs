//! Clock facade.
//!
//! All timing inside the harness is carried as `f64` seconds. The wall
//! clock is a monotone offset from process start; CPU clocks read the
//! POSIX per-process and per-thread CPU clocks directly. Platforms
//! without `clock_gettime` degrade to wall time so the harness still
//! produces numbers, just less meaningful ones.

use std::sync::OnceLock;
use std::time::Instant;

fn epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Monotone wall-clock reading in seconds.
#[inline]
pub fn wall_time() -> f64 {
    epoch().elapsed().as_secs_f64()
}

#[cfg(unix)]
fn clock_gettime_seconds(clock: libc::clockid_t) -> f64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid, writable timespec; both clock ids we pass
    // are required by POSIX.
    let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
    if rc != 0 {
        return wall_time();
    }
    ts.tv_sec as f64 + ts.tv_nsec as f64 * 1e-9
}

/// CPU time consumed by the whole process, in seconds.
#[cfg(unix)]
#[inline]
pub fn process_cpu_time() -> f64 {
    clock_gettime_seconds(libc::CLOCK_PROCESS_CPUTIME_ID)
}

/// CPU time consumed by the calling thread, in seconds.
#[cfg(unix)]
#[inline]
pub fn thread_cpu_time() -> f64 {
    clock_gettime_seconds(libc::CLOCK_THREAD_CPUTIME_ID)
}

#[cfg(not(unix))]
#[inline]
pub fn process_cpu_time() -> f64 {
    wall_time()
}

#[cfg(not(unix))]
#[inline]
pub fn thread_cpu_time() -> f64 {
    wall_time()
}
