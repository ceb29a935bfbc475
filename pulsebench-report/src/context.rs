//! Run context: host information plus user-supplied key/value pairs.
//!
//! Host data comes from `/proc` and `/sys` on Linux and degrades to
//! zeros elsewhere. The custom-context map is process-global, written
//! before any benchmark runs and read when reporters emit the context.

use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};

/// One level of the CPU cache hierarchy.
#[derive(Debug, Clone)]
pub struct CacheInfo {
    pub typ: String,
    pub level: i32,
    /// Bytes.
    pub size: u64,
    /// How many logical CPUs share this cache.
    pub num_sharing: i32,
}

/// Everything a reporter knows about the run before any results exist.
#[derive(Debug, Clone)]
pub struct Context {
    pub date: String,
    pub executable_name: String,
    pub host_name: String,
    pub num_cpus: u32,
    pub mhz_per_cpu: f64,
    pub cpu_scaling_enabled: bool,
    pub caches: Vec<CacheInfo>,
    pub load_avg: Vec<f64>,
    pub library_build_type: &'static str,
    /// Width the console reporter uses for the name column.
    pub name_field_width: usize,
    pub extra: BTreeMap<String, String>,
}

impl Context {
    /// Capture the current host state.
    pub fn capture(executable_name: &str, name_field_width: usize) -> Self {
        Self {
            date: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%z").to_string(),
            executable_name: executable_name.to_string(),
            host_name: host_name(),
            num_cpus: num_cpus(),
            mhz_per_cpu: cpu_mhz().unwrap_or(0.0),
            cpu_scaling_enabled: cpu_scaling_enabled(),
            caches: cpu_caches(),
            load_avg: load_avg(),
            library_build_type: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
            name_field_width,
            extra: custom_context(),
        }
    }
}

fn global_context() -> &'static Mutex<BTreeMap<String, String>> {
    static CONTEXT: OnceLock<Mutex<BTreeMap<String, String>>> = OnceLock::new();
    CONTEXT.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Add a key/value pair surfaced in every reporter's context block.
/// The first write for a key wins.
pub fn add_custom_context(key: impl Into<String>, value: impl Into<String>) {
    let mut map = global_context().lock().unwrap();
    let key = key.into();
    let value = value.into();
    if map.contains_key(&key) {
        eprintln!("failed to add custom context '{key}': it already exists");
        return;
    }
    map.insert(key, value);
}

/// Snapshot of the custom-context map.
pub fn custom_context() -> BTreeMap<String, String> {
    global_context().lock().unwrap().clone()
}

fn num_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}

#[cfg(unix)]
fn host_name() -> String {
    let mut buf = [0u8; 256];
    // SAFETY: buf is a valid writable buffer; gethostname always
    // NUL-terminates within the given length on success.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if rc != 0 {
        return "unknown".to_string();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

#[cfg(not(unix))]
fn host_name() -> String {
    std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".to_string())
}

/// First `cpu MHz` entry of /proc/cpuinfo (Linux only).
fn cpu_mhz() -> Option<f64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| {
                content
                    .lines()
                    .find(|l| l.starts_with("cpu MHz"))
                    .and_then(|l| l.split(':').nth(1))
                    .and_then(|s| s.trim().parse().ok())
            })
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Whether any CPU runs under a governor other than `performance`.
fn cpu_scaling_enabled() -> bool {
    #[cfg(target_os = "linux")]
    {
        for cpu in 0..num_cpus() {
            let path = format!("/sys/devices/system/cpu/cpu{cpu}/cpufreq/scaling_governor");
            if let Ok(governor) = std::fs::read_to_string(path) {
                if governor.trim() != "performance" {
                    return true;
                }
            }
        }
        false
    }
    #[cfg(not(target_os = "linux"))]
    {
        false
    }
}

fn cpu_caches() -> Vec<CacheInfo> {
    #[cfg(target_os = "linux")]
    {
        let mut caches = Vec::new();
        for index in 0.. {
            let base = format!("/sys/devices/system/cpu/cpu0/cache/index{index}");
            let Ok(typ) = std::fs::read_to_string(format!("{base}/type")) else {
                break;
            };
            let level = read_sys_number(&format!("{base}/level")).unwrap_or(0) as i32;
            let size = std::fs::read_to_string(format!("{base}/size"))
                .ok()
                .and_then(|s| parse_cache_size(s.trim()))
                .unwrap_or(0);
            let num_sharing = std::fs::read_to_string(format!("{base}/shared_cpu_list"))
                .map(|s| count_cpu_list(s.trim()))
                .unwrap_or(1);
            caches.push(CacheInfo {
                typ: typ.trim().to_string(),
                level,
                size,
                num_sharing,
            });
        }
        caches
    }
    #[cfg(not(target_os = "linux"))]
    {
        Vec::new()
    }
}

#[cfg(target_os = "linux")]
fn read_sys_number(path: &str) -> Option<u64> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse().ok())
}

/// `32K` / `1024K` / `8M` style size strings from sysfs.
#[cfg(target_os = "linux")]
fn parse_cache_size(s: &str) -> Option<u64> {
    let (digits, mult) = match s.as_bytes().last()? {
        b'K' => (&s[..s.len() - 1], 1024),
        b'M' => (&s[..s.len() - 1], 1024 * 1024),
        b'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits.parse::<u64>().ok().map(|v| v * mult)
}

/// Number of CPUs named by a `0-3,8-11` style list.
#[cfg(target_os = "linux")]
fn count_cpu_list(list: &str) -> i32 {
    let mut count = 0;
    for part in list.split(',').filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.parse::<i32>(), hi.parse::<i32>()) {
                    count += (hi - lo + 1).max(0);
                }
            }
            None => count += 1,
        }
    }
    count.max(1)
}

#[cfg(unix)]
fn load_avg() -> Vec<f64> {
    let mut loads = [0f64; 3];
    // SAFETY: loads is a valid array of 3 doubles.
    let got = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if got < 0 {
        Vec::new()
    } else {
        loads[..got as usize].to_vec()
    }
}

#[cfg(not(unix))]
fn load_avg() -> Vec<f64> {
    Vec::new()
}
