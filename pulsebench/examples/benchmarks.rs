//! Demonstration benchmark suite.
//!
//! Run with e.g.
//!   cargo run --release --example benchmarks -- --benchmark_filter=bm_sort
//!   cargo run --release --example benchmarks -- --benchmark_format=json

use pulsebench::prelude::*;

fn bm_vec_sum(state: &mut State) {
    let data: Vec<u64> = (0..4096).collect();
    while state.keep_running() {
        std::hint::black_box(data.iter().sum::<u64>());
    }
    state.set_bytes_processed(state.iterations() * 4096 * 8);
}
pulsebench::benchmark!(bm_vec_sum);

fn bm_sort(state: &mut State) {
    let n = state.range(0) as usize;
    let data: Vec<u64> = (0..n as u64).rev().collect();
    while state.keep_running() {
        let mut scratch = data.clone();
        scratch.sort_unstable();
        std::hint::black_box(&scratch);
    }
    state.set_complexity_n(n as i64);
}
pulsebench::benchmark!(bm_sort, |b: &mut Benchmark| {
    b.range(1 << 6, 1 << 12).complexity(Complexity::ONLogN);
});

fn bm_contended_counter(state: &mut State) {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    while state.keep_running() {
        COUNTER.fetch_add(1, Ordering::Relaxed);
    }
    state.set_items_processed(state.iterations());
}
pulsebench::benchmark!(bm_contended_counter, |b: &mut Benchmark| {
    b.threads(1).threads(4).use_real_time();
});

fn bm_spin_with_counters(state: &mut State) {
    let mut folds = 0.0;
    while state.keep_running() {
        let mut x = 0u64;
        for i in 0..512u64 {
            x = x.wrapping_mul(31).wrapping_add(std::hint::black_box(i));
        }
        std::hint::black_box(x);
        folds += 512.0;
    }
    state
        .counters
        .insert("folds".into(), Counter::new(folds, Counter::RATE));
}
pulsebench::benchmark!(bm_spin_with_counters, |b: &mut Benchmark| {
    b.unit(TimeUnit::Microsecond).repetitions(3);
});

pulsebench::main!();
