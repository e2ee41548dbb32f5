//! Benchmark suite for ledger lock contention
//!
//! Measures the per-account locking discipline under the access patterns the
//! desks produce, using the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! # Scenarios
//!
//! - Uncontended balance reads and deposits on a single thread
//! - Transfers between random account pairs from several threads
//! - Transfers all hitting the same two accounts in opposite directions
//! - A full snapshot, as taken at shutdown

use desk_bank::Ledger;
use std::sync::Arc;
use std::thread;

fn main() {
    divan::main();
}

const CAPACITY: usize = 1000;
const OPS_PER_THREAD: usize = 1_000;

fn funded_ledger() -> Arc<Ledger> {
    let ledger = Ledger::with_capacity(CAPACITY);
    for number in 0..CAPACITY as i32 {
        ledger
            .deposit(number, 1_000_000)
            .expect("Funding failed");
    }
    Arc::new(ledger)
}

/// Single-threaded balance reads across the whole ledger
#[divan::bench]
fn read_balance_sweep(bencher: divan::Bencher) {
    let ledger = funded_ledger();
    bencher.bench(|| {
        let mut sum = 0i64;
        for number in 0..CAPACITY as i32 {
            sum += i64::from(ledger.read_balance(number).expect("Read failed"));
        }
        divan::black_box(sum)
    });
}

/// Single-threaded deposits across the whole ledger
#[divan::bench]
fn deposit_sweep(bencher: divan::Bencher) {
    let ledger = Arc::new(Ledger::with_capacity(CAPACITY));
    bencher.bench(|| {
        for number in 0..CAPACITY as i32 {
            // Overflow after many iterations is an expected error, not a failure.
            let _ = divan::black_box(ledger.deposit(number, 1));
        }
    });
}

/// Transfers between spread-out account pairs from `threads` desks
#[divan::bench(args = [1, 2, 4, 8])]
fn spread_transfers(bencher: divan::Bencher, threads: usize) {
    let ledger = funded_ledger();
    bencher.bench(|| {
        let handles: Vec<_> = (0..threads)
            .map(|worker| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for op in 0..OPS_PER_THREAD {
                        let from = ((worker * 7919 + op * 31) % CAPACITY) as i32;
                        let to = ((from as usize + 1 + op % (CAPACITY - 1)) % CAPACITY) as i32;
                        let _ = ledger.transfer(from, to, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Worker panicked");
        }
    });
}

/// Every desk transferring between the same two accounts
#[divan::bench(args = [2, 4, 8])]
fn hot_pair_transfers(bencher: divan::Bencher, threads: usize) {
    let ledger = funded_ledger();
    bencher.bench(|| {
        let handles: Vec<_> = (0..threads)
            .map(|worker| {
                let ledger = Arc::clone(&ledger);
                let (from, to) = if worker % 2 == 0 { (0, 1) } else { (1, 0) };
                thread::spawn(move || {
                    for _ in 0..OPS_PER_THREAD {
                        let _ = ledger.transfer(from, to, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("Worker panicked");
        }
    });
}

/// Consistent snapshot of every account
#[divan::bench]
fn snapshot(bencher: divan::Bencher) {
    let ledger = funded_ledger();
    bencher.bench(|| divan::black_box(ledger.snapshot()));
}
