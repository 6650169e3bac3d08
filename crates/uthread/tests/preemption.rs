//! Timer preemption and guard pages
//!
//! Preempted threads only spin on atomics here: the quantum can expire at any
//! instruction, including inside the allocator.

#![cfg(target_os = "linux")]

use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use uthread::{init, preemptions, spawn, yield_now, Builder, Mutex, RuntimeConfig};

fn preemptive_runtime() {
    let cfg = RuntimeConfig::new()
        .preemption(true)
        .quantum(Duration::from_millis(2));
    init(cfg).unwrap();
}

#[test]
fn test_spinning_thread_is_preempted() {
    preemptive_runtime();
    let stop = Rc::new(AtomicBool::new(false));

    let s = stop.clone();
    let spinner = spawn(move || {
        let mut spins = 0u64;
        while !s.load(Ordering::Relaxed) {
            spins = spins.wrapping_add(1);
            std::hint::spin_loop();
        }
        spins
    })
    .unwrap();

    // The spinner never yields; only the timer can hand control back
    yield_now();
    stop.store(true, Ordering::Relaxed);
    assert!(preemptions() >= 1);
    assert!(spinner.join().unwrap().is_some());
}

#[test]
fn test_two_spinners_share_the_cpu() {
    preemptive_runtime();
    let counters = Rc::new([AtomicU64::new(0), AtomicU64::new(0)]);
    let stop = Rc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..2)
        .map(|i| {
            let (c, s) = (counters.clone(), stop.clone());
            spawn(move || {
                while !s.load(Ordering::Relaxed) {
                    c[i].fetch_add(1, Ordering::Relaxed);
                }
            })
            .unwrap()
        })
        .collect();

    while counters[0].load(Ordering::Relaxed) == 0 || counters[1].load(Ordering::Relaxed) == 0 {
        yield_now();
    }
    stop.store(true, Ordering::Relaxed);
    for h in handles {
        h.join().unwrap();
    }
    assert!(preemptions() >= 1);
}

#[test]
fn test_lock_holder_is_not_preempted() {
    preemptive_runtime();
    let m = Rc::new(Mutex::new(0u64));
    let other_ran = Rc::new(AtomicBool::new(false));

    let o = other_ran.clone();
    let other = spawn(move || o.store(true, Ordering::Relaxed)).unwrap();

    {
        let mut g = m.lock().unwrap();
        // Burn several quanta of CPU time while holding the lock
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(20) {
            *g = g.wrapping_add(1);
        }
        assert!(!other_ran.load(Ordering::Relaxed));
    }
    other.join().unwrap();
    assert!(other_ran.load(Ordering::Relaxed));
}

#[inline(never)]
fn recurse(depth: u64) -> u64 {
    let frame = std::hint::black_box([depth as u8; 256]);
    if depth == u64::MAX {
        return 0;
    }
    frame[0] as u64 + recurse(std::hint::black_box(depth + 1))
}

#[test]
fn test_stack_overflow_kills_only_that_thread() {
    init(RuntimeConfig::new().guard_pages(true)).unwrap();
    let h = Builder::new()
        .stack_size(32 * 1024)
        .spawn(|| recurse(0))
        .unwrap();
    assert_eq!(h.join().unwrap(), None);

    // The runtime keeps working afterwards
    let h = spawn(|| 5).unwrap();
    assert_eq!(h.join().unwrap(), Some(5));
}
