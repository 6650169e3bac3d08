//! Divide-and-conquer array sum
//!
//! Every range is split in two and each half summed by its own green thread,
//! down to single elements. The threaded result is checked against a plain
//! loop.
//!
//! # Usage
//!
//! ```text
//! sum-array [SIZE] [MAX]
//! ```
//!
//! # Environment Variables
//!
//! - `UTHREAD_SCHED_POLICY=priority` - Use the priority ready queue
//! - `UTHREAD_PREEMPT=1` - Enable timer preemption
//! - `UTHREAD_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::rc::Rc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use uthread::{kerror, kinfo, live_threads, Builder, Result};

const DEFAULT_SIZE: usize = 1000;
const DEFAULT_MAX: u64 = 10_000;

/// Children only recurse and add, so a small stack is plenty
const STACK_SIZE: usize = 32 * 1024;

fn sum(values: Rc<[u64]>, start: usize, end: usize) -> Result<u64> {
    if start == end {
        return Ok(values[start]);
    }
    let mid = (start + end) / 2;
    let builder = Builder::new().stack_size(STACK_SIZE);

    let left = {
        let values = values.clone();
        builder.spawn(move || sum(values, start, mid))?
    };
    let right = builder.spawn(move || sum(values, mid + 1, end))?;

    let left = left.join()?.unwrap_or(Err(uthread::Error::InvalidArgument("left half died")))?;
    let right = right.join()?.unwrap_or(Err(uthread::Error::InvalidArgument("right half died")))?;
    Ok(left + right)
}

/// xorshift64*, seeded from the clock
fn random_values(size: usize, max: u64) -> Vec<u64> {
    let mut state = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0x9E37_79B9_7F4A_7C15, |d| d.as_nanos() as u64)
        | 1;
    (0..size)
        .map(|_| {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            state.wrapping_mul(0x2545_F491_4F6C_DD1D) % max
        })
        .collect()
}

fn main() {
    let mut args = std::env::args().skip(1);
    let size = args.next().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_SIZE).max(1);
    let max = args.next().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_MAX).max(1);

    let values: Rc<[u64]> = random_values(size, max).into();
    let start = Instant::now();

    let threaded = {
        let values = values.clone();
        Builder::new()
            .spawn(move || sum(values, 0, size - 1))
            .and_then(|h| h.join())
    };

    match threaded {
        Ok(Some(Ok(total))) => {
            kinfo!("summed {} values in {:?}", size, start.elapsed());
            println!("Sum calculated using threads: {}", total);
        }
        Ok(Some(Err(e))) | Err(e) => {
            kerror!("threaded sum failed: {}", e);
            std::process::exit(1);
        }
        Ok(None) => {
            kerror!("summing thread terminated abnormally");
            std::process::exit(1);
        }
    }

    let manual: u64 = values.iter().sum();
    println!("Sum calculated manually: {}", manual);
    kinfo!("{} thread(s) still live", live_threads());
}
