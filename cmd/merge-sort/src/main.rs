//! Threaded merge sort
//!
//! Each half of every range is sorted by its own green thread; the parent
//! joins both and merges them through a shared scratch buffer.
//!
//! # Usage
//!
//! ```text
//! merge-sort [SIZE]
//! ```
//!
//! # Environment Variables
//!
//! - `UTHREAD_SCHED_POLICY=priority` - Use the priority ready queue
//! - `UTHREAD_PREEMPT=1` - Enable timer preemption
//! - `UTHREAD_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use uthread::{kerror, Builder, Result};

const DEFAULT_SIZE: usize = 10;
const STACK_SIZE: usize = 32 * 1024;

struct Buffers {
    data: Vec<i32>,
    scratch: Vec<i32>,
}

type Shared = Rc<RefCell<Buffers>>;

fn merge(buf: &mut Buffers, start: usize, mid: usize, end: usize) {
    let Buffers { data, scratch } = buf;
    let (mut i, mut j) = (start, mid + 1);
    scratch.clear();
    while i <= mid && j <= end {
        if data[i] < data[j] {
            scratch.push(data[i]);
            i += 1;
        } else {
            scratch.push(data[j]);
            j += 1;
        }
    }
    scratch.extend_from_slice(&data[i..=mid]);
    scratch.extend_from_slice(&data[j..=end]);
    data[start..=end].copy_from_slice(scratch);
}

fn merge_sort(buf: Shared, start: usize, end: usize) -> Result<()> {
    if start >= end {
        return Ok(());
    }
    let mid = (start + end) / 2;
    let builder = Builder::new().stack_size(STACK_SIZE);

    let left = {
        let buf = buf.clone();
        builder.spawn(move || merge_sort(buf, start, mid))?
    };
    let right = {
        let buf = buf.clone();
        builder.spawn(move || merge_sort(buf, mid + 1, end))?
    };
    for half in [left, right] {
        half.join()?
            .unwrap_or(Err(uthread::Error::InvalidArgument("sorting thread died")))?;
    }

    // No yield happens while the buffers are borrowed
    merge(&mut buf.borrow_mut(), start, mid, end);
    Ok(())
}

fn main() {
    let size = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SIZE)
        .max(1);

    let mut seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(1, |d| d.subsec_nanos() as u64)
        | 1;
    let data = (0..size)
        .map(|_| {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((seed >> 33) % 1000) as i32
        })
        .collect();

    let buf = Rc::new(RefCell::new(Buffers {
        data,
        scratch: Vec::with_capacity(size),
    }));

    let sorted = {
        let buf = buf.clone();
        Builder::new().spawn(move || merge_sort(buf, 0, size - 1)).and_then(|h| h.join())
    };
    match sorted {
        Ok(Some(Ok(()))) => {}
        Ok(Some(Err(e))) | Err(e) => {
            kerror!("merge sort failed: {}", e);
            std::process::exit(1);
        }
        Ok(None) => {
            kerror!("sorting thread terminated abnormally");
            std::process::exit(1);
        }
    }

    let buf = buf.borrow();
    debug_assert!(buf.data.windows(2).all(|w| w[0] <= w[1]));
    let line: Vec<String> = buf.data.iter().map(i32::to_string).collect();
    println!("Sorted array: {}", line.join(" "));
}
