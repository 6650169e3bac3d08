//! Mutex, semaphore, barrier and condition variable under green threads

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use uthread::{spawn, yield_now, Barrier, Condvar, Error, Mutex, Semaphore};

#[test]
fn test_semaphore_excludes_across_yields() {
    const K: usize = 5;
    const T: usize = 20;
    let sem = Rc::new(Semaphore::new(1));
    let counter = Rc::new(Cell::new(0usize));

    let handles: Vec<_> = (0..K)
        .map(|_| {
            let (sem, counter) = (sem.clone(), counter.clone());
            spawn(move || {
                for _ in 0..T {
                    sem.wait().unwrap();
                    let seen = counter.get();
                    yield_now();
                    counter.set(seen + 1);
                    sem.post().unwrap();
                }
            })
            .unwrap()
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(counter.get(), K * T);
    assert_eq!(sem.value(), 1);
}

#[test]
fn test_semaphore_counts_producers() {
    let sem = Rc::new(Semaphore::with_max(0, 4).unwrap());
    let consumed = Rc::new(Cell::new(0));

    let (s, c) = (sem.clone(), consumed.clone());
    let consumer = spawn(move || {
        for _ in 0..8 {
            s.wait().unwrap();
            c.set(c.get() + 1);
        }
    })
    .unwrap();

    for _ in 0..8 {
        sem.post().unwrap();
        yield_now();
    }
    consumer.join().unwrap();
    assert_eq!(consumed.get(), 8);
    assert_eq!(sem.value(), 0);
}

#[test]
fn test_semaphore_wait_under_mutex_fails() {
    let sem = Semaphore::new(0);
    let m = Mutex::new(());
    let _g = m.lock().unwrap();
    assert_eq!(sem.wait(), Err(Error::Deadlock));
}

#[test]
fn test_semaphore_destroy_under_mutex_fails() {
    let sem = Rc::new(Semaphore::new(0));
    let s = sem.clone();
    let waiter = spawn(move || s.wait()).unwrap();
    yield_now();

    let m = Mutex::new(());
    {
        let _g = m.lock().unwrap();
        assert_eq!(sem.destroy(), Err(Error::Deadlock));
    }
    assert_eq!(waiter.join().unwrap(), Some(Err(Error::Destroyed)));
}

#[test]
fn test_barrier_three_rounds() {
    const P: u32 = 4;
    const ROUNDS: u32 = 3;
    let barrier = Rc::new(Barrier::new(P).unwrap());
    let arrivals = Rc::new(RefCell::new(vec![0u32; ROUNDS as usize]));
    let leaders = Rc::new(Cell::new(0));

    let handles: Vec<_> = (0..P)
        .map(|_| {
            let (b, arrivals, leaders) = (barrier.clone(), arrivals.clone(), leaders.clone());
            spawn(move || {
                for round in 0..ROUNDS as usize {
                    arrivals.borrow_mut()[round] += 1;
                    if b.wait().unwrap() {
                        leaders.set(leaders.get() + 1);
                    }
                    // Nobody gets here before the whole round has arrived
                    assert_eq!(arrivals.borrow()[round], P);
                }
            })
            .unwrap()
        })
        .collect();

    for h in handles {
        assert_eq!(h.join().unwrap(), Some(()));
    }
    assert_eq!(leaders.get(), ROUNDS);
    assert_eq!(barrier.parties(), P);
}

#[test]
fn test_condvar_producer_consumer() {
    let shared = Rc::new((Mutex::new(VecDeque::new()), Condvar::new()));
    const ITEMS: u32 = 10;

    let s = shared.clone();
    let consumer = spawn(move || {
        let (m, cv) = &*s;
        let mut got = Vec::new();
        while got.len() < ITEMS as usize {
            let mut q = m.lock().unwrap();
            while q.is_empty() {
                q = cv.wait(q).unwrap();
            }
            got.extend(q.drain(..));
        }
        got
    })
    .unwrap();

    let (m, cv) = &*shared;
    for i in 0..ITEMS {
        m.lock().unwrap().push_back(i);
        cv.signal();
        if i % 3 == 0 {
            yield_now();
        }
    }
    assert_eq!(consumer.join().unwrap(), Some((0..ITEMS).collect::<Vec<_>>()));
    assert_eq!(cv.waiters(), 0);
}

#[test]
fn test_condvar_broadcast_releases_all() {
    let shared = Rc::new((Mutex::new(false), Condvar::new()));
    let woken = Rc::new(Cell::new(0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let (s, w) = (shared.clone(), woken.clone());
            spawn(move || {
                let (m, cv) = &*s;
                let mut go = m.lock().unwrap();
                while !*go {
                    go = cv.wait(go).unwrap();
                }
                w.set(w.get() + 1);
            })
            .unwrap()
        })
        .collect();

    yield_now();
    let (m, cv) = &*shared;
    assert_eq!(cv.waiters(), 4);
    *m.lock().unwrap() = true;
    cv.broadcast();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(woken.get(), 4);
}

#[test]
fn test_mutex_serializes_holders() {
    let m = Rc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = (0..3)
        .map(|i| {
            let m = m.clone();
            spawn(move || {
                let mut g = m.lock().unwrap();
                g.push(i);
                // Suppressed while the lock is held
                yield_now();
                g.push(i);
            })
            .unwrap()
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(*m.lock().unwrap(), vec![0, 0, 1, 1, 2, 2]);
}
