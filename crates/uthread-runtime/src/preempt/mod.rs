//! Quantum timer for involuntary preemption
//!
//! A per-OS-thread CPU-time timer delivers `SIGVTALRM` to the thread that
//! runs the green threads. The handler preempts the running thread unless
//! the interrupt mask is held, in which case the preemption is deferred to
//! the point where the mask drops.

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod linux;
        pub(crate) use linux::PreemptTimer;
    } else {
        mod stub;
        pub(crate) use stub::PreemptTimer;
    }
}
