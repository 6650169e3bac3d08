//! Architecture-specific context switching
//!
//! Each architecture module provides the same three items:
//!
//! - `MachineContext` - repr(C) block of callee-saved registers
//! - `init_context` - prime a context so its first activation runs an entry function
//! - `switch_context` - save the running registers into one context and load another
//!
//! Only callee-saved state is captured: a switch is always an ordinary
//! function call from the compiler's point of view, so caller-saved registers
//! are already spilled by the time we get here.

/// Entry point run on a fresh stack; must never return
pub type EntryFn = extern "C" fn(usize);

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub use self::x86_64::{init_context, switch_context, MachineContext};
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use self::aarch64::{init_context, switch_context, MachineContext};
    } else {
        compile_error!("uthread supports x86_64 and aarch64 only");
    }
}
