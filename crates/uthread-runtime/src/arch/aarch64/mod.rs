//! aarch64 context switching implementation
//!
//! AAPCS64: x19-x29, the link register, sp and the low halves of v8-v15
//! (d8-d15) survive calls and are saved here.

use std::arch::naked_asm;

use super::EntryFn;

/// Saved register block (offsets are used by the assembly below)
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MachineContext {
    pub sp: u64,       // 0x00
    pub lr: u64,       // 0x08, resume address
    pub x19_x28: [u64; 10], // 0x10..0x60
    pub fp: u64,       // 0x60
    pub d8_d15: [u64; 8], // 0x68..0xA8
}

/// Initialize a fresh context
///
/// The first `switch_context` into `regs` returns into the trampoline with
/// `stack_top` (rounded down to 16 bytes) as sp; the trampoline calls
/// `entry(arg)` from x19/x20.
pub fn init_context(regs: &mut MachineContext, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    let sp = (stack_top as usize) & !0xF;

    *regs = MachineContext::default();
    regs.sp = sp as u64;
    regs.lr = entry_trampoline as usize as u64;
    regs.x19_x28[0] = entry as usize as u64;
    regs.x19_x28[1] = arg as u64;
}

#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "blr x19",
        "brk #1",
    );
}

/// Save the running context into `old` and resume `new`
///
/// # Safety
///
/// Same contract as the x86_64 version: `new` must come from
/// `init_context` or an earlier switch, with its stack still mapped.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old: *mut MachineContext, _new: *const MachineContext) {
    naked_asm!(
        // Save into old (x0)
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "str x30, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "str x29, [x0, #0x60]",
        "stp d8, d9, [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Load from new (x1)
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldr x30, [x1, #0x08]",
        "ldp x19, x20, [x1, #0x10]",
        "ldp x21, x22, [x1, #0x20]",
        "ldp x23, x24, [x1, #0x30]",
        "ldp x25, x26, [x1, #0x40]",
        "ldp x27, x28, [x1, #0x50]",
        "ldr x29, [x1, #0x60]",
        "ldp d8, d9, [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        "ret",
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    extern "C" fn never(_: usize) {}

    #[test]
    fn test_layout_matches_asm_offsets() {
        assert_eq!(offset_of!(MachineContext, lr), 0x08);
        assert_eq!(offset_of!(MachineContext, x19_x28), 0x10);
        assert_eq!(offset_of!(MachineContext, fp), 0x60);
        assert_eq!(offset_of!(MachineContext, d8_d15), 0x68);
        assert_eq!(size_of::<MachineContext>(), 0xA8);
    }

    #[test]
    fn test_init_context_aligns_stack() {
        let mut regs = MachineContext::default();
        init_context(&mut regs, 0x2000_000F as *mut u8, never, 5);
        assert_eq!(regs.sp, 0x2000_0000);
        assert_eq!(regs.x19_x28[1], 5);
    }
}
