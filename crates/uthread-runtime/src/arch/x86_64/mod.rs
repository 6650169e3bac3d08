//! x86_64 context switching implementation
//!
//! System V AMD64: rbx, rbp, r12-r15, the MXCSR control bits and the x87
//! control word survive calls and are saved here.

use std::arch::naked_asm;

use super::EntryFn;

/// Saved register block (offsets are used by the assembly below)
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct MachineContext {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
    pub mxcsr: u32, // 0x40
    pub fpucw: u16, // 0x44
    _pad: u16,
}

/// Default MXCSR: all exceptions masked, round to nearest
const MXCSR_DEFAULT: u32 = 0x1F80;
/// Default x87 control word: all exceptions masked, extended precision
const FPUCW_DEFAULT: u16 = 0x037F;

/// Initialize a fresh context
///
/// The first `switch_context` into `regs` lands in the trampoline with
/// `stack_top` as its stack pointer, which then calls `entry(arg)`.
/// `stack_top` is rounded down to 16 bytes; the trampoline's `call` then
/// leaves the entry function with the ABI-mandated `rsp % 16 == 8`.
pub fn init_context(regs: &mut MachineContext, stack_top: *mut u8, entry: EntryFn, arg: usize) {
    let sp = (stack_top as usize) & !0xF;

    *regs = MachineContext {
        rsp: sp as u64,
        rip: entry_trampoline as usize as u64,
        r12: entry as usize as u64,
        r13: arg as u64,
        mxcsr: MXCSR_DEFAULT,
        fpucw: FPUCW_DEFAULT,
        ..MachineContext::default()
    };
}

/// Calls the entry function held in r12 with the argument held in r13
#[unsafe(naked)]
unsafe extern "C" fn entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        // Entry functions exit through the scheduler and never come back
        "ud2",
    );
}

/// Save the running context into `old` and resume `new`
///
/// Returns when some later switch targets `old`.
///
/// # Safety
///
/// `new` must have been produced by `init_context` over a live stack, or
/// saved by an earlier `switch_context` whose stack is still mapped.
/// Neither pointer may alias memory that the switch invalidates.
#[unsafe(naked)]
pub unsafe extern "C" fn switch_context(_old: *mut MachineContext, _new: *const MachineContext) {
    naked_asm!(
        // Save into old (rdi)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        "stmxcsr [rdi + 0x40]",
        "fnstcw [rdi + 0x44]",
        // Load from new (rsi)
        "mov rsp, [rsi + 0x00]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "ldmxcsr [rsi + 0x40]",
        "fldcw [rsi + 0x44]",
        "jmp qword ptr [rsi + 0x08]",
        // Resume point for a saved context
        "1:",
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
        assert_eq!(offset_of!(MachineContext, rsp), 0x00);
        assert_eq!(offset_of!(MachineContext, rip), 0x08);
        assert_eq!(offset_of!(MachineContext, r15), 0x38);
        assert_eq!(offset_of!(MachineContext, mxcsr), 0x40);
        assert_eq!(offset_of!(MachineContext, fpucw), 0x44);
        assert_eq!(size_of::<MachineContext>(), 0x48);
    }

    #[test]
    fn test_init_context_aligns_stack() {
        let mut regs = MachineContext::default();
        init_context(&mut regs, 0x1000_0007 as *mut u8, never, 99);
        assert_eq!(regs.rsp, 0x1000_0000);
        assert_eq!(regs.r13, 99);
        assert_eq!(regs.r12, never as usize as u64);
        assert_eq!(regs.rip, entry_trampoline as usize as u64);
        assert_eq!(regs.mxcsr, MXCSR_DEFAULT);
    }
}
