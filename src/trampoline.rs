//! The injectable idle loop and its markers.
//!
//! The image lives in its own `.text.trampy` section and is emitted by a
//! single `global_asm!` block, so the entry marker, the instructions and the
//! size marker keep their source order in the final binary. Nothing between
//! the two markers refers to an absolute address; the loop branch is
//! PC-relative.
//!
//! Layout:
//!
//! ```text
//! trampy_safe_entry:   <idle syscall>      <- patched by the tracer
//! .Ltrampy_idle_loop:  <idle syscall>
//!                      branch .Ltrampy_idle_loop
//! trampy_size_sym:
//! ```

use core::arch::global_asm;
use core::ffi::c_void;

use crate::arch::IDLE_SYSCALL;
#[cfg(target_arch = "arm")]
use crate::arch::SyscallConvention;

/// One argument-less syscall whose number is the `nr` operand.
#[cfg(target_arch = "x86_64")]
macro_rules! make_syscall {
    () => {
        "xor eax, eax\n    mov al, {nr}\n    syscall"
    };
}

#[cfg(target_arch = "x86")]
macro_rules! make_syscall {
    () => {
        "xor eax, eax\n    mov al, {nr}\n    int 0x80"
    };
}

// r7 for EABI kernels, the biased `trap` immediate for OABI-compat ones.
#[cfg(target_arch = "arm")]
macro_rules! make_syscall {
    () => {
        "mov r7, #{nr}\n    svc #{trap}"
    };
}

#[cfg(target_arch = "aarch64")]
macro_rules! make_syscall {
    () => {
        "mov x8, #{nr}\n    svc #0"
    };
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
macro_rules! branch_back {
    () => {
        "jmp .Ltrampy_idle_loop"
    };
}

#[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
macro_rules! branch_back {
    () => {
        "b .Ltrampy_idle_loop"
    };
}

// Alignment padding lands before the entry marker and is never copied.
#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
macro_rules! isa_mode {
    () => {
        ".p2align 4"
    };
}

// ARM state is forced on 32-bit ARM so Thumb-default targets still get
// fixed 4-byte `svc` encodings.
#[cfg(target_arch = "arm")]
macro_rules! isa_mode {
    () => {
        ".arm\n    .balign 4"
    };
}

#[cfg(target_arch = "aarch64")]
macro_rules! isa_mode {
    () => {
        ".balign 4"
    };
}

/// Emit the image with the given operands.
macro_rules! emit_image {
    ($($operands:tt)*) => {
        global_asm!(
            ".pushsection .text.trampy,\"ax\",%progbits",
            isa_mode!(),
            ".globl trampy_safe_entry",
            ".hidden trampy_safe_entry",
            ".type trampy_safe_entry,%function",
            "trampy_safe_entry:",
            make_syscall!(),
            ".Ltrampy_idle_loop:",
            make_syscall!(),
            branch_back!(),
            ".globl trampy_size_sym",
            ".hidden trampy_size_sym",
            ".type trampy_size_sym,%function",
            "trampy_size_sym:",
            ".size trampy_safe_entry, trampy_size_sym - trampy_safe_entry",
            ".popsection",
            $($operands)*
        );
    };
}

#[cfg(any(target_arch = "x86_64", target_arch = "x86"))]
const _: () = assert!(IDLE_SYSCALL <= u8::MAX as u32, "idle syscall must fit `mov al`");

#[cfg(not(target_arch = "arm"))]
emit_image!(nr = const IDLE_SYSCALL);

#[cfg(target_arch = "arm")]
emit_image!(
    nr = const IDLE_SYSCALL,
    trap = const SyscallConvention::HOST.encode(IDLE_SYSCALL),
);

unsafe extern "C" {
    /// Entry marker. Never called from the tracer's own address space.
    fn trampy_safe_entry();
    /// Size marker, immediately after the last instruction of the image.
    fn trampy_size_sym();
}

/// Address of the first instruction of the image in this process.
#[inline]
pub(crate) fn entry_addr() -> usize {
    trampy_safe_entry as *const () as usize
}

/// Address one past the last byte of the image in this process.
#[inline]
pub(crate) fn end_addr() -> usize {
    trampy_size_sym as *const () as usize
}

/// Byte length of the injectable image.
///
/// Computed from the two marker symbols only, so it is available in
/// stripped builds.
pub fn trampoline_size() -> usize {
    end_addr().wrapping_sub(entry_addr())
}

/// Address of the image's entry marker.
///
/// The pointer is only meaningful inside this process: copy
/// [`trampoline_size`] bytes from it into the target, never hand the
/// pointer itself over.
pub fn trampoline_entry() -> *const c_void {
    trampy_safe_entry as *const c_void
}
