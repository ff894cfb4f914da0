//! C ABI for tracers not written in Rust.

use core::ffi::c_void;

use crate::trampoline;

/// Size in bytes of the code to inject.
#[unsafe(no_mangle)]
pub extern "C" fn trampy_get_code_size() -> usize {
    trampoline::trampoline_size()
}

/// Entry of the code to inject, valid in the caller's address space only.
#[unsafe(no_mangle)]
pub extern "C" fn trampy_get_safe_entry() -> *const c_void {
    trampoline::trampoline_entry()
}
