//! Injectable fork/clone trampoline for ptrace-based tracers.
//!
//! A tracer that intercepts `fork`/`clone` in a child cannot let the raw
//! syscall run (the new process would escape tracing). Instead it copies the
//! small image provided here into the child, points the child's program
//! counter at it and lets it spin on `sched_yield` until the tracer has
//! patched the first idle syscall into the real fork/clone.
//!
//! # Features
//!
//! - `capi` - export `trampy_get_code_size` / `trampy_get_safe_entry`
//!
//! # Quick Start
//!
//! ```ignore
//! let image = trampy::init()?;
//! let bytes = image.bytes()?;
//! // poke `bytes` into the target at `base`, then:
//! let layout = trampy::InjectionLayout::at(base);
//! set_pc(pid, layout.entry());
//! ```
//!
//! Supported targets: Linux on x86_64, x86, arm and aarch64. Any other
//! target fails to compile.

#![no_std]

#[macro_use]
extern crate log;

pub mod arch;
pub mod image;
pub mod layout;
pub mod trampoline;

#[cfg(feature = "capi")]
pub mod capi;

pub use arch::{IDLE_SYSCALL, Isa, SyscallConvention};
pub use image::{Error, MAX_IMAGE_LEN, TrampolineImage};
pub use layout::InjectionLayout;
pub use trampoline::{trampoline_entry, trampoline_size};

/// Validate the compiled image and log where it is.
///
/// Call once at tracer startup; the result never changes for the lifetime
/// of the process.
pub fn init() -> Result<TrampolineImage, Error> {
    let conv = SyscallConvention::HOST;
    debug!(
        "trampy: {} convention, enter kernel via `{}`, number {:?}, base {:#x}",
        conv.isa, conv.enter_kernel, conv.number, conv.base
    );

    match TrampolineImage::checked() {
        Ok(image) => {
            info!(
                "trampy: image at {:p}, {} bytes, idle syscall {}",
                image.entry(),
                image.len(),
                IDLE_SYSCALL
            );
            if image.len() != conv.image_len() {
                warn!(
                    "trampy: image is {} bytes, expected {} for {}",
                    image.len(),
                    conv.image_len(),
                    conv.isa
                );
            }
            Ok(image)
        }
        Err(e) => {
            error!("trampy: {}", e);
            Err(e)
        }
    }
}
