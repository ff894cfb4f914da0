//! Addresses of an injected copy of the trampoline.
//!
//! The image is position independent, so once the collaborator has copied
//! it to `base` in the target, every interesting address is `base` plus a
//! fixed offset from the syscall convention. This is pure arithmetic: nothing
//! here reads or writes target memory.

use crate::arch::SyscallConvention;
use crate::image::TrampolineImage;

/// Where the trampoline lives inside a target after injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionLayout {
    base: usize,
    len: usize,
    conv: SyscallConvention,
}

impl InjectionLayout {
    /// Layout of this binary's image copied to `base`.
    pub fn at(base: usize) -> Self {
        Self::with_image(base, &TrampolineImage::get())
    }

    /// Layout of `image` copied to `base`.
    pub fn with_image(base: usize, image: &TrampolineImage) -> Self {
        Self {
            base,
            len: image.len(),
            conv: SyscallConvention::HOST,
        }
    }

    /// Address to point the target's program counter at.
    pub fn entry(&self) -> usize {
        self.base
    }

    /// One past the last injected byte. Wraps for an image ending at the
    /// top of the address space.
    pub fn end(&self) -> usize {
        self.base.wrapping_add(self.len)
    }

    /// Whether `addr` falls inside the injected bytes.
    pub fn contains(&self, addr: usize) -> bool {
        addr.wrapping_sub(self.base) < self.len
    }

    /// Addresses of the two trap instructions. The first is the one the
    /// tracer turns into the real fork/clone.
    pub fn trap_sites(&self) -> [usize; 2] {
        self.conv.trap_offsets().map(|off| self.base.wrapping_add(off))
    }

    /// Whether `pc`, as reported at a syscall stop, belongs to one of the
    /// injected idle syscalls.
    ///
    /// At a syscall stop the program counter already points past the trap
    /// instruction.
    pub fn is_idle_stop(&self, pc: usize) -> bool {
        let trap_len = self.conv.trap_len;
        self.trap_sites()
            .iter()
            .any(|&site| site.wrapping_add(trap_len) == pc)
    }
}
