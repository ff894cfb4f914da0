//! Syscall conventions of the supported instruction sets.
//!
//! Each entry describes how to invoke a syscall with a number and no
//! arguments: the instruction that enters the kernel, where the number
//! travels, and the base offset added to the number before encoding.
//! The byte lengths recorded here are those of the encodings emitted by
//! [`crate::trampoline`].

#[cfg(not(any(target_os = "linux", target_os = "android")))]
compile_error!("trampy only supports Linux syscall numbering");

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "x86",
    target_arch = "arm",
    target_arch = "aarch64"
)))]
compile_error!("Architecture not supported by trampy on Linux");

/// Logical number of the idle syscall (`sched_yield`) on the build target.
pub const IDLE_SYSCALL: u32 = libc::SYS_sched_yield as u32;

/// Instruction set architectures with a validated trampoline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isa {
    /// 64-bit x86.
    X86_64,
    /// 32-bit x86.
    X86,
    /// 32-bit ARM, ARM state.
    Arm,
    /// 64-bit ARM.
    AArch64,
}

impl Isa {
    /// The instruction set this crate was built for.
    #[cfg(target_arch = "x86_64")]
    pub const HOST: Isa = Isa::X86_64;
    #[cfg(target_arch = "x86")]
    pub const HOST: Isa = Isa::X86;
    #[cfg(target_arch = "arm")]
    pub const HOST: Isa = Isa::Arm;
    #[cfg(target_arch = "aarch64")]
    pub const HOST: Isa = Isa::AArch64;

    /// Target-triple style name of the ISA.
    pub const fn name(self) -> &'static str {
        match self {
            Isa::X86_64 => "x86_64",
            Isa::X86 => "x86",
            Isa::Arm => "arm",
            Isa::AArch64 => "aarch64",
        }
    }
}

impl core::fmt::Display for Isa {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Where the syscall number is placed before trapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberOperand {
    /// Loaded into the named register.
    Register(&'static str),
    /// Encoded in the trap instruction itself.
    Immediate,
    /// Loaded into the named register and also encoded, biased, in the
    /// trap immediate. Covers ABIs that read either one.
    RegisterAndImmediate(&'static str),
}

/// How one ISA invokes a syscall without arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallConvention {
    pub isa: Isa,
    /// Instruction that enters kernel mode.
    pub enter_kernel: &'static str,
    /// Operand carrying the syscall number.
    pub number: NumberOperand,
    /// Added to logical syscall numbers before emission.
    pub base: u32,
    /// Encoded length of the number load, 0 when the number is an immediate.
    pub load_len: usize,
    /// Encoded length of the trap instruction.
    pub trap_len: usize,
    /// Encoded length of the backward branch closing the idle loop.
    pub branch_len: usize,
}

/// `syscall` with the number in `rax`, loaded as `xor eax, eax; mov al, nr`.
pub const X86_64: SyscallConvention = SyscallConvention {
    isa: Isa::X86_64,
    enter_kernel: "syscall",
    number: NumberOperand::Register("rax"),
    base: 0,
    load_len: 4,
    trap_len: 2,
    branch_len: 2,
};

/// `int 0x80` with the number in `eax`, loaded like x86_64.
pub const X86: SyscallConvention = SyscallConvention {
    isa: Isa::X86,
    enter_kernel: "int 0x80",
    number: NumberOperand::Register("eax"),
    base: 0,
    load_len: 4,
    trap_len: 2,
    branch_len: 2,
};

/// `swi` with the plain number in `r7` for EABI kernels and the number
/// biased by the OABI `__NR_SYSCALL_BASE` in the 24-bit immediate.
pub const ARM: SyscallConvention = SyscallConvention {
    isa: Isa::Arm,
    enter_kernel: "svc",
    number: NumberOperand::RegisterAndImmediate("r7"),
    base: 0x90_0000,
    load_len: 4,
    trap_len: 4,
    branch_len: 4,
};

/// `svc #0` with the number in `x8`.
pub const AARCH64: SyscallConvention = SyscallConvention {
    isa: Isa::AArch64,
    enter_kernel: "svc #0",
    number: NumberOperand::Register("x8"),
    base: 0,
    load_len: 4,
    trap_len: 4,
    branch_len: 4,
};

/// Every convention this crate knows, whether or not it is the build target.
pub const CONVENTIONS: [SyscallConvention; 4] = [X86_64, X86, ARM, AARCH64];

impl SyscallConvention {
    /// Convention of the build target.
    pub const HOST: SyscallConvention = Self::for_isa(Isa::HOST);

    /// Table entry for `isa`.
    pub const fn for_isa(isa: Isa) -> SyscallConvention {
        match isa {
            Isa::X86_64 => X86_64,
            Isa::X86 => X86,
            Isa::Arm => ARM,
            Isa::AArch64 => AARCH64,
        }
    }

    /// Number as it must appear in the trap immediate.
    pub const fn encode(&self, nr: u32) -> u32 {
        self.base + nr
    }

    /// Bytes of one number load plus trap.
    pub const fn invocation_len(&self) -> usize {
        self.load_len + self.trap_len
    }

    /// Bytes of the whole image: the first invocation, the looped
    /// invocation and the branch back.
    pub const fn image_len(&self) -> usize {
        2 * self.invocation_len() + self.branch_len
    }

    /// Offsets of the two trap instructions from the entry marker.
    pub const fn trap_offsets(&self) -> [usize; 2] {
        [self.load_len, self.invocation_len() + self.load_len]
    }
}
