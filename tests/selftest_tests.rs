//! Traced self-test of an injected copy.
//!
//! The image is copied into a scratch RWX mapping, a forked child jumps to
//! the copy and the parent observes the idle syscall stops with ptrace.

#![cfg(all(target_os = "linux", target_arch = "x86_64"))]

use std::ptr;

use nix::{
    sys::{
        ptrace,
        signal::{self, Signal},
        wait::{WaitStatus, waitpid},
    },
    unistd::{ForkResult, Pid, fork},
};
use trampy::{InjectionLayout, TrampolineImage};

const PAGE_SIZE: usize = 4096;

/// Copy the image into a fresh RWX page and return its base.
fn inject_locally() -> usize {
    let bytes = TrampolineImage::checked().unwrap().bytes().unwrap();
    let page = unsafe {
        libc::mmap(
            ptr::null_mut(),
            PAGE_SIZE,
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    assert_ne!(page, libc::MAP_FAILED, "Failed to map scratch page");

    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), page as *mut u8, bytes.len()) };
    page as usize
}

/// Fork a traced child that stops itself, then runs the copy at `base`.
fn spawn_into(base: usize) -> Pid {
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            match waitpid(child, None) {
                Ok(WaitStatus::Stopped(pid, Signal::SIGSTOP)) => assert_eq!(pid, child),
                other => panic!("Expected child to stop, got {:?}", other),
            }
            ptrace::setoptions(
                child,
                ptrace::Options::PTRACE_O_TRACESYSGOOD | ptrace::Options::PTRACE_O_EXITKILL,
            )
            .expect("Failed to set ptrace options");
            child
        }
        Ok(ForkResult::Child) => {
            // CHILD PROCESS: only raw syscalls from here on. libc's raise()
            // would leave sigprocmask calls pending after the stop.
            if ptrace::traceme().is_err() {
                unsafe { libc::_exit(1) };
            }
            unsafe {
                let pid = libc::syscall(libc::SYS_getpid);
                libc::syscall(libc::SYS_kill, pid, libc::SIGSTOP);
            }
            let entry: extern "C" fn() -> ! = unsafe { std::mem::transmute(base) };
            entry()
        }
        Err(_) => {
            panic!("Fork failed");
        }
    }
}

/// Resume to the next syscall stop and return the registers there.
fn next_syscall_stop(child: Pid) -> libc::user_regs_struct {
    ptrace::syscall(child, None).expect("Failed to resume child");
    match waitpid(child, None) {
        Ok(WaitStatus::PtraceSyscall(pid)) => assert_eq!(pid, child),
        other => panic!("Expected a syscall stop, got {:?}", other),
    }
    ptrace::getregs(child).expect("Failed to read registers")
}

fn reap(child: Pid) {
    let _ = signal::kill(child, Signal::SIGKILL);
    let _ = waitpid(child, None);
}

// =============================================================================
// Idle Loop Tests
// =============================================================================

#[test]
fn test_idle_syscall_issued_from_copy() {
    let base = inject_locally();
    let layout = InjectionLayout::at(base);
    let [first, second] = layout.trap_sites();
    let child = spawn_into(base);

    let mut sites = Vec::new();
    for _ in 0..8 {
        let regs = next_syscall_stop(child);
        assert_eq!(regs.orig_rax, libc::SYS_sched_yield as u64);

        let pc = regs.rip as usize;
        assert!(layout.contains(pc - 2), "stop at {:#x} outside the copy", pc);
        assert!(layout.is_idle_stop(pc));
        sites.push(pc - 2);
    }
    reap(child);

    // Entry and exit stop of the first trap, then the loop forever
    assert_eq!(&sites[..2], &[first, first]);
    assert!(sites[2..].iter().all(|&site| site == second));
}

#[test]
fn test_tracer_patches_first_trap() {
    let base = inject_locally();
    let layout = InjectionLayout::at(base);
    let child = spawn_into(base);

    // Swap the idle syscall for getpid at its entry stop, the way a tracer
    // swaps in fork/clone
    let mut regs = next_syscall_stop(child);
    assert!(layout.is_idle_stop(regs.rip as usize));
    regs.orig_rax = libc::SYS_getpid as u64;
    ptrace::setregs(child, regs).expect("Failed to write registers");

    let regs = next_syscall_stop(child);
    assert_eq!(regs.orig_rax, libc::SYS_getpid as u64);
    assert_eq!(regs.rax, child.as_raw() as u64);

    // Back to idling afterwards
    let regs = next_syscall_stop(child);
    assert_eq!(regs.orig_rax, libc::SYS_sched_yield as u64);
    assert_eq!(regs.rip as usize, layout.trap_sites()[1] + 2);

    reap(child);
}
