use alloc::string::String;
use core::fmt;

use hal::{Errno, Frame, InterruptKind};

use crate::process::Pid;

/// Errors reported by the kernel and its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// A load asked for more frames than the pool holds.
    InsufficientMemory { requested: usize, available: usize },
    InvalidPid(Pid),
    /// `next` was called on an empty scheduler.
    SchedulerUnderflow,
    /// A frame was returned that is not currently in use.
    FrameAccountingViolation(Frame),
    ProgramNotFound(String),
    InvalidPriority(u8),
    /// A handler that needs a running process found the slot empty.
    NoRunningProcess,
    /// IO_OUT arrived with no operation in flight.
    NoFinishedOperation,
    /// The running slot disagrees with the PCB states.
    RunningSlotCorrupt,
    UnhandledInterrupt(InterruptKind),
    InvalidConfig(&'static str),
    Hardware(Errno),
}

impl KernelError {
    /// Returns true for errors caused by caller input rather than a broken invariant.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            KernelError::InsufficientMemory { .. }
                | KernelError::ProgramNotFound(_)
                | KernelError::InvalidPriority(_)
        )
    }
}

impl From<Errno> for KernelError {
    fn from(errno: Errno) -> Self {
        KernelError::Hardware(errno)
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::InsufficientMemory {
                requested,
                available,
            } => write!(
                f,
                "insufficient memory: {} frames requested, {} free",
                requested, available
            ),
            KernelError::InvalidPid(pid) => write!(f, "unknown pid {}", pid),
            KernelError::SchedulerUnderflow => f.write_str("scheduler has no ready process"),
            KernelError::FrameAccountingViolation(frame) => {
                write!(f, "frame {} is not in use", frame)
            }
            KernelError::ProgramNotFound(path) => write!(f, "no program at {}", path),
            KernelError::InvalidPriority(value) => {
                write!(f, "priority {} outside 1..=5", value)
            }
            KernelError::NoRunningProcess => f.write_str("no running process"),
            KernelError::NoFinishedOperation => f.write_str("no I/O operation in flight"),
            KernelError::RunningSlotCorrupt => f.write_str("running slot is inconsistent"),
            KernelError::UnhandledInterrupt(kind) => {
                write!(f, "no handler registered for {}", kind)
            }
            KernelError::InvalidConfig(reason) => write!(f, "invalid config: {}", reason),
            KernelError::Hardware(errno) => write!(f, "hardware error: {}", errno),
        }
    }
}

impl core::error::Error for KernelError {}
