#![cfg_attr(not(test), no_std)]

extern crate alloc;

use alloc::string::String;
use core::fmt;

/// Physical memory cell index.
pub type PhysAddr = usize;

/// Logical (per-process) address.
pub type LogicalAddr = usize;

/// Logical page number inside a process image.
pub type Page = usize;

/// Physical frame number.
pub type Frame = usize;

/// Common error codes raised by the simulated devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    InvalidArg,
    OutOfBounds,
    PageFault,
    DeviceBusy,
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Errno::InvalidArg => "invalid argument",
            Errno::OutOfBounds => "address out of bounds",
            Errno::PageFault => "page not mapped",
            Errno::DeviceBusy => "device busy",
        };
        f.write_str(text)
    }
}

/// Instruction set understood by the simulated CPU and I/O device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Cpu,
    Io,
    Exit,
}

impl Instruction {
    pub const fn is_exit(self) -> bool {
        matches!(self, Instruction::Exit)
    }

    pub const fn is_io(self) -> bool {
        matches!(self, Instruction::Io)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Cpu => f.write_str("CPU"),
            Instruction::Io => f.write_str("IO"),
            Instruction::Exit => f.write_str("EXIT"),
        }
    }
}

/// The five interrupt kinds the kernel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InterruptKind {
    New,
    Kill,
    IoIn,
    IoOut,
    Timeout,
}

impl fmt::Display for InterruptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            InterruptKind::New => "NEW",
            InterruptKind::Kill => "KILL",
            InterruptKind::IoIn => "IO_IN",
            InterruptKind::IoOut => "IO_OUT",
            InterruptKind::Timeout => "TIMEOUT",
        };
        f.write_str(text)
    }
}

/// Interrupt request together with its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Irq {
    New { path: String, priority: u8 },
    Kill,
    IoIn { operation: Instruction },
    IoOut,
    Timeout,
}

impl Irq {
    /// Returns the kind used to route this request.
    pub fn kind(&self) -> InterruptKind {
        match self {
            Irq::New { .. } => InterruptKind::New,
            Irq::Kill => InterruptKind::Kill,
            Irq::IoIn { .. } => InterruptKind::IoIn,
            Irq::IoOut => InterruptKind::IoOut,
            Irq::Timeout => InterruptKind::Timeout,
        }
    }
}

/// Program counter register.
pub trait CpuOps {
    /// Current program counter, `None` while no process is active.
    fn pc(&self) -> Option<LogicalAddr>;

    /// Loads the program counter; `None` idles the CPU.
    fn set_pc(&mut self, pc: Option<LogicalAddr>);
}

/// Address translation unit.
pub trait MmuOps {
    /// Drops every cached page to frame translation.
    fn reset_translation(&mut self);

    /// Installs a single page to frame translation.
    fn set_page_frame(&mut self, page: Page, frame: Frame);

    /// Configures the frame size used to split logical addresses.
    fn set_frame_size(&mut self, frame_size: usize);
}

/// Quantum timer.
pub trait TimerOps {
    /// Restarts the current time slice.
    fn reset_timer(&mut self);

    /// Sets the slice length; `None` disables timeouts.
    fn set_quantum(&mut self, quantum: Option<u32>);
}

/// Physical memory array.
pub trait MemoryOps {
    /// Stores an instruction at a physical address.
    fn put(&mut self, addr: PhysAddr, instruction: Instruction) -> Result<(), Errno>;

    /// Returns the number of memory cells.
    fn size(&self) -> usize;
}

/// Single-operation I/O device.
pub trait IoDeviceOps {
    /// Starts an operation. Callers check `is_idle` first.
    fn execute(&mut self, operation: Instruction) -> Result<(), Errno>;

    /// Returns true when no operation is in flight.
    fn is_idle(&self) -> bool;
}

/// Machine power control.
pub trait PowerOps {
    /// Stops the simulation loop.
    fn power_off(&mut self);
}

/// Everything the kernel needs from the machine it runs on.
pub trait Hardware: CpuOps + MmuOps + TimerOps + MemoryOps + IoDeviceOps + PowerOps {}

impl<T> Hardware for T where T: CpuOps + MmuOps + TimerOps + MemoryOps + IoDeviceOps + PowerOps {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn irq_reports_its_kind() {
        let irq = Irq::New {
            path: "prg1.exe".into(),
            priority: 3,
        };
        assert_eq!(irq.kind(), InterruptKind::New);
        assert_eq!(
            Irq::IoIn {
                operation: Instruction::Io
            }
            .kind(),
            InterruptKind::IoIn
        );
        assert_eq!(Irq::Timeout.kind(), InterruptKind::Timeout);
    }

    #[test]
    fn instruction_predicates_and_display() {
        assert!(Instruction::Exit.is_exit());
        assert!(!Instruction::Cpu.is_exit());
        assert!(Instruction::Io.is_io());
        assert_eq!(format!("{}", Instruction::Io), "IO");
        assert_eq!(format!("{}", InterruptKind::IoOut), "IO_OUT");
    }
}
