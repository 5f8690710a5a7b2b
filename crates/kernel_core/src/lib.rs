#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fs;
pub mod gantt;
pub mod interrupt;
pub mod io;
pub mod kernel;
pub mod loader;
pub mod memory;
pub mod paging;
pub mod process;
pub mod program;
pub mod scheduler;

#[cfg(test)]
mod mock;

pub use config::{KernelConfig, DEFAULT_FRAME_SIZE};
pub use dispatcher::Dispatcher;
pub use error::KernelError;
pub use fs::FileSystem;
pub use gantt::GanttDiagram;
pub use hal::{Errno, Instruction, InterruptKind, Irq};
pub use interrupt::{Handler, InterruptVector};
pub use io::{IoDeviceController, IoRequest};
pub use kernel::Kernel;
pub use loader::{load_program, pages_needed};
pub use memory::MemoryManager;
pub use paging::PageTable;
pub use process::{Pcb, PcbTable, Pid, Priority, ProcState};
pub use program::{asm, Program};
pub use scheduler::{
    Fcfs, NonPreemptivePriority, Policy, PreemptivePriority, PriorityQueues, RoundRobin,
    Scheduler,
};
