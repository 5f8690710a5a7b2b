use std::collections::BTreeMap;

use hal::{Errno, Frame, Instruction, LogicalAddr, Page, PhysAddr};
use log::trace;

/// Program counter register. `None` means no process is active.
#[derive(Debug, Default)]
pub struct Cpu {
    pub pc: Option<LogicalAddr>,
}

impl Cpu {
    pub fn is_busy(&self) -> bool {
        self.pc.is_some()
    }
}

/// Translation cache from logical pages to physical frames.
#[derive(Debug, Default)]
pub struct Mmu {
    frame_size: usize,
    tlb: BTreeMap<Page, Frame>,
}

impl Mmu {
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn set_frame_size(&mut self, frame_size: usize) {
        self.frame_size = frame_size;
    }

    pub fn reset(&mut self) {
        self.tlb.clear();
    }

    pub fn set_page_frame(&mut self, page: Page, frame: Frame) {
        self.tlb.insert(page, frame);
    }

    pub fn frame(&self, page: Page) -> Option<Frame> {
        self.tlb.get(&page).copied()
    }

    /// Splits `addr` into page and offset and maps it to a physical cell.
    pub fn translate(&self, addr: LogicalAddr) -> Result<PhysAddr, Errno> {
        if self.frame_size == 0 {
            return Err(Errno::InvalidArg);
        }
        let page = addr / self.frame_size;
        let offset = addr % self.frame_size;
        let frame = self.frame(page).ok_or(Errno::PageFault)?;
        Ok(frame * self.frame_size + offset)
    }
}

/// Quantum timer. Counts ticks while the CPU is busy and fires once the
/// count passes the quantum.
#[derive(Debug, Default)]
pub struct Timer {
    quantum: Option<u32>,
    count: u32,
}

impl Timer {
    pub fn quantum(&self) -> Option<u32> {
        self.quantum
    }

    pub fn set_quantum(&mut self, quantum: Option<u32>) {
        self.quantum = quantum;
        self.count = 0;
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Advances one tick. Returns true when the slice has run out; the CPU
    /// does not execute on that tick.
    pub fn tick(&mut self, cpu_busy: bool) -> bool {
        let Some(quantum) = self.quantum else {
            return false;
        };
        if !cpu_busy {
            return false;
        }
        self.count += 1;
        self.count > quantum
    }
}

/// Physical memory array of instruction cells.
#[derive(Debug)]
pub struct Memory {
    cells: Vec<Option<Instruction>>,
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![None; size],
        }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn put(&mut self, addr: PhysAddr, instruction: Instruction) -> Result<(), Errno> {
        let cell = self.cells.get_mut(addr).ok_or(Errno::OutOfBounds)?;
        *cell = Some(instruction);
        Ok(())
    }

    /// Reads a cell. Cells never written hold no instruction.
    pub fn get(&self, addr: PhysAddr) -> Result<Instruction, Errno> {
        self.cells
            .get(addr)
            .ok_or(Errno::OutOfBounds)?
            .ok_or(Errno::InvalidArg)
    }
}

#[derive(Debug, Clone, Copy)]
struct Operation {
    instruction: Instruction,
    elapsed: u32,
}

/// Single-operation device that completes `latency` ticks after it starts.
#[derive(Debug)]
pub struct IoDevice {
    latency: u32,
    current: Option<Operation>,
    completed: usize,
}

impl IoDevice {
    pub fn new(latency: u32) -> Self {
        Self {
            latency,
            current: None,
            completed: 0,
        }
    }

    pub fn latency(&self) -> u32 {
        self.latency
    }

    pub fn is_idle(&self) -> bool {
        self.current.is_none()
    }

    /// Number of operations finished since power-on.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn execute(&mut self, instruction: Instruction) -> Result<(), Errno> {
        if self.current.is_some() {
            return Err(Errno::DeviceBusy);
        }
        self.current = Some(Operation {
            instruction,
            elapsed: 0,
        });
        Ok(())
    }

    /// Advances one tick. Returns true when the operation in flight completes.
    pub fn tick(&mut self) -> bool {
        let Some(operation) = self.current.as_mut() else {
            return false;
        };
        operation.elapsed += 1;
        if operation.elapsed < self.latency {
            return false;
        }
        trace!(
            "io device: {} done after {} ticks",
            operation.instruction,
            operation.elapsed
        );
        self.current = None;
        self.completed += 1;
        true
    }
}
