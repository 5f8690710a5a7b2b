use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

use hal::{
    CpuOps, Errno, Frame, Instruction, IoDeviceOps, LogicalAddr, MemoryOps, MmuOps, Page,
    PhysAddr, PowerOps, TimerOps,
};

/// Recording hardware used by unit tests.
#[derive(Debug)]
pub struct MockHardware {
    pub pc: Option<LogicalAddr>,
    pub tlb: BTreeMap<Page, Frame>,
    pub frame_size: usize,
    pub quantum: Option<u32>,
    pub timer_resets: usize,
    pub cells: Vec<Option<Instruction>>,
    pub writes: usize,
    pub io_busy: bool,
    pub io_started: Vec<Instruction>,
    pub powered_off: usize,
}

impl MockHardware {
    pub fn new(memory_size: usize) -> Self {
        Self {
            pc: None,
            tlb: BTreeMap::new(),
            frame_size: 0,
            quantum: None,
            timer_resets: 0,
            cells: vec![None; memory_size],
            writes: 0,
            io_busy: false,
            io_started: Vec::new(),
            powered_off: 0,
        }
    }

    /// Marks the in-flight I/O operation as done.
    pub fn finish_io(&mut self) {
        self.io_busy = false;
    }
}

impl CpuOps for MockHardware {
    fn pc(&self) -> Option<LogicalAddr> {
        self.pc
    }

    fn set_pc(&mut self, pc: Option<LogicalAddr>) {
        self.pc = pc;
    }
}

impl MmuOps for MockHardware {
    fn reset_translation(&mut self) {
        self.tlb.clear();
    }

    fn set_page_frame(&mut self, page: Page, frame: Frame) {
        self.tlb.insert(page, frame);
    }

    fn set_frame_size(&mut self, frame_size: usize) {
        self.frame_size = frame_size;
    }
}

impl TimerOps for MockHardware {
    fn reset_timer(&mut self) {
        self.timer_resets += 1;
    }

    fn set_quantum(&mut self, quantum: Option<u32>) {
        self.quantum = quantum;
    }
}

impl MemoryOps for MockHardware {
    fn put(&mut self, addr: PhysAddr, instruction: Instruction) -> Result<(), Errno> {
        let cell = self.cells.get_mut(addr).ok_or(Errno::OutOfBounds)?;
        *cell = Some(instruction);
        self.writes += 1;
        Ok(())
    }

    fn size(&self) -> usize {
        self.cells.len()
    }
}

impl IoDeviceOps for MockHardware {
    fn execute(&mut self, operation: Instruction) -> Result<(), Errno> {
        if self.io_busy {
            return Err(Errno::DeviceBusy);
        }
        self.io_busy = true;
        self.io_started.push(operation);
        Ok(())
    }

    fn is_idle(&self) -> bool {
        !self.io_busy
    }
}

impl PowerOps for MockHardware {
    fn power_off(&mut self) {
        self.powered_off += 1;
    }
}
