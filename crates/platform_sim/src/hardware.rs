use hal::{
    CpuOps, Errno, Frame, Instruction, IoDeviceOps, Irq, LogicalAddr, MemoryOps, MmuOps, Page,
    PhysAddr, PowerOps, TimerOps,
};
use log::trace;

use crate::devices::{Cpu, IoDevice, Memory, Mmu, Timer};

/// The simulated machine the kernel runs on.
///
/// Devices never call into the kernel. Each tick phase returns the
/// interrupt it raised and the caller hands it to the kernel before the
/// next phase runs.
#[derive(Debug)]
pub struct SimHardware {
    pub cpu: Cpu,
    pub mmu: Mmu,
    pub timer: Timer,
    pub memory: Memory,
    pub io_device: IoDevice,
    powered_off: bool,
}

impl SimHardware {
    pub fn new(memory_size: usize, io_latency: u32) -> Self {
        Self {
            cpu: Cpu::default(),
            mmu: Mmu::default(),
            timer: Timer::default(),
            memory: Memory::new(memory_size),
            io_device: IoDevice::new(io_latency),
            powered_off: false,
        }
    }

    pub fn is_powered_off(&self) -> bool {
        self.powered_off
    }

    /// I/O phase of a tick.
    pub fn tick_io(&mut self) -> Option<Irq> {
        self.io_device.tick().then_some(Irq::IoOut)
    }

    /// Timer and CPU phase of a tick: either the slice runs out or the CPU
    /// fetches, advances and decodes one instruction.
    pub fn tick_cpu(&mut self) -> Result<Option<Irq>, Errno> {
        if self.timer.tick(self.cpu.is_busy()) {
            return Ok(Some(Irq::Timeout));
        }
        let Some(pc) = self.cpu.pc else {
            return Ok(None);
        };
        let addr = self.mmu.translate(pc)?;
        let instruction = self.memory.get(addr)?;
        self.cpu.pc = Some(pc + 1);
        trace!("cpu: pc={} mem[{}] {}", pc, addr, instruction);
        Ok(match instruction {
            Instruction::Cpu => None,
            Instruction::Io => Some(Irq::IoIn {
                operation: instruction,
            }),
            Instruction::Exit => Some(Irq::Kill),
        })
    }
}

impl CpuOps for SimHardware {
    fn pc(&self) -> Option<LogicalAddr> {
        self.cpu.pc
    }

    fn set_pc(&mut self, pc: Option<LogicalAddr>) {
        self.cpu.pc = pc;
    }
}

impl MmuOps for SimHardware {
    fn reset_translation(&mut self) {
        self.mmu.reset();
    }

    fn set_page_frame(&mut self, page: Page, frame: Frame) {
        self.mmu.set_page_frame(page, frame);
    }

    fn set_frame_size(&mut self, frame_size: usize) {
        self.mmu.set_frame_size(frame_size);
    }
}

impl TimerOps for SimHardware {
    fn reset_timer(&mut self) {
        self.timer.reset();
    }

    fn set_quantum(&mut self, quantum: Option<u32>) {
        self.timer.set_quantum(quantum);
    }
}

impl MemoryOps for SimHardware {
    fn put(&mut self, addr: PhysAddr, instruction: Instruction) -> Result<(), Errno> {
        self.memory.put(addr, instruction)
    }

    fn size(&self) -> usize {
        self.memory.size()
    }
}

impl IoDeviceOps for SimHardware {
    fn execute(&mut self, operation: Instruction) -> Result<(), Errno> {
        self.io_device.execute(operation)
    }

    fn is_idle(&self) -> bool {
        self.io_device.is_idle()
    }
}

impl PowerOps for SimHardware {
    fn power_off(&mut self) {
        self.powered_off = true;
    }
}
