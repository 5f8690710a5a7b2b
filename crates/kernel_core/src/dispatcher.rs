use hal::{CpuOps, MmuOps, TimerOps};
use log::debug;

use crate::error::KernelError;
use crate::paging::PageTable;
use crate::process::Pcb;

/// Context switch bridge between a PCB and the CPU, MMU and timer.
///
/// Never touches the frame pool or the scheduler.
#[derive(Debug, Default, Clone, Copy)]
pub struct Dispatcher;

impl Dispatcher {
    /// Creates a dispatcher.
    pub fn new() -> Self {
        Self
    }

    /// Installs the process's translations, restarts the time slice and resumes at its pc.
    pub fn load<H>(&self, hardware: &mut H, pcb: &Pcb, table: &PageTable)
    where
        H: CpuOps + MmuOps + TimerOps + ?Sized,
    {
        hardware.reset_translation();
        for (page, frame) in table.iter() {
            hardware.set_page_frame(page, frame);
        }
        hardware.reset_timer();
        hardware.set_pc(Some(pcb.pc));
        debug!("dispatch: load pid={} pc={}", pcb.pid, pcb.pc);
    }

    /// Copies the CPU program counter into the PCB and idles the CPU.
    pub fn save<H>(&self, hardware: &mut H, pcb: &mut Pcb) -> Result<(), KernelError>
    where
        H: CpuOps + ?Sized,
    {
        let pc = hardware.pc().ok_or(KernelError::NoRunningProcess)?;
        pcb.pc = pc;
        hardware.set_pc(None);
        debug!("dispatch: save pid={} pc={}", pcb.pid, pc);
        Ok(())
    }
}
