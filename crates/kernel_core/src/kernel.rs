use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::vec::Vec;

use hal::{Hardware, InterruptKind, Irq};
use log::{debug, error, info, warn};

use crate::config::KernelConfig;
use crate::dispatcher::Dispatcher;
use crate::error::KernelError;
use crate::fs::FileSystem;
use crate::gantt::GanttDiagram;
use crate::interrupt::InterruptVector;
use crate::io::IoDeviceController;
use crate::loader::load_program;
use crate::memory::MemoryManager;
use crate::process::{Pcb, PcbTable, Pid, Priority, ProcState};
use crate::scheduler::{Policy, Scheduler};

/// The interrupt-driven kernel.
///
/// Owns the hardware it runs on, so every handler holds `&mut Kernel` for
/// its whole run and no second handler can start until it returns.
pub struct Kernel<H> {
    hardware: H,
    policy: Policy,
    pcb_table: PcbTable,
    scheduler: Box<dyn Scheduler>,
    dispatcher: Dispatcher,
    memory_manager: MemoryManager,
    io: IoDeviceController,
    file_system: FileSystem,
    gantt: GanttDiagram,
    vector: InterruptVector<H>,
}

impl<H: Hardware> Kernel<H> {
    /// Boots the kernel on `hardware`.
    pub fn new(mut hardware: H, config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;
        let memory_manager = MemoryManager::new(hardware.size(), config.frame_size)?;
        hardware.set_frame_size(config.frame_size);
        hardware.set_quantum(config.policy.quantum());
        hardware.set_pc(None);

        let mut vector = InterruptVector::new();
        vector.register(InterruptKind::New, on_new::<H>);
        vector.register(InterruptKind::Kill, on_kill::<H>);
        vector.register(InterruptKind::IoIn, on_io_in::<H>);
        vector.register(InterruptKind::IoOut, on_io_out::<H>);
        vector.register(InterruptKind::Timeout, on_timeout::<H>);

        info!(
            "kernel: boot policy={} frames={} frame_size={}",
            config.policy,
            memory_manager.total_frames(),
            config.frame_size
        );

        Ok(Self {
            hardware,
            policy: config.policy,
            pcb_table: PcbTable::new(),
            scheduler: config.policy.build(),
            dispatcher: Dispatcher::new(),
            memory_manager,
            io: IoDeviceController::new(),
            file_system: FileSystem::new(),
            gantt: GanttDiagram::new(),
            vector,
        })
    }

    /// Runs the program stored at `path` by raising NEW. Returns the new pid.
    pub fn submit(&mut self, path: &str, priority: u8) -> Result<Pid, KernelError> {
        let pid = self.pcb_table.peek_pid();
        self.handle_interrupt(Irq::New {
            path: path.to_string(),
            priority,
        })?;
        Ok(pid)
    }

    /// Routes an interrupt to its handler and audits the running slot afterwards.
    pub fn handle_interrupt(&mut self, irq: Irq) -> Result<(), KernelError> {
        let kind = irq.kind();
        let result = self
            .vector
            .handler(kind)
            .and_then(|handler| handler(self, irq))
            .and_then(|()| self.pcb_table.check_running_slot());
        match &result {
            Ok(()) => debug!("irq: {} handled, running={:?}", kind, self.pcb_table.running()),
            Err(err) if err.is_recoverable() => warn!("irq: {} rejected: {}", kind, err),
            Err(err) => error!("irq: {} failed: {}", kind, err),
        }
        result
    }

    /// Called once per clock tick. Powers the machine off once every process has terminated.
    pub fn clock_tick(&mut self) -> bool {
        if !self.gantt.observe(&self.pcb_table) {
            return false;
        }
        info!(
            "kernel: all processes terminated after {} ticks, powering off",
            self.gantt.ticks()
        );
        self.hardware.power_off();
        true
    }

    /// Keeps the machine on while more submissions are expected, even if
    /// every admitted process has already terminated.
    pub fn hold_power(&mut self, held: bool) {
        self.gantt.set_held(held);
    }

    /// Purges terminated PCBs from the table and returns their pids.
    pub fn reap_terminated(&mut self) -> Vec<Pid> {
        self.pcb_table.remove_terminated()
    }

    /// Returns the hardware the kernel drives.
    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    /// Returns the hardware mutably.
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    /// Returns the scheduling policy chosen at boot.
    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Returns the PCB table.
    pub fn pcb_table(&self) -> &PcbTable {
        &self.pcb_table
    }

    /// Returns the active scheduler.
    pub fn scheduler(&self) -> &dyn Scheduler {
        self.scheduler.as_ref()
    }

    /// Returns the memory manager.
    pub fn memory_manager(&self) -> &MemoryManager {
        &self.memory_manager
    }

    /// Returns the I/O device controller.
    pub fn io_controller(&self) -> &IoDeviceController {
        &self.io
    }

    /// Returns the program store.
    pub fn file_system(&self) -> &FileSystem {
        &self.file_system
    }

    /// Returns the program store mutably.
    pub fn file_system_mut(&mut self) -> &mut FileSystem {
        &mut self.file_system
    }

    /// Returns the state history.
    pub fn gantt(&self) -> &GanttDiagram {
        &self.gantt
    }

    /// Promotes `pid` to the running slot and loads its context.
    fn dispatch(&mut self, pid: Pid) -> Result<(), KernelError> {
        self.pcb_table.set_running(pid)?;
        let pcb = self.pcb_table.get(pid)?;
        let table = self.memory_manager.page_table(pid)?;
        self.dispatcher.load(&mut self.hardware, pcb, table);
        Ok(())
    }

    fn make_ready(&mut self, pid: Pid) -> Result<(), KernelError> {
        let pcb = self.pcb_table.get_mut(pid)?;
        pcb.state = ProcState::Ready;
        self.scheduler.add(pcb);
        Ok(())
    }

    /// Saves the running context and empties the running slot.
    fn save_running(&mut self) -> Result<Pid, KernelError> {
        let pid = self.pcb_table.take_running()?;
        let pcb = self.pcb_table.get_mut(pid)?;
        self.dispatcher.save(&mut self.hardware, pcb)?;
        Ok(pid)
    }

    fn dispatch_next(&mut self) -> Result<(), KernelError> {
        if self.scheduler.is_empty() {
            return Ok(());
        }
        let pid = self.scheduler.next()?;
        self.dispatch(pid)
    }

    /// Runs `pid` now if the CPU is free or the policy preempts, else queues it.
    fn run_or_queue(&mut self, pid: Pid) -> Result<(), KernelError> {
        let Some(running) = self.pcb_table.running() else {
            return self.dispatch(pid);
        };
        let preempt = self
            .scheduler
            .must_preempt(self.pcb_table.get(running)?, self.pcb_table.get(pid)?);
        if !preempt {
            return self.make_ready(pid);
        }
        let preempted = self.save_running()?;
        self.make_ready(preempted)?;
        debug!("kernel: pid={} preempts pid={}", pid, preempted);
        self.dispatch(pid)
    }
}

fn on_new<H: Hardware>(kernel: &mut Kernel<H>, irq: Irq) -> Result<(), KernelError> {
    let Irq::New { path, priority } = irq else {
        return Err(KernelError::UnhandledInterrupt(irq.kind()));
    };
    let priority = Priority::new(priority)?;
    let program = kernel.file_system.read(&path)?;
    let pid = kernel.pcb_table.allocate_pid();
    let pages = load_program(
        pid,
        program,
        &mut kernel.memory_manager,
        &mut kernel.hardware,
    )?;

    kernel.pcb_table.insert(Pcb::new(pid, priority, path));
    kernel.run_or_queue(pid)?;
    kernel.gantt.track(pid);

    let pcb = kernel.pcb_table.get(pid)?;
    info!(
        "new: pid={} path={} priority={} pages={} state={}",
        pid,
        pcb.path,
        priority.get(),
        pages,
        pcb.state
    );
    debug!("pcb table:\n{}", kernel.pcb_table);
    debug!("memory:\n{}", kernel.memory_manager);
    Ok(())
}

fn on_kill<H: Hardware>(kernel: &mut Kernel<H>, _irq: Irq) -> Result<(), KernelError> {
    let pid = kernel.save_running()?;
    let frames = kernel.memory_manager.release(pid)?;
    kernel.pcb_table.get_mut(pid)?.state = ProcState::Terminated;
    info!("kill: pid={} terminated, freed frames {:?}", pid, frames);
    kernel.dispatch_next()
}

fn on_io_in<H: Hardware>(kernel: &mut Kernel<H>, irq: Irq) -> Result<(), KernelError> {
    let Irq::IoIn { operation } = irq else {
        return Err(KernelError::UnhandledInterrupt(irq.kind()));
    };
    let pid = kernel.save_running()?;
    kernel.pcb_table.get_mut(pid)?.state = ProcState::Waiting;
    kernel.io.submit(pid, operation, &mut kernel.hardware)?;
    debug!("io_in: pid={} waiting, {}", pid, kernel.io);
    kernel.dispatch_next()
}

fn on_io_out<H: Hardware>(kernel: &mut Kernel<H>, _irq: Irq) -> Result<(), KernelError> {
    let pid = kernel.io.collect_finished(&mut kernel.hardware)?;
    debug!("io_out: pid={} finished, {}", pid, kernel.io);
    kernel.run_or_queue(pid)
}

fn on_timeout<H: Hardware>(kernel: &mut Kernel<H>, _irq: Irq) -> Result<(), KernelError> {
    if kernel.scheduler.is_empty() {
        kernel.hardware.reset_timer();
        return Ok(());
    }
    let pid = kernel.save_running()?;
    kernel.make_ready(pid)?;
    debug!("timeout: pid={} back to ready", pid);
    kernel.dispatch_next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHardware;
    use crate::program::{asm, Program};
    use hal::Instruction;

    fn boot(policy: Policy, memory_size: usize) -> Kernel<MockHardware> {
        let mut kernel = Kernel::new(
            MockHardware::new(memory_size),
            KernelConfig::with_policy(policy),
        )
        .expect("kernel should boot");
        let fs = kernel.file_system_mut();
        fs.write("prg1.exe", Program::from_blocks("prg1.exe", &[asm::cpu(2)]));
        fs.write("prg2.exe", Program::from_blocks("prg2.exe", &[asm::cpu(4), asm::io()]));
        fs.write("prg3.exe", Program::from_blocks("prg3.exe", &[asm::cpu(3)]));
        fs.write("big.exe", Program::from_blocks("big.exe", &[asm::cpu(40)]));
        kernel
    }

    fn state(kernel: &Kernel<MockHardware>, pid: Pid) -> ProcState {
        kernel.pcb_table().get(pid).expect("pcb should exist").state
    }

    #[test]
    fn boot_programs_hardware() {
        let kernel = boot(Policy::RoundRobin { quantum: 3 }, 32);
        assert_eq!(kernel.hardware().frame_size, 4);
        assert_eq!(kernel.hardware().quantum, Some(3));
        assert_eq!(kernel.memory_manager().total_frames(), 8);
    }

    #[test]
    fn boot_rejects_invalid_config() {
        let config = KernelConfig {
            frame_size: 0,
            policy: Policy::Fcfs,
        };
        assert!(matches!(
            Kernel::new(MockHardware::new(8), config),
            Err(KernelError::InvalidConfig(_))
        ));
    }

    #[test]
    fn first_submission_runs_immediately() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let pid = kernel.submit("prg1.exe", 3).expect("submit should succeed");
        assert_eq!(pid, 0);
        assert_eq!(state(&kernel, pid), ProcState::Running);
        assert_eq!(kernel.pcb_table().running(), Some(pid));
        assert_eq!(kernel.hardware().pc, Some(0));
        assert_eq!(kernel.hardware().tlb.len(), 1);
        assert_eq!(kernel.hardware().writes, 3);
    }

    #[test]
    fn later_submissions_queue_under_fcfs() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let first = kernel.submit("prg1.exe", 5).expect("submit should succeed");
        let second = kernel.submit("prg3.exe", 1).expect("submit should succeed");
        assert_eq!(kernel.pcb_table().running(), Some(first));
        assert_eq!(state(&kernel, second), ProcState::Ready);
        assert_eq!(kernel.scheduler().len(), 1);
    }

    #[test]
    fn insufficient_memory_is_reported_and_recoverable() {
        let mut kernel = boot(Policy::Fcfs, 16);
        let result = kernel.submit("big.exe", 1);
        assert_eq!(
            result,
            Err(KernelError::InsufficientMemory {
                requested: 11,
                available: 4
            })
        );
        assert!(kernel.pcb_table().is_empty());
        assert_eq!(kernel.memory_manager().free_count(), 4);
        assert_eq!(kernel.hardware().writes, 0);

        let pid = kernel.submit("prg1.exe", 1).expect("submit should succeed");
        assert_eq!(pid, 1);
    }

    #[test]
    fn unknown_program_and_bad_priority_are_rejected() {
        let mut kernel = boot(Policy::Fcfs, 16);
        assert_eq!(
            kernel.submit("nope.exe", 1),
            Err(KernelError::ProgramNotFound("nope.exe".to_string()))
        );
        assert_eq!(
            kernel.submit("prg1.exe", 0),
            Err(KernelError::InvalidPriority(0))
        );
        assert!(kernel.pcb_table().is_empty());
    }

    #[test]
    fn kill_frees_frames_and_dispatches_next() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let first = kernel.submit("prg2.exe", 3).expect("submit should succeed");
        let second = kernel.submit("prg1.exe", 3).expect("submit should succeed");
        assert_eq!(kernel.memory_manager().free_count(), 5);

        kernel.hardware_mut().pc = Some(6);
        kernel.handle_interrupt(Irq::Kill).expect("kill should succeed");

        assert_eq!(state(&kernel, first), ProcState::Terminated);
        assert_eq!(state(&kernel, second), ProcState::Running);
        assert_eq!(kernel.pcb_table().running(), Some(second));
        assert_eq!(kernel.memory_manager().free_count(), 7);
        assert!(kernel.memory_manager().page_table(first).is_err());
    }

    #[test]
    fn kill_without_running_process_is_fatal() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let result = kernel.handle_interrupt(Irq::Kill);
        assert_eq!(result, Err(KernelError::NoRunningProcess));
        assert!(!result.unwrap_err().is_recoverable());
    }

    #[test]
    fn io_in_parks_process_and_runs_next() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let first = kernel.submit("prg2.exe", 3).expect("submit should succeed");
        let second = kernel.submit("prg1.exe", 3).expect("submit should succeed");

        kernel.hardware_mut().pc = Some(5);
        kernel
            .handle_interrupt(Irq::IoIn {
                operation: Instruction::Io,
            })
            .expect("io in should succeed");

        let pcb = kernel.pcb_table().get(first).expect("pcb");
        assert_eq!(pcb.state, ProcState::Waiting);
        assert_eq!(pcb.pc, 5);
        assert_eq!(kernel.io_controller().current(), Some(first));
        assert_eq!(kernel.pcb_table().running(), Some(second));
        assert_eq!(kernel.hardware().io_started, vec![Instruction::Io]);
    }

    #[test]
    fn io_out_with_idle_cpu_resumes_process() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let pid = kernel.submit("prg2.exe", 3).expect("submit should succeed");
        kernel.hardware_mut().pc = Some(5);
        kernel
            .handle_interrupt(Irq::IoIn {
                operation: Instruction::Io,
            })
            .expect("io in should succeed");
        assert_eq!(kernel.pcb_table().running(), None);
        assert_eq!(kernel.hardware().pc, None);

        kernel.hardware_mut().finish_io();
        kernel.handle_interrupt(Irq::IoOut).expect("io out should succeed");
        assert_eq!(kernel.pcb_table().running(), Some(pid));
        assert_eq!(kernel.hardware().pc, Some(5));
    }

    #[test]
    fn io_out_without_operation_is_fatal() {
        let mut kernel = boot(Policy::Fcfs, 32);
        assert_eq!(
            kernel.handle_interrupt(Irq::IoOut),
            Err(KernelError::NoFinishedOperation)
        );
    }

    #[test]
    fn preemptive_priority_swaps_on_arrival() {
        let mut kernel = boot(Policy::PreemptivePriority, 32);
        let low = kernel.submit("prg1.exe", 4).expect("submit should succeed");
        kernel.hardware_mut().pc = Some(1);
        let high = kernel.submit("prg3.exe", 2).expect("submit should succeed");

        assert_eq!(kernel.pcb_table().running(), Some(high));
        let pcb = kernel.pcb_table().get(low).expect("pcb");
        assert_eq!(pcb.state, ProcState::Ready);
        assert_eq!(pcb.pc, 1);
        assert_eq!(kernel.scheduler().len(), 1);
        assert_eq!(kernel.hardware().pc, Some(0));
    }

    #[test]
    fn preemptive_priority_swaps_on_io_completion() {
        let mut kernel = boot(Policy::PreemptivePriority, 32);
        let high = kernel.submit("prg2.exe", 1).expect("submit should succeed");
        kernel.hardware_mut().pc = Some(5);
        kernel
            .handle_interrupt(Irq::IoIn {
                operation: Instruction::Io,
            })
            .expect("io in should succeed");
        let low = kernel.submit("prg1.exe", 5).expect("submit should succeed");
        assert_eq!(kernel.pcb_table().running(), Some(low));

        kernel.hardware_mut().finish_io();
        kernel.handle_interrupt(Irq::IoOut).expect("io out should succeed");
        assert_eq!(kernel.pcb_table().running(), Some(high));
        assert_eq!(state(&kernel, low), ProcState::Ready);
    }

    #[test]
    fn non_preemptive_priority_never_swaps() {
        let mut kernel = boot(Policy::NonPreemptivePriority, 32);
        let low = kernel.submit("prg1.exe", 5).expect("submit should succeed");
        let high = kernel.submit("prg3.exe", 1).expect("submit should succeed");
        assert_eq!(kernel.pcb_table().running(), Some(low));
        assert_eq!(state(&kernel, high), ProcState::Ready);
    }

    #[test]
    fn timeout_with_empty_scheduler_only_resets_timer() {
        let mut kernel = boot(Policy::RoundRobin { quantum: 2 }, 32);
        let pid = kernel.submit("prg1.exe", 3).expect("submit should succeed");
        let resets = kernel.hardware().timer_resets;
        kernel.handle_interrupt(Irq::Timeout).expect("timeout should succeed");
        assert_eq!(kernel.hardware().timer_resets, resets + 1);
        assert_eq!(kernel.pcb_table().running(), Some(pid));
    }

    #[test]
    fn timeout_rotates_running_process() {
        let mut kernel = boot(Policy::RoundRobin { quantum: 2 }, 32);
        let first = kernel.submit("prg1.exe", 3).expect("submit should succeed");
        let second = kernel.submit("prg3.exe", 3).expect("submit should succeed");
        kernel.hardware_mut().pc = Some(2);
        kernel.handle_interrupt(Irq::Timeout).expect("timeout should succeed");

        assert_eq!(kernel.pcb_table().running(), Some(second));
        assert_eq!(state(&kernel, first), ProcState::Ready);
        assert_eq!(kernel.pcb_table().get(first).expect("pcb").pc, 2);
        assert_eq!(kernel.scheduler().len(), 1);
    }

    #[test]
    fn clock_tick_powers_off_once_everything_terminated() {
        let mut kernel = boot(Policy::Fcfs, 32);
        kernel.submit("prg1.exe", 3).expect("submit should succeed");
        assert!(!kernel.clock_tick());
        kernel.hardware_mut().pc = Some(3);
        kernel.handle_interrupt(Irq::Kill).expect("kill should succeed");
        assert!(kernel.clock_tick());
        assert!(!kernel.clock_tick());
        assert_eq!(kernel.hardware().powered_off, 1);
    }

    #[test]
    fn held_power_defers_shutdown() {
        let mut kernel = boot(Policy::Fcfs, 32);
        kernel.submit("prg1.exe", 3).expect("submit should succeed");
        kernel.hardware_mut().pc = Some(3);
        kernel.handle_interrupt(Irq::Kill).expect("kill should succeed");

        kernel.hold_power(true);
        assert!(!kernel.clock_tick());
        assert_eq!(kernel.hardware().powered_off, 0);
        kernel.hold_power(false);
        assert!(kernel.clock_tick());
        assert_eq!(kernel.hardware().powered_off, 1);
    }

    #[test]
    fn reap_purges_only_terminated() {
        let mut kernel = boot(Policy::Fcfs, 32);
        let first = kernel.submit("prg1.exe", 3).expect("submit should succeed");
        let second = kernel.submit("prg3.exe", 3).expect("submit should succeed");
        kernel.hardware_mut().pc = Some(3);
        kernel.handle_interrupt(Irq::Kill).expect("kill should succeed");

        assert_eq!(kernel.reap_terminated(), vec![first]);
        assert!(kernel.pcb_table().get(first).is_err());
        assert!(kernel.pcb_table().get(second).is_ok());
        let third = kernel.submit("prg1.exe", 3).expect("submit should succeed");
        assert_eq!(third, 2);
    }
}
