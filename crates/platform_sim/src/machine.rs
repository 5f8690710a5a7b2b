use std::collections::BTreeMap;
use std::fmt;

use kernel_core::{Kernel, KernelConfig, KernelError, Pid, Program};
use log::{debug, info, warn};

use crate::hardware::SimHardware;

/// Substrate settings chosen at power-on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    /// Number of memory cells.
    pub memory_size: usize,
    /// Ticks an I/O operation takes to complete.
    pub io_latency: u32,
    /// The run stops here even if the kernel never powers off.
    pub max_ticks: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: 32,
            io_latency: 3,
            max_ticks: 10_000,
        }
    }
}

/// A submission the kernel turned down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub tick: usize,
    pub path: String,
    pub error: KernelError,
}

/// Outcome of a complete run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: usize,
    pub powered_off: bool,
    pub rejected: Vec<Rejection>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.powered_off {
            write!(f, "powered off after {} ticks", self.ticks)?;
        } else {
            write!(f, "stopped at tick limit {} without powering off", self.ticks)?;
        }
        for rejection in &self.rejected {
            write!(
                f,
                "\n  rejected {} at tick {}: {}",
                rejection.path, rejection.tick, rejection.error
            )?;
        }
        Ok(())
    }
}

/// Owns the kernel and drives the clock.
///
/// Each tick runs the I/O phase, then the timer and CPU phase, then the
/// clock observers; an interrupt raised by a phase is fully handled before
/// the next phase starts.
pub struct Machine {
    kernel: Kernel<SimHardware>,
    tick: usize,
    max_ticks: usize,
    arrivals: BTreeMap<usize, Vec<(String, u8)>>,
    rejected: Vec<Rejection>,
}

impl Machine {
    pub fn new(config: MachineConfig, kernel_config: KernelConfig) -> Result<Self, KernelError> {
        let hardware = SimHardware::new(config.memory_size, config.io_latency);
        let kernel = Kernel::new(hardware, kernel_config)?;
        info!(
            "machine: memory={} cells io_latency={} max_ticks={}",
            config.memory_size, config.io_latency, config.max_ticks
        );
        Ok(Self {
            kernel,
            tick: 0,
            max_ticks: config.max_ticks,
            arrivals: BTreeMap::new(),
            rejected: Vec::new(),
        })
    }

    /// Stores a program in the kernel's file system.
    pub fn install(&mut self, path: &str, program: Program) {
        self.kernel.file_system_mut().write(path, program);
    }

    /// Submits a program right now.
    pub fn submit(&mut self, path: &str, priority: u8) -> Result<Pid, KernelError> {
        self.kernel.submit(path, priority)
    }

    /// Submits a program at the start of tick `at_tick`.
    pub fn schedule(&mut self, at_tick: usize, path: &str, priority: u8) {
        self.arrivals
            .entry(at_tick)
            .or_default()
            .push((path.to_string(), priority));
    }

    pub fn tick(&self) -> usize {
        self.tick
    }

    pub fn kernel(&self) -> &Kernel<SimHardware> {
        &self.kernel
    }

    pub fn kernel_mut(&mut self) -> &mut Kernel<SimHardware> {
        &mut self.kernel
    }

    pub fn rejected(&self) -> &[Rejection] {
        &self.rejected
    }

    /// Runs one clock tick. Returns false once the machine is powered off.
    pub fn step(&mut self) -> Result<bool, KernelError> {
        if self.kernel.hardware().is_powered_off() {
            return Ok(false);
        }
        self.tick += 1;
        self.admit_arrivals()?;

        if let Some(irq) = self.kernel.hardware_mut().tick_io() {
            self.kernel.handle_interrupt(irq)?;
        }
        if let Some(irq) = self.kernel.hardware_mut().tick_cpu()? {
            self.kernel.handle_interrupt(irq)?;
        }
        self.kernel.hold_power(!self.arrivals.is_empty());
        self.kernel.clock_tick();
        Ok(!self.kernel.hardware().is_powered_off())
    }

    /// Ticks until power-off or the tick limit.
    pub fn run(&mut self) -> Result<RunSummary, KernelError> {
        self.run_observed(|_| {})
    }

    /// Like `run`, calling `on_tick` with the tick number before each tick.
    pub fn run_observed<F>(&mut self, mut on_tick: F) -> Result<RunSummary, KernelError>
    where
        F: FnMut(usize),
    {
        info!("machine: switch on");
        while self.tick < self.max_ticks {
            on_tick(self.tick + 1);
            if !self.step()? {
                break;
            }
        }
        let summary = self.summary();
        if !summary.powered_off {
            warn!("machine: tick limit {} reached", self.max_ticks);
        }
        Ok(summary)
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            ticks: self.tick,
            powered_off: self.kernel.hardware().is_powered_off(),
            rejected: self.rejected.clone(),
        }
    }

    fn admit_arrivals(&mut self) -> Result<(), KernelError> {
        let pending = self.arrivals.split_off(&(self.tick + 1));
        let due = std::mem::replace(&mut self.arrivals, pending);
        for (path, priority) in due.into_values().flatten() {
            match self.kernel.submit(&path, priority) {
                Ok(pid) => debug!("machine: tick {} admitted {} as pid {}", self.tick, path, pid),
                Err(error) if error.is_recoverable() => self.rejected.push(Rejection {
                    tick: self.tick,
                    path,
                    error,
                }),
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}
