use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hal::LogicalAddr;

use crate::error::KernelError;

/// Process identifier. Assigned monotonically and never reused.
pub type Pid = u32;

/// Process lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl fmt::Display for ProcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ProcState::New => "new",
            ProcState::Ready => "ready",
            ProcState::Running => "running",
            ProcState::Waiting => "waiting",
            ProcState::Terminated => "terminated",
        };
        f.write_str(text)
    }
}

/// Scheduling priority, 1 (highest) through 5 (lowest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Self = Self(1);
    pub const LOWEST: Self = Self(5);
    pub const LEVELS: usize = 5;

    /// Validates `value` as a priority in `1..=5`.
    pub fn new(value: u8) -> Result<Self, KernelError> {
        if (Self::HIGHEST.0..=Self::LOWEST.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(KernelError::InvalidPriority(value))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Zero-based queue index for this level.
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

/// Process control block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub pid: Pid,
    pub priority: Priority,
    pub state: ProcState,
    pub pc: LogicalAddr,
    pub path: String,
}

impl Pcb {
    /// Creates a PCB in the `New` state with its program counter at zero.
    pub fn new(pid: Pid, priority: Priority, path: String) -> Self {
        Self {
            pid,
            priority,
            state: ProcState::New,
            pc: 0,
            path,
        }
    }
}

/// All known PCBs plus the single running slot.
#[derive(Debug, Default)]
pub struct PcbTable {
    pcbs: BTreeMap<Pid, Pcb>,
    running: Option<Pid>,
    next_pid: Pid,
}

impl PcbTable {
    /// Creates an empty table. The first pid handed out is 0.
    pub fn new() -> Self {
        Self {
            pcbs: BTreeMap::new(),
            running: None,
            next_pid: 0,
        }
    }

    /// Hands out the next pid.
    pub fn allocate_pid(&mut self) -> Pid {
        let pid = self.next_pid;
        self.next_pid += 1;
        pid
    }

    /// Returns the pid the next `allocate_pid` call will hand out.
    pub fn peek_pid(&self) -> Pid {
        self.next_pid
    }

    /// Inserts `pcb`, keyed by its pid.
    pub fn insert(&mut self, pcb: Pcb) {
        self.pcbs.insert(pcb.pid, pcb);
    }

    /// Looks up the PCB for `pid`.
    pub fn get(&self, pid: Pid) -> Result<&Pcb, KernelError> {
        self.pcbs.get(&pid).ok_or(KernelError::InvalidPid(pid))
    }

    /// Looks up the PCB for `pid` mutably.
    pub fn get_mut(&mut self, pid: Pid) -> Result<&mut Pcb, KernelError> {
        self.pcbs.get_mut(&pid).ok_or(KernelError::InvalidPid(pid))
    }

    /// Removes a PCB from the table. Its pid is not handed out again.
    pub fn remove(&mut self, pid: Pid) -> Result<Pcb, KernelError> {
        if self.running == Some(pid) {
            self.running = None;
        }
        self.pcbs.remove(&pid).ok_or(KernelError::InvalidPid(pid))
    }

    /// Removes every terminated PCB and returns their pids in ascending order.
    pub fn remove_terminated(&mut self) -> Vec<Pid> {
        let mut removed = Vec::new();
        self.pcbs.retain(|pid, pcb| {
            let terminated = pcb.state == ProcState::Terminated;
            if terminated {
                removed.push(*pid);
            }
            !terminated
        });
        if self.running.is_some_and(|pid| removed.contains(&pid)) {
            self.running = None;
        }
        removed
    }

    /// Returns the pid in the running slot.
    pub fn running(&self) -> Option<Pid> {
        self.running
    }

    /// Marks `pid` as running and places it in the running slot.
    pub fn set_running(&mut self, pid: Pid) -> Result<(), KernelError> {
        if let Some(current) = self.running {
            if current != pid {
                return Err(KernelError::RunningSlotCorrupt);
            }
        }
        self.get_mut(pid)?.state = ProcState::Running;
        self.running = Some(pid);
        Ok(())
    }

    /// Empties the running slot and returns the pid that occupied it.
    pub fn take_running(&mut self) -> Result<Pid, KernelError> {
        self.running.take().ok_or(KernelError::NoRunningProcess)
    }

    /// Returns true when every PCB in the table has terminated.
    pub fn all_terminated(&self) -> bool {
        self.pcbs
            .values()
            .all(|pcb| pcb.state == ProcState::Terminated)
    }

    /// Checks that at most one PCB is running and that it is the one in the slot.
    pub fn check_running_slot(&self) -> Result<(), KernelError> {
        let running: Vec<Pid> = self
            .pcbs
            .values()
            .filter(|pcb| pcb.state == ProcState::Running)
            .map(|pcb| pcb.pid)
            .collect();
        match (running.as_slice(), self.running) {
            ([], None) => Ok(()),
            ([pid], Some(slot)) if *pid == slot => Ok(()),
            _ => Err(KernelError::RunningSlotCorrupt),
        }
    }

    /// Iterates PCBs in pid order.
    pub fn iter(&self) -> impl Iterator<Item = &Pcb> {
        self.pcbs.values()
    }

    /// Number of PCBs in the table.
    pub fn len(&self) -> usize {
        self.pcbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcbs.is_empty()
    }
}

impl fmt::Display for PcbTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>4} | {:>3} | {:<10} | {:>3} | path", "pid", "pri", "state", "pc")?;
        for pcb in self.pcbs.values() {
            writeln!(
                f,
                "{:>4} | {:>3} | {:<10} | {:>3} | {}",
                pcb.pid,
                pcb.priority.get(),
                pcb.state,
                pcb.pc,
                pcb.path
            )?;
        }
        match self.running {
            Some(pid) => write!(f, "running: {}", pid),
            None => write!(f, "running: none"),
        }
    }
}
