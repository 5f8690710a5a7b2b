use alloc::boxed::Box;
use alloc::collections::VecDeque;
use core::fmt;

use crate::error::KernelError;
use crate::process::{Pcb, Pid, Priority};

/// Ordering and preemption policy over ready processes.
pub trait Scheduler: fmt::Debug {
    /// Enqueues a ready process.
    fn add(&mut self, pcb: &Pcb);

    /// Dequeues the next process to run.
    fn next(&mut self) -> Result<Pid, KernelError>;

    fn is_empty(&self) -> bool;

    /// Number of queued processes.
    fn len(&self) -> usize;

    /// Returns true when `candidate` should take the CPU from `running` now.
    fn must_preempt(&self, running: &Pcb, candidate: &Pcb) -> bool;
}

/// Scheduling policy selected at boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Fcfs,
    RoundRobin { quantum: u32 },
    PreemptivePriority,
    NonPreemptivePriority,
}

impl Policy {
    /// Builds the scheduler for this policy.
    pub fn build(self) -> Box<dyn Scheduler> {
        match self {
            Policy::Fcfs => Box::new(Fcfs::new()),
            Policy::RoundRobin { quantum } => Box::new(RoundRobin::new(quantum)),
            Policy::PreemptivePriority => Box::new(PreemptivePriority::new()),
            Policy::NonPreemptivePriority => Box::new(NonPreemptivePriority::new()),
        }
    }

    /// Timer quantum to program at boot; only Round-Robin uses one.
    pub fn quantum(self) -> Option<u32> {
        match self {
            Policy::RoundRobin { quantum } => Some(quantum),
            _ => None,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::Fcfs => f.write_str("FCFS"),
            Policy::RoundRobin { quantum } => write!(f, "Round-Robin (quantum {})", quantum),
            Policy::PreemptivePriority => f.write_str("preemptive priority"),
            Policy::NonPreemptivePriority => f.write_str("non-preemptive priority"),
        }
    }
}

/// First come, first served. Never preempts.
#[derive(Debug, Default)]
pub struct Fcfs {
    ready: VecDeque<Pid>,
}

impl Fcfs {
    /// Creates an empty FCFS scheduler.
    pub fn new() -> Self {
        Self {
            ready: VecDeque::new(),
        }
    }
}

impl Scheduler for Fcfs {
    fn add(&mut self, pcb: &Pcb) {
        self.ready.push_back(pcb.pid);
    }

    fn next(&mut self) -> Result<Pid, KernelError> {
        self.ready.pop_front().ok_or(KernelError::SchedulerUnderflow)
    }

    fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn must_preempt(&self, _running: &Pcb, _candidate: &Pcb) -> bool {
        false
    }
}

/// FIFO ordering; preemption comes from the timer quantum, not `must_preempt`.
#[derive(Debug)]
pub struct RoundRobin {
    ready: Fcfs,
    quantum: u32,
}

impl RoundRobin {
    /// Creates a round-robin scheduler with a `quantum` tick slice.
    pub fn new(quantum: u32) -> Self {
        Self {
            ready: Fcfs::new(),
            quantum,
        }
    }

    /// Returns the time slice in ticks.
    pub fn quantum(&self) -> u32 {
        self.quantum
    }
}

impl Scheduler for RoundRobin {
    fn add(&mut self, pcb: &Pcb) {
        self.ready.add(pcb);
    }

    fn next(&mut self) -> Result<Pid, KernelError> {
        self.ready.next()
    }

    fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    fn len(&self) -> usize {
        self.ready.len()
    }

    fn must_preempt(&self, _running: &Pcb, _candidate: &Pcb) -> bool {
        false
    }
}

/// One FIFO per priority level with aging.
#[derive(Debug, Default)]
pub struct PriorityQueues {
    levels: [VecDeque<Pid>; Priority::LEVELS],
}

impl PriorityQueues {
    /// Creates five empty priority levels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `pcb` at the tail of its priority level.
    pub fn add(&mut self, pcb: &Pcb) {
        self.levels[pcb.priority.index()].push_back(pcb.pid);
    }

    /// Pops from the highest non-empty level, then ages the rest.
    pub fn next(&mut self) -> Result<Pid, KernelError> {
        let pid = self
            .levels
            .iter_mut()
            .find_map(|level| level.pop_front())
            .ok_or(KernelError::SchedulerUnderflow)?;
        self.aging();
        Ok(pid)
    }

    /// Moves the head of every level 2..=5 to the tail of the level above.
    pub fn aging(&mut self) {
        for index in 1..Priority::LEVELS {
            if let Some(pid) = self.levels[index].pop_front() {
                self.levels[index - 1].push_back(pid);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(VecDeque::is_empty)
    }

    /// Number of queued pids across every level.
    pub fn len(&self) -> usize {
        self.levels.iter().map(VecDeque::len).sum()
    }

    /// Returns the queued pids of a level, head first.
    pub fn level(&self, priority: Priority) -> impl Iterator<Item = Pid> + '_ {
        self.levels[priority.index()].iter().copied()
    }
}

/// A strictly higher priority arrival takes the CPU at once.
#[derive(Debug, Default)]
pub struct PreemptivePriority {
    queues: PriorityQueues,
}

impl PreemptivePriority {
    /// Creates an empty preemptive priority scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the underlying priority levels.
    pub fn queues(&self) -> &PriorityQueues {
        &self.queues
    }
}

impl Scheduler for PreemptivePriority {
    fn add(&mut self, pcb: &Pcb) {
        self.queues.add(pcb);
    }

    fn next(&mut self) -> Result<Pid, KernelError> {
        self.queues.next()
    }

    fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    fn len(&self) -> usize {
        self.queues.len()
    }

    fn must_preempt(&self, running: &Pcb, candidate: &Pcb) -> bool {
        candidate.priority < running.priority
    }
}

/// Priority ordering that waits for the running process to give up the CPU.
#[derive(Debug, Default)]
pub struct NonPreemptivePriority {
    queues: PriorityQueues,
}

impl NonPreemptivePriority {
    /// Creates an empty non-preemptive priority scheduler.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for NonPreemptivePriority {
    fn add(&mut self, pcb: &Pcb) {
        self.queues.add(pcb);
    }

    fn next(&mut self) -> Result<Pid, KernelError> {
        self.queues.next()
    }

    fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    fn len(&self) -> usize {
        self.queues.len()
    }

    fn must_preempt(&self, _running: &Pcb, _candidate: &Pcb) -> bool {
        false
    }
}
