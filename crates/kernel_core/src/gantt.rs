use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;

use crate::process::{PcbTable, Pid, ProcState};

/// Per-tick state history of every admitted process.
///
/// Also decides when the machine powers off: exactly once, on the first
/// tick at which every tracked process has terminated.
#[derive(Debug, Default)]
pub struct GanttDiagram {
    timelines: BTreeMap<Pid, Vec<Option<ProcState>>>,
    ticks: usize,
    held: bool,
    shutdown_signalled: bool,
}

impl GanttDiagram {
    /// Creates an empty diagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// While held, power-off is withheld even if every tracked process has
    /// terminated. Set while more submissions are still expected.
    pub fn set_held(&mut self, held: bool) {
        self.held = held;
    }

    /// Starts tracking `pid`; ticks before admission are recorded as not loaded.
    pub fn track(&mut self, pid: Pid) {
        let ticks = self.ticks;
        self.timelines.entry(pid).or_insert_with(|| vec![None; ticks]);
    }

    /// Records one clock tick. Returns true when the machine must power off.
    pub fn observe(&mut self, table: &PcbTable) -> bool {
        self.ticks += 1;
        let mut all_terminated = true;
        for (pid, timeline) in self.timelines.iter_mut() {
            let state = table
                .get(*pid)
                .map(|pcb| pcb.state)
                .unwrap_or(ProcState::Terminated);
            all_terminated &= state == ProcState::Terminated;
            timeline.push(Some(state));
        }
        if self.shutdown_signalled || self.held || self.timelines.is_empty() || !all_terminated {
            return false;
        }
        self.shutdown_signalled = true;
        true
    }

    /// Number of ticks observed so far.
    pub fn ticks(&self) -> usize {
        self.ticks
    }

    /// True once the power-off decision has been taken.
    pub fn shutdown_signalled(&self) -> bool {
        self.shutdown_signalled
    }

    /// Recorded states of `pid`, one per tick.
    pub fn timeline(&self, pid: Pid) -> Option<&[Option<ProcState>]> {
        self.timelines.get(&pid).map(Vec::as_slice)
    }

    /// Number of ticks `pid` spent in `state`.
    pub fn count(&self, pid: Pid, state: ProcState) -> usize {
        self.timeline(pid)
            .map(|timeline| {
                timeline
                    .iter()
                    .filter(|entry| **entry == Some(state))
                    .count()
            })
            .unwrap_or(0)
    }
}

fn symbol(state: Option<ProcState>) -> char {
    match state {
        None => '.',
        Some(ProcState::New) => 'n',
        Some(ProcState::Ready) => 'r',
        Some(ProcState::Running) => '#',
        Some(ProcState::Waiting) => 'w',
        Some(ProcState::Terminated) => 'x',
    }
}

impl fmt::Display for GanttDiagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid |")?;
        for tick in 1..=self.ticks {
            write!(f, "{}", tick % 10)?;
        }
        for (pid, timeline) in &self.timelines {
            write!(f, "\n{:>3} |", pid)?;
            for state in timeline {
                write!(f, "{}", symbol(*state))?;
            }
        }
        write!(
            f,
            "\n    n new  # running  r ready  w waiting  x terminated  . not loaded"
        )
    }
}
