use alloc::collections::VecDeque;
use core::fmt;

use hal::{Instruction, IoDeviceOps};
use log::debug;

use crate::error::KernelError;
use crate::process::Pid;

/// A queued I/O request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoRequest {
    pub pid: Pid,
    pub operation: Instruction,
}

/// Serializes operations onto the single I/O device, FIFO, one in flight.
#[derive(Debug, Default)]
pub struct IoDeviceController {
    waiting: VecDeque<IoRequest>,
    current: Option<Pid>,
}

impl IoDeviceController {
    /// Creates an idle controller with no pending requests.
    pub fn new() -> Self {
        Self {
            waiting: VecDeque::new(),
            current: None,
        }
    }

    /// Queues a request and starts it right away when the device is idle.
    pub fn submit<D: IoDeviceOps + ?Sized>(
        &mut self,
        pid: Pid,
        operation: Instruction,
        device: &mut D,
    ) -> Result<(), KernelError> {
        self.waiting.push_back(IoRequest { pid, operation });
        self.start_next(device)
    }

    /// Returns the pid whose operation just completed and starts the next one.
    pub fn collect_finished<D: IoDeviceOps + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<Pid, KernelError> {
        let finished = self.current.take().ok_or(KernelError::NoFinishedOperation)?;
        self.start_next(device)?;
        Ok(finished)
    }

    /// The pid whose operation is on the device.
    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    /// Pids waiting for the device, head first.
    pub fn waiting(&self) -> impl Iterator<Item = Pid> + '_ {
        self.waiting.iter().map(|request| request.pid)
    }

    fn start_next<D: IoDeviceOps + ?Sized>(&mut self, device: &mut D) -> Result<(), KernelError> {
        if self.current.is_some() || !device.is_idle() {
            return Ok(());
        }
        if let Some(request) = self.waiting.pop_front() {
            device.execute(request.operation)?;
            self.current = Some(request.pid);
            debug!("io: start pid={} op={}", request.pid, request.operation);
        }
        Ok(())
    }
}

impl fmt::Display for IoDeviceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current {
            Some(pid) => write!(f, "io: running pid {}", pid)?,
            None => write!(f, "io: idle")?,
        }
        write!(f, ", waiting [")?;
        for (index, request) in self.waiting.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", request.pid)?;
        }
        write!(f, "]")
    }
}
