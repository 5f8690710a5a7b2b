use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::fmt;

use hal::Frame;

use crate::error::KernelError;
use crate::paging::PageTable;
use crate::process::Pid;

/// Frame pool plus the page table of every loaded process.
///
/// Every frame is either in `free` or in `used`, never both, and each used
/// frame appears in exactly one registered page table.
#[derive(Debug)]
pub struct MemoryManager {
    frame_size: usize,
    total_frames: usize,
    free: Vec<Frame>,
    used: BTreeSet<Frame>,
    page_tables: BTreeMap<Pid, PageTable>,
}

impl MemoryManager {
    /// Splits `memory_size` cells into frames of `frame_size` cells.
    pub fn new(memory_size: usize, frame_size: usize) -> Result<Self, KernelError> {
        if frame_size == 0 {
            return Err(KernelError::InvalidConfig("frame size must be non-zero"));
        }
        let total_frames = memory_size / frame_size;
        Ok(Self {
            frame_size,
            total_frames,
            free: (0..total_frames).collect(),
            used: BTreeSet::new(),
            page_tables: BTreeMap::new(),
        })
    }

    /// Cells per frame.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Number of frames the memory holds.
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    /// Returns the number of frames available for allocation.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Number of frames currently allocated.
    pub fn used_count(&self) -> usize {
        self.used.len()
    }

    /// Returns true when `count` frames can be allocated right now.
    pub fn adequate_frames(&self, count: usize) -> bool {
        self.free.len() >= count
    }

    /// Takes `count` frames from the free pool. Nothing is taken on failure.
    pub fn alloc_frames(&mut self, count: usize) -> Result<Vec<Frame>, KernelError> {
        if !self.adequate_frames(count) {
            return Err(KernelError::InsufficientMemory {
                requested: count,
                available: self.free.len(),
            });
        }
        let split = self.free.len() - count;
        let mut frames = self.free.split_off(split);
        frames.reverse();
        self.used.extend(frames.iter().copied());
        Ok(frames)
    }

    /// Returns frames to the pool. Rejects the whole batch if any frame is
    /// not in use or appears twice.
    pub fn free_frames(&mut self, frames: &[Frame]) -> Result<(), KernelError> {
        let mut seen = BTreeSet::new();
        for &frame in frames {
            if !self.used.contains(&frame) || !seen.insert(frame) {
                return Err(KernelError::FrameAccountingViolation(frame));
            }
        }
        for &frame in frames {
            self.used.remove(&frame);
            self.free.push(frame);
        }
        Ok(())
    }

    /// Registers the page table of a freshly loaded process.
    pub fn put_page_table(&mut self, pid: Pid, table: PageTable) {
        self.page_tables.insert(pid, table);
    }

    /// Returns the page table registered for `pid`.
    pub fn page_table(&self, pid: Pid) -> Result<&PageTable, KernelError> {
        self.page_tables.get(&pid).ok_or(KernelError::InvalidPid(pid))
    }

    /// Drops the page table of `pid` and frees every frame it maps.
    pub fn release(&mut self, pid: Pid) -> Result<Vec<Frame>, KernelError> {
        let frames = self.page_table(pid)?.frames();
        self.free_frames(&frames)?;
        self.page_tables.remove(&pid);
        Ok(frames)
    }

    /// Iterates the free pool in allocation order (last is handed out first).
    pub fn free_list(&self) -> impl Iterator<Item = Frame> + '_ {
        self.free.iter().copied()
    }
}

impl fmt::Display for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "frames: total={} free={} used={} (size {})",
            self.total_frames,
            self.free.len(),
            self.used.len(),
            self.frame_size
        )?;
        write!(f, "free:")?;
        for frame in &self.free {
            write!(f, " {}", frame)?;
        }
        for (pid, table) in &self.page_tables {
            write!(f, "\npid {}:", pid)?;
            for (page, frame) in table.iter() {
                write!(f, " {}->{}", page, frame)?;
            }
        }
        Ok(())
    }
}
