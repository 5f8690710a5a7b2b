use hal::MemoryOps;
use log::trace;

use crate::error::KernelError;
use crate::memory::MemoryManager;
use crate::paging::PageTable;
use crate::process::Pid;
use crate::program::Program;

/// Number of pages needed to hold `instructions` cells.
pub fn pages_needed(instructions: usize, frame_size: usize) -> usize {
    instructions.div_ceil(frame_size)
}

/// Pages a program into free frames and registers its page table.
///
/// Either every page is loaded or nothing is: when the pool is short no
/// frame is allocated and no memory cell is written. A memory fault while
/// writing returns the frames but leaves the cells already written in
/// place; the fault is fatal, and the freed frames are overwritten by the
/// next load that takes them.
pub fn load_program<M: MemoryOps + ?Sized>(
    pid: Pid,
    program: &Program,
    memory_manager: &mut MemoryManager,
    memory: &mut M,
) -> Result<usize, KernelError> {
    let frame_size = memory_manager.frame_size();
    let pages = pages_needed(program.len(), frame_size);
    if !memory_manager.adequate_frames(pages) {
        return Err(KernelError::InsufficientMemory {
            requested: pages,
            available: memory_manager.free_count(),
        });
    }

    let frames = memory_manager.alloc_frames(pages)?;
    let mut table = PageTable::new();
    for (page, frame) in frames.iter().enumerate() {
        table.map(page, *frame);
    }

    for (page, chunk) in program.instructions().chunks(frame_size).enumerate() {
        let frame = frames[page];
        for (offset, instruction) in chunk.iter().enumerate() {
            let addr = frame * frame_size + offset;
            if let Err(errno) = memory.put(addr, *instruction) {
                memory_manager.free_frames(&frames)?;
                return Err(errno.into());
            }
            trace!("load: pid={} mem[{}] = {}", pid, addr, instruction);
        }
    }

    memory_manager.put_page_table(pid, table);
    Ok(pages)
}
