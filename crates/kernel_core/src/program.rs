use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use hal::Instruction;

/// Helpers for building instruction blocks.
pub mod asm {
    use super::*;

    /// `count` consecutive CPU instructions.
    pub fn cpu(count: usize) -> Vec<Instruction> {
        vec![Instruction::Cpu; count]
    }

    /// A single I/O request.
    pub fn io() -> Vec<Instruction> {
        vec![Instruction::Io]
    }

    /// A single EXIT.
    pub fn exit() -> Vec<Instruction> {
        vec![Instruction::Exit]
    }
}

/// A compiled program. The last instruction is always EXIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    name: String,
    instructions: Vec<Instruction>,
}

impl Program {
    /// Builds a program, appending EXIT when the sequence does not end with one.
    pub fn new(name: &str, mut instructions: Vec<Instruction>) -> Self {
        if !instructions.last().is_some_and(|last| last.is_exit()) {
            instructions.push(Instruction::Exit);
        }
        Self {
            name: name.to_string(),
            instructions,
        }
    }

    /// Builds a program from blocks such as `asm::cpu(2)` and `asm::io()`.
    pub fn from_blocks(name: &str, blocks: &[Vec<Instruction>]) -> Self {
        let instructions = blocks.iter().flatten().copied().collect();
        Self::new(name, instructions)
    }

    /// Returns the program's path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the instructions, EXIT included.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Number of instructions, EXIT included.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
