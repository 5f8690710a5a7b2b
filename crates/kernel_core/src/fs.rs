use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::error::KernelError;
use crate::program::Program;

/// Flat path to program store.
#[derive(Debug, Default, Clone)]
pub struct FileSystem {
    files: BTreeMap<String, Program>,
}

impl FileSystem {
    /// Creates an empty file system.
    pub fn new() -> Self {
        Self {
            files: BTreeMap::new(),
        }
    }

    /// Stores a program, replacing any previous one at the same path.
    pub fn write(&mut self, path: &str, program: Program) {
        self.files.insert(path.to_string(), program);
    }

    /// Returns the program stored at `path`.
    pub fn read(&self, path: &str) -> Result<&Program, KernelError> {
        self.files
            .get(path)
            .ok_or_else(|| KernelError::ProgramNotFound(path.to_string()))
    }

    /// Lists stored paths in sorted order.
    pub fn paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::asm;

    #[test]
    fn write_then_read_returns_program() {
        let mut fs = FileSystem::new();
        let program = Program::from_blocks("prg1.exe", &[asm::cpu(2)]);
        fs.write("c:/prg1.exe", program.clone());
        assert_eq!(fs.read("c:/prg1.exe").expect("read should succeed"), &program);
    }

    #[test]
    fn read_unknown_path_errors() {
        let fs = FileSystem::new();
        assert_eq!(
            fs.read("c:/missing.exe"),
            Err(KernelError::ProgramNotFound("c:/missing.exe".to_string()))
        );
    }

    #[test]
    fn write_replaces_and_lists_sorted() {
        let mut fs = FileSystem::new();
        fs.write("b", Program::from_blocks("b", &[asm::cpu(1)]));
        fs.write("a", Program::from_blocks("a", &[asm::cpu(1)]));
        fs.write("b", Program::from_blocks("b2", &[asm::cpu(2)]));
        assert_eq!(fs.paths(), vec!["a", "b"]);
        assert_eq!(fs.read("b").expect("read should succeed").name(), "b2");
    }
}
