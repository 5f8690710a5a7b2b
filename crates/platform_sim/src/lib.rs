//! Hosted simulation of the machine the kernel runs on: CPU, MMU, quantum
//! timer, memory array, one I/O device and the clock that drives them.

pub mod devices;
pub mod hardware;
pub mod machine;

pub use hardware::SimHardware;
pub use machine::{Machine, MachineConfig, Rejection, RunSummary};
