use crate::error::KernelError;
use crate::scheduler::Policy;

/// Cells per frame used when nothing else is configured.
pub const DEFAULT_FRAME_SIZE: usize = 4;

/// Boot-time kernel settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub frame_size: usize,
    pub policy: Policy,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            policy: Policy::Fcfs,
        }
    }
}

impl KernelConfig {
    /// Default frame size with the given policy.
    pub fn with_policy(policy: Policy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Rejects settings the kernel cannot run with.
    pub fn validate(&self) -> Result<(), KernelError> {
        if self.frame_size == 0 {
            return Err(KernelError::InvalidConfig("frame size must be non-zero"));
        }
        if self.policy.quantum() == Some(0) {
            return Err(KernelError::InvalidConfig("quantum must be non-zero"));
        }
        Ok(())
    }
}
