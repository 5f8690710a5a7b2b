use alloc::collections::BTreeMap;
use core::fmt;

use hal::{InterruptKind, Irq};

use crate::error::KernelError;
use crate::kernel::Kernel;

/// Interrupt handler entry. Runs to completion with exclusive access to the kernel.
pub type Handler<H> = fn(&mut Kernel<H>, Irq) -> Result<(), KernelError>;

/// Flat table routing each interrupt kind to its handler.
pub struct InterruptVector<H> {
    handlers: BTreeMap<InterruptKind, Handler<H>>,
}

impl<H> InterruptVector<H> {
    /// Creates a vector with no handlers registered.
    pub fn new() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Installs `handler` for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: InterruptKind, handler: Handler<H>) {
        self.handlers.insert(kind, handler);
    }

    /// Looks up the handler for `kind`.
    pub fn handler(&self, kind: InterruptKind) -> Result<Handler<H>, KernelError> {
        self.handlers
            .get(&kind)
            .copied()
            .ok_or(KernelError::UnhandledInterrupt(kind))
    }

    /// True when `kind` has a handler.
    pub fn is_registered(&self, kind: InterruptKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

impl<H> Default for InterruptVector<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for InterruptVector<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
