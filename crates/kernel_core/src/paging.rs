use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use hal::{Frame, Page};

/// Logical page to physical frame mapping owned by one process.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PageTable {
    entries: BTreeMap<Page, Frame>,
}

impl PageTable {
    /// Creates an empty page table.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Maps `page` to `frame`, replacing any previous mapping.
    pub fn map(&mut self, page: Page, frame: Frame) {
        self.entries.insert(page, frame);
    }

    /// Returns the frame backing `page`.
    pub fn frame(&self, page: Page) -> Option<Frame> {
        self.entries.get(&page).copied()
    }

    /// Iterates mappings in page order.
    pub fn iter(&self) -> impl Iterator<Item = (Page, Frame)> + '_ {
        self.entries.iter().map(|(page, frame)| (*page, *frame))
    }

    /// Returns the mapped frames in page order.
    pub fn frames(&self) -> Vec<Frame> {
        self.entries.values().copied().collect()
    }

    /// Number of mapped pages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
