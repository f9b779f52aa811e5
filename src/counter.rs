use std::sync::atomic::{AtomicU64, Ordering};

/// Total site visits, shared by handle for the lifetime of the process.
#[derive(Debug, Default)]
pub struct VisitCounter {
    total: AtomicU64,
}

impl VisitCounter {
    pub fn new(initial: u64) -> Self {
        VisitCounter {
            total: AtomicU64::new(initial),
        }
    }

    /// Record one visit and return the new total.
    pub fn increment(&self) -> u64 {
        self.total.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn current(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }
}
