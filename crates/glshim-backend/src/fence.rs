use std::sync::atomic::{AtomicU64, Ordering};

use glshim_types::ResourceId;

/// A monotonic completion counter.
///
/// Submission replays synchronously, so a fence reaches its signal value as
/// soon as `Queue::submit` returns and waiting never has to block.
#[derive(Debug)]
pub struct Fence {
    pub(crate) id: ResourceId,
    value: AtomicU64,
}

impl Fence {
    pub(crate) fn new(id: ResourceId) -> Self {
        Self {
            id,
            value: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Raise the value. Lower values are ignored so the counter never goes
    /// backwards outside of `reset`.
    pub fn signal(&self, value: u64) {
        self.value.fetch_max(value, Ordering::AcqRel);
    }

    /// Whether `value` has been reached.
    pub fn wait(&self, value: u64) -> bool {
        self.value() >= value
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }
}
