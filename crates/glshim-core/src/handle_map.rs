use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use glshim_types::{ResourceId, ResourceType};

// Start from 1 so a zero device id always means "null".
static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(1);

/// Per-device resource id allocator.
pub struct HandleAllocator {
    device_id: u32,
    next_id: AtomicU64,
}

impl HandleAllocator {
    /// Create an allocator for a freshly created device.
    pub fn new() -> Self {
        Self {
            device_id: NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Allocate a new resource id with the given resource type.
    pub fn alloc(&self, resource_type: ResourceType) -> ResourceId {
        ResourceId {
            device_id: self.device_id,
            index: self.next_id.fetch_add(1, Ordering::Relaxed),
            resource_type,
        }
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}
