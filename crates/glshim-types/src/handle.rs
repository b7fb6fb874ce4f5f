use serde::{Deserialize, Serialize};

/// A backend-assigned identifier for a HAL resource.
/// Carries the creating device so foreign resources can be rejected before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceId {
    /// Which device created this resource
    pub device_id: u32,
    /// Unique resource identifier within the device
    pub index: u64,
    /// Type tag for debugging and validation
    pub resource_type: ResourceType,
}

impl ResourceId {
    /// Create a null/invalid id.
    pub fn null() -> Self {
        Self {
            device_id: 0,
            index: 0,
            resource_type: ResourceType::None,
        }
    }

    pub fn is_null(&self) -> bool {
        self.resource_type == ResourceType::None && self.index == 0
    }

    /// Whether this resource was created by the given device.
    pub fn belongs_to(&self, device_id: u32) -> bool {
        self.device_id == device_id
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}@dev{}", self.resource_type, self.index, self.device_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    None,
    Buffer,
    Texture,
    TextureView,
    Sampler,
    BindGroupLayout,
    BindGroup,
    RenderPipeline,
    ComputePipeline,
    QuerySet,
    Fence,
    Surface,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResourceType::None => "none",
            ResourceType::Buffer => "buffer",
            ResourceType::Texture => "texture",
            ResourceType::TextureView => "texture view",
            ResourceType::Sampler => "sampler",
            ResourceType::BindGroupLayout => "bind group layout",
            ResourceType::BindGroup => "bind group",
            ResourceType::RenderPipeline => "render pipeline",
            ResourceType::ComputePipeline => "compute pipeline",
            ResourceType::QuerySet => "query set",
            ResourceType::Fence => "fence",
            ResourceType::Surface => "surface",
        };
        f.write_str(name)
    }
}
