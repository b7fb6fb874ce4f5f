pub mod binding;
pub mod format;
pub mod geometry;
pub mod handle;
pub mod state;
pub mod usage;

pub use binding::{
    AddressMode, BindGroupLayoutEntry, BindingType, BufferBindingType, FilterMode,
    SamplerBindingType, SamplerDescriptor, TextureSampleType,
};
pub use format::{
    IndexFormat, TextureAspect, TextureDimension, TextureFormat, TextureViewDimension,
    VertexFormat, VertexScalar,
};
pub use geometry::{Color, Extent3d, Origin3d};
pub use handle::{ResourceId, ResourceType};
pub use state::*;
pub use usage::{BufferUsages, ColorWrites, ShaderStages, TextureUsages};
