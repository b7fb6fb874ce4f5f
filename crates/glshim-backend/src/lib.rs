//! Immediate-mode compatibility backend.
//!
//! Work is recorded into [`CommandBuffer`]s by a [`CommandEncoder`] and its
//! pass encoders, then replayed in order against a [`GlContext`] by the
//! [`Queue`]. [`SoftContext`] implements the context in memory.

mod binder;
pub mod command;
pub mod context;
pub mod conv;
pub mod device;
pub mod encoder;
pub mod fence;
mod framebuffer;
pub mod native;
pub mod pass;
pub mod pipeline_state;
pub mod queue;
pub mod readback;
pub mod resource;
pub mod soft;

pub use command::{BufferCopy, Command, CommandBuffer};
pub use context::{share, GlContext, SharedContext};
pub use device::Device;
pub use encoder::{
    CommandEncoder, CommandEncoderDescriptor, ComputePassDescriptor, RenderPassColorAttachment,
    RenderPassDepthStencilAttachment, RenderPassDescriptor,
};
pub use fence::Fence;
pub use native::{
    Capabilities, NativeBuffer, NativeFramebuffer, NativeProgram, NativeQuery, NativeTexture,
};
pub use pass::{ComputePassEncoder, RenderPassEncoder};
pub use queue::{Queue, TextureDataLayout};
pub use readback::TextureBufferCopy;
pub use resource::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindingResource, Buffer, BufferBinding, BufferDescriptor, ComputePipeline,
    ComputePipelineDescriptor, QuerySet, QuerySetDescriptor, QueryType, RenderPipeline,
    RenderPipelineDescriptor, Sampler, Surface, Texture, TextureDescriptor, TextureView,
    TextureViewDescriptor, ViewSource,
};
pub use soft::{GlCall, SoftContext};
