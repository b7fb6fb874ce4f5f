//! Fixtures shared by the backend integration tests: a device and queue
//! opened on a `SoftContext` the test can still inspect.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use glshim_backend::{
    Buffer, BufferDescriptor, Capabilities, CommandBuffer, CommandEncoder,
    CommandEncoderDescriptor, ComputePipeline, ComputePipelineDescriptor, Device, NativeProgram,
    Queue, RenderPipeline, RenderPipelineDescriptor, SharedContext, SoftContext, Texture,
    TextureDescriptor, TextureView, TextureViewDescriptor,
};
use glshim_core::GlShimConfig;
use glshim_types::{
    BufferUsages, ColorTargetState, ColorWrites, MultisampleState, PrimitiveState, TextureFormat,
    VertexBufferLayout,
};

pub const SURFACE_WIDTH: u32 = 32;
pub const SURFACE_HEIGHT: u32 = 24;

pub struct Harness {
    pub soft: Arc<Mutex<SoftContext>>,
    pub device: Device,
    pub queue: Queue,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::default())
    }

    pub fn with_capabilities(caps: Capabilities) -> Self {
        Self::with_config(caps, test_config())
    }

    pub fn with_config(caps: Capabilities, config: GlShimConfig) -> Self {
        glshim_common::init_test_logging();
        let soft = Arc::new(Mutex::new(SoftContext::with_capabilities(
            SURFACE_WIDTH,
            SURFACE_HEIGHT,
            caps,
        )));
        let context: SharedContext = soft.clone();
        let (device, queue) = Device::open(context, &config).expect("failed to open device");
        Self {
            soft,
            device,
            queue,
        }
    }

    /// An encoder that is already recording.
    pub fn encoder(&self) -> CommandEncoder {
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor::default());
        encoder.begin_encoding(None).expect("begin_encoding failed");
        encoder
    }

    pub fn finish(&self, encoder: &mut CommandEncoder) -> CommandBuffer {
        encoder.end_encoding().expect("end_encoding failed")
    }

    pub fn submit(&self, encoder: &mut CommandEncoder) {
        let buffer = self.finish(encoder);
        self.queue.submit([buffer], None).expect("submit failed");
    }

    pub fn buffer(&self, size: u64, usage: BufferUsages) -> Arc<Buffer> {
        self.device
            .create_buffer(&BufferDescriptor {
                label: None,
                size,
                usage,
            })
            .expect("create_buffer failed")
    }

    /// A readback-capable RGBA8 render target and a view of its level 0.
    pub fn render_target(
        &self,
        width: u32,
        height: u32,
        samples: u32,
    ) -> (Arc<Texture>, Arc<TextureView>) {
        self.render_target_with_format(width, height, samples, TextureFormat::Rgba8Unorm)
    }

    pub fn render_target_with_format(
        &self,
        width: u32,
        height: u32,
        samples: u32,
        format: TextureFormat,
    ) -> (Arc<Texture>, Arc<TextureView>) {
        let texture = self
            .device
            .create_texture(&TextureDescriptor::render_target(
                None, width, height, format, samples,
            ))
            .expect("create_texture failed");
        let view = self
            .device
            .create_texture_view(&texture, &TextureViewDescriptor::default())
            .expect("create_texture_view failed");
        (texture, view)
    }

    pub fn pipeline(&self, vertex_buffers: Vec<VertexBufferLayout>) -> Arc<RenderPipeline> {
        self.pipeline_with(vertex_buffers, PrimitiveState::default(), ColorWrites::ALL)
    }

    pub fn pipeline_with(
        &self,
        vertex_buffers: Vec<VertexBufferLayout>,
        primitive: PrimitiveState,
        write_mask: ColorWrites,
    ) -> Arc<RenderPipeline> {
        self.device
            .create_render_pipeline(&RenderPipelineDescriptor {
                label: Some("test pipeline"),
                program: program(3),
                bind_group_layouts: Vec::new(),
                vertex_buffers,
                primitive,
                depth_stencil: None,
                multisample: MultisampleState::default(),
                targets: vec![Some(ColorTargetState {
                    format: TextureFormat::Rgba8Unorm,
                    blend: None,
                    write_mask,
                })],
            })
            .expect("create_render_pipeline failed")
    }

    pub fn compute_pipeline(&self) -> Arc<ComputePipeline> {
        self.device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some("test compute"),
                program: program(5),
                bind_group_layouts: Vec::new(),
            })
            .expect("create_compute_pipeline failed")
    }
}

pub fn test_config() -> GlShimConfig {
    let mut config = GlShimConfig::default();
    config.surface.width = SURFACE_WIDTH;
    config.surface.height = SURFACE_HEIGHT;
    config
}

pub fn program(raw: u32) -> NativeProgram {
    NativeProgram::from_raw(raw).expect("program names are non-zero")
}

/// Every texel of a tightly packed RGBA8 image equals `texel`.
pub fn all_texels(data: &[u8], texel: [u8; 4]) -> bool {
    !data.is_empty() && data.chunks_exact(4).all(|t| t == texel)
}
