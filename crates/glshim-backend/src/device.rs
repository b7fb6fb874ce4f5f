//! Resource creation and the device/queue pair.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, info, trace, warn};

use glshim_core::{GlShimConfig, HalError, HalResult, HandleAllocator};
use glshim_types::{
    BindingType, BufferUsages, ResourceId, ResourceType, SamplerDescriptor, TextureDimension,
    TextureViewDimension,
};

use crate::context::{GlContext, SharedContext};
use crate::conv;
use crate::encoder::{check_range, CommandEncoder, CommandEncoderDescriptor};
use crate::fence::Fence;
use crate::framebuffer;
use crate::native::{consts, Capabilities};
use crate::queue::Queue;
use crate::resource::{
    ensure_owned, BindGroup, BindGroupDescriptor, BindGroupLayout, BindGroupLayoutDescriptor,
    BindingResource, Buffer, BufferDescriptor, ComputePipeline, ComputePipelineDescriptor,
    QuerySet, QuerySetDescriptor, RenderPipeline, RenderPipelineDescriptor, Sampler, Surface,
    Texture, TextureDescriptor, TextureView, TextureViewDescriptor, ViewSource,
};

/// Interval between fence polls in [`Device::wait`].
const FENCE_POLL_INTERVAL: Duration = Duration::from_micros(200);

/// Creates resources on one native context.
///
/// Every resource id carries this device's id, so resources from another
/// device are rejected before they reach the context.
pub struct Device {
    context: SharedContext,
    handles: HandleAllocator,
    caps: Capabilities,
    config: GlShimConfig,
    /// Live resources and their labels.
    live: DashMap<ResourceId, Option<String>>,
}

impl Device {
    /// Open a device and its queue on `context`.
    pub fn open(context: SharedContext, config: &GlShimConfig) -> HalResult<(Device, Queue)> {
        let caps = {
            let gl = context.lock();
            if gl.is_context_lost() {
                return Err(HalError::DeviceLost);
            }
            gl.capabilities()
        };
        let handles = HandleAllocator::new();
        info!(
            device = handles.device_id(),
            compute = caps.compute,
            indirect = caps.indirect_draw,
            timestamps = caps.timestamp_query,
            "opened device"
        );
        let queue = Queue::new(
            context.clone(),
            handles.device_id(),
            caps,
            config.backend.clone(),
        );
        let device = Device {
            context,
            handles,
            caps,
            config: config.clone(),
            live: DashMap::new(),
        };
        Ok((device, queue))
    }

    pub fn id(&self) -> u32 {
        self.handles.device_id()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_resource_count(&self) -> usize {
        self.live.len()
    }

    fn register(&self, ty: ResourceType, label: Option<&str>) -> ResourceId {
        let id = self.handles.alloc(ty);
        trace!(%id, label, "created");
        self.live.insert(id, label.map(str::to_string));
        id
    }

    fn unregister(&self, id: ResourceId) -> HalResult<()> {
        ensure_owned(id, self.id())?;
        if self.live.remove(&id).is_none() {
            warn!(%id, "destroying a resource that is not live");
        } else {
            trace!(%id, "destroyed");
        }
        Ok(())
    }

    // ── Buffers ─────────────────────────────────────────────

    pub fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> HalResult<Arc<Buffer>> {
        let mut gl = self.context.lock();
        let raw = gl.create_buffer().map_err(HalError::ObjectCreation)?;
        gl.bind_buffer(consts::COPY_WRITE_BUFFER, Some(raw));
        gl.buffer_data_size(consts::COPY_WRITE_BUFFER, desc.size, usage_hint(desc.usage));
        gl.bind_buffer(consts::COPY_WRITE_BUFFER, None);
        drop(gl);

        let id = self.register(ResourceType::Buffer, desc.label);
        Ok(Arc::new(Buffer::new(
            id,
            raw,
            desc.size,
            desc.usage,
            desc.label.map(str::to_string),
        )))
    }

    pub fn destroy_buffer(&self, buffer: &Buffer) -> HalResult<()> {
        self.unregister(buffer.id)?;
        self.context.lock().delete_buffer(buffer.raw);
        Ok(())
    }

    // ── Textures ────────────────────────────────────────────

    pub fn create_texture(&self, desc: &TextureDescriptor<'_>) -> HalResult<Arc<Texture>> {
        let size = desc.size;
        if size.width == 0 || size.height == 0 || size.depth_or_array_layers == 0 {
            return Err(HalError::ObjectCreation(format!(
                "texture size must be non-zero, got {}x{}x{}",
                size.width, size.height, size.depth_or_array_layers
            )));
        }
        let samples = desc.sample_count.max(1);
        let levels = desc.mip_level_count.max(1);
        if samples > 1 && (levels > 1 || desc.dimension != TextureDimension::D2) {
            return Err(HalError::UnsupportedOperation(
                "multisampled textures must be single-level 2D".to_string(),
            ));
        }
        let target = conv::texture_target(desc.dimension, size.depth_or_array_layers, samples);
        let format = conv::describe_texture_format(desc.format);

        let mut gl = self.context.lock();
        let raw = gl.create_texture().map_err(HalError::ObjectCreation)?;
        gl.active_texture(consts::TEXTURE0);
        gl.bind_texture(target, Some(raw));
        match target {
            consts::TEXTURE_2D_MULTISAMPLE => gl.tex_storage_2d_multisample(
                target,
                samples as i32,
                format.internal,
                size.width as i32,
                size.height as i32,
                true,
            ),
            consts::TEXTURE_2D => gl.tex_storage_2d(
                target,
                levels as i32,
                format.internal,
                size.width as i32,
                size.height as i32,
            ),
            _ => gl.tex_storage_3d(
                target,
                levels as i32,
                format.internal,
                size.width as i32,
                size.height as i32,
                size.depth_or_array_layers as i32,
            ),
        }
        if target != consts::TEXTURE_2D_MULTISAMPLE {
            apply_sampler_defaults(&mut *gl, target, &SamplerDescriptor::default(), levels);
        }
        gl.bind_texture(target, None);
        drop(gl);

        let id = self.register(ResourceType::Texture, desc.label);
        debug!(%id, format = ?desc.format, width = size.width, height = size.height, samples, "created texture");
        Ok(Arc::new(Texture::new(id, raw, target, desc)))
    }

    /// Destroy a texture together with its cached framebuffer.
    pub fn destroy_texture(&self, texture: &Texture) -> HalResult<()> {
        self.unregister(texture.id)?;
        let mut gl = self.context.lock();
        framebuffer::release(&mut *gl, texture);
        gl.delete_texture(texture.raw);
        Ok(())
    }

    pub fn create_texture_view(
        &self,
        texture: &Arc<Texture>,
        desc: &TextureViewDescriptor<'_>,
    ) -> HalResult<Arc<TextureView>> {
        ensure_owned(texture.id, self.id())?;
        if desc.base_mip_level >= texture.mip_level_count {
            return Err(HalError::OutOfRange {
                offset: u64::from(desc.base_mip_level),
                len: 1,
                size: u64::from(texture.mip_level_count),
            });
        }
        let mip_level_count = desc
            .mip_level_count
            .unwrap_or(texture.mip_level_count - desc.base_mip_level);
        let dimension = desc.dimension.unwrap_or(match texture.dimension {
            TextureDimension::D1 => TextureViewDimension::D1,
            TextureDimension::D3 => TextureViewDimension::D3,
            TextureDimension::D2 if texture.size.depth_or_array_layers > 1 => {
                TextureViewDimension::D2Array
            }
            TextureDimension::D2 => TextureViewDimension::D2,
        });
        let id = self.register(ResourceType::TextureView, desc.label);
        Ok(Arc::new(TextureView {
            id,
            source: ViewSource::Texture(texture.clone()),
            format: desc.format.unwrap_or(texture.format),
            dimension,
            aspect: desc.aspect,
            base_mip_level: desc.base_mip_level,
            mip_level_count,
            base_array_layer: desc.base_array_layer,
        }))
    }

    pub fn destroy_texture_view(&self, view: &TextureView) -> HalResult<()> {
        self.unregister(view.id)
    }

    /// The default framebuffer, sized from the `[surface]` configuration.
    pub fn create_surface(&self) -> HalResult<Arc<Surface>> {
        let (width, height) = (self.config.surface.width, self.config.surface.height);
        let id = self.register(ResourceType::Surface, Some("surface"));
        let view_id = self.register(ResourceType::TextureView, Some("surface view"));
        info!(width, height, vsync = self.config.surface.vsync, "created surface");
        Ok(Arc::new(Surface::new(id, view_id, width, height)))
    }

    pub fn destroy_surface(&self, surface: &Surface) -> HalResult<()> {
        self.unregister(surface.view_id)?;
        self.unregister(surface.id)
    }

    // ── Samplers and bind groups ────────────────────────────

    pub fn create_sampler(&self, desc: &SamplerDescriptor) -> HalResult<Arc<Sampler>> {
        let id = self.register(ResourceType::Sampler, desc.label.as_deref());
        Ok(Arc::new(Sampler {
            id,
            desc: desc.clone(),
        }))
    }

    pub fn destroy_sampler(&self, sampler: &Sampler) -> HalResult<()> {
        self.unregister(sampler.id)
    }

    pub fn create_bind_group_layout(
        &self,
        desc: &BindGroupLayoutDescriptor<'_>,
    ) -> HalResult<Arc<BindGroupLayout>> {
        let mut entries = desc.entries.to_vec();
        entries.sort_by_key(|e| e.binding);
        if let Some(pair) = entries.windows(2).find(|w| w[0].binding == w[1].binding) {
            return Err(HalError::ResourceType {
                expected: ResourceType::BindGroupLayout,
                reason: format!("binding {} declared twice", pair[0].binding),
            });
        }
        let id = self.register(ResourceType::BindGroupLayout, desc.label);
        Ok(Arc::new(BindGroupLayout { id, entries }))
    }

    pub fn destroy_bind_group_layout(&self, layout: &BindGroupLayout) -> HalResult<()> {
        self.unregister(layout.id)
    }

    /// Create a bind group. Every entry must match the kind its layout slot
    /// declares and belong to this device.
    pub fn create_bind_group(&self, desc: &BindGroupDescriptor<'_>) -> HalResult<Arc<BindGroup>> {
        let device = self.id();
        ensure_owned(desc.layout.id, device)?;
        let mut entries = desc.entries.clone();
        entries.sort_by_key(|e| e.binding);

        for entry in &entries {
            let Some(slot) = desc.layout.entry(entry.binding) else {
                return Err(HalError::ResourceType {
                    expected: ResourceType::BindGroupLayout,
                    reason: format!("layout has no entry for binding {}", entry.binding),
                });
            };
            let expected = match slot.ty {
                BindingType::Buffer { .. } => ResourceType::Buffer,
                BindingType::Sampler(_) => ResourceType::Sampler,
                BindingType::Texture { .. } => ResourceType::TextureView,
            };
            match &entry.resource {
                BindingResource::Buffer(binding) => {
                    ensure_owned(binding.buffer.id, device)?;
                    if expected != ResourceType::Buffer {
                        return Err(HalError::mismatch(expected, ResourceType::Buffer, entry.binding));
                    }
                    let size = binding.size.map_or(0, |s| s.get());
                    check_range(binding.offset, size, binding.buffer.size)?;
                }
                BindingResource::TextureView(view) => {
                    ensure_owned(view.id, device)?;
                    if expected != ResourceType::TextureView {
                        return Err(HalError::mismatch(
                            expected,
                            ResourceType::TextureView,
                            entry.binding,
                        ));
                    }
                }
                BindingResource::Sampler(sampler) => {
                    ensure_owned(sampler.id, device)?;
                    if expected != ResourceType::Sampler {
                        return Err(HalError::mismatch(expected, ResourceType::Sampler, entry.binding));
                    }
                }
            }
        }

        let id = self.register(ResourceType::BindGroup, desc.label);
        Ok(Arc::new(BindGroup {
            id,
            layout: desc.layout.clone(),
            entries,
        }))
    }

    pub fn destroy_bind_group(&self, group: &BindGroup) -> HalResult<()> {
        self.unregister(group.id)
    }

    // ── Pipelines ───────────────────────────────────────────

    pub fn create_render_pipeline(
        &self,
        desc: &RenderPipelineDescriptor<'_>,
    ) -> HalResult<Arc<RenderPipeline>> {
        for layout in &desc.bind_group_layouts {
            ensure_owned(layout.id, self.id())?;
        }
        let attributes: usize = desc.vertex_buffers.iter().map(|l| l.attributes.len()).sum();
        if attributes > self.caps.max_vertex_attributes as usize {
            return Err(HalError::UnsupportedOperation(format!(
                "{attributes} vertex attributes, the context supports {}",
                self.caps.max_vertex_attributes
            )));
        }
        if desc.targets.iter().flatten().count() > 1 {
            debug!(label = desc.label, "only the first color target's blend state is applied");
        }
        let id = self.register(ResourceType::RenderPipeline, desc.label);
        Ok(Arc::new(RenderPipeline {
            id,
            label: desc.label.map(str::to_string),
            program: desc.program,
            bind_group_layouts: desc.bind_group_layouts.clone(),
            vertex_buffers: desc.vertex_buffers.clone(),
            primitive: desc.primitive,
            depth_stencil: desc.depth_stencil,
            multisample: desc.multisample,
            targets: desc.targets.clone(),
        }))
    }

    pub fn destroy_render_pipeline(&self, pipeline: &RenderPipeline) -> HalResult<()> {
        self.unregister(pipeline.id)
    }

    pub fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDescriptor<'_>,
    ) -> HalResult<Arc<ComputePipeline>> {
        for layout in &desc.bind_group_layouts {
            ensure_owned(layout.id, self.id())?;
        }
        if !self.caps.compute {
            warn!(label = desc.label, "compute unavailable, dispatches will be skipped");
        }
        let id = self.register(ResourceType::ComputePipeline, desc.label);
        Ok(Arc::new(ComputePipeline {
            id,
            label: desc.label.map(str::to_string),
            program: desc.program,
            bind_group_layouts: desc.bind_group_layouts.clone(),
        }))
    }

    pub fn destroy_compute_pipeline(&self, pipeline: &ComputePipeline) -> HalResult<()> {
        self.unregister(pipeline.id)
    }

    // ── Queries, fences, encoders ───────────────────────────

    pub fn create_query_set(&self, desc: &QuerySetDescriptor<'_>) -> HalResult<Arc<QuerySet>> {
        if !self.caps.timestamp_query {
            return Err(HalError::UnsupportedOperation(
                "timestamp queries".to_string(),
            ));
        }
        let mut gl = self.context.lock();
        let mut queries = Vec::with_capacity(desc.count as usize);
        for _ in 0..desc.count {
            match gl.create_query() {
                Ok(query) => queries.push(query),
                Err(e) => {
                    for query in queries {
                        gl.delete_query(query);
                    }
                    return Err(HalError::ObjectCreation(e));
                }
            }
        }
        drop(gl);
        let id = self.register(ResourceType::QuerySet, desc.label);
        Ok(Arc::new(QuerySet {
            id,
            ty: desc.ty,
            queries,
        }))
    }

    pub fn destroy_query_set(&self, query_set: &QuerySet) -> HalResult<()> {
        self.unregister(query_set.id)?;
        let mut gl = self.context.lock();
        for query in &query_set.queries {
            gl.delete_query(*query);
        }
        Ok(())
    }

    pub fn create_fence(&self) -> HalResult<Arc<Fence>> {
        let id = self.register(ResourceType::Fence, None);
        Ok(Arc::new(Fence::new(id)))
    }

    pub fn destroy_fence(&self, fence: &Fence) -> HalResult<()> {
        self.unregister(fence.id)
    }

    pub fn create_command_encoder(&self, desc: &CommandEncoderDescriptor<'_>) -> CommandEncoder {
        CommandEncoder::new(self.id(), desc)
    }

    /// Wait until `fence` reaches `value`. Returns `false` on timeout.
    pub fn wait(&self, fence: &Fence, value: u64, timeout: Duration) -> HalResult<bool> {
        ensure_owned(fence.id, self.id())?;
        let deadline = Instant::now() + timeout;
        loop {
            if fence.wait(value) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            std::thread::sleep(FENCE_POLL_INTERVAL);
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id())
            .field("caps", &self.caps)
            .field("live", &self.live.len())
            .finish_non_exhaustive()
    }
}

fn usage_hint(usage: BufferUsages) -> u32 {
    if usage.contains(BufferUsages::MAP_READ) {
        consts::DYNAMIC_READ
    } else if usage.intersects(BufferUsages::MAP_WRITE | BufferUsages::UNIFORM) {
        consts::DYNAMIC_DRAW
    } else {
        consts::STATIC_DRAW
    }
}

/// Filtering and wrapping live on the texture object here.
fn apply_sampler_defaults(
    gl: &mut dyn GlContext,
    target: u32,
    desc: &SamplerDescriptor,
    levels: u32,
) {
    let min = conv::min_filter(desc.min_filter, desc.mipmap_filter, levels > 1);
    gl.tex_parameter_i32(target, consts::TEXTURE_MIN_FILTER, min as i32);
    gl.tex_parameter_i32(target, consts::TEXTURE_MAG_FILTER, conv::filter(desc.mag_filter) as i32);
    gl.tex_parameter_i32(target, consts::TEXTURE_WRAP_S, conv::address_mode(desc.address_mode_u) as i32);
    gl.tex_parameter_i32(target, consts::TEXTURE_WRAP_T, conv::address_mode(desc.address_mode_v) as i32);
    gl.tex_parameter_i32(target, consts::TEXTURE_WRAP_R, conv::address_mode(desc.address_mode_w) as i32);
    gl.tex_parameter_i32(target, consts::TEXTURE_MAX_LEVEL, levels as i32 - 1);
}
