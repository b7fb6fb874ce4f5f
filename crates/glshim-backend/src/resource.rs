//! HAL resources and the descriptors they are created from.
//!
//! Resources are handed out as `Arc`s. Recorded commands hold clones, so a
//! resource stays alive at least until every command buffer referencing it
//! has been submitted or dropped.

use std::num::NonZeroU64;
use std::sync::Arc;

use parking_lot::Mutex;

use glshim_types::{
    BindGroupLayoutEntry, BindingType, BufferBindingType, BufferUsages, ColorTargetState,
    DepthStencilState, Extent3d, MultisampleState, PrimitiveState, ResourceId, SamplerDescriptor,
    TextureAspect, TextureDimension, TextureFormat, TextureUsages, TextureViewDimension,
    VertexBufferLayout,
};

use crate::native::{
    consts, NativeBuffer, NativeFramebuffer, NativeProgram, NativeQuery, NativeTexture,
};

// ── Buffers ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub usage: BufferUsages,
}

#[derive(Debug)]
pub struct Buffer {
    pub(crate) id: ResourceId,
    pub(crate) raw: NativeBuffer,
    pub(crate) size: u64,
    pub(crate) usage: BufferUsages,
    pub(crate) label: Option<String>,
    /// CPU mirror, allocated by the first texture readback into this buffer
    /// and kept coherent with every later write. Never shrinks.
    shadow: Mutex<Option<Vec<u8>>>,
}

impl Buffer {
    pub(crate) fn new(
        id: ResourceId,
        raw: NativeBuffer,
        size: u64,
        usage: BufferUsages,
        label: Option<String>,
    ) -> Self {
        Self {
            id,
            raw,
            size,
            usage,
            label,
            shadow: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn raw(&self) -> NativeBuffer {
        self.raw
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn usage(&self) -> BufferUsages {
        self.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Length of the CPU shadow, if one has been allocated.
    pub fn shadow_len(&self) -> Option<usize> {
        self.shadow.lock().as_ref().map(Vec::len)
    }

    /// Run `f` on the shadow, allocating it or growing it to at least
    /// `required` bytes first.
    pub(crate) fn with_shadow<R>(&self, required: usize, f: impl FnOnce(&mut [u8]) -> R) -> R {
        let mut guard = self.shadow.lock();
        let shadow = guard.get_or_insert_with(Vec::new);
        if shadow.len() < required {
            shadow.resize(required, 0);
        }
        f(shadow)
    }

    /// Copy from the shadow if it covers the whole range.
    pub(crate) fn read_shadow(&self, offset: u64, out: &mut [u8]) -> bool {
        let guard = self.shadow.lock();
        let Some(shadow) = guard.as_ref() else {
            return false;
        };
        let start = offset as usize;
        let end = start + out.len();
        if end > shadow.len() {
            return false;
        }
        out.copy_from_slice(&shadow[start..end]);
        true
    }

    /// Mirror a write into the shadow when one exists.
    pub(crate) fn update_shadow(&self, offset: u64, data: &[u8]) {
        let mut guard = self.shadow.lock();
        if let Some(shadow) = guard.as_mut() {
            let start = offset as usize;
            let end = start + data.len();
            if shadow.len() < end {
                shadow.resize(end, 0);
            }
            shadow[start..end].copy_from_slice(data);
        }
    }

    pub(crate) fn has_shadow(&self) -> bool {
        self.shadow.lock().is_some()
    }

    /// Install initial shadow contents unless a shadow already exists.
    pub(crate) fn seed_shadow(&self, contents: Vec<u8>) {
        let mut guard = self.shadow.lock();
        if guard.is_none() {
            *guard = Some(contents);
        }
    }
}

// ── Textures ────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TextureDescriptor<'a> {
    pub label: Option<&'a str>,
    pub size: Extent3d,
    pub mip_level_count: u32,
    pub sample_count: u32,
    pub dimension: TextureDimension,
    pub format: TextureFormat,
    pub usage: TextureUsages,
}

impl<'a> TextureDescriptor<'a> {
    /// A single-level 2D render target.
    pub fn render_target(
        label: Option<&'a str>,
        width: u32,
        height: u32,
        format: TextureFormat,
        sample_count: u32,
    ) -> Self {
        Self {
            label,
            size: Extent3d::new_2d(width, height),
            mip_level_count: 1,
            sample_count,
            dimension: TextureDimension::D2,
            format,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
        }
    }
}

#[derive(Debug)]
pub struct Texture {
    pub(crate) id: ResourceId,
    pub(crate) raw: NativeTexture,
    pub(crate) target: u32,
    pub(crate) format: TextureFormat,
    pub(crate) dimension: TextureDimension,
    pub(crate) size: Extent3d,
    pub(crate) mip_level_count: u32,
    pub(crate) sample_count: u32,
    pub(crate) usage: TextureUsages,
    pub(crate) label: Option<String>,
    /// Framebuffer wrapping this texture as its color attachment, created
    /// the first time the texture is rendered to or read back.
    framebuffer: Mutex<Option<NativeFramebuffer>>,
}

impl Texture {
    pub(crate) fn new(
        id: ResourceId,
        raw: NativeTexture,
        target: u32,
        desc: &TextureDescriptor<'_>,
    ) -> Self {
        Self {
            id,
            raw,
            target,
            format: desc.format,
            dimension: desc.dimension,
            size: desc.size,
            mip_level_count: desc.mip_level_count.max(1),
            sample_count: desc.sample_count.max(1),
            usage: desc.usage,
            label: desc.label.map(str::to_string),
            framebuffer: Mutex::new(None),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn raw(&self) -> NativeTexture {
        self.raw
    }

    /// Native target kind: 2D, 2D multisample, 2D array or 3D.
    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn dimension(&self) -> TextureDimension {
        self.dimension
    }

    pub fn size(&self) -> Extent3d {
        self.size
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn usage(&self) -> TextureUsages {
        self.usage
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_multisampled(&self) -> bool {
        self.target == consts::TEXTURE_2D_MULTISAMPLE
    }

    /// The cached framebuffer, if one has been created.
    pub fn framebuffer(&self) -> Option<NativeFramebuffer> {
        *self.framebuffer.lock()
    }

    pub(crate) fn set_framebuffer(&self, framebuffer: Option<NativeFramebuffer>) {
        *self.framebuffer.lock() = framebuffer;
    }

    pub(crate) fn take_framebuffer(&self) -> Option<NativeFramebuffer> {
        self.framebuffer.lock().take()
    }
}

// ── Texture views ───────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct TextureViewDescriptor<'a> {
    pub label: Option<&'a str>,
    pub format: Option<TextureFormat>,
    pub dimension: Option<TextureViewDimension>,
    pub aspect: TextureAspect,
    pub base_mip_level: u32,
    pub mip_level_count: Option<u32>,
    pub base_array_layer: u32,
    pub array_layer_count: Option<u32>,
}

/// What a view looks at.
#[derive(Debug, Clone)]
pub enum ViewSource {
    /// The default framebuffer of the context.
    Surface { width: u32, height: u32 },
    Texture(Arc<Texture>),
}

#[derive(Debug)]
pub struct TextureView {
    pub(crate) id: ResourceId,
    pub(crate) source: ViewSource,
    pub(crate) format: TextureFormat,
    pub(crate) dimension: TextureViewDimension,
    pub(crate) aspect: TextureAspect,
    pub(crate) base_mip_level: u32,
    pub(crate) mip_level_count: u32,
    pub(crate) base_array_layer: u32,
}

impl TextureView {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn source(&self) -> &ViewSource {
        &self.source
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        match &self.source {
            ViewSource::Texture(texture) => Some(texture),
            ViewSource::Surface { .. } => None,
        }
    }

    pub fn is_surface(&self) -> bool {
        matches!(self.source, ViewSource::Surface { .. })
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn dimension(&self) -> TextureViewDimension {
        self.dimension
    }

    pub fn aspect(&self) -> TextureAspect {
        self.aspect
    }

    pub fn base_mip_level(&self) -> u32 {
        self.base_mip_level
    }

    pub fn mip_level_count(&self) -> u32 {
        self.mip_level_count
    }

    pub fn base_array_layer(&self) -> u32 {
        self.base_array_layer
    }

    /// Width and height of the viewed mip level.
    pub fn extent(&self) -> (u32, u32) {
        match &self.source {
            ViewSource::Surface { width, height } => (*width, *height),
            ViewSource::Texture(texture) => {
                let size = texture.size.mip_level_size(self.base_mip_level);
                (size.width, size.height)
            }
        }
    }
}

// ── Surface ─────────────────────────────────────────────────

/// The presentable default framebuffer.
#[derive(Debug)]
pub struct Surface {
    pub(crate) id: ResourceId,
    pub(crate) view_id: ResourceId,
    view: Mutex<Arc<TextureView>>,
}

impl Surface {
    pub(crate) fn new(id: ResourceId, view_id: ResourceId, width: u32, height: u32) -> Self {
        Self {
            id,
            view_id,
            view: Mutex::new(Arc::new(Self::make_view(view_id, width, height))),
        }
    }

    fn make_view(view_id: ResourceId, width: u32, height: u32) -> TextureView {
        TextureView {
            id: view_id,
            source: ViewSource::Surface { width, height },
            format: TextureFormat::Rgba8Unorm,
            dimension: TextureViewDimension::D2,
            aspect: TextureAspect::All,
            base_mip_level: 0,
            mip_level_count: 1,
            base_array_layer: 0,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Resize after the window changed.
    pub fn configure(&self, width: u32, height: u32) {
        *self.view.lock() = Arc::new(Self::make_view(self.view_id, width, height));
    }

    /// View of the current back buffer, usable as a color attachment.
    pub fn acquire_texture(&self) -> Arc<TextureView> {
        self.view.lock().clone()
    }

    pub fn size(&self) -> (u32, u32) {
        self.view.lock().extent()
    }
}

// ── Samplers ────────────────────────────────────────────────

/// Sampler state. Filtering is carried by textures in this execution model,
/// so binding a sampler issues no native call.
#[derive(Debug)]
pub struct Sampler {
    pub(crate) id: ResourceId,
    pub(crate) desc: SamplerDescriptor,
}

impl Sampler {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.desc
    }
}

// ── Bind groups ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BindGroupLayoutDescriptor<'a> {
    pub label: Option<&'a str>,
    pub entries: &'a [BindGroupLayoutEntry],
}

#[derive(Debug)]
pub struct BindGroupLayout {
    pub(crate) id: ResourceId,
    /// Sorted by binding number.
    pub(crate) entries: Vec<BindGroupLayoutEntry>,
}

impl BindGroupLayout {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.entries
    }

    pub fn entry(&self, binding: u32) -> Option<&BindGroupLayoutEntry> {
        self.entries
            .binary_search_by_key(&binding, |e| e.binding)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Number of dynamic offsets a `SetBindGroup` with this layout consumes.
    pub fn dynamic_offset_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.ty.has_dynamic_offset())
            .count()
    }

    /// Indexed buffer target for a buffer binding.
    pub(crate) fn buffer_target(&self, binding: u32) -> u32 {
        match self.entry(binding).map(|e| e.ty) {
            Some(BindingType::Buffer {
                ty: BufferBindingType::Storage { .. },
                ..
            }) => consts::SHADER_STORAGE_BUFFER,
            _ => consts::UNIFORM_BUFFER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferBinding {
    pub buffer: Arc<Buffer>,
    pub offset: u64,
    /// `None` binds from `offset` to the end of the buffer.
    pub size: Option<NonZeroU64>,
}

#[derive(Debug, Clone)]
pub enum BindingResource {
    Buffer(BufferBinding),
    TextureView(Arc<TextureView>),
    Sampler(Arc<Sampler>),
}

#[derive(Debug, Clone)]
pub struct BindGroupEntry {
    pub binding: u32,
    pub resource: BindingResource,
}

#[derive(Debug, Clone)]
pub struct BindGroupDescriptor<'a> {
    pub label: Option<&'a str>,
    pub layout: &'a Arc<BindGroupLayout>,
    pub entries: Vec<BindGroupEntry>,
}

#[derive(Debug)]
pub struct BindGroup {
    pub(crate) id: ResourceId,
    pub(crate) layout: Arc<BindGroupLayout>,
    /// Sorted by binding number.
    pub(crate) entries: Vec<BindGroupEntry>,
}

impl BindGroup {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn layout(&self) -> &Arc<BindGroupLayout> {
        &self.layout
    }

    pub fn entries(&self) -> &[BindGroupEntry] {
        &self.entries
    }
}

// ── Pipelines ───────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    /// Linked program for the vertex and fragment stages.
    pub program: NativeProgram,
    pub bind_group_layouts: Vec<Arc<BindGroupLayout>>,
    pub vertex_buffers: Vec<VertexBufferLayout>,
    pub primitive: PrimitiveState,
    pub depth_stencil: Option<DepthStencilState>,
    pub multisample: MultisampleState,
    pub targets: Vec<Option<ColorTargetState>>,
}

#[derive(Debug)]
pub struct RenderPipeline {
    pub(crate) id: ResourceId,
    pub(crate) label: Option<String>,
    pub(crate) program: NativeProgram,
    pub(crate) bind_group_layouts: Vec<Arc<BindGroupLayout>>,
    pub(crate) vertex_buffers: Vec<VertexBufferLayout>,
    pub(crate) primitive: PrimitiveState,
    pub(crate) depth_stencil: Option<DepthStencilState>,
    pub(crate) multisample: MultisampleState,
    pub(crate) targets: Vec<Option<ColorTargetState>>,
}

impl RenderPipeline {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn program(&self) -> NativeProgram {
        self.program
    }

    pub fn bind_group_layouts(&self) -> &[Arc<BindGroupLayout>] {
        &self.bind_group_layouts
    }

    pub fn vertex_buffers(&self) -> &[VertexBufferLayout] {
        &self.vertex_buffers
    }

    pub fn primitive(&self) -> &PrimitiveState {
        &self.primitive
    }

    pub fn depth_stencil(&self) -> Option<&DepthStencilState> {
        self.depth_stencil.as_ref()
    }

    pub fn multisample(&self) -> &MultisampleState {
        &self.multisample
    }

    pub fn targets(&self) -> &[Option<ColorTargetState>] {
        &self.targets
    }
}

#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor<'a> {
    pub label: Option<&'a str>,
    pub program: NativeProgram,
    pub bind_group_layouts: Vec<Arc<BindGroupLayout>>,
}

#[derive(Debug)]
pub struct ComputePipeline {
    pub(crate) id: ResourceId,
    pub(crate) label: Option<String>,
    pub(crate) program: NativeProgram,
    pub(crate) bind_group_layouts: Vec<Arc<BindGroupLayout>>,
}

impl ComputePipeline {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn program(&self) -> NativeProgram {
        self.program
    }

    pub fn bind_group_layouts(&self) -> &[Arc<BindGroupLayout>] {
        &self.bind_group_layouts
    }
}

// ── Queries ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Timestamp,
}

#[derive(Debug, Clone)]
pub struct QuerySetDescriptor<'a> {
    pub label: Option<&'a str>,
    pub ty: QueryType,
    pub count: u32,
}

#[derive(Debug)]
pub struct QuerySet {
    pub(crate) id: ResourceId,
    pub(crate) ty: QueryType,
    pub(crate) queries: Vec<NativeQuery>,
}

impl QuerySet {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn ty(&self) -> QueryType {
        self.ty
    }

    pub fn count(&self) -> u32 {
        self.queries.len() as u32
    }

    pub(crate) fn query(&self, index: u32) -> Option<NativeQuery> {
        self.queries.get(index as usize).copied()
    }
}

/// Reject resources created by another device.
pub(crate) fn ensure_owned(id: ResourceId, device_id: u32) -> glshim_core::HalResult<()> {
    if id.belongs_to(device_id) {
        Ok(())
    } else {
        Err(glshim_core::HalError::foreign(
            id.resource_type,
            id.device_id,
            device_id,
        ))
    }
}
