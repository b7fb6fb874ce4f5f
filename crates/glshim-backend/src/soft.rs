//! A software context that keeps enough immediate-mode state to run the
//! backend without a display. Color storage is RGBA8 with the bottom row
//! first, the same layout a hardware context reads back.

use std::collections::{HashMap, HashSet};

use tracing::trace;

use crate::context::GlContext;
use crate::native::consts::*;
use crate::native::{
    Capabilities, NativeBuffer, NativeFramebuffer, NativeProgram, NativeQuery, NativeTexture,
};

/// A recorded native call. Only calls that tests and diagnostics look at
/// carry their arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    Enable(u32),
    Disable(u32),
    Viewport([i32; 4]),
    DepthRange(f32, f32),
    Scissor([i32; 4]),
    BlendColor([f32; 4]),
    CullFace(u32),
    FrontFace(u32),
    PolygonOffset(f32, f32),
    DepthFunc(u32),
    DepthMask(bool),
    StencilFunc {
        face: u32,
        func: u32,
        reference: i32,
        mask: u32,
    },
    StencilOp {
        face: u32,
        fail: u32,
        depth_fail: u32,
        pass: u32,
    },
    StencilMask {
        face: u32,
        mask: u32,
    },
    ColorMask([bool; 4]),
    BlendEquation(u32, u32),
    BlendFunc(u32, u32, u32, u32),
    ClearColor([f32; 4]),
    ClearDepth(f32),
    ClearStencil(i32),
    Clear(u32),
    UseProgram(Option<u32>),
    BindBuffer {
        target: u32,
        buffer: Option<u32>,
    },
    BindBufferBase {
        target: u32,
        index: u32,
        buffer: Option<u32>,
    },
    BindBufferRange {
        target: u32,
        index: u32,
        buffer: Option<u32>,
        offset: u64,
        size: u64,
    },
    BufferSubData {
        target: u32,
        offset: u64,
        len: usize,
    },
    CopyBufferSubData {
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    },
    EnableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        integer: bool,
        stride: i32,
        offset: u64,
    },
    VertexAttribDivisor {
        index: u32,
        divisor: u32,
    },
    DrawArrays {
        mode: u32,
        first: i32,
        count: i32,
        instances: Option<i32>,
    },
    DrawElements {
        mode: u32,
        count: i32,
        element_type: u32,
        offset: u64,
        instances: Option<i32>,
        base_vertex: i32,
    },
    DrawArraysIndirect {
        mode: u32,
        offset: u64,
    },
    DrawElementsIndirect {
        mode: u32,
        element_type: u32,
        offset: u64,
    },
    DispatchCompute(u32, u32, u32),
    DispatchComputeIndirect(u64),
    MemoryBarrier(u32),
    ActiveTexture(u32),
    BindTexture {
        target: u32,
        texture: Option<u32>,
    },
    TexSubImage {
        level: i32,
        rect: [i32; 4],
    },
    PixelStore(u32, i32),
    BindFramebuffer {
        target: u32,
        framebuffer: Option<u32>,
    },
    FramebufferTexture {
        attachment: u32,
        texture_target: u32,
        texture: Option<u32>,
    },
    DeleteFramebuffer(u32),
    BlitFramebuffer {
        src: [i32; 4],
        dst: [i32; 4],
        mask: u32,
        filter: u32,
    },
    ReadPixels([i32; 4]),
    QueryCounter(u32),
    PushDebugGroup(String),
    PopDebugGroup,
    DebugMarker(String),
    Flush,
    Finish,
    Present,
    Other(&'static str),
}

#[derive(Debug)]
struct SoftTexture {
    target: u32,
    internal_format: u32,
    width: u32,
    height: u32,
    samples: u32,
    allocated: bool,
    params: HashMap<u32, i32>,
    /// Level 0 of color formats.
    texels: Vec<u8>,
}

impl SoftTexture {
    fn is_color(&self) -> bool {
        !matches!(
            self.internal_format,
            DEPTH_COMPONENT16
                | DEPTH_COMPONENT24
                | DEPTH_COMPONENT32F
                | DEPTH24_STENCIL8
                | DEPTH32F_STENCIL8
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct IndexedBinding {
    buffer: u32,
    offset: u64,
    size: Option<u64>,
}

/// Where color writes for a framebuffer binding land.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ColorTarget {
    Surface,
    Texture(u32),
}

pub struct SoftContext {
    caps: Capabilities,
    next_name: u32,
    error: u32,
    lost: bool,
    calls: Vec<GlCall>,
    force_incomplete: bool,

    buffers: HashMap<u32, Vec<u8>>,
    textures: HashMap<u32, SoftTexture>,
    framebuffers: HashMap<u32, HashMap<u32, u32>>,
    queries: HashSet<u32>,

    buffer_bindings: HashMap<u32, u32>,
    indexed_bindings: HashMap<(u32, u32), IndexedBinding>,
    texture_bindings: HashMap<(u32, u32), u32>,
    active_unit: u32,
    read_framebuffer: Option<NativeFramebuffer>,
    draw_framebuffer: Option<NativeFramebuffer>,
    program: Option<NativeProgram>,

    enabled: HashSet<u32>,
    viewport: [i32; 4],
    scissor_box: [i32; 4],
    clear_color: [f32; 4],
    clear_depth: f32,
    clear_stencil: i32,
    color_mask: [bool; 4],
    depth_mask: bool,
    stencil_write_mask: [u32; 2],
    pixel_store: HashMap<u32, i32>,
    debug_depth: usize,

    surface_width: u32,
    surface_height: u32,
    surface_texels: Vec<u8>,
    presented: u64,
}

impl SoftContext {
    /// A context whose default framebuffer is `width` x `height`.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_capabilities(width, height, Capabilities::default())
    }

    pub fn with_capabilities(width: u32, height: u32, caps: Capabilities) -> Self {
        let mut pixel_store = HashMap::new();
        pixel_store.insert(PACK_ALIGNMENT, 4);
        pixel_store.insert(UNPACK_ALIGNMENT, 4);
        Self {
            caps,
            next_name: 1,
            error: NO_ERROR,
            lost: false,
            calls: Vec::new(),
            force_incomplete: false,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            queries: HashSet::new(),
            buffer_bindings: HashMap::new(),
            indexed_bindings: HashMap::new(),
            texture_bindings: HashMap::new(),
            active_unit: 0,
            read_framebuffer: None,
            draw_framebuffer: None,
            program: None,
            enabled: HashSet::new(),
            viewport: [0, 0, width as i32, height as i32],
            scissor_box: [0, 0, width as i32, height as i32],
            clear_color: [0.0; 4],
            clear_depth: 1.0,
            clear_stencil: 0,
            color_mask: [true; 4],
            depth_mask: true,
            stencil_write_mask: [!0, !0],
            pixel_store,
            debug_depth: 0,
            surface_width: width,
            surface_height: height,
            surface_texels: vec![0; width as usize * height as usize * 4],
            presented: 0,
        }
    }

    // ── Test and diagnostic hooks ───────────────────────────

    pub fn calls(&self) -> &[GlCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<GlCall> {
        std::mem::take(&mut self.calls)
    }

    /// Latch an error as if the next call had raised it.
    pub fn inject_error(&mut self, code: u32) {
        self.set_error(code);
    }

    /// Simulate a reset: every later `get_error` reports `CONTEXT_LOST`.
    pub fn lose_context(&mut self) {
        self.lost = true;
    }

    /// Make every non-default framebuffer fail its completeness check.
    pub fn set_force_incomplete_framebuffers(&mut self, force: bool) {
        self.force_incomplete = force;
    }

    pub fn surface_size(&self) -> (u32, u32) {
        (self.surface_width, self.surface_height)
    }

    pub fn surface_texels(&self) -> &[u8] {
        &self.surface_texels
    }

    pub fn texture_texels(&self, texture: NativeTexture) -> Option<&[u8]> {
        self.textures.get(&texture.raw()).map(|t| t.texels.as_slice())
    }

    pub fn texture_parameter(&self, texture: NativeTexture, parameter: u32) -> Option<i32> {
        self.textures
            .get(&texture.raw())
            .and_then(|t| t.params.get(&parameter).copied())
    }

    pub fn buffer_contents(&self, buffer: NativeBuffer) -> Option<&[u8]> {
        self.buffers.get(&buffer.raw()).map(|b| b.as_slice())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_framebuffers(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn framebuffer_attachment(
        &self,
        framebuffer: NativeFramebuffer,
        attachment: u32,
    ) -> Option<NativeTexture> {
        self.framebuffers
            .get(&framebuffer.raw())
            .and_then(|a| a.get(&attachment))
            .and_then(|&name| NativeTexture::from_raw(name))
    }

    pub fn is_enabled(&self, cap: u32) -> bool {
        self.enabled.contains(&cap)
    }

    pub fn color_write_mask(&self) -> [bool; 4] {
        self.color_mask
    }

    pub fn depth_write_mask(&self) -> bool {
        self.depth_mask
    }

    /// Front and back stencil write masks.
    pub fn stencil_write_masks(&self) -> [u32; 2] {
        self.stencil_write_mask
    }

    /// Last depth and stencil clear values.
    pub fn depth_stencil_clear_values(&self) -> (f32, i32) {
        (self.clear_depth, self.clear_stencil)
    }

    pub fn pixel_store_value(&self, parameter: u32) -> i32 {
        self.pixel_store.get(&parameter).copied().unwrap_or(0)
    }

    pub fn current_program(&self) -> Option<NativeProgram> {
        self.program
    }

    pub fn current_viewport(&self) -> [i32; 4] {
        self.viewport
    }

    /// `(buffer, offset, size)` bound at an indexed binding point.
    pub fn indexed_binding(&self, target: u32, index: u32) -> Option<(u32, u64, Option<u64>)> {
        self.indexed_bindings
            .get(&(target, index))
            .map(|b| (b.buffer, b.offset, b.size))
    }

    pub fn texture_binding(&self, unit: u32, target: u32) -> Option<u32> {
        self.texture_bindings.get(&(unit, target)).copied()
    }

    pub fn present_count(&self) -> u64 {
        self.presented
    }

    pub fn debug_group_depth(&self) -> usize {
        self.debug_depth
    }

    // ── Internals ───────────────────────────────────────────

    fn set_error(&mut self, code: u32) {
        if self.error == NO_ERROR {
            self.error = code;
        }
    }

    fn gen_name(&mut self) -> u32 {
        let name = self.next_name;
        self.next_name += 1;
        name
    }

    fn record(&mut self, call: GlCall) {
        trace!(?call, "soft gl call");
        self.calls.push(call);
    }

    fn bound_buffer(&mut self, target: u32) -> Option<u32> {
        let bound = self.buffer_bindings.get(&target).copied();
        if bound.is_none() {
            self.set_error(INVALID_OPERATION);
        }
        bound
    }

    fn framebuffer_for(&self, target: u32) -> Option<NativeFramebuffer> {
        match target {
            READ_FRAMEBUFFER => self.read_framebuffer,
            _ => self.draw_framebuffer,
        }
    }

    fn framebuffer_status(&self, framebuffer: Option<NativeFramebuffer>) -> u32 {
        let Some(framebuffer) = framebuffer else {
            return FRAMEBUFFER_COMPLETE;
        };
        let Some(attachments) = self.framebuffers.get(&framebuffer.raw()) else {
            return FRAMEBUFFER_UNSUPPORTED;
        };
        if self.force_incomplete {
            return FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
        }
        if attachments.is_empty() {
            return FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT;
        }
        let mut samples = None;
        for name in attachments.values() {
            let Some(texture) = self.textures.get(name) else {
                return FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            };
            if !texture.allocated {
                return FRAMEBUFFER_INCOMPLETE_ATTACHMENT;
            }
            match samples {
                None => samples = Some(texture.samples),
                Some(s) if s != texture.samples => return FRAMEBUFFER_INCOMPLETE_MULTISAMPLE,
                Some(_) => {}
            }
        }
        FRAMEBUFFER_COMPLETE
    }

    fn color_target(&self, framebuffer: Option<NativeFramebuffer>) -> Option<ColorTarget> {
        match framebuffer {
            None => Some(ColorTarget::Surface),
            Some(fb) => self
                .framebuffers
                .get(&fb.raw())
                .and_then(|a| a.get(&COLOR_ATTACHMENT0))
                .filter(|name| self.textures.get(name).is_some_and(|t| t.is_color()))
                .map(|&name| ColorTarget::Texture(name)),
        }
    }

    fn target_info(&self, target: ColorTarget) -> (u32, u32, u32) {
        match target {
            ColorTarget::Surface => (self.surface_width, self.surface_height, 1),
            ColorTarget::Texture(name) => self
                .textures
                .get(&name)
                .map_or((0, 0, 1), |t| (t.width, t.height, t.samples)),
        }
    }

    fn texels(&self, target: ColorTarget) -> &[u8] {
        match target {
            ColorTarget::Surface => &self.surface_texels,
            ColorTarget::Texture(name) => self
                .textures
                .get(&name)
                .map_or(&[][..], |t| t.texels.as_slice()),
        }
    }

    fn texels_mut(&mut self, target: ColorTarget) -> Option<&mut Vec<u8>> {
        match target {
            ColorTarget::Surface => Some(&mut self.surface_texels),
            ColorTarget::Texture(name) => self.textures.get_mut(&name).map(|t| &mut t.texels),
        }
    }

    fn clear_color_target(&mut self) {
        let Some(target) = self.color_target(self.draw_framebuffer) else {
            return;
        };
        let (width, height, _) = self.target_info(target);
        let (x0, y0, x1, y1) = if self.enabled.contains(&SCISSOR_TEST) {
            let [x, y, w, h] = self.scissor_box;
            (
                x.clamp(0, width as i32) as u32,
                y.clamp(0, height as i32) as u32,
                (x + w).clamp(0, width as i32) as u32,
                (y + h).clamp(0, height as i32) as u32,
            )
        } else {
            (0, 0, width, height)
        };
        let value = self.clear_color.map(unorm8);
        let mask = self.color_mask;
        let Some(texels) = self.texels_mut(target) else {
            return;
        };
        for y in y0..y1 {
            for x in x0..x1 {
                let base = ((y * width + x) * 4) as usize;
                for channel in 0..4 {
                    if mask[channel] {
                        texels[base + channel] = value[channel];
                    }
                }
            }
        }
    }

    fn check_draw_framebuffer(&mut self) -> bool {
        if self.framebuffer_status(self.draw_framebuffer) != FRAMEBUFFER_COMPLETE {
            self.set_error(INVALID_FRAMEBUFFER_OPERATION);
            return false;
        }
        true
    }
}

fn unorm8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

impl GlContext for SoftContext {
    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn get_error(&mut self) -> u32 {
        if self.lost {
            return CONTEXT_LOST;
        }
        std::mem::replace(&mut self.error, NO_ERROR)
    }

    fn is_context_lost(&self) -> bool {
        self.lost
    }

    fn flush(&mut self) {
        self.record(GlCall::Flush);
    }

    fn finish(&mut self) {
        self.record(GlCall::Finish);
    }

    fn present(&mut self) {
        self.presented += 1;
        self.record(GlCall::Present);
    }

    fn enable(&mut self, cap: u32) {
        self.enabled.insert(cap);
        self.record(GlCall::Enable(cap));
    }

    fn disable(&mut self, cap: u32) {
        self.enabled.remove(&cap);
        self.record(GlCall::Disable(cap));
    }

    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if width < 0 || height < 0 {
            self.set_error(INVALID_VALUE);
            return;
        }
        self.viewport = [x, y, width, height];
        self.record(GlCall::Viewport(self.viewport));
    }

    fn depth_range(&mut self, near: f32, far: f32) {
        self.record(GlCall::DepthRange(near, far));
    }

    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32) {
        if width < 0 || height < 0 {
            self.set_error(INVALID_VALUE);
            return;
        }
        self.scissor_box = [x, y, width, height];
        self.record(GlCall::Scissor(self.scissor_box));
    }

    fn blend_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.record(GlCall::BlendColor([red, green, blue, alpha]));
    }

    fn cull_face(&mut self, face: u32) {
        self.record(GlCall::CullFace(face));
    }

    fn front_face(&mut self, mode: u32) {
        self.record(GlCall::FrontFace(mode));
    }

    fn polygon_offset(&mut self, factor: f32, units: f32) {
        self.record(GlCall::PolygonOffset(factor, units));
    }

    fn depth_func(&mut self, func: u32) {
        self.record(GlCall::DepthFunc(func));
    }

    fn depth_mask(&mut self, write: bool) {
        self.depth_mask = write;
        self.record(GlCall::DepthMask(write));
    }

    fn stencil_func_separate(&mut self, face: u32, func: u32, reference: i32, mask: u32) {
        self.record(GlCall::StencilFunc {
            face,
            func,
            reference,
            mask,
        });
    }

    fn stencil_op_separate(&mut self, face: u32, fail: u32, depth_fail: u32, pass: u32) {
        self.record(GlCall::StencilOp {
            face,
            fail,
            depth_fail,
            pass,
        });
    }

    fn stencil_mask_separate(&mut self, face: u32, mask: u32) {
        if face == FRONT || face == FRONT_AND_BACK {
            self.stencil_write_mask[0] = mask;
        }
        if face == BACK || face == FRONT_AND_BACK {
            self.stencil_write_mask[1] = mask;
        }
        self.record(GlCall::StencilMask { face, mask });
    }

    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool) {
        self.color_mask = [red, green, blue, alpha];
        self.record(GlCall::ColorMask(self.color_mask));
    }

    fn blend_equation_separate(&mut self, color: u32, alpha: u32) {
        self.record(GlCall::BlendEquation(color, alpha));
    }

    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32) {
        self.record(GlCall::BlendFunc(src_rgb, dst_rgb, src_alpha, dst_alpha));
    }

    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.clear_color = [red, green, blue, alpha];
        self.record(GlCall::ClearColor(self.clear_color));
    }

    fn clear_depth(&mut self, depth: f32) {
        self.clear_depth = depth;
        self.record(GlCall::ClearDepth(depth));
    }

    fn clear_stencil(&mut self, stencil: i32) {
        self.clear_stencil = stencil;
        self.record(GlCall::ClearStencil(stencil));
    }

    fn clear(&mut self, mask: u32) {
        self.record(GlCall::Clear(mask));
        if !self.check_draw_framebuffer() {
            return;
        }
        if mask & COLOR_BUFFER_BIT != 0 {
            self.clear_color_target();
        }
        // Depth and stencil planes are not stored.
    }

    fn use_program(&mut self, program: Option<NativeProgram>) {
        self.program = program;
        self.record(GlCall::UseProgram(program.map(NativeProgram::raw)));
    }

    fn create_buffer(&mut self) -> Result<NativeBuffer, String> {
        let name = self.gen_name();
        self.buffers.insert(name, Vec::new());
        NativeBuffer::from_raw(name).ok_or_else(|| "buffer name space exhausted".to_string())
    }

    fn delete_buffer(&mut self, buffer: NativeBuffer) {
        let name = buffer.raw();
        self.buffers.remove(&name);
        self.buffer_bindings.retain(|_, bound| *bound != name);
        self.indexed_bindings.retain(|_, b| b.buffer != name);
        self.record(GlCall::Other("delete_buffer"));
    }

    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeBuffer>) {
        self.record(GlCall::BindBuffer {
            target,
            buffer: buffer.map(NativeBuffer::raw),
        });
        match buffer {
            Some(b) if !self.buffers.contains_key(&b.raw()) => self.set_error(INVALID_OPERATION),
            Some(b) => {
                self.buffer_bindings.insert(target, b.raw());
            }
            None => {
                self.buffer_bindings.remove(&target);
            }
        }
    }

    fn bind_buffer_base(&mut self, target: u32, index: u32, buffer: Option<NativeBuffer>) {
        self.record(GlCall::BindBufferBase {
            target,
            index,
            buffer: buffer.map(NativeBuffer::raw),
        });
        match buffer {
            Some(b) if !self.buffers.contains_key(&b.raw()) => self.set_error(INVALID_OPERATION),
            Some(b) => {
                self.indexed_bindings.insert(
                    (target, index),
                    IndexedBinding {
                        buffer: b.raw(),
                        offset: 0,
                        size: None,
                    },
                );
                self.buffer_bindings.insert(target, b.raw());
            }
            None => {
                self.indexed_bindings.remove(&(target, index));
            }
        }
    }

    fn bind_buffer_range(
        &mut self,
        target: u32,
        index: u32,
        buffer: Option<NativeBuffer>,
        offset: u64,
        size: u64,
    ) {
        self.record(GlCall::BindBufferRange {
            target,
            index,
            buffer: buffer.map(NativeBuffer::raw),
            offset,
            size,
        });
        let Some(b) = buffer else {
            self.indexed_bindings.remove(&(target, index));
            return;
        };
        let Some(len) = self.buffers.get(&b.raw()).map(|data| data.len() as u64) else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        if size == 0 || offset + size > len {
            self.set_error(INVALID_VALUE);
            return;
        }
        self.indexed_bindings.insert(
            (target, index),
            IndexedBinding {
                buffer: b.raw(),
                offset,
                size: Some(size),
            },
        );
        self.buffer_bindings.insert(target, b.raw());
    }

    fn buffer_data_size(&mut self, target: u32, size: u64, _usage: u32) {
        self.record(GlCall::Other("buffer_data"));
        let Some(name) = self.bound_buffer(target) else {
            return;
        };
        if let Some(data) = self.buffers.get_mut(&name) {
            *data = vec![0; size as usize];
        }
    }

    fn buffer_sub_data(&mut self, target: u32, offset: u64, data: &[u8]) {
        self.record(GlCall::BufferSubData {
            target,
            offset,
            len: data.len(),
        });
        let Some(name) = self.bound_buffer(target) else {
            return;
        };
        let Some(storage) = self.buffers.get_mut(&name) else {
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > storage.len() {
            self.set_error(INVALID_VALUE);
            return;
        }
        storage[start..end].copy_from_slice(data);
    }

    fn get_buffer_sub_data(&mut self, target: u32, offset: u64, data: &mut [u8]) {
        self.record(GlCall::Other("get_buffer_sub_data"));
        let Some(name) = self.bound_buffer(target) else {
            return;
        };
        let Some(storage) = self.buffers.get(&name) else {
            return;
        };
        let start = offset as usize;
        let end = start + data.len();
        if end > storage.len() {
            self.set_error(INVALID_VALUE);
            return;
        }
        data.copy_from_slice(&storage[start..end]);
    }

    fn copy_buffer_sub_data(
        &mut self,
        src_target: u32,
        dst_target: u32,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    ) {
        self.record(GlCall::CopyBufferSubData {
            src_offset,
            dst_offset,
            size,
        });
        let (Some(src), Some(dst)) = (self.bound_buffer(src_target), self.bound_buffer(dst_target))
        else {
            return;
        };
        let src_range = src_offset as usize..(src_offset + size) as usize;
        let chunk = match self.buffers.get(&src) {
            Some(data) if src_range.end <= data.len() => data[src_range].to_vec(),
            _ => {
                self.set_error(INVALID_VALUE);
                return;
            }
        };
        match self.buffers.get_mut(&dst) {
            Some(data) if dst_offset as usize + chunk.len() <= data.len() => {
                let start = dst_offset as usize;
                data[start..start + chunk.len()].copy_from_slice(&chunk);
            }
            _ => self.set_error(INVALID_VALUE),
        }
    }

    fn enable_vertex_attrib_array(&mut self, index: u32) {
        if index >= self.caps.max_vertex_attributes {
            self.set_error(INVALID_VALUE);
            return;
        }
        self.record(GlCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&mut self, _index: u32) {
        self.record(GlCall::Other("disable_vertex_attrib_array"));
    }

    fn vertex_attrib_pointer_f32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: u64,
    ) {
        if !self.buffer_bindings.contains_key(&ARRAY_BUFFER) {
            self.set_error(INVALID_OPERATION);
        }
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            data_type,
            normalized,
            integer: false,
            stride,
            offset,
        });
    }

    fn vertex_attrib_pointer_i32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: u64,
    ) {
        if !self.buffer_bindings.contains_key(&ARRAY_BUFFER) {
            self.set_error(INVALID_OPERATION);
        }
        self.record(GlCall::VertexAttribPointer {
            index,
            size,
            data_type,
            normalized: false,
            integer: true,
            stride,
            offset,
        });
    }

    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32) {
        self.record(GlCall::VertexAttribDivisor { index, divisor });
    }

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32) {
        self.check_draw_framebuffer();
        self.record(GlCall::DrawArrays {
            mode,
            first,
            count,
            instances: None,
        });
    }

    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instance_count: i32) {
        self.check_draw_framebuffer();
        self.record(GlCall::DrawArrays {
            mode,
            first,
            count,
            instances: Some(instance_count),
        });
    }

    fn draw_elements(&mut self, mode: u32, count: i32, element_type: u32, offset: u64) {
        self.check_draw_framebuffer();
        if !self.buffer_bindings.contains_key(&ELEMENT_ARRAY_BUFFER) {
            self.set_error(INVALID_OPERATION);
        }
        self.record(GlCall::DrawElements {
            mode,
            count,
            element_type,
            offset,
            instances: None,
            base_vertex: 0,
        });
    }

    fn draw_elements_instanced(
        &mut self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: u64,
        instance_count: i32,
    ) {
        self.draw_elements_instanced_base_vertex(
            mode,
            count,
            element_type,
            offset,
            instance_count,
            0,
        );
    }

    fn draw_elements_instanced_base_vertex(
        &mut self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: u64,
        instance_count: i32,
        base_vertex: i32,
    ) {
        self.check_draw_framebuffer();
        if !self.buffer_bindings.contains_key(&ELEMENT_ARRAY_BUFFER) {
            self.set_error(INVALID_OPERATION);
        }
        if base_vertex != 0 && !self.caps.base_vertex {
            self.set_error(INVALID_OPERATION);
        }
        self.record(GlCall::DrawElements {
            mode,
            count,
            element_type,
            offset,
            instances: Some(instance_count),
            base_vertex,
        });
    }

    fn draw_arrays_indirect(&mut self, mode: u32, offset: u64) {
        if !self.caps.indirect_draw || !self.buffer_bindings.contains_key(&DRAW_INDIRECT_BUFFER) {
            self.set_error(INVALID_OPERATION);
        }
        self.record(GlCall::DrawArraysIndirect { mode, offset });
    }

    fn draw_elements_indirect(&mut self, mode: u32, element_type: u32, offset: u64) {
        if !self.caps.indirect_draw || !self.buffer_bindings.contains_key(&DRAW_INDIRECT_BUFFER) {
            self.set_error(INVALID_OPERATION);
        }
        self.record(GlCall::DrawElementsIndirect {
            mode,
            element_type,
            offset,
        });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        if !self.caps.compute {
            self.set_error(INVALID_OPERATION);
            return;
        }
        self.record(GlCall::DispatchCompute(x, y, z));
    }

    fn dispatch_compute_indirect(&mut self, offset: u64) {
        if !self.caps.compute || !self.buffer_bindings.contains_key(&DISPATCH_INDIRECT_BUFFER) {
            self.set_error(INVALID_OPERATION);
            return;
        }
        self.record(GlCall::DispatchComputeIndirect(offset));
    }

    fn memory_barrier(&mut self, barriers: u32) {
        self.record(GlCall::MemoryBarrier(barriers));
    }

    fn create_texture(&mut self) -> Result<NativeTexture, String> {
        let name = self.gen_name();
        self.textures.insert(
            name,
            SoftTexture {
                target: 0,
                internal_format: 0,
                width: 0,
                height: 0,
                samples: 1,
                allocated: false,
                params: HashMap::new(),
                texels: Vec::new(),
            },
        );
        NativeTexture::from_raw(name).ok_or_else(|| "texture name space exhausted".to_string())
    }

    fn delete_texture(&mut self, texture: NativeTexture) {
        let name = texture.raw();
        self.textures.remove(&name);
        self.texture_bindings.retain(|_, bound| *bound != name);
        for attachments in self.framebuffers.values_mut() {
            attachments.retain(|_, attached| *attached != name);
        }
        self.record(GlCall::Other("delete_texture"));
    }

    fn active_texture(&mut self, unit: u32) {
        if unit < TEXTURE0 || unit - TEXTURE0 >= self.caps.max_texture_units {
            self.set_error(INVALID_ENUM);
            return;
        }
        self.active_unit = unit - TEXTURE0;
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture(&mut self, target: u32, texture: Option<NativeTexture>) {
        self.record(GlCall::BindTexture {
            target,
            texture: texture.map(NativeTexture::raw),
        });
        let key = (self.active_unit, target);
        let Some(texture) = texture else {
            self.texture_bindings.remove(&key);
            return;
        };
        match self.textures.get_mut(&texture.raw()) {
            Some(t) if t.target == 0 || t.target == target => {
                t.target = target;
                self.texture_bindings.insert(key, texture.raw());
            }
            _ => self.set_error(INVALID_OPERATION),
        }
    }

    fn tex_storage_2d(
        &mut self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    ) {
        self.tex_storage_3d(target, levels, internal_format, width, height, 1);
    }

    fn tex_storage_3d(
        &mut self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        _depth: i32,
    ) {
        self.record(GlCall::Other("tex_storage"));
        if levels < 1 || width < 1 || height < 1 {
            self.set_error(INVALID_VALUE);
            return;
        }
        let Some(name) = self.texture_bindings.get(&(self.active_unit, target)).copied() else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        if let Some(t) = self.textures.get_mut(&name) {
            if t.allocated {
                self.set_error(INVALID_OPERATION);
                return;
            }
            t.internal_format = internal_format;
            t.width = width as u32;
            t.height = height as u32;
            t.samples = 1;
            t.allocated = true;
            if t.is_color() {
                t.texels = vec![0; width as usize * height as usize * 4];
            }
        }
    }

    fn tex_storage_2d_multisample(
        &mut self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        _fixed_sample_locations: bool,
    ) {
        self.record(GlCall::Other("tex_storage_multisample"));
        if target != TEXTURE_2D_MULTISAMPLE || samples < 1 || width < 1 || height < 1 {
            self.set_error(INVALID_VALUE);
            return;
        }
        let Some(name) = self.texture_bindings.get(&(self.active_unit, target)).copied() else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        if let Some(t) = self.textures.get_mut(&name) {
            t.internal_format = internal_format;
            t.width = width as u32;
            t.height = height as u32;
            t.samples = samples as u32;
            t.allocated = true;
            if t.is_color() {
                t.texels = vec![0; width as usize * height as usize * 4];
            }
        }
    }

    fn tex_sub_image_2d(
        &mut self,
        target: u32,
        level: i32,
        x_offset: i32,
        y_offset: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        pixels: &[u8],
    ) {
        self.record(GlCall::TexSubImage {
            level,
            rect: [x_offset, y_offset, width, height],
        });
        let Some(name) = self.texture_bindings.get(&(self.active_unit, target)).copied() else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        // Only level 0 RGBA8 uploads are tracked.
        if level != 0 || format != RGBA || data_type != UNSIGNED_BYTE {
            return;
        }
        let Some(texture) = self.textures.get_mut(&name) else {
            return;
        };
        if x_offset < 0
            || y_offset < 0
            || (x_offset + width) as u32 > texture.width
            || (y_offset + height) as u32 > texture.height
            || pixels.len() < (width * height * 4) as usize
        {
            self.set_error(INVALID_VALUE);
            return;
        }
        let row_bytes = width as usize * 4;
        for row in 0..height as usize {
            let dst = ((y_offset as usize + row) * texture.width as usize + x_offset as usize) * 4;
            texture.texels[dst..dst + row_bytes]
                .copy_from_slice(&pixels[row * row_bytes..(row + 1) * row_bytes]);
        }
    }

    fn tex_parameter_i32(&mut self, target: u32, parameter: u32, value: i32) {
        let Some(name) = self.texture_bindings.get(&(self.active_unit, target)).copied() else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        if let Some(t) = self.textures.get_mut(&name) {
            t.params.insert(parameter, value);
        }
        self.record(GlCall::Other("tex_parameter"));
    }

    fn pixel_store_i32(&mut self, parameter: u32, value: i32) {
        if matches!(parameter, PACK_ALIGNMENT | UNPACK_ALIGNMENT) && ![1, 2, 4, 8].contains(&value)
        {
            self.set_error(INVALID_VALUE);
            return;
        }
        self.pixel_store.insert(parameter, value);
        self.record(GlCall::PixelStore(parameter, value));
    }

    fn create_framebuffer(&mut self) -> Result<NativeFramebuffer, String> {
        let name = self.gen_name();
        self.framebuffers.insert(name, HashMap::new());
        NativeFramebuffer::from_raw(name)
            .ok_or_else(|| "framebuffer name space exhausted".to_string())
    }

    fn delete_framebuffer(&mut self, framebuffer: NativeFramebuffer) {
        self.framebuffers.remove(&framebuffer.raw());
        if self.read_framebuffer == Some(framebuffer) {
            self.read_framebuffer = None;
        }
        if self.draw_framebuffer == Some(framebuffer) {
            self.draw_framebuffer = None;
        }
        self.record(GlCall::DeleteFramebuffer(framebuffer.raw()));
    }

    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<NativeFramebuffer>) {
        self.record(GlCall::BindFramebuffer {
            target,
            framebuffer: framebuffer.map(NativeFramebuffer::raw),
        });
        if let Some(fb) = framebuffer {
            if !self.framebuffers.contains_key(&fb.raw()) {
                self.set_error(INVALID_OPERATION);
                return;
            }
        }
        match target {
            READ_FRAMEBUFFER => self.read_framebuffer = framebuffer,
            DRAW_FRAMEBUFFER => self.draw_framebuffer = framebuffer,
            FRAMEBUFFER => {
                self.read_framebuffer = framebuffer;
                self.draw_framebuffer = framebuffer;
            }
            _ => self.set_error(INVALID_ENUM),
        }
    }

    fn framebuffer_binding(&self, target: u32) -> Option<NativeFramebuffer> {
        self.framebuffer_for(target)
    }

    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeTexture>,
        _level: i32,
    ) {
        self.record(GlCall::FramebufferTexture {
            attachment,
            texture_target,
            texture: texture.map(NativeTexture::raw),
        });
        let Some(fb) = self.framebuffer_for(target) else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        let Some(texture) = texture else {
            if let Some(attachments) = self.framebuffers.get_mut(&fb.raw()) {
                attachments.remove(&attachment);
            }
            return;
        };
        let kind_matches = self
            .textures
            .get(&texture.raw())
            .is_some_and(|t| t.target == texture_target);
        if !kind_matches {
            self.set_error(INVALID_OPERATION);
            return;
        }
        if let Some(attachments) = self.framebuffers.get_mut(&fb.raw()) {
            attachments.insert(attachment, texture.raw());
        }
    }

    fn check_framebuffer_status(&mut self, target: u32) -> u32 {
        self.framebuffer_status(self.framebuffer_for(target))
    }

    fn blit_framebuffer(
        &mut self,
        src_x0: i32,
        src_y0: i32,
        src_x1: i32,
        src_y1: i32,
        dst_x0: i32,
        dst_y0: i32,
        dst_x1: i32,
        dst_y1: i32,
        mask: u32,
        filter: u32,
    ) {
        self.record(GlCall::BlitFramebuffer {
            src: [src_x0, src_y0, src_x1, src_y1],
            dst: [dst_x0, dst_y0, dst_x1, dst_y1],
            mask,
            filter,
        });
        if self.framebuffer_status(self.read_framebuffer) != FRAMEBUFFER_COMPLETE
            || self.framebuffer_status(self.draw_framebuffer) != FRAMEBUFFER_COMPLETE
        {
            self.set_error(INVALID_FRAMEBUFFER_OPERATION);
            return;
        }
        if mask & COLOR_BUFFER_BIT == 0 {
            return;
        }
        let (Some(src), Some(dst)) = (
            self.color_target(self.read_framebuffer),
            self.color_target(self.draw_framebuffer),
        ) else {
            return;
        };
        let (src_w, src_h, src_samples) = self.target_info(src);
        let (dst_w, dst_h, dst_samples) = self.target_info(dst);
        let same_size = (src_x1 - src_x0, src_y1 - src_y0) == (dst_x1 - dst_x0, dst_y1 - dst_y0);
        if dst_samples > 1 || (src_samples > 1 && !same_size) {
            self.set_error(INVALID_OPERATION);
            return;
        }
        let source = self.texels(src).to_vec();
        let Some(texels) = self.texels_mut(dst) else {
            return;
        };
        let (span_w, span_h) = ((dst_x1 - dst_x0).max(1), (dst_y1 - dst_y0).max(1));
        for dy in dst_y0.max(0)..dst_y1.min(dst_h as i32) {
            for dx in dst_x0.max(0)..dst_x1.min(dst_w as i32) {
                let sx = src_x0 + (dx - dst_x0) * (src_x1 - src_x0) / span_w;
                let sy = src_y0 + (dy - dst_y0) * (src_y1 - src_y0) / span_h;
                if sx < 0 || sy < 0 || sx >= src_w as i32 || sy >= src_h as i32 {
                    continue;
                }
                let s = ((sy as u32 * src_w + sx as u32) * 4) as usize;
                let d = ((dy as u32 * dst_w + dx as u32) * 4) as usize;
                texels[d..d + 4].copy_from_slice(&source[s..s + 4]);
            }
        }
    }

    fn read_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        pixels: &mut [u8],
    ) {
        self.record(GlCall::ReadPixels([x, y, width, height]));
        if self.framebuffer_status(self.read_framebuffer) != FRAMEBUFFER_COMPLETE {
            self.set_error(INVALID_FRAMEBUFFER_OPERATION);
            return;
        }
        if format != RGBA || data_type != UNSIGNED_BYTE {
            self.set_error(INVALID_ENUM);
            return;
        }
        let Some(src) = self.color_target(self.read_framebuffer) else {
            self.set_error(INVALID_OPERATION);
            return;
        };
        let (src_w, src_h, samples) = self.target_info(src);
        if samples > 1 {
            self.set_error(INVALID_OPERATION);
            return;
        }
        let alignment = self.pixel_store_value(PACK_ALIGNMENT).max(1) as usize;
        let row_bytes = width.max(0) as usize * 4;
        let stride = row_bytes.div_ceil(alignment) * alignment;
        let needed = if height > 0 {
            stride * (height as usize - 1) + row_bytes
        } else {
            0
        };
        if pixels.len() < needed {
            self.set_error(INVALID_OPERATION);
            return;
        }
        let source = self.texels(src);
        for row in 0..height.max(0) {
            let sy = y + row;
            if sy < 0 || sy >= src_h as i32 {
                continue;
            }
            for col in 0..width.max(0) {
                let sx = x + col;
                if sx < 0 || sx >= src_w as i32 {
                    continue;
                }
                let s = ((sy as u32 * src_w + sx as u32) * 4) as usize;
                let d = row as usize * stride + col as usize * 4;
                pixels[d..d + 4].copy_from_slice(&source[s..s + 4]);
            }
        }
    }

    fn create_query(&mut self) -> Result<NativeQuery, String> {
        if !self.caps.timestamp_query {
            return Err("timer queries are not available".to_string());
        }
        let name = self.gen_name();
        self.queries.insert(name);
        NativeQuery::from_raw(name).ok_or_else(|| "query name space exhausted".to_string())
    }

    fn delete_query(&mut self, query: NativeQuery) {
        self.queries.remove(&query.raw());
    }

    fn query_counter(&mut self, query: NativeQuery, target: u32) {
        if target != TIMESTAMP || !self.queries.contains(&query.raw()) {
            self.set_error(INVALID_OPERATION);
            return;
        }
        self.record(GlCall::QueryCounter(query.raw()));
    }

    fn push_debug_group(&mut self, message: &str) {
        self.debug_depth += 1;
        self.record(GlCall::PushDebugGroup(message.to_string()));
    }

    fn pop_debug_group(&mut self) {
        if self.debug_depth == 0 {
            self.set_error(INVALID_OPERATION);
            return;
        }
        self.debug_depth -= 1;
        self.record(GlCall::PopDebugGroup);
    }

    fn debug_message_insert(&mut self, message: &str) {
        self.record(GlCall::DebugMarker(message.to_string()));
    }
}
