//! The recorded command set and its replay against a live context.
//!
//! Commands are captured by the encoders with every argument resolved to a
//! concrete resource, then replayed in order by the queue. Replay never
//! consults encoder state, so a command buffer can be submitted from any
//! thread that holds the context.

use std::sync::Arc;

use tracing::{debug, warn};

use glshim_core::{HalError, HalResult};
use glshim_types::{
    Color, DepthStencilState, IndexFormat, PrimitiveTopology, VertexBufferLayout, VertexStepMode,
};

use crate::binder;
use crate::context::GlContext;
use crate::conv;
use crate::framebuffer;
use crate::native::{consts, Capabilities, NativeProgram};
use crate::pipeline_state::{self, apply_all};
use crate::readback::{self, TextureBufferCopy};
use crate::resource::{BindGroup, Buffer, QuerySet, RenderPipeline, Texture};

/// One region of a buffer-to-buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferCopy {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub enum Command {
    // ── Transfers ───────────────────────────────────────────
    ClearBuffer {
        buffer: Arc<Buffer>,
        offset: u64,
        size: u64,
    },
    CopyBufferToBuffer {
        src: Arc<Buffer>,
        dst: Arc<Buffer>,
        regions: Vec<BufferCopy>,
    },
    CopyTextureToBuffer {
        src: Arc<Texture>,
        dst: Arc<Buffer>,
        regions: Vec<TextureBufferCopy>,
    },

    // ── Render targets ──────────────────────────────────────
    BindDefaultFramebuffer,
    EnsureFramebuffer {
        texture: Arc<Texture>,
    },
    AttachDepthStencil {
        color: Arc<Texture>,
        depth: Arc<Texture>,
    },
    /// `destination: None` resolves into the default framebuffer.
    ResolveMultisample {
        source: Arc<Texture>,
        destination: Option<Arc<Texture>>,
        width: u32,
        height: u32,
    },
    ClearColor {
        color: Color,
    },
    ClearDepth {
        depth: f32,
    },
    ClearStencil {
        stencil: u32,
    },

    // ── Dynamic state ───────────────────────────────────────
    SetViewport {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    },
    SetScissorRect {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
    SetBlendConstant {
        color: Color,
    },
    SetStencilReference {
        depth_stencil: Option<DepthStencilState>,
        reference: u32,
    },

    // ── Pipelines and bindings ──────────────────────────────
    UseProgram {
        program: NativeProgram,
    },
    ApplyPipelineState {
        pipeline: Arc<RenderPipeline>,
        stencil_reference: u32,
    },
    BindGroup {
        index: u32,
        group: Arc<BindGroup>,
        dynamic_offsets: Vec<u32>,
    },
    /// `layout` is the slot's layout in the pipeline set when recorded.
    SetVertexBuffer {
        slot: u32,
        buffer: Arc<Buffer>,
        offset: u64,
        layout: Option<VertexBufferLayout>,
    },
    SetIndexBuffer {
        buffer: Arc<Buffer>,
    },

    // ── Work ────────────────────────────────────────────────
    Draw {
        topology: PrimitiveTopology,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
    },
    DrawIndexed {
        topology: PrimitiveTopology,
        index_format: IndexFormat,
        /// Byte offset of the index buffer binding.
        index_offset: u64,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
    },
    DrawIndirect {
        topology: PrimitiveTopology,
        buffer: Arc<Buffer>,
        offset: u64,
    },
    DrawIndexedIndirect {
        topology: PrimitiveTopology,
        index_format: IndexFormat,
        buffer: Arc<Buffer>,
        offset: u64,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    DispatchIndirect {
        buffer: Arc<Buffer>,
        offset: u64,
    },

    // ── Queries and annotations ─────────────────────────────
    WriteTimestamp {
        query_set: Arc<QuerySet>,
        index: u32,
    },
    PushDebugGroup {
        label: String,
    },
    PopDebugGroup,
    InsertDebugMarker {
        label: String,
    },
}

impl Command {
    /// Short name used in logs and execution errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::ClearBuffer { .. } => "ClearBuffer",
            Command::CopyBufferToBuffer { .. } => "CopyBufferToBuffer",
            Command::CopyTextureToBuffer { .. } => "CopyTextureToBuffer",
            Command::BindDefaultFramebuffer => "BindDefaultFramebuffer",
            Command::EnsureFramebuffer { .. } => "EnsureFramebuffer",
            Command::AttachDepthStencil { .. } => "AttachDepthStencil",
            Command::ResolveMultisample { .. } => "ResolveMultisample",
            Command::ClearColor { .. } => "ClearColor",
            Command::ClearDepth { .. } => "ClearDepth",
            Command::ClearStencil { .. } => "ClearStencil",
            Command::SetViewport { .. } => "SetViewport",
            Command::SetScissorRect { .. } => "SetScissorRect",
            Command::SetBlendConstant { .. } => "SetBlendConstant",
            Command::SetStencilReference { .. } => "SetStencilReference",
            Command::UseProgram { .. } => "UseProgram",
            Command::ApplyPipelineState { .. } => "ApplyPipelineState",
            Command::BindGroup { .. } => "BindGroup",
            Command::SetVertexBuffer { .. } => "SetVertexBuffer",
            Command::SetIndexBuffer { .. } => "SetIndexBuffer",
            Command::Draw { .. } => "Draw",
            Command::DrawIndexed { .. } => "DrawIndexed",
            Command::DrawIndirect { .. } => "DrawIndirect",
            Command::DrawIndexedIndirect { .. } => "DrawIndexedIndirect",
            Command::Dispatch { .. } => "Dispatch",
            Command::DispatchIndirect { .. } => "DispatchIndirect",
            Command::WriteTimestamp { .. } => "WriteTimestamp",
            Command::PushDebugGroup { .. } => "PushDebugGroup",
            Command::PopDebugGroup => "PopDebugGroup",
            Command::InsertDebugMarker { .. } => "InsertDebugMarker",
        }
    }

    /// Replay this command. Errors are recoverable unless `is_fatal`.
    pub fn execute(&self, gl: &mut dyn GlContext, caps: &Capabilities) -> HalResult<()> {
        match self {
            Command::ClearBuffer {
                buffer,
                offset,
                size,
            } => {
                let zeros = vec![0u8; *size as usize];
                gl.bind_buffer(consts::COPY_WRITE_BUFFER, Some(buffer.raw));
                gl.buffer_sub_data(consts::COPY_WRITE_BUFFER, *offset, &zeros);
                gl.bind_buffer(consts::COPY_WRITE_BUFFER, None);
                buffer.update_shadow(*offset, &zeros);
            }

            Command::CopyBufferToBuffer { src, dst, regions } => {
                gl.bind_buffer(consts::COPY_READ_BUFFER, Some(src.raw));
                gl.bind_buffer(consts::COPY_WRITE_BUFFER, Some(dst.raw));
                for region in regions {
                    gl.copy_buffer_sub_data(
                        consts::COPY_READ_BUFFER,
                        consts::COPY_WRITE_BUFFER,
                        region.src_offset,
                        region.dst_offset,
                        region.size,
                    );
                }
                gl.bind_buffer(consts::COPY_WRITE_BUFFER, None);
                if dst.has_shadow() {
                    gl.bind_buffer(consts::COPY_READ_BUFFER, Some(dst.raw));
                    for region in regions {
                        let mut copied = vec![0u8; region.size as usize];
                        gl.get_buffer_sub_data(
                            consts::COPY_READ_BUFFER,
                            region.dst_offset,
                            &mut copied,
                        );
                        dst.update_shadow(region.dst_offset, &copied);
                    }
                }
                gl.bind_buffer(consts::COPY_READ_BUFFER, None);
            }

            Command::CopyTextureToBuffer { src, dst, regions } => {
                for (at, region) in regions.iter().enumerate() {
                    match readback::copy_texture_to_buffer(gl, src, dst, region) {
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => warn!(region = at, error = %e, "readback region skipped"),
                        Ok(()) => {}
                    }
                }
            }

            Command::BindDefaultFramebuffer => {
                gl.bind_framebuffer(consts::FRAMEBUFFER, None);
            }

            Command::EnsureFramebuffer { texture } => {
                framebuffer::ensure(gl, texture)?;
            }

            Command::AttachDepthStencil { color, depth } => {
                framebuffer::attach_depth_stencil(gl, color, depth);
            }

            Command::ResolveMultisample {
                source,
                destination,
                width,
                height,
            } => {
                framebuffer::resolve_multisample(
                    gl,
                    source,
                    destination.as_deref(),
                    *width,
                    *height,
                )?;
            }

            // Clears ignore the pipeline's write masks and any scissor.
            Command::ClearColor { color } => {
                gl.color_mask(true, true, true, true);
                gl.disable(consts::SCISSOR_TEST);
                let [r, g, b, a] = color.to_f32_array();
                gl.clear_color(r, g, b, a);
                gl.clear(consts::COLOR_BUFFER_BIT);
            }

            Command::ClearDepth { depth } => {
                gl.depth_mask(true);
                gl.disable(consts::SCISSOR_TEST);
                gl.clear_depth(*depth);
                gl.clear(consts::DEPTH_BUFFER_BIT);
            }

            Command::ClearStencil { stencil } => {
                gl.stencil_mask_separate(consts::FRONT_AND_BACK, !0);
                gl.disable(consts::SCISSOR_TEST);
                gl.clear_stencil(*stencil as i32);
                gl.clear(consts::STENCIL_BUFFER_BIT);
            }

            Command::SetViewport {
                x,
                y,
                width,
                height,
                min_depth,
                max_depth,
            } => {
                gl.viewport(*x as i32, *y as i32, *width as i32, *height as i32);
                gl.depth_range(*min_depth, *max_depth);
            }

            Command::SetScissorRect {
                x,
                y,
                width,
                height,
            } => {
                gl.enable(consts::SCISSOR_TEST);
                gl.scissor(*x as i32, *y as i32, *width as i32, *height as i32);
            }

            Command::SetBlendConstant { color } => {
                let [r, g, b, a] = color.to_f32_array();
                gl.blend_color(r, g, b, a);
            }

            Command::SetStencilReference {
                depth_stencil,
                reference,
            } => {
                let ops =
                    pipeline_state::stencil_reference_state(depth_stencil.as_ref(), *reference);
                apply_all(&ops, gl);
            }

            Command::UseProgram { program } => {
                gl.use_program(Some(*program));
            }

            Command::ApplyPipelineState {
                pipeline,
                stencil_reference,
            } => {
                let ops = pipeline_state::render_pipeline_state(pipeline, *stencil_reference);
                apply_all(&ops, gl);
            }

            Command::BindGroup {
                index,
                group,
                dynamic_offsets,
            } => {
                binder::bind_group(gl, *index, group, dynamic_offsets);
            }

            Command::SetVertexBuffer {
                slot,
                buffer,
                offset,
                layout,
            } => {
                gl.bind_buffer(consts::ARRAY_BUFFER, Some(buffer.raw));
                let Some(layout) = layout else {
                    debug!(slot, "no vertex layout for slot, attributes left unchanged");
                    return Ok(());
                };
                let stride = layout.array_stride as i32;
                let divisor = match layout.step_mode {
                    VertexStepMode::Vertex => 0,
                    VertexStepMode::Instance => 1,
                };
                for attribute in &layout.attributes {
                    let desc = conv::describe_vertex_format(attribute.format);
                    let location = attribute.shader_location;
                    let pointer = offset + attribute.offset;
                    gl.enable_vertex_attrib_array(location);
                    if desc.integer {
                        gl.vertex_attrib_pointer_i32(
                            location,
                            desc.size,
                            desc.data_type,
                            stride,
                            pointer,
                        );
                    } else {
                        gl.vertex_attrib_pointer_f32(
                            location,
                            desc.size,
                            desc.data_type,
                            desc.normalized,
                            stride,
                            pointer,
                        );
                    }
                    gl.vertex_attrib_divisor(location, divisor);
                }
            }

            Command::SetIndexBuffer { buffer } => {
                gl.bind_buffer(consts::ELEMENT_ARRAY_BUFFER, Some(buffer.raw));
            }

            Command::Draw {
                topology,
                vertex_count,
                instance_count,
                first_vertex,
            } => {
                let mode = conv::primitive_mode(*topology);
                if *instance_count <= 1 {
                    gl.draw_arrays(mode, *first_vertex as i32, *vertex_count as i32);
                } else {
                    gl.draw_arrays_instanced(
                        mode,
                        *first_vertex as i32,
                        *vertex_count as i32,
                        *instance_count as i32,
                    );
                }
            }

            Command::DrawIndexed {
                topology,
                index_format,
                index_offset,
                index_count,
                instance_count,
                first_index,
                base_vertex,
            } => {
                let mode = conv::primitive_mode(*topology);
                let element_type = conv::index_type(*index_format);
                let offset = index_offset + u64::from(*first_index) * index_format.byte_size();
                let count = *index_count as i32;
                if *base_vertex != 0 {
                    if !caps.base_vertex {
                        return Err(HalError::UnsupportedOperation(
                            "indexed draw with a base vertex".to_string(),
                        ));
                    }
                    gl.draw_elements_instanced_base_vertex(
                        mode,
                        count,
                        element_type,
                        offset,
                        (*instance_count).max(1) as i32,
                        *base_vertex,
                    );
                } else if *instance_count <= 1 {
                    gl.draw_elements(mode, count, element_type, offset);
                } else {
                    gl.draw_elements_instanced(
                        mode,
                        count,
                        element_type,
                        offset,
                        *instance_count as i32,
                    );
                }
            }

            Command::DrawIndirect {
                topology,
                buffer,
                offset,
            } => {
                if !caps.indirect_draw {
                    debug!("indirect draw unavailable, draw skipped");
                    return Ok(());
                }
                gl.bind_buffer(consts::DRAW_INDIRECT_BUFFER, Some(buffer.raw));
                gl.draw_arrays_indirect(conv::primitive_mode(*topology), *offset);
            }

            Command::DrawIndexedIndirect {
                topology,
                index_format,
                buffer,
                offset,
            } => {
                if !caps.indirect_draw {
                    debug!("indirect draw unavailable, draw skipped");
                    return Ok(());
                }
                gl.bind_buffer(consts::DRAW_INDIRECT_BUFFER, Some(buffer.raw));
                gl.draw_elements_indirect(
                    conv::primitive_mode(*topology),
                    conv::index_type(*index_format),
                    *offset,
                );
            }

            Command::Dispatch { x, y, z } => {
                if !caps.compute {
                    debug!("compute unavailable, dispatch skipped");
                    return Ok(());
                }
                gl.dispatch_compute(*x, *y, *z);
                gl.memory_barrier(consts::ALL_BARRIER_BITS);
            }

            Command::DispatchIndirect { buffer, offset } => {
                if !caps.compute {
                    debug!("compute unavailable, indirect dispatch skipped");
                    return Ok(());
                }
                gl.bind_buffer(consts::DISPATCH_INDIRECT_BUFFER, Some(buffer.raw));
                gl.dispatch_compute_indirect(*offset);
                gl.memory_barrier(consts::ALL_BARRIER_BITS);
            }

            Command::WriteTimestamp { query_set, index } => match query_set.query(*index) {
                Some(query) => gl.query_counter(query, consts::TIMESTAMP),
                None => {
                    return Err(HalError::OutOfRange {
                        offset: u64::from(*index),
                        len: 1,
                        size: u64::from(query_set.count()),
                    })
                }
            },

            Command::PushDebugGroup { label } => {
                if caps.debug_markers {
                    gl.push_debug_group(label);
                }
            }

            Command::PopDebugGroup => {
                if caps.debug_markers {
                    gl.pop_debug_group();
                }
            }

            Command::InsertDebugMarker { label } => {
                if caps.debug_markers {
                    gl.debug_message_insert(label);
                }
            }
        }
        Ok(())
    }
}

/// A finished, immutable sequence of commands.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    pub(crate) label: Option<String>,
    pub(crate) commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command kinds in recording order.
    pub fn kinds(&self) -> Vec<&'static str> {
        self.commands.iter().map(Command::kind).collect()
    }
}
