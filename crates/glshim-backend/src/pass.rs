//! Render and compute pass recording.
//!
//! Pass encoders borrow their command encoder mutably for the whole pass and
//! append straight into it. The closing bookkeeping (resolve, rebinding the
//! default framebuffer) runs on drop, so `end` is
//! just an explicit drop.

use std::sync::Arc;

use tracing::{debug, warn};

use glshim_core::HalResult;
use glshim_types::{Color, IndexFormat};

use crate::command::Command;
use crate::encoder::{skipped, CommandEncoder};
use crate::resource::{BindGroup, Buffer, ComputePipeline, RenderPipeline, Texture};

/// Resolve recorded at pass begin and emitted at pass end.
#[derive(Debug, Clone)]
pub(crate) struct PendingResolve {
    pub(crate) source: Arc<Texture>,
    pub(crate) destination: Option<Arc<Texture>>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

#[derive(Debug, Clone)]
struct IndexBinding {
    format: IndexFormat,
    offset: u64,
}

#[derive(Debug)]
pub struct RenderPassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
    pipeline: Option<Arc<RenderPipeline>>,
    vertex_buffers: Vec<Option<(Arc<Buffer>, u64)>>,
    index: Option<IndexBinding>,
    stencil_reference: u32,
    resolve: Option<PendingResolve>,
    offscreen: bool,
}

impl<'a> RenderPassEncoder<'a> {
    pub(crate) fn new(
        encoder: &'a mut CommandEncoder,
        offscreen: bool,
        resolve: Option<PendingResolve>,
    ) -> Self {
        Self {
            encoder,
            pipeline: None,
            vertex_buffers: Vec::new(),
            index: None,
            stencil_reference: 0,
            resolve,
            offscreen,
        }
    }

    pub fn pipeline(&self) -> Option<&Arc<RenderPipeline>> {
        self.pipeline.as_ref()
    }

    pub fn stencil_reference(&self) -> u32 {
        self.stencil_reference
    }

    /// Buffer and offset bound to a vertex slot in this pass.
    pub fn vertex_buffer(&self, slot: u32) -> Option<(&Arc<Buffer>, u64)> {
        self.vertex_buffers
            .get(slot as usize)?
            .as_ref()
            .map(|(buffer, offset)| (buffer, *offset))
    }

    pub fn set_pipeline(&mut self, pipeline: Option<&Arc<RenderPipeline>>) -> HalResult<()> {
        let Some(pipeline) = pipeline else {
            skipped("SetPipeline", "pipeline");
            return Ok(());
        };
        self.encoder.check(pipeline.id)?;
        self.encoder.push(Command::UseProgram {
            program: pipeline.program,
        });
        self.encoder.push(Command::ApplyPipelineState {
            pipeline: pipeline.clone(),
            stencil_reference: self.stencil_reference,
        });
        self.pipeline = Some(pipeline.clone());
        Ok(())
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        group: Option<&Arc<BindGroup>>,
        dynamic_offsets: &[u32],
    ) -> HalResult<()> {
        record_bind_group(self.encoder, index, group, dynamic_offsets)
    }

    /// Bind a vertex buffer. Attributes are configured from the current
    /// pipeline's layout for `slot`, so set the pipeline first.
    pub fn set_vertex_buffer(
        &mut self,
        slot: u32,
        buffer: Option<&Arc<Buffer>>,
        offset: u64,
    ) -> HalResult<()> {
        let Some(buffer) = buffer else {
            skipped("SetVertexBuffer", "buffer");
            return Ok(());
        };
        self.encoder.check(buffer.id)?;
        let layout = self
            .pipeline
            .as_ref()
            .and_then(|p| p.vertex_buffers.get(slot as usize))
            .cloned();
        if layout.is_none() {
            debug!(slot, "no pipeline vertex layout for slot");
        }
        let index = slot as usize;
        if self.vertex_buffers.len() <= index {
            self.vertex_buffers.resize(index + 1, None);
        }
        self.vertex_buffers[index] = Some((buffer.clone(), offset));
        self.encoder.push(Command::SetVertexBuffer {
            slot,
            buffer: buffer.clone(),
            offset,
            layout,
        });
        Ok(())
    }

    pub fn set_index_buffer(
        &mut self,
        buffer: Option<&Arc<Buffer>>,
        format: IndexFormat,
        offset: u64,
    ) -> HalResult<()> {
        let Some(buffer) = buffer else {
            skipped("SetIndexBuffer", "buffer");
            return Ok(());
        };
        self.encoder.check(buffer.id)?;
        self.index = Some(IndexBinding { format, offset });
        self.encoder.push(Command::SetIndexBuffer {
            buffer: buffer.clone(),
        });
        Ok(())
    }

    pub fn set_viewport(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        min_depth: f32,
        max_depth: f32,
    ) {
        self.encoder.push(Command::SetViewport {
            x,
            y,
            width,
            height,
            min_depth,
            max_depth,
        });
    }

    pub fn set_scissor_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        self.encoder.push(Command::SetScissorRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn set_blend_constant(&mut self, color: Color) {
        self.encoder.push(Command::SetBlendConstant { color });
    }

    /// Store the reference for later pipelines and re-apply the current
    /// pipeline's stencil functions with it.
    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.stencil_reference = reference;
        self.encoder.push(Command::SetStencilReference {
            depth_stencil: self.pipeline.as_ref().and_then(|p| p.depth_stencil),
            reference,
        });
    }

    pub fn draw(
        &mut self,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        let Some(pipeline) = &self.pipeline else {
            skipped("Draw", "pipeline");
            return;
        };
        warn_first_instance(first_instance);
        let topology = pipeline.primitive.topology;
        self.encoder.push(Command::Draw {
            topology,
            vertex_count,
            instance_count,
            first_vertex,
        });
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        let Some(pipeline) = &self.pipeline else {
            skipped("DrawIndexed", "pipeline");
            return;
        };
        let Some(index) = &self.index else {
            skipped("DrawIndexed", "index buffer");
            return;
        };
        warn_first_instance(first_instance);
        let command = Command::DrawIndexed {
            topology: pipeline.primitive.topology,
            index_format: index.format,
            index_offset: index.offset,
            index_count,
            instance_count,
            first_index,
            base_vertex,
        };
        self.encoder.push(command);
    }

    pub fn draw_indirect(&mut self, buffer: Option<&Arc<Buffer>>, offset: u64) -> HalResult<()> {
        let (Some(pipeline), Some(buffer)) = (&self.pipeline, buffer) else {
            skipped("DrawIndirect", "pipeline or indirect buffer");
            return Ok(());
        };
        self.encoder.check(buffer.id)?;
        let command = Command::DrawIndirect {
            topology: pipeline.primitive.topology,
            buffer: buffer.clone(),
            offset,
        };
        self.encoder.push(command);
        Ok(())
    }

    pub fn draw_indexed_indirect(
        &mut self,
        buffer: Option<&Arc<Buffer>>,
        offset: u64,
    ) -> HalResult<()> {
        let (Some(pipeline), Some(index), Some(buffer)) = (&self.pipeline, &self.index, buffer)
        else {
            skipped("DrawIndexedIndirect", "pipeline, index buffer or indirect buffer");
            return Ok(());
        };
        self.encoder.check(buffer.id)?;
        let command = Command::DrawIndexedIndirect {
            topology: pipeline.primitive.topology,
            index_format: index.format,
            buffer: buffer.clone(),
            offset,
        };
        self.encoder.push(command);
        Ok(())
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.encoder.push(Command::PushDebugGroup {
            label: label.to_string(),
        });
    }

    pub fn pop_debug_group(&mut self) {
        self.encoder.push(Command::PopDebugGroup);
    }

    pub fn insert_debug_marker(&mut self, label: &str) {
        self.encoder.push(Command::InsertDebugMarker {
            label: label.to_string(),
        });
    }

    /// End the pass.
    pub fn end(self) {}
}

impl Drop for RenderPassEncoder<'_> {
    fn drop(&mut self) {
        if let Some(resolve) = self.resolve.take() {
            self.encoder.push(Command::ResolveMultisample {
                source: resolve.source,
                destination: resolve.destination,
                width: resolve.width,
                height: resolve.height,
            });
        }
        if self.offscreen {
            self.encoder.push(Command::BindDefaultFramebuffer);
        }
    }
}

#[derive(Debug)]
pub struct ComputePassEncoder<'a> {
    encoder: &'a mut CommandEncoder,
    pipeline: Option<Arc<ComputePipeline>>,
}

impl<'a> ComputePassEncoder<'a> {
    pub(crate) fn new(encoder: &'a mut CommandEncoder) -> Self {
        Self {
            encoder,
            pipeline: None,
        }
    }

    pub fn pipeline(&self) -> Option<&Arc<ComputePipeline>> {
        self.pipeline.as_ref()
    }

    pub fn set_pipeline(&mut self, pipeline: Option<&Arc<ComputePipeline>>) -> HalResult<()> {
        let Some(pipeline) = pipeline else {
            skipped("SetPipeline", "pipeline");
            return Ok(());
        };
        self.encoder.check(pipeline.id)?;
        self.encoder.push(Command::UseProgram {
            program: pipeline.program,
        });
        self.pipeline = Some(pipeline.clone());
        Ok(())
    }

    pub fn set_bind_group(
        &mut self,
        index: u32,
        group: Option<&Arc<BindGroup>>,
        dynamic_offsets: &[u32],
    ) -> HalResult<()> {
        record_bind_group(self.encoder, index, group, dynamic_offsets)
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.encoder.push(Command::Dispatch { x, y, z });
    }

    pub fn dispatch_indirect(&mut self, buffer: Option<&Arc<Buffer>>, offset: u64) -> HalResult<()> {
        let Some(buffer) = buffer else {
            skipped("DispatchIndirect", "buffer");
            return Ok(());
        };
        self.encoder.check(buffer.id)?;
        self.encoder.push(Command::DispatchIndirect {
            buffer: buffer.clone(),
            offset,
        });
        Ok(())
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.encoder.push(Command::PushDebugGroup {
            label: label.to_string(),
        });
    }

    pub fn pop_debug_group(&mut self) {
        self.encoder.push(Command::PopDebugGroup);
    }

    pub fn insert_debug_marker(&mut self, label: &str) {
        self.encoder.push(Command::InsertDebugMarker {
            label: label.to_string(),
        });
    }

    pub fn end(self) {}
}

fn record_bind_group(
    encoder: &mut CommandEncoder,
    index: u32,
    group: Option<&Arc<BindGroup>>,
    dynamic_offsets: &[u32],
) -> HalResult<()> {
    let Some(group) = group else {
        skipped("BindGroup", "bind group");
        return Ok(());
    };
    encoder.check(group.id)?;
    let expected = group.layout.dynamic_offset_count();
    if expected != dynamic_offsets.len() {
        warn!(
            index,
            expected,
            supplied = dynamic_offsets.len(),
            "dynamic offset count does not match the bind group layout"
        );
    }
    encoder.push(Command::BindGroup {
        index,
        group: group.clone(),
        dynamic_offsets: dynamic_offsets.to_vec(),
    });
    Ok(())
}

fn warn_first_instance(first_instance: u32) {
    if first_instance != 0 {
        warn!(first_instance, "first instance is not supported, drawing from instance 0");
    }
}
