//! Command recording.

use std::sync::Arc;

use tracing::{debug, warn};

use glshim_core::{HalError, HalResult};
use glshim_types::{Color, Operations};

use crate::command::{BufferCopy, Command, CommandBuffer};
use crate::pass::{ComputePassEncoder, PendingResolve, RenderPassEncoder};
use crate::readback::{self, TextureBufferCopy};
use crate::resource::{ensure_owned, Buffer, QuerySet, Texture, TextureView, ViewSource};

#[derive(Debug, Clone, Default)]
pub struct CommandEncoderDescriptor<'a> {
    pub label: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct RenderPassColorAttachment<'a> {
    pub view: &'a Arc<TextureView>,
    pub resolve_target: Option<&'a Arc<TextureView>>,
    pub ops: Operations<Color>,
}

#[derive(Debug, Clone)]
pub struct RenderPassDepthStencilAttachment<'a> {
    pub view: &'a Arc<TextureView>,
    pub depth_ops: Option<Operations<f32>>,
    pub stencil_ops: Option<Operations<u32>>,
}

#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor<'a> {
    pub label: Option<&'a str>,
    pub color_attachments: &'a [Option<RenderPassColorAttachment<'a>>],
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a>>,
}

#[derive(Debug, Clone, Default)]
pub struct ComputePassDescriptor<'a> {
    pub label: Option<&'a str>,
}

/// Records commands into a buffer for later submission.
///
/// An encoder is reusable: `begin_encoding` starts a recording,
/// `end_encoding` hands the commands over as a [`CommandBuffer`].
#[derive(Debug)]
pub struct CommandEncoder {
    device_id: u32,
    label: Option<String>,
    commands: Vec<Command>,
    recording: bool,
}

impl CommandEncoder {
    pub(crate) fn new(device_id: u32, desc: &CommandEncoderDescriptor<'_>) -> Self {
        Self {
            device_id,
            label: desc.label.map(str::to_string),
            commands: Vec::new(),
            recording: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Commands recorded so far in the current recording.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Start a fresh recording. Anything recorded and not ended is dropped.
    pub fn begin_encoding(&mut self, label: Option<&str>) -> HalResult<()> {
        if self.recording {
            debug!(dropped = self.commands.len(), "restarting an unfinished recording");
        }
        if let Some(label) = label {
            self.label = Some(label.to_string());
        }
        self.commands.clear();
        self.recording = true;
        Ok(())
    }

    pub fn end_encoding(&mut self) -> HalResult<CommandBuffer> {
        if !self.recording {
            return Err(HalError::RecordingState(
                "end_encoding called on an encoder that is not recording".to_string(),
            ));
        }
        self.recording = false;
        let commands = std::mem::take(&mut self.commands);
        debug!(label = ?self.label, commands = commands.len(), "finished command buffer");
        Ok(CommandBuffer {
            label: self.label.clone(),
            commands,
        })
    }

    /// Drop everything recorded so far and leave the recording state.
    pub fn discard_encoding(&mut self) {
        self.commands.clear();
        self.recording = false;
    }

    // ── Transfers ───────────────────────────────────────────

    /// Zero `size` bytes from `offset`; `None` clears to the end.
    pub fn clear_buffer(
        &mut self,
        buffer: Option<&Arc<Buffer>>,
        offset: u64,
        size: Option<u64>,
    ) -> HalResult<()> {
        self.ensure_recording()?;
        let Some(buffer) = buffer else {
            skipped("ClearBuffer", "buffer");
            return Ok(());
        };
        self.check(buffer.id)?;
        let size = size.unwrap_or_else(|| buffer.size.saturating_sub(offset));
        check_range(offset, size, buffer.size)?;
        if size > 0 {
            self.push(Command::ClearBuffer {
                buffer: buffer.clone(),
                offset,
                size,
            });
        }
        Ok(())
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        src: Option<&Arc<Buffer>>,
        dst: Option<&Arc<Buffer>>,
        regions: &[BufferCopy],
    ) -> HalResult<()> {
        self.ensure_recording()?;
        let (Some(src), Some(dst)) = (src, dst) else {
            skipped("CopyBufferToBuffer", "source or destination buffer");
            return Ok(());
        };
        self.check(src.id)?;
        self.check(dst.id)?;
        for region in regions {
            check_range(region.src_offset, region.size, src.size)?;
            check_range(region.dst_offset, region.size, dst.size)?;
        }
        let regions: Vec<BufferCopy> = regions.iter().filter(|r| r.size > 0).copied().collect();
        if !regions.is_empty() {
            self.push(Command::CopyBufferToBuffer {
                src: src.clone(),
                dst: dst.clone(),
                regions,
            });
        }
        Ok(())
    }

    /// Copy texels into a buffer, top row first.
    pub fn copy_texture_to_buffer(
        &mut self,
        src: Option<&Arc<Texture>>,
        dst: Option<&Arc<Buffer>>,
        regions: &[TextureBufferCopy],
    ) -> HalResult<()> {
        self.ensure_recording()?;
        let (Some(src), Some(dst)) = (src, dst) else {
            skipped("CopyTextureToBuffer", "source texture or destination buffer");
            return Ok(());
        };
        self.check(src.id)?;
        self.check(dst.id)?;
        for region in regions {
            if region.mip_level >= src.mip_level_count {
                return Err(HalError::OutOfRange {
                    offset: u64::from(region.mip_level),
                    len: 1,
                    size: u64::from(src.mip_level_count),
                });
            }
            readback::check_texel_region(
                src.size.mip_level_size(region.mip_level),
                region.texture_origin,
                region.size.width,
                region.size.height,
            )?;
        }
        let regions: Vec<TextureBufferCopy> = regions
            .iter()
            .filter(|r| r.size.width > 0 && r.size.height > 0)
            .copied()
            .collect();
        if !regions.is_empty() {
            self.push(Command::CopyTextureToBuffer {
                src: src.clone(),
                dst: dst.clone(),
                regions,
            });
        }
        Ok(())
    }

    pub fn write_timestamp(&mut self, query_set: &Arc<QuerySet>, index: u32) -> HalResult<()> {
        self.ensure_recording()?;
        self.check(query_set.id)?;
        if index >= query_set.count() {
            return Err(HalError::OutOfRange {
                offset: u64::from(index),
                len: 1,
                size: u64::from(query_set.count()),
            });
        }
        self.push(Command::WriteTimestamp {
            query_set: query_set.clone(),
            index,
        });
        Ok(())
    }

    // ── Debug annotations ───────────────────────────────────

    pub fn push_debug_group(&mut self, label: &str) -> HalResult<()> {
        self.ensure_recording()?;
        self.push(Command::PushDebugGroup {
            label: label.to_string(),
        });
        Ok(())
    }

    pub fn pop_debug_group(&mut self) -> HalResult<()> {
        self.ensure_recording()?;
        self.push(Command::PopDebugGroup);
        Ok(())
    }

    pub fn insert_debug_marker(&mut self, label: &str) -> HalResult<()> {
        self.ensure_recording()?;
        self.push(Command::InsertDebugMarker {
            label: label.to_string(),
        });
        Ok(())
    }

    // ── Passes ──────────────────────────────────────────────

    /// Start a render pass. The pass records into this encoder and ends
    /// when the returned encoder is dropped or `end` is called.
    pub fn begin_render_pass(
        &mut self,
        desc: &RenderPassDescriptor<'_>,
    ) -> HalResult<RenderPassEncoder<'_>> {
        self.ensure_recording()?;
        for attachment in desc.color_attachments.iter().flatten() {
            self.check_view(attachment.view)?;
            if let Some(target) = attachment.resolve_target {
                self.check_view(target)?;
            }
        }
        if let Some(ds) = &desc.depth_stencil_attachment {
            self.check_view(ds.view)?;
        }

        let first = desc.color_attachments.iter().flatten().next();
        let depth_texture = desc
            .depth_stencil_attachment
            .as_ref()
            .and_then(|ds| ds.view.texture());
        let mut offscreen = false;

        match first.map(|a| (a, &a.view.source)) {
            None => {
                warn!(
                    label = ?desc.label,
                    "render pass has no color attachment, rendering to the default framebuffer"
                );
                self.push(Command::BindDefaultFramebuffer);
            }
            Some((_, ViewSource::Surface { width, height })) => {
                self.push(Command::BindDefaultFramebuffer);
                self.push_viewport(*width, *height);
            }
            Some((attachment, ViewSource::Texture(texture))) => {
                offscreen = true;
                self.push(Command::EnsureFramebuffer {
                    texture: texture.clone(),
                });
                if let Some(depth) = depth_texture {
                    self.push(Command::AttachDepthStencil {
                        color: texture.clone(),
                        depth: depth.clone(),
                    });
                }
                let (width, height) = attachment.view.extent();
                self.push_viewport(width, height);
            }
        }

        if let Some(color) = first.and_then(|a| a.ops.clear_value()) {
            self.push(Command::ClearColor { color: *color });
        }
        if let Some(ds) = &desc.depth_stencil_attachment {
            if let Some(depth) = ds.depth_ops.as_ref().and_then(|o| o.clear_value()) {
                self.push(Command::ClearDepth { depth: *depth });
            }
            if let Some(stencil) = ds.stencil_ops.as_ref().and_then(|o| o.clear_value()) {
                self.push(Command::ClearStencil { stencil: *stencil });
            }
        }

        let resolve = desc
            .color_attachments
            .iter()
            .flatten()
            .find_map(|a| {
                let target = a.resolve_target?;
                let Some(source) = a.view.texture() else {
                    warn!("resolve source is the surface, resolve ignored");
                    return None;
                };
                let (width, height) = a.view.extent();
                Some(PendingResolve {
                    source: source.clone(),
                    destination: target.texture().cloned(),
                    width,
                    height,
                })
            });

        Ok(RenderPassEncoder::new(self, offscreen, resolve))
    }

    pub fn begin_compute_pass(
        &mut self,
        desc: &ComputePassDescriptor<'_>,
    ) -> HalResult<ComputePassEncoder<'_>> {
        self.ensure_recording()?;
        debug!(label = ?desc.label, "begin compute pass");
        Ok(ComputePassEncoder::new(self))
    }

    // ── Internals ───────────────────────────────────────────

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub(crate) fn check(&self, id: glshim_types::ResourceId) -> HalResult<()> {
        ensure_owned(id, self.device_id)
    }

    fn check_view(&self, view: &TextureView) -> HalResult<()> {
        self.check(view.id)?;
        if let Some(texture) = view.texture() {
            self.check(texture.id)?;
        }
        Ok(())
    }

    fn ensure_recording(&self) -> HalResult<()> {
        if self.recording {
            Ok(())
        } else {
            Err(HalError::RecordingState(
                "encoder is not recording".to_string(),
            ))
        }
    }

    fn push_viewport(&mut self, width: u32, height: u32) {
        self.push(Command::SetViewport {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
    }
}

/// Log a call that was dropped for a missing argument.
pub(crate) fn skipped(kind: &'static str, what: &str) {
    warn!(kind, "{what} missing, nothing recorded");
}

pub(crate) fn check_range(offset: u64, len: u64, size: u64) -> HalResult<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(HalError::OutOfRange { offset, len, size }),
    }
}
