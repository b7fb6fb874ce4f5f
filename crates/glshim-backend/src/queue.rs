//! Submission and immediate transfers.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use glshim_core::{BackendConfig, HalError, HalResult};
use glshim_types::Origin3d;

use crate::command::CommandBuffer;
use crate::context::{GlContext, SharedContext};
use crate::conv;
use crate::encoder::check_range;
use crate::fence::Fence;
use crate::native::{consts, Capabilities};
use crate::readback::{self, BYTES_PER_PIXEL};
use crate::resource::{ensure_owned, Buffer, Surface, Texture};

/// Nanoseconds per timestamp tick.
const TIMESTAMP_PERIOD: f32 = 1.0;

/// Layout of the bytes handed to [`Queue::write_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureDataLayout {
    pub offset: u64,
    /// Row pitch in the source data. `None` packs rows tightly.
    pub bytes_per_row: Option<u32>,
}

pub struct Queue {
    context: SharedContext,
    device_id: u32,
    caps: Capabilities,
    config: BackendConfig,
    execution_errors: AtomicU64,
}

impl Queue {
    pub(crate) fn new(
        context: SharedContext,
        device_id: u32,
        caps: Capabilities,
        config: BackendConfig,
    ) -> Self {
        Self {
            context,
            device_id,
            caps,
            config,
            execution_errors: AtomicU64::new(0),
        }
    }

    /// Native errors observed during replay since the queue was created.
    pub fn execution_error_count(&self) -> u64 {
        self.execution_errors.load(Ordering::Relaxed)
    }

    /// Replay command buffers in order, then signal `fence`.
    ///
    /// Native errors raised by individual commands are logged and replay
    /// continues. Only losing the context aborts the submission.
    pub fn submit<I>(&self, buffers: I, signal: Option<(&Fence, u64)>) -> HalResult<()>
    where
        I: IntoIterator<Item = CommandBuffer>,
    {
        if let Some((fence, _)) = signal {
            ensure_owned(fence.id, self.device_id)?;
        }
        let mut gl = self.context.lock();
        let mut index = 0usize;

        for buffer in buffers {
            debug!(
                label = ?buffer.label,
                commands = buffer.commands.len(),
                "replaying command buffer"
            );
            for command in &buffer.commands {
                if self.config.log_commands {
                    debug!(index, kind = command.kind(), "replay");
                }
                if let Err(e) = command.execute(&mut *gl, &self.caps) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(index, kind = command.kind(), error = %e, "command failed, continuing");
                }
                if self.config.check_errors {
                    self.check_error(&mut *gl, index, command.kind())?;
                } else if gl.is_context_lost() {
                    return Err(HalError::DeviceLost);
                }
                index += 1;
            }
        }

        if let Some((fence, value)) = signal {
            fence.signal(value);
        }
        if self.config.flush_on_submit {
            gl.flush();
        }
        Ok(())
    }

    fn check_error(&self, gl: &mut dyn GlContext, index: usize, kind: &'static str) -> HalResult<()> {
        let code = gl.get_error();
        if code == consts::CONTEXT_LOST || gl.is_context_lost() {
            return Err(HalError::DeviceLost);
        }
        if code != consts::NO_ERROR {
            self.execution_errors.fetch_add(1, Ordering::Relaxed);
            let error = HalError::Execution { index, kind, code };
            warn!(%error, "native error after replay");
        }
        Ok(())
    }

    /// Copy `data.len()` bytes from `buffer` at `offset`.
    ///
    /// Served from the CPU shadow when one covers the range, otherwise read
    /// back from native storage, which waits for prior work on the buffer.
    pub fn read_buffer(&self, buffer: &Buffer, offset: u64, data: &mut [u8]) -> HalResult<()> {
        ensure_owned(buffer.id, self.device_id)?;
        if data.is_empty() {
            return Ok(());
        }
        check_range(offset, data.len() as u64, buffer.size)?;
        if buffer.read_shadow(offset, data) {
            return Ok(());
        }
        let mut gl = self.context.lock();
        gl.bind_buffer(consts::COPY_READ_BUFFER, Some(buffer.raw));
        gl.get_buffer_sub_data(consts::COPY_READ_BUFFER, offset, data);
        gl.bind_buffer(consts::COPY_READ_BUFFER, None);
        Ok(())
    }

    pub fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> HalResult<()> {
        ensure_owned(buffer.id, self.device_id)?;
        if data.is_empty() {
            return Ok(());
        }
        check_range(offset, data.len() as u64, buffer.size)?;
        let mut gl = self.context.lock();
        gl.bind_buffer(consts::COPY_WRITE_BUFFER, Some(buffer.raw));
        gl.buffer_sub_data(consts::COPY_WRITE_BUFFER, offset, data);
        gl.bind_buffer(consts::COPY_WRITE_BUFFER, None);
        buffer.update_shadow(offset, data);
        Ok(())
    }

    /// Upload a `width × height` region of mip level `mip_level`. Row 0 of
    /// `data` is the top row of the region.
    #[allow(clippy::too_many_arguments)]
    pub fn write_texture(
        &self,
        texture: &Texture,
        mip_level: u32,
        origin: Origin3d,
        data: &[u8],
        layout: TextureDataLayout,
        width: u32,
        height: u32,
    ) -> HalResult<()> {
        ensure_owned(texture.id, self.device_id)?;
        if width == 0 || height == 0 {
            return Ok(());
        }
        if !readback::supports_readback(texture.format) || texture.is_multisampled() {
            return Err(HalError::UnsupportedOperation(format!(
                "upload into {:?} textures with {} samples",
                texture.format, texture.sample_count
            )));
        }
        if mip_level >= texture.mip_level_count {
            return Err(HalError::OutOfRange {
                offset: u64::from(mip_level),
                len: 1,
                size: u64::from(texture.mip_level_count),
            });
        }
        let level = texture.size.mip_level_size(mip_level);
        readback::check_texel_region(level, origin, width, height)?;

        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let pitch = layout
            .bytes_per_row
            .map_or(row_bytes, |b| (b as usize).max(row_bytes));
        let start = layout.offset as usize;
        let needed = pitch * (height as usize - 1) + row_bytes;
        let Some(source) = start
            .checked_add(needed)
            .and_then(|end| data.get(start..end))
        else {
            return Err(HalError::OutOfRange {
                offset: layout.offset,
                len: needed as u64,
                size: data.len() as u64,
            });
        };

        // Native rows count from the bottom: caller row r lands on row h-1-r.
        let mut rows = vec![0u8; row_bytes * height as usize];
        for r in 0..height as usize {
            let from = r * pitch;
            let to = (height as usize - 1 - r) * row_bytes;
            rows[to..to + row_bytes].copy_from_slice(&source[from..from + row_bytes]);
        }
        if conv::needs_bgra_swizzle(texture.format) {
            readback::swizzle_bgra(&mut rows);
        }

        let y = level.height - origin.y - height;
        let desc = conv::describe_texture_format(texture.format);
        let mut gl = self.context.lock();
        gl.bind_texture(texture.target, Some(texture.raw));
        gl.pixel_store_i32(consts::UNPACK_ALIGNMENT, 1);
        gl.tex_sub_image_2d(
            texture.target,
            mip_level as i32,
            origin.x as i32,
            y as i32,
            width as i32,
            height as i32,
            desc.external,
            desc.data_type,
            &rows,
        );
        gl.bind_texture(texture.target, None);
        Ok(())
    }

    /// Swap the default framebuffer to the display.
    pub fn present(&self, surface: &Surface) -> HalResult<()> {
        ensure_owned(surface.id, self.device_id)?;
        let mut gl = self.context.lock();
        gl.present();
        if gl.is_context_lost() {
            return Err(HalError::DeviceLost);
        }
        Ok(())
    }

    pub fn get_timestamp_period(&self) -> f32 {
        TIMESTAMP_PERIOD
    }
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue")
            .field("device_id", &self.device_id)
            .field("caps", &self.caps)
            .field("execution_errors", &self.execution_error_count())
            .finish_non_exhaustive()
    }
}
