//! Texture to buffer copies.
//!
//! The native API addresses framebuffers bottom row first while buffers and
//! uploads are top row first, so every transfer between the two flips rows.

use glshim_core::{HalError, HalResult};
use glshim_types::{Extent3d, Origin3d, TextureFormat};

use crate::context::GlContext;
use crate::conv;
use crate::encoder::check_range;
use crate::framebuffer;
use crate::native::consts;
use crate::resource::{Buffer, Texture};

/// Readback always produces 4-byte RGBA texels.
pub const BYTES_PER_PIXEL: usize = 4;

/// One region of a texture/buffer copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBufferCopy {
    pub mip_level: u32,
    pub texture_origin: Origin3d,
    pub buffer_offset: u64,
    /// Row pitch in the buffer. `None` packs rows tightly.
    pub bytes_per_row: Option<u32>,
    pub size: Extent3d,
}

impl TextureBufferCopy {
    /// Whole level 0 of a texture into the start of a buffer.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            mip_level: 0,
            texture_origin: Origin3d::ZERO,
            buffer_offset: 0,
            bytes_per_row: None,
            size: Extent3d::new_2d(width, height),
        }
    }

    pub(crate) fn row_bytes(&self) -> usize {
        self.size.width as usize * BYTES_PER_PIXEL
    }

    pub(crate) fn pitch(&self) -> usize {
        self.bytes_per_row
            .map_or(self.row_bytes(), |b| (b as usize).max(self.row_bytes()))
    }

    /// Bytes touched in the buffer.
    pub fn required_bytes(&self) -> usize {
        match self.size.height {
            0 => 0,
            h => self.pitch() * (h as usize - 1) + self.row_bytes(),
        }
    }
}

pub(crate) fn supports_readback(format: TextureFormat) -> bool {
    matches!(
        format,
        TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rgba8Uint
    )
}

/// Reject a `width × height` region at `origin` that does not fit in `level`.
pub(crate) fn check_texel_region(
    level: Extent3d,
    origin: Origin3d,
    width: u32,
    height: u32,
) -> HalResult<()> {
    check_range(u64::from(origin.x), u64::from(width), u64::from(level.width))?;
    check_range(u64::from(origin.y), u64::from(height), u64::from(level.height))
}

/// Copy `rows` rows of `row_bytes` each from `src` (tightly packed) into
/// `dst` at `pitch` spacing, last row first.
pub fn flip_rows_into(src: &[u8], dst: &mut [u8], row_bytes: usize, pitch: usize, rows: usize) {
    for row in 0..rows {
        let from = (rows - 1 - row) * row_bytes;
        let to = row * pitch;
        dst[to..to + row_bytes].copy_from_slice(&src[from..from + row_bytes]);
    }
}

/// Swap red and blue in place.
pub(crate) fn swizzle_bgra(texels: &mut [u8]) {
    for texel in texels.chunks_exact_mut(BYTES_PER_PIXEL) {
        texel.swap(0, 2);
    }
}

/// Read a region of `texture` into `buffer`'s shadow and native storage.
///
/// The framebuffer binding in effect before the copy is restored afterwards,
/// so this can run in the middle of a render pass.
pub(crate) fn copy_texture_to_buffer(
    gl: &mut dyn GlContext,
    texture: &Texture,
    buffer: &Buffer,
    region: &TextureBufferCopy,
) -> HalResult<()> {
    let (width, height) = (region.size.width, region.size.height);
    if width == 0 || height == 0 {
        return Ok(());
    }
    if !supports_readback(texture.format) {
        return Err(HalError::UnsupportedOperation(format!(
            "readback of {:?} textures",
            texture.format
        )));
    }
    if texture.is_multisampled() || region.mip_level != 0 {
        return Err(HalError::UnsupportedOperation(
            "readback of multisampled textures or mip levels other than 0".to_string(),
        ));
    }
    let level = texture.size.mip_level_size(region.mip_level);
    check_texel_region(level, region.texture_origin, width, height)?;

    let previous_draw = gl.framebuffer_binding(consts::DRAW_FRAMEBUFFER);
    let previous_read = gl.framebuffer_binding(consts::READ_FRAMEBUFFER);
    let result = read_region(gl, texture, buffer, region, level.height);
    gl.bind_framebuffer(consts::READ_FRAMEBUFFER, previous_read);
    gl.bind_framebuffer(consts::DRAW_FRAMEBUFFER, previous_draw);
    result
}

fn read_region(
    gl: &mut dyn GlContext,
    texture: &Texture,
    buffer: &Buffer,
    region: &TextureBufferCopy,
    level_height: u32,
) -> HalResult<()> {
    framebuffer::ensure(gl, texture)?;

    let (width, height) = (region.size.width, region.size.height);
    let row_bytes = region.row_bytes();
    let mut rows = vec![0u8; row_bytes * height as usize];
    // Framebuffer rows count from the bottom.
    let y = level_height - region.texture_origin.y - height;
    gl.pixel_store_i32(consts::PACK_ALIGNMENT, 1);
    gl.read_pixels(
        region.texture_origin.x as i32,
        y as i32,
        width as i32,
        height as i32,
        consts::RGBA,
        consts::UNSIGNED_BYTE,
        &mut rows,
    );
    if conv::needs_bgra_swizzle(texture.format) {
        swizzle_bgra(&mut rows);
    }

    if !buffer.has_shadow() {
        // Start from the native contents so bytes outside the region stay
        // correct when later reads are served from the shadow.
        let mut initial = vec![0u8; buffer.size as usize];
        if !initial.is_empty() {
            gl.bind_buffer(consts::COPY_READ_BUFFER, Some(buffer.raw));
            gl.get_buffer_sub_data(consts::COPY_READ_BUFFER, 0, &mut initial);
            gl.bind_buffer(consts::COPY_READ_BUFFER, None);
        }
        buffer.seed_shadow(initial);
    }

    let offset = region.buffer_offset as usize;
    let required = region.required_bytes();
    buffer.with_shadow(offset + required, |shadow| {
        let window = &mut shadow[offset..offset + required];
        flip_rows_into(&rows, window, row_bytes, region.pitch(), height as usize);
        if (offset + required) as u64 <= buffer.size {
            gl.bind_buffer(consts::COPY_WRITE_BUFFER, Some(buffer.raw));
            gl.buffer_sub_data(consts::COPY_WRITE_BUFFER, region.buffer_offset, window);
            gl.bind_buffer(consts::COPY_WRITE_BUFFER, None);
        }
    });
    Ok(())
}
