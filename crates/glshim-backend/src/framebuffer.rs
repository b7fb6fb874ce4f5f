//! Lazily created framebuffers for rendering into and reading from textures.

use tracing::{debug, warn};

use glshim_core::{HalError, HalResult};

use crate::context::GlContext;
use crate::conv;
use crate::native::{consts, NativeFramebuffer};
use crate::resource::Texture;

/// Bind the texture's framebuffer to both read and draw targets, creating
/// it on first use. A framebuffer that fails completeness is deleted and
/// the default framebuffer is bound instead.
pub(crate) fn ensure(gl: &mut dyn GlContext, texture: &Texture) -> HalResult<NativeFramebuffer> {
    if let Some(framebuffer) = texture.framebuffer() {
        gl.bind_framebuffer(consts::FRAMEBUFFER, Some(framebuffer));
        return Ok(framebuffer);
    }

    let framebuffer = gl.create_framebuffer().map_err(HalError::ObjectCreation)?;
    gl.bind_framebuffer(consts::FRAMEBUFFER, Some(framebuffer));
    let attachment = if texture.format.is_depth_stencil() {
        conv::depth_stencil_attachment(texture.format)
    } else {
        consts::COLOR_ATTACHMENT0
    };
    gl.framebuffer_texture_2d(
        consts::FRAMEBUFFER,
        attachment,
        texture.target,
        Some(texture.raw),
        0,
    );

    let status = gl.check_framebuffer_status(consts::FRAMEBUFFER);
    if status != consts::FRAMEBUFFER_COMPLETE {
        warn!(
            texture = %texture.id,
            status = format_args!("0x{status:04x}"),
            "framebuffer incomplete, falling back to the default framebuffer"
        );
        gl.bind_framebuffer(consts::FRAMEBUFFER, None);
        gl.delete_framebuffer(framebuffer);
        return Err(HalError::FramebufferIncomplete { status });
    }

    debug!(texture = %texture.id, framebuffer = framebuffer.raw(), "created framebuffer");
    texture.set_framebuffer(Some(framebuffer));
    Ok(framebuffer)
}

/// Attach `depth` to the framebuffer currently bound for `color`.
pub(crate) fn attach_depth_stencil(gl: &mut dyn GlContext, color: &Texture, depth: &Texture) {
    if color.framebuffer().is_none() {
        // The color target failed completeness and the pass renders to the
        // default framebuffer; leave its depth buffer alone.
        return;
    }
    gl.framebuffer_texture_2d(
        consts::FRAMEBUFFER,
        conv::depth_stencil_attachment(depth.format),
        depth.target,
        Some(depth.raw),
        0,
    );
    let status = gl.check_framebuffer_status(consts::FRAMEBUFFER);
    if status != consts::FRAMEBUFFER_COMPLETE {
        warn!(
            color = %color.id,
            depth = %depth.id,
            status = format_args!("0x{status:04x}"),
            "depth attachment left the framebuffer incomplete"
        );
    }
}

/// Resolve a multisampled texture into `destination`, or into the default
/// framebuffer when there is none. Leaves the default framebuffer bound for
/// both read and draw.
pub(crate) fn resolve_multisample(
    gl: &mut dyn GlContext,
    source: &Texture,
    destination: Option<&Texture>,
    width: u32,
    height: u32,
) -> HalResult<()> {
    let draw = match destination {
        Some(texture) => Some(ensure(gl, texture)?),
        None => None,
    };
    let read = ensure(gl, source)?;

    gl.bind_framebuffer(consts::READ_FRAMEBUFFER, Some(read));
    gl.bind_framebuffer(consts::DRAW_FRAMEBUFFER, draw);
    let (w, h) = (width as i32, height as i32);
    gl.blit_framebuffer(
        0,
        0,
        w,
        h,
        0,
        0,
        w,
        h,
        consts::COLOR_BUFFER_BIT,
        consts::NEAREST,
    );
    gl.bind_framebuffer(consts::READ_FRAMEBUFFER, None);
    gl.bind_framebuffer(consts::DRAW_FRAMEBUFFER, None);
    Ok(())
}

/// Delete the texture's cached framebuffer, if any.
pub(crate) fn release(gl: &mut dyn GlContext, texture: &Texture) {
    if let Some(framebuffer) = texture.take_framebuffer() {
        gl.delete_framebuffer(framebuffer);
    }
}
