use std::sync::Arc;

use parking_lot::Mutex;

use crate::native::{
    Capabilities, NativeBuffer, NativeFramebuffer, NativeProgram, NativeQuery, NativeTexture,
};

/// Context shared between a device and its queue. Every native call goes
/// through this lock, so a context is only ever current on one thread.
pub type SharedContext = Arc<Mutex<dyn GlContext + Send>>;

/// Wrap a concrete context for use by a device.
pub fn share<C: GlContext + Send + 'static>(context: C) -> SharedContext {
    Arc::new(Mutex::new(context))
}

/// The immediate-mode entry points the backend replays against.
///
/// Implementations keep the usual immediate-mode semantics: object names are
/// bound to targets and subsequent calls act on whatever is bound, errors are
/// latched until `get_error` is called, and `None` means "unbind" or "the
/// default framebuffer" depending on the call.
pub trait GlContext {
    fn capabilities(&self) -> Capabilities;

    /// Return and clear the latched error code.
    fn get_error(&mut self) -> u32;

    fn is_context_lost(&self) -> bool {
        false
    }

    fn flush(&mut self);
    fn finish(&mut self);

    /// Swap the default framebuffer to the display.
    fn present(&mut self);

    // ── Fixed-function state ────────────────────────────────

    fn enable(&mut self, cap: u32);
    fn disable(&mut self, cap: u32);
    fn viewport(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn depth_range(&mut self, near: f32, far: f32);
    fn scissor(&mut self, x: i32, y: i32, width: i32, height: i32);
    fn blend_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn cull_face(&mut self, face: u32);
    fn front_face(&mut self, mode: u32);
    fn polygon_offset(&mut self, factor: f32, units: f32);
    fn depth_func(&mut self, func: u32);
    fn depth_mask(&mut self, write: bool);
    fn stencil_func_separate(&mut self, face: u32, func: u32, reference: i32, mask: u32);
    fn stencil_op_separate(&mut self, face: u32, fail: u32, depth_fail: u32, pass: u32);
    fn stencil_mask_separate(&mut self, face: u32, mask: u32);
    fn color_mask(&mut self, red: bool, green: bool, blue: bool, alpha: bool);
    fn blend_equation_separate(&mut self, color: u32, alpha: u32);
    fn blend_func_separate(&mut self, src_rgb: u32, dst_rgb: u32, src_alpha: u32, dst_alpha: u32);

    // ── Clears ──────────────────────────────────────────────

    fn clear_color(&mut self, red: f32, green: f32, blue: f32, alpha: f32);
    fn clear_depth(&mut self, depth: f32);
    fn clear_stencil(&mut self, stencil: i32);
    fn clear(&mut self, mask: u32);

    fn use_program(&mut self, program: Option<NativeProgram>);

    // ── Buffers ─────────────────────────────────────────────

    fn create_buffer(&mut self) -> Result<NativeBuffer, String>;
    fn delete_buffer(&mut self, buffer: NativeBuffer);
    fn bind_buffer(&mut self, target: u32, buffer: Option<NativeBuffer>);
    fn bind_buffer_base(&mut self, target: u32, index: u32, buffer: Option<NativeBuffer>);
    fn bind_buffer_range(
        &mut self,
        target: u32,
        index: u32,
        buffer: Option<NativeBuffer>,
        offset: u64,
        size: u64,
    );
    /// Allocate zeroed storage for the buffer bound to `target`.
    fn buffer_data_size(&mut self, target: u32, size: u64, usage: u32);
    fn buffer_sub_data(&mut self, target: u32, offset: u64, data: &[u8]);
    /// Map the buffer bound to `target` for reading and copy out. Blocks
    /// until prior work touching the buffer has completed.
    fn get_buffer_sub_data(&mut self, target: u32, offset: u64, data: &mut [u8]);
    fn copy_buffer_sub_data(
        &mut self,
        src_target: u32,
        dst_target: u32,
        src_offset: u64,
        dst_offset: u64,
        size: u64,
    );

    // ── Vertex input ────────────────────────────────────────

    fn enable_vertex_attrib_array(&mut self, index: u32);
    fn disable_vertex_attrib_array(&mut self, index: u32);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attrib_pointer_f32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        normalized: bool,
        stride: i32,
        offset: u64,
    );
    fn vertex_attrib_pointer_i32(
        &mut self,
        index: u32,
        size: i32,
        data_type: u32,
        stride: i32,
        offset: u64,
    );
    fn vertex_attrib_divisor(&mut self, index: u32, divisor: u32);

    // ── Draws ───────────────────────────────────────────────

    fn draw_arrays(&mut self, mode: u32, first: i32, count: i32);
    fn draw_arrays_instanced(&mut self, mode: u32, first: i32, count: i32, instance_count: i32);
    fn draw_elements(&mut self, mode: u32, count: i32, element_type: u32, offset: u64);
    fn draw_elements_instanced(
        &mut self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: u64,
        instance_count: i32,
    );
    fn draw_elements_instanced_base_vertex(
        &mut self,
        mode: u32,
        count: i32,
        element_type: u32,
        offset: u64,
        instance_count: i32,
        base_vertex: i32,
    );
    fn draw_arrays_indirect(&mut self, mode: u32, offset: u64);
    fn draw_elements_indirect(&mut self, mode: u32, element_type: u32, offset: u64);

    // ── Compute ─────────────────────────────────────────────

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_compute_indirect(&mut self, offset: u64);
    fn memory_barrier(&mut self, barriers: u32);

    // ── Textures ────────────────────────────────────────────

    fn create_texture(&mut self) -> Result<NativeTexture, String>;
    fn delete_texture(&mut self, texture: NativeTexture);
    fn active_texture(&mut self, unit: u32);
    fn bind_texture(&mut self, target: u32, texture: Option<NativeTexture>);
    fn tex_storage_2d(
        &mut self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
    );
    fn tex_storage_3d(
        &mut self,
        target: u32,
        levels: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        depth: i32,
    );
    fn tex_storage_2d_multisample(
        &mut self,
        target: u32,
        samples: i32,
        internal_format: u32,
        width: i32,
        height: i32,
        fixed_sample_locations: bool,
    );
    #[allow(clippy::too_many_arguments)]
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
    );
    fn tex_parameter_i32(&mut self, target: u32, parameter: u32, value: i32);
    fn pixel_store_i32(&mut self, parameter: u32, value: i32);

    // ── Framebuffers ────────────────────────────────────────

    fn create_framebuffer(&mut self) -> Result<NativeFramebuffer, String>;
    fn delete_framebuffer(&mut self, framebuffer: NativeFramebuffer);
    fn bind_framebuffer(&mut self, target: u32, framebuffer: Option<NativeFramebuffer>);
    /// Currently bound framebuffer for `target`. `FRAMEBUFFER` reports the
    /// draw binding.
    fn framebuffer_binding(&self, target: u32) -> Option<NativeFramebuffer>;
    fn framebuffer_texture_2d(
        &mut self,
        target: u32,
        attachment: u32,
        texture_target: u32,
        texture: Option<NativeTexture>,
        level: i32,
    );
    fn check_framebuffer_status(&mut self, target: u32) -> u32;
    #[allow(clippy::too_many_arguments)]
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
    );
    /// Read a rectangle of the read framebuffer. Rows are returned bottom
    /// row first.
    #[allow(clippy::too_many_arguments)]
    fn read_pixels(
        &mut self,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
        format: u32,
        data_type: u32,
        pixels: &mut [u8],
    );

    // ── Queries and debug annotations ───────────────────────

    fn create_query(&mut self) -> Result<NativeQuery, String>;
    fn delete_query(&mut self, query: NativeQuery);
    fn query_counter(&mut self, query: NativeQuery, target: u32);

    fn push_debug_group(&mut self, message: &str);
    fn pop_debug_group(&mut self);
    fn debug_message_insert(&mut self, message: &str);
}
