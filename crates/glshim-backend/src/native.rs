//! Native object names and enum values of the immediate-mode API.

use std::num::NonZeroU32;

macro_rules! native_object {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            pub fn from_raw(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            pub fn raw(self) -> u32 {
                self.0.get()
            }
        }
    };
}

native_object!(NativeBuffer);
native_object!(NativeTexture);
native_object!(
    /// A framebuffer object. The default framebuffer is represented by `None`.
    NativeFramebuffer
);
native_object!(
    /// A linked program, supplied by the shader compilation subsystem.
    NativeProgram
);
native_object!(NativeQuery);

/// Optional features of the live context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub compute: bool,
    pub indirect_draw: bool,
    pub base_vertex: bool,
    pub timestamp_query: bool,
    pub debug_markers: bool,
    pub max_texture_units: u32,
    pub max_vertex_attributes: u32,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            compute: true,
            indirect_draw: true,
            base_vertex: true,
            timestamp_query: false,
            debug_markers: true,
            max_texture_units: 16,
            max_vertex_attributes: 16,
        }
    }
}

impl Capabilities {
    /// Baseline ES 3.0 level: no compute, no indirect, no base vertex.
    pub fn es30() -> Self {
        Self {
            compute: false,
            indirect_draw: false,
            base_vertex: false,
            timestamp_query: false,
            debug_markers: false,
            max_texture_units: 16,
            max_vertex_attributes: 16,
        }
    }
}

/// Enum values, matching the values of the native API.
pub mod consts {
    // Errors
    pub const NO_ERROR: u32 = 0;
    pub const INVALID_ENUM: u32 = 0x0500;
    pub const INVALID_VALUE: u32 = 0x0501;
    pub const INVALID_OPERATION: u32 = 0x0502;
    pub const OUT_OF_MEMORY: u32 = 0x0505;
    pub const INVALID_FRAMEBUFFER_OPERATION: u32 = 0x0506;
    pub const CONTEXT_LOST: u32 = 0x0507;

    // Capabilities
    pub const CULL_FACE: u32 = 0x0B44;
    pub const DEPTH_TEST: u32 = 0x0B71;
    pub const STENCIL_TEST: u32 = 0x0B90;
    pub const BLEND: u32 = 0x0BE2;
    pub const SCISSOR_TEST: u32 = 0x0C11;
    pub const POLYGON_OFFSET_FILL: u32 = 0x8037;
    pub const SAMPLE_ALPHA_TO_COVERAGE: u32 = 0x809E;

    // Faces
    pub const FRONT: u32 = 0x0404;
    pub const BACK: u32 = 0x0405;
    pub const FRONT_AND_BACK: u32 = 0x0408;
    pub const CW: u32 = 0x0900;
    pub const CCW: u32 = 0x0901;

    // Compare functions
    pub const NEVER: u32 = 0x0200;
    pub const LESS: u32 = 0x0201;
    pub const EQUAL: u32 = 0x0202;
    pub const LEQUAL: u32 = 0x0203;
    pub const GREATER: u32 = 0x0204;
    pub const NOTEQUAL: u32 = 0x0205;
    pub const GEQUAL: u32 = 0x0206;
    pub const ALWAYS: u32 = 0x0207;

    // Stencil operations
    pub const ZERO: u32 = 0;
    pub const KEEP: u32 = 0x1E00;
    pub const REPLACE: u32 = 0x1E01;
    pub const INCR: u32 = 0x1E02;
    pub const DECR: u32 = 0x1E03;
    pub const INVERT: u32 = 0x150A;
    pub const INCR_WRAP: u32 = 0x8507;
    pub const DECR_WRAP: u32 = 0x8508;

    // Blend factors
    pub const ONE: u32 = 1;
    pub const SRC_COLOR: u32 = 0x0300;
    pub const ONE_MINUS_SRC_COLOR: u32 = 0x0301;
    pub const SRC_ALPHA: u32 = 0x0302;
    pub const ONE_MINUS_SRC_ALPHA: u32 = 0x0303;
    pub const DST_ALPHA: u32 = 0x0304;
    pub const ONE_MINUS_DST_ALPHA: u32 = 0x0305;
    pub const DST_COLOR: u32 = 0x0306;
    pub const ONE_MINUS_DST_COLOR: u32 = 0x0307;
    pub const SRC_ALPHA_SATURATE: u32 = 0x0308;
    pub const CONSTANT_COLOR: u32 = 0x8001;
    pub const ONE_MINUS_CONSTANT_COLOR: u32 = 0x8002;

    // Blend equations
    pub const FUNC_ADD: u32 = 0x8006;
    pub const MIN: u32 = 0x8007;
    pub const MAX: u32 = 0x8008;
    pub const FUNC_SUBTRACT: u32 = 0x800A;
    pub const FUNC_REVERSE_SUBTRACT: u32 = 0x800B;

    // Primitive modes
    pub const POINTS: u32 = 0x0000;
    pub const LINES: u32 = 0x0001;
    pub const LINE_STRIP: u32 = 0x0003;
    pub const TRIANGLES: u32 = 0x0004;
    pub const TRIANGLE_STRIP: u32 = 0x0005;

    // Data types
    pub const BYTE: u32 = 0x1400;
    pub const UNSIGNED_BYTE: u32 = 0x1401;
    pub const SHORT: u32 = 0x1402;
    pub const UNSIGNED_SHORT: u32 = 0x1403;
    pub const INT: u32 = 0x1404;
    pub const UNSIGNED_INT: u32 = 0x1405;
    pub const FLOAT: u32 = 0x1406;
    pub const HALF_FLOAT: u32 = 0x140B;
    pub const UNSIGNED_INT_24_8: u32 = 0x84FA;
    pub const FLOAT_32_UNSIGNED_INT_24_8_REV: u32 = 0x8DAD;

    // Buffer targets
    pub const ARRAY_BUFFER: u32 = 0x8892;
    pub const ELEMENT_ARRAY_BUFFER: u32 = 0x8893;
    pub const PIXEL_PACK_BUFFER: u32 = 0x88EB;
    pub const UNIFORM_BUFFER: u32 = 0x8A11;
    pub const COPY_READ_BUFFER: u32 = 0x8F36;
    pub const COPY_WRITE_BUFFER: u32 = 0x8F37;
    pub const DRAW_INDIRECT_BUFFER: u32 = 0x8F3F;
    pub const SHADER_STORAGE_BUFFER: u32 = 0x90D2;
    pub const DISPATCH_INDIRECT_BUFFER: u32 = 0x90EE;

    // Buffer usage hints
    pub const STREAM_READ: u32 = 0x88E1;
    pub const STATIC_DRAW: u32 = 0x88E4;
    pub const DYNAMIC_DRAW: u32 = 0x88E8;
    pub const DYNAMIC_READ: u32 = 0x88E9;

    // Clear mask bits
    pub const DEPTH_BUFFER_BIT: u32 = 0x0000_0100;
    pub const STENCIL_BUFFER_BIT: u32 = 0x0000_0400;
    pub const COLOR_BUFFER_BIT: u32 = 0x0000_4000;

    // Texture targets
    pub const TEXTURE_2D: u32 = 0x0DE1;
    pub const TEXTURE_3D: u32 = 0x806F;
    pub const TEXTURE_CUBE_MAP: u32 = 0x8513;
    pub const TEXTURE_2D_ARRAY: u32 = 0x8C1A;
    pub const TEXTURE_2D_MULTISAMPLE: u32 = 0x9100;
    pub const TEXTURE0: u32 = 0x84C0;

    // Sized internal formats
    pub const R8: u32 = 0x8229;
    pub const RG8: u32 = 0x822B;
    pub const RGBA8: u32 = 0x8058;
    pub const SRGB8_ALPHA8: u32 = 0x8C43;
    pub const R16F: u32 = 0x822D;
    pub const RG16F: u32 = 0x822F;
    pub const RGBA16F: u32 = 0x881A;
    pub const R32F: u32 = 0x822E;
    pub const RG32F: u32 = 0x8230;
    pub const RGBA32F: u32 = 0x8814;
    pub const R32UI: u32 = 0x8236;
    pub const RGBA8UI: u32 = 0x8D7C;
    pub const DEPTH_COMPONENT16: u32 = 0x81A5;
    pub const DEPTH_COMPONENT24: u32 = 0x81A6;
    pub const DEPTH24_STENCIL8: u32 = 0x88F0;
    pub const DEPTH_COMPONENT32F: u32 = 0x8CAC;
    pub const DEPTH32F_STENCIL8: u32 = 0x8CAD;

    // Pixel formats
    pub const DEPTH_COMPONENT: u32 = 0x1902;
    pub const RED: u32 = 0x1903;
    pub const RGBA: u32 = 0x1908;
    pub const BGRA: u32 = 0x80E1;
    pub const RG: u32 = 0x8227;
    pub const DEPTH_STENCIL: u32 = 0x84F9;
    pub const RED_INTEGER: u32 = 0x8D94;
    pub const RGBA_INTEGER: u32 = 0x8D99;

    // Framebuffers
    pub const FRAMEBUFFER: u32 = 0x8D40;
    pub const READ_FRAMEBUFFER: u32 = 0x8CA8;
    pub const DRAW_FRAMEBUFFER: u32 = 0x8CA9;
    pub const COLOR_ATTACHMENT0: u32 = 0x8CE0;
    pub const DEPTH_ATTACHMENT: u32 = 0x8D00;
    pub const STENCIL_ATTACHMENT: u32 = 0x8D20;
    pub const DEPTH_STENCIL_ATTACHMENT: u32 = 0x821A;
    pub const FRAMEBUFFER_COMPLETE: u32 = 0x8CD5;
    pub const FRAMEBUFFER_INCOMPLETE_ATTACHMENT: u32 = 0x8CD6;
    pub const FRAMEBUFFER_INCOMPLETE_MISSING_ATTACHMENT: u32 = 0x8CD7;
    pub const FRAMEBUFFER_UNSUPPORTED: u32 = 0x8CDD;
    pub const FRAMEBUFFER_INCOMPLETE_MULTISAMPLE: u32 = 0x8D56;

    // Filters and wrap modes
    pub const NEAREST: u32 = 0x2600;
    pub const LINEAR: u32 = 0x2601;
    pub const NEAREST_MIPMAP_NEAREST: u32 = 0x2700;
    pub const LINEAR_MIPMAP_NEAREST: u32 = 0x2701;
    pub const NEAREST_MIPMAP_LINEAR: u32 = 0x2702;
    pub const LINEAR_MIPMAP_LINEAR: u32 = 0x2703;
    pub const REPEAT: u32 = 0x2901;
    pub const CLAMP_TO_EDGE: u32 = 0x812F;
    pub const MIRRORED_REPEAT: u32 = 0x8370;

    // Texture parameters
    pub const TEXTURE_MAG_FILTER: u32 = 0x2800;
    pub const TEXTURE_MIN_FILTER: u32 = 0x2801;
    pub const TEXTURE_WRAP_S: u32 = 0x2802;
    pub const TEXTURE_WRAP_T: u32 = 0x2803;
    pub const TEXTURE_WRAP_R: u32 = 0x8072;
    pub const TEXTURE_BASE_LEVEL: u32 = 0x813C;
    pub const TEXTURE_MAX_LEVEL: u32 = 0x813D;

    // Pixel storage
    pub const UNPACK_ROW_LENGTH: u32 = 0x0CF2;
    pub const UNPACK_ALIGNMENT: u32 = 0x0CF5;
    pub const PACK_ROW_LENGTH: u32 = 0x0D02;
    pub const PACK_ALIGNMENT: u32 = 0x0D05;

    // Synchronization and queries
    pub const ALL_BARRIER_BITS: u32 = 0xFFFF_FFFF;
    pub const TIMESTAMP: u32 = 0x8E28;
}
