//! Conversions from the backend-neutral vocabulary to native enum values.

use glshim_types::{
    AddressMode, BlendFactor, BlendOperation, CompareFunction, Face, FilterMode, FrontFace,
    IndexFormat, PrimitiveTopology, StencilOperation, TextureDimension, TextureFormat,
    VertexFormat, VertexScalar,
};

use crate::native::consts::*;

/// Native description of a texture format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDesc {
    pub internal: u32,
    pub external: u32,
    pub data_type: u32,
}

pub fn describe_texture_format(format: TextureFormat) -> FormatDesc {
    let (internal, external, data_type) = match format {
        TextureFormat::R8Unorm => (R8, RED, UNSIGNED_BYTE),
        TextureFormat::Rg8Unorm => (RG8, RG, UNSIGNED_BYTE),
        TextureFormat::Rgba8Unorm => (RGBA8, RGBA, UNSIGNED_BYTE),
        TextureFormat::Rgba8UnormSrgb => (SRGB8_ALPHA8, RGBA, UNSIGNED_BYTE),
        // BGRA storage is not portable; keep RGBA and swizzle on upload.
        TextureFormat::Bgra8Unorm => (RGBA8, RGBA, UNSIGNED_BYTE),
        TextureFormat::Bgra8UnormSrgb => (SRGB8_ALPHA8, RGBA, UNSIGNED_BYTE),
        TextureFormat::R16Float => (R16F, RED, HALF_FLOAT),
        TextureFormat::Rg16Float => (RG16F, RG, HALF_FLOAT),
        TextureFormat::Rgba16Float => (RGBA16F, RGBA, HALF_FLOAT),
        TextureFormat::R32Float => (R32F, RED, FLOAT),
        TextureFormat::Rg32Float => (RG32F, RG, FLOAT),
        TextureFormat::Rgba32Float => (RGBA32F, RGBA, FLOAT),
        TextureFormat::R32Uint => (R32UI, RED_INTEGER, UNSIGNED_INT),
        TextureFormat::Rgba8Uint => (RGBA8UI, RGBA_INTEGER, UNSIGNED_BYTE),
        TextureFormat::Depth16Unorm => (DEPTH_COMPONENT16, DEPTH_COMPONENT, UNSIGNED_SHORT),
        TextureFormat::Depth24Plus => (DEPTH_COMPONENT24, DEPTH_COMPONENT, UNSIGNED_INT),
        TextureFormat::Depth24PlusStencil8 => (DEPTH24_STENCIL8, DEPTH_STENCIL, UNSIGNED_INT_24_8),
        TextureFormat::Depth32Float => (DEPTH_COMPONENT32F, DEPTH_COMPONENT, FLOAT),
        TextureFormat::Depth32FloatStencil8 => (
            DEPTH32F_STENCIL8,
            DEPTH_STENCIL,
            FLOAT_32_UNSIGNED_INT_24_8_REV,
        ),
    };
    FormatDesc {
        internal,
        external,
        data_type,
    }
}

/// Whether uploads in this format need red and blue swapped.
pub fn needs_bgra_swizzle(format: TextureFormat) -> bool {
    matches!(
        format,
        TextureFormat::Bgra8Unorm | TextureFormat::Bgra8UnormSrgb
    )
}

/// Native texture target for a texture's shape.
pub fn texture_target(dimension: TextureDimension, layers: u32, sample_count: u32) -> u32 {
    match dimension {
        TextureDimension::D3 => TEXTURE_3D,
        _ if sample_count > 1 => TEXTURE_2D_MULTISAMPLE,
        _ if layers > 1 => TEXTURE_2D_ARRAY,
        _ => TEXTURE_2D,
    }
}

/// Framebuffer attachment point for a depth or depth-stencil format.
pub fn depth_stencil_attachment(format: TextureFormat) -> u32 {
    match (format.has_depth(), format.has_stencil()) {
        (true, true) => DEPTH_STENCIL_ATTACHMENT,
        (false, true) => STENCIL_ATTACHMENT,
        _ => DEPTH_ATTACHMENT,
    }
}

pub fn primitive_mode(topology: PrimitiveTopology) -> u32 {
    match topology {
        PrimitiveTopology::PointList => POINTS,
        PrimitiveTopology::LineList => LINES,
        PrimitiveTopology::LineStrip => LINE_STRIP,
        PrimitiveTopology::TriangleList => TRIANGLES,
        PrimitiveTopology::TriangleStrip => TRIANGLE_STRIP,
    }
}

pub fn index_type(format: IndexFormat) -> u32 {
    match format {
        IndexFormat::Uint16 => UNSIGNED_SHORT,
        IndexFormat::Uint32 => UNSIGNED_INT,
    }
}

pub fn front_face(face: FrontFace) -> u32 {
    match face {
        FrontFace::Ccw => CCW,
        FrontFace::Cw => CW,
    }
}

pub fn cull_face(face: Face) -> u32 {
    match face {
        Face::Front => FRONT,
        Face::Back => BACK,
    }
}

pub fn compare_function(func: CompareFunction) -> u32 {
    match func {
        CompareFunction::Never => NEVER,
        CompareFunction::Less => LESS,
        CompareFunction::Equal => EQUAL,
        CompareFunction::LessEqual => LEQUAL,
        CompareFunction::Greater => GREATER,
        CompareFunction::NotEqual => NOTEQUAL,
        CompareFunction::GreaterEqual => GEQUAL,
        CompareFunction::Always => ALWAYS,
    }
}

pub fn stencil_op(op: StencilOperation) -> u32 {
    match op {
        StencilOperation::Keep => KEEP,
        StencilOperation::Zero => ZERO,
        StencilOperation::Replace => REPLACE,
        StencilOperation::Invert => INVERT,
        StencilOperation::IncrementClamp => INCR,
        StencilOperation::DecrementClamp => DECR,
        StencilOperation::IncrementWrap => INCR_WRAP,
        StencilOperation::DecrementWrap => DECR_WRAP,
    }
}

pub fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => ZERO,
        BlendFactor::One => ONE,
        BlendFactor::Src => SRC_COLOR,
        BlendFactor::OneMinusSrc => ONE_MINUS_SRC_COLOR,
        BlendFactor::SrcAlpha => SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => ONE_MINUS_SRC_ALPHA,
        BlendFactor::Dst => DST_COLOR,
        BlendFactor::OneMinusDst => ONE_MINUS_DST_COLOR,
        BlendFactor::DstAlpha => DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => ONE_MINUS_DST_ALPHA,
        BlendFactor::SrcAlphaSaturated => SRC_ALPHA_SATURATE,
        BlendFactor::Constant => CONSTANT_COLOR,
        BlendFactor::OneMinusConstant => ONE_MINUS_CONSTANT_COLOR,
    }
}

pub fn blend_equation(op: BlendOperation) -> u32 {
    match op {
        BlendOperation::Add => FUNC_ADD,
        BlendOperation::Subtract => FUNC_SUBTRACT,
        BlendOperation::ReverseSubtract => FUNC_REVERSE_SUBTRACT,
        BlendOperation::Min => MIN,
        BlendOperation::Max => MAX,
    }
}

/// How a vertex attribute is described to the native vertex fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribDesc {
    pub size: i32,
    pub data_type: u32,
    pub normalized: bool,
    /// Fetched through the integer attribute path.
    pub integer: bool,
}

pub fn describe_vertex_format(format: VertexFormat) -> VertexAttribDesc {
    let data_type = match format.scalar() {
        VertexScalar::U8 => UNSIGNED_BYTE,
        VertexScalar::I8 => BYTE,
        VertexScalar::U16 => UNSIGNED_SHORT,
        VertexScalar::I16 => SHORT,
        VertexScalar::U32 => UNSIGNED_INT,
        VertexScalar::I32 => INT,
        VertexScalar::F16 => HALF_FLOAT,
        VertexScalar::F32 => FLOAT,
    };
    VertexAttribDesc {
        size: format.components() as i32,
        data_type,
        normalized: format.is_normalized(),
        integer: format.is_integer(),
    }
}

pub fn filter(mode: FilterMode) -> u32 {
    match mode {
        FilterMode::Nearest => NEAREST,
        FilterMode::Linear => LINEAR,
    }
}

/// Minification filter combining the texel and mip filters.
pub fn min_filter(min: FilterMode, mipmap: FilterMode, has_mips: bool) -> u32 {
    match (min, mipmap, has_mips) {
        (m, _, false) => filter(m),
        (FilterMode::Nearest, FilterMode::Nearest, true) => NEAREST_MIPMAP_NEAREST,
        (FilterMode::Linear, FilterMode::Nearest, true) => LINEAR_MIPMAP_NEAREST,
        (FilterMode::Nearest, FilterMode::Linear, true) => NEAREST_MIPMAP_LINEAR,
        (FilterMode::Linear, FilterMode::Linear, true) => LINEAR_MIPMAP_LINEAR,
    }
}

pub fn address_mode(mode: AddressMode) -> u32 {
    match mode {
        AddressMode::ClampToEdge => CLAMP_TO_EDGE,
        AddressMode::Repeat => REPEAT,
        AddressMode::MirrorRepeat => MIRRORED_REPEAT,
    }
}
