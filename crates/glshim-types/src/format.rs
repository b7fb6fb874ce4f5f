use serde::{Deserialize, Serialize};

/// Pixel formats understood by the compatibility backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureFormat {
    R8Unorm,
    Rg8Unorm,
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    Rg32Float,
    Rgba32Float,
    R32Uint,
    Rgba8Uint,
    Depth16Unorm,
    Depth24Plus,
    Depth24PlusStencil8,
    Depth32Float,
    Depth32FloatStencil8,
}

impl TextureFormat {
    /// Bytes per texel in the format's own storage layout.
    pub fn block_size(self) -> u32 {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm | TextureFormat::R16Float | TextureFormat::Depth16Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rg16Float
            | TextureFormat::R32Float
            | TextureFormat::R32Uint
            | TextureFormat::Rgba8Uint
            | TextureFormat::Depth24Plus
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::Depth32Float => 4,
            TextureFormat::Rgba16Float
            | TextureFormat::Rg32Float
            | TextureFormat::Depth32FloatStencil8 => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    pub fn has_depth(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth16Unorm
                | TextureFormat::Depth24Plus
                | TextureFormat::Depth24PlusStencil8
                | TextureFormat::Depth32Float
                | TextureFormat::Depth32FloatStencil8
        )
    }

    pub fn has_stencil(self) -> bool {
        matches!(
            self,
            TextureFormat::Depth24PlusStencil8 | TextureFormat::Depth32FloatStencil8
        )
    }

    pub fn is_depth_stencil(self) -> bool {
        self.has_depth() || self.has_stencil()
    }

    pub fn is_srgb(self) -> bool {
        matches!(
            self,
            TextureFormat::Rgba8UnormSrgb | TextureFormat::Bgra8UnormSrgb
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureDimension {
    D1,
    #[default]
    D2,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureViewDimension {
    D1,
    #[default]
    D2,
    D2Array,
    Cube,
    CubeArray,
    D3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TextureAspect {
    #[default]
    All,
    DepthOnly,
    StencilOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

impl IndexFormat {
    /// Size of a single index in bytes.
    pub fn byte_size(self) -> u64 {
        match self {
            IndexFormat::Uint16 => 2,
            IndexFormat::Uint32 => 4,
        }
    }
}

/// Scalar class of a vertex attribute as seen by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexScalar {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F16,
    F32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexFormat {
    Uint8x2,
    Uint8x4,
    Sint8x2,
    Sint8x4,
    Unorm8x2,
    Unorm8x4,
    Snorm8x2,
    Snorm8x4,
    Uint16x2,
    Uint16x4,
    Sint16x2,
    Sint16x4,
    Unorm16x2,
    Unorm16x4,
    Snorm16x2,
    Snorm16x4,
    Float16x2,
    Float16x4,
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
    Uint32,
    Uint32x2,
    Uint32x3,
    Uint32x4,
    Sint32,
    Sint32x2,
    Sint32x3,
    Sint32x4,
}

impl VertexFormat {
    pub fn components(self) -> u32 {
        use VertexFormat::*;
        match self {
            Float32 | Uint32 | Sint32 => 1,
            Uint8x2 | Sint8x2 | Unorm8x2 | Snorm8x2 | Uint16x2 | Sint16x2 | Unorm16x2
            | Snorm16x2 | Float16x2 | Float32x2 | Uint32x2 | Sint32x2 => 2,
            Float32x3 | Uint32x3 | Sint32x3 => 3,
            Uint8x4 | Sint8x4 | Unorm8x4 | Snorm8x4 | Uint16x4 | Sint16x4 | Unorm16x4
            | Snorm16x4 | Float16x4 | Float32x4 | Uint32x4 | Sint32x4 => 4,
        }
    }

    pub fn scalar(self) -> VertexScalar {
        use VertexFormat::*;
        match self {
            Uint8x2 | Uint8x4 | Unorm8x2 | Unorm8x4 => VertexScalar::U8,
            Sint8x2 | Sint8x4 | Snorm8x2 | Snorm8x4 => VertexScalar::I8,
            Uint16x2 | Uint16x4 | Unorm16x2 | Unorm16x4 => VertexScalar::U16,
            Sint16x2 | Sint16x4 | Snorm16x2 | Snorm16x4 => VertexScalar::I16,
            Float16x2 | Float16x4 => VertexScalar::F16,
            Float32 | Float32x2 | Float32x3 | Float32x4 => VertexScalar::F32,
            Uint32 | Uint32x2 | Uint32x3 | Uint32x4 => VertexScalar::U32,
            Sint32 | Sint32x2 | Sint32x3 | Sint32x4 => VertexScalar::I32,
        }
    }

    /// Normalized integer formats are read as floats in [0,1] / [-1,1].
    pub fn is_normalized(self) -> bool {
        use VertexFormat::*;
        matches!(
            self,
            Unorm8x2 | Unorm8x4 | Snorm8x2 | Snorm8x4 | Unorm16x2 | Unorm16x4 | Snorm16x2
                | Snorm16x4
        )
    }

    /// Integer formats reach the shader as integers and need the integer attribute path.
    pub fn is_integer(self) -> bool {
        !self.is_normalized()
            && !matches!(self.scalar(), VertexScalar::F16 | VertexScalar::F32)
    }

    pub fn byte_size(self) -> u64 {
        let scalar = match self.scalar() {
            VertexScalar::U8 | VertexScalar::I8 => 1,
            VertexScalar::U16 | VertexScalar::I16 | VertexScalar::F16 => 2,
            VertexScalar::U32 | VertexScalar::I32 | VertexScalar::F32 => 4,
        };
        scalar * self.components() as u64
    }
}
