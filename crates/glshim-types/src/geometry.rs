use serde::{Deserialize, Serialize};

/// RGBA color with double-precision channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const TRANSPARENT: Self = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
    pub const BLACK: Self = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Self = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_f32_array(self) -> [f32; 4] {
        [self.r as f32, self.g as f32, self.b as f32, self.a as f32]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth_or_array_layers: u32,
}

impl Extent3d {
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth_or_array_layers: 1,
        }
    }

    /// Size of a mip level, never smaller than one texel per axis.
    pub fn mip_level_size(&self, level: u32) -> Extent3d {
        Extent3d {
            width: (self.width >> level).max(1),
            height: (self.height >> level).max(1),
            depth_or_array_layers: self.depth_or_array_layers,
        }
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self::new_2d(1, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Origin3d {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Origin3d {
    pub const ZERO: Self = Origin3d { x: 0, y: 0, z: 0 };
}
