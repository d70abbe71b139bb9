//! sRGB transfer functions and linear-light color math.
//!
//! Palette ranking and dither decisions happen in linear light; sRGB-space
//! distances overweight dark tones and produce visible dither artifacts.

use rgb::RGB;

/// A color in linear-light RGB, each channel 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearRgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl LinearRgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance in linear light.
    pub fn distance_sq(self, other: Self) -> f32 {
        let dr = self.r - other.r;
        let dg = self.g - other.g;
        let db = self.b - other.b;
        dr * dr + dg * dg + db * db
    }
}

/// sRGB gamma → linear, single channel, both 0.0..=1.0.
/// Standard IEC 61966-2-1 transfer function.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

/// Precomputed u8 → linear table.
///
/// Built once per pipeline and reused for every frame; the per-pixel paths
/// only ever convert 8-bit values, so 256 entries cover everything and the
/// hot loops never call `powf`.
#[derive(Debug, Clone)]
pub struct SrgbLut {
    table: [f32; 256],
}

impl SrgbLut {
    pub fn new() -> Self {
        let mut table = [0.0f32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = srgb_to_linear(i as f32 / 255.0);
        }
        Self { table }
    }

    #[inline]
    pub fn linear_u8(&self, c: u8) -> f32 {
        self.table[c as usize]
    }

    #[inline]
    pub fn linear_rgb(&self, p: RGB<u8>) -> LinearRgb {
        LinearRgb {
            r: self.table[p.r as usize],
            g: self.table[p.g as usize],
            b: self.table[p.b as usize],
        }
    }
}

impl Default for SrgbLut {
    fn default() -> Self {
        Self::new()
    }
}
