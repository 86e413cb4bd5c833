//! Common types shared across the graphics system.

/// Size of a texture in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth in texels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a 2D extent (depth = 1).
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Total number of texels.
    pub fn texel_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

impl Default for Extent3d {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
            depth: 1,
        }
    }
}

/// Clear value for a color attachment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearValue {
    /// Red channel.
    pub r: f32,
    /// Green channel.
    pub g: f32,
    /// Blue channel.
    pub b: f32,
    /// Alpha channel.
    pub a: f32,
}

impl ClearValue {
    /// Opaque black.
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    /// Create a clear value from components.
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::BLACK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_2d() {
        let extent = Extent3d::new_2d(512, 256);
        assert_eq!(extent.width, 512);
        assert_eq!(extent.height, 256);
        assert_eq!(extent.depth, 1);
        assert_eq!(extent.texel_count(), 512 * 256);
    }

    #[test]
    fn test_clear_value_black() {
        let clear = ClearValue::default();
        assert_eq!(clear, ClearValue::BLACK);
        assert_eq!(clear.r, 0.0);
    }
}
