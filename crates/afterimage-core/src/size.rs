/// Pixel dimensions of a surface.
///
/// Stored as `i32` because that is what GL viewport/texture calls take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// `floor(self * scale)` per axis.
    pub fn scaled(self, scale: f32) -> Size {
        Size {
            width: (self.width as f32 * scale).floor() as i32,
            height: (self.height as f32 * scale).floor() as i32,
        }
    }

    pub fn area(self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }

    /// Size of one texel in normalized texture coordinates.
    pub fn texel(self) -> [f32; 2] {
        [
            1.0 / self.width.max(1) as f32,
            1.0 / self.height.max(1) as f32,
        ]
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
