/// Logical viewport: size in logical (CSS-like) units plus the device pixel
/// ratio reported by the windowing system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
            device_pixel_ratio: if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
                device_pixel_ratio
            } else {
                1.0
            },
        }
    }

    /// Backing-store size for a given effective pixel ratio (the device ratio
    /// after memory-pressure capping).
    pub fn backing_size(&self, effective_ratio: f64) -> (u32, u32) {
        let w = (self.width * effective_ratio).round().max(1.0);
        let h = (self.height * effective_ratio).round().max(1.0);
        (w as u32, h as u32)
    }
}
