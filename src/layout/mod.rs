mod fit;
mod geom;

pub use fit::fit_font_size;
pub use geom::{is_noise, pad, rotation_degrees, to_surface_rect, visible_rotation};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutParams {
    pub noise_min_width: f64,
    pub noise_min_height: f64,
    pub padding: f64,
    pub rotation_threshold: f64,
    pub min_font_size: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            noise_min_width: 10.0,
            noise_min_height: 8.0,
            padding: 1.0,
            rotation_threshold: 0.5,
            min_font_size: 8.0,
        }
    }
}
