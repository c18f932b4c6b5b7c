mod font;
mod raster;
mod svg;

pub use font::{OverlayFont, measure_text_width};
pub use raster::render_png;
pub use svg::render_svg;

use serde::Serialize;

use crate::layout::{
    LayoutParams, SurfaceSize, fit_font_size, is_noise, pad, rotation_degrees, to_surface_rect,
    visible_rotation,
};
use crate::protocol::RecognitionResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayElement {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
    pub rotation: Option<f64>,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct OverlayStyle {
    pub text_color: String,
    pub background_color: String,
    pub font_family: Option<String>,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            text_color: "#ffffff".to_string(),
            background_color: "rgba(0,0,0,0.55)".to_string(),
            font_family: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OverlayRenderer {
    params: LayoutParams,
    font: Option<OverlayFont>,
}

impl OverlayRenderer {
    pub fn new(params: LayoutParams, font: Option<OverlayFont>) -> Self {
        Self { params, font }
    }

    pub fn params(&self) -> &LayoutParams {
        &self.params
    }

    pub fn font(&self) -> Option<&OverlayFont> {
        self.font.as_ref()
    }

    pub fn layout(&self, result: &RecognitionResult, surface: SurfaceSize) -> Vec<OverlayElement> {
        let mut elements = Vec::with_capacity(result.observations.len());
        for observation in &result.observations {
            let rect = to_surface_rect(&observation.bounding_box, surface);
            if is_noise(&rect, &self.params) {
                continue;
            }
            let padded = pad(&rect, self.params.padding);
            let angle = rotation_degrees(observation.top_left, observation.top_right, surface);
            let font_size = fit_font_size(
                padded.height,
                padded.width,
                self.params.min_font_size,
                |size| measure_text_width(&observation.text, size, self.font.as_ref()),
            );
            elements.push(OverlayElement {
                text: observation.text.clone(),
                x: padded.x,
                y: padded.y,
                width: padded.width,
                height: padded.height,
                font_size,
                rotation: visible_rotation(angle, &self.params),
                confidence: observation.confidence,
            });
        }
        elements
    }
}

#[derive(Debug, Default)]
pub struct Overlay {
    renderer: OverlayRenderer,
    elements: Vec<OverlayElement>,
}

impl Overlay {
    pub fn new(renderer: OverlayRenderer) -> Self {
        Self {
            renderer,
            elements: Vec::new(),
        }
    }

    pub fn render(&mut self, result: &RecognitionResult, surface: SurfaceSize) -> &[OverlayElement] {
        self.elements = self.renderer.layout(result, surface);
        &self.elements
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn elements(&self) -> &[OverlayElement] {
        &self.elements
    }

    pub fn renderer(&self) -> &OverlayRenderer {
        &self.renderer
    }
}
