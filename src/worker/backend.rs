use anyhow::{Result, anyhow};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use super::machine::Target;
use crate::protocol::{TextObservation, WindowBounds, WindowId};

pub type BackendFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub enum PickerOutcome {
    Selected(Target),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowInfo {
    pub id: WindowId,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl WindowInfo {
    pub fn bounds(&self) -> WindowBounds {
        WindowBounds {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

pub trait CaptureBackend: Send + Sync + 'static {
    fn present_picker(&self) -> BackendFuture<PickerOutcome>;

    fn capture(&self, target: Target, size: PixelSize) -> BackendFuture<DynamicImage>;

    fn recognize(
        &self,
        image: DynamicImage,
        languages: Vec<String>,
    ) -> BackendFuture<Vec<TextObservation>>;

    fn list_windows(&self) -> BackendFuture<Vec<WindowInfo>>;

    fn window_bounds(&self, id: WindowId) -> BackendFuture<WindowBounds> {
        let windows = self.list_windows();
        Box::pin(async move {
            windows
                .await?
                .into_iter()
                .find(|window| window.id == id)
                .map(|window| window.bounds())
                .ok_or_else(|| anyhow!("window {} is no longer listed", id))
        })
    }

    fn scale_factor(&self) -> f64;
}
