use anyhow::anyhow;
use image::DynamicImage;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::protocol::{NormalizedPoint, NormalizedRect, TextObservation, WindowBounds, WindowId};
use crate::worker::{BackendFuture, CaptureBackend, PickerOutcome, PixelSize, Target, WindowInfo};

pub(crate) fn with_temp_home<F, R>(func: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    static HOME_MUTEX: Mutex<()> = Mutex::new(());
    let _guard = HOME_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let dir = tempfile::tempdir().expect("tempdir");
    let base = dir.path().join(".window-lens");
    let saved: Vec<(&str, Option<String>)> = ["HOME", "WINDOW_LENS_DIR"]
        .into_iter()
        .map(|key| (key, std::env::var(key).ok()))
        .collect();
    // Env writes are serialized by HOME_MUTEX.
    unsafe {
        std::env::set_var("HOME", dir.path());
        std::env::set_var("WINDOW_LENS_DIR", &base);
    }
    let result = func(&base);
    unsafe {
        for (key, value) in saved {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
    }
    result
}

pub(crate) fn notes_target() -> Target {
    Target {
        window_id: Some(42),
        app_name: Some("Notes".to_string()),
        title: Some("Untitled".to_string()),
        bounds: WindowBounds {
            x: 100.0,
            y: 100.0,
            width: 400.0,
            height: 300.0,
        },
    }
}

pub(crate) fn observation(text: &str, x: f64, y: f64, w: f64, h: f64) -> TextObservation {
    TextObservation {
        text: text.to_string(),
        confidence: 0.9,
        bounding_box: NormalizedRect {
            x,
            y,
            width: w,
            height: h,
        },
        top_left: NormalizedPoint { x, y: y + h },
        top_right: NormalizedPoint { x: x + w, y: y + h },
        bottom_right: NormalizedPoint { x: x + w, y },
        bottom_left: NormalizedPoint { x, y },
    }
}

#[derive(Default)]
pub(crate) struct FakeBackend {
    picks: Mutex<VecDeque<Result<PickerOutcome, String>>>,
    observations: Vec<TextObservation>,
    windows: Vec<WindowInfo>,
    live_bounds: HashMap<WindowId, WindowBounds>,
    capture_error: Option<String>,
    captured: Arc<Mutex<Vec<PixelSize>>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_pick(self, outcome: Result<PickerOutcome, String>) -> Self {
        self.picks.lock().expect("picks").push_back(outcome);
        self
    }

    pub(crate) fn with_observations(mut self, observations: Vec<TextObservation>) -> Self {
        self.observations = observations;
        self
    }

    pub(crate) fn with_window(mut self, id: WindowId, app_name: &str, bounds: WindowBounds) -> Self {
        self.windows.push(WindowInfo {
            id,
            app_name: Some(app_name.to_string()),
            title: None,
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        });
        self
    }

    pub(crate) fn with_live_bounds(mut self, id: WindowId, bounds: WindowBounds) -> Self {
        self.live_bounds.insert(id, bounds);
        self
    }

    pub(crate) fn with_capture_error(mut self, message: &str) -> Self {
        self.capture_error = Some(message.to_string());
        self
    }

    pub(crate) fn captured_sizes(&self) -> Arc<Mutex<Vec<PixelSize>>> {
        self.captured.clone()
    }
}

impl CaptureBackend for FakeBackend {
    fn present_picker(&self) -> BackendFuture<PickerOutcome> {
        let next = self.picks.lock().expect("picks").pop_front();
        Box::pin(async move {
            match next {
                Some(Ok(outcome)) => Ok(outcome),
                Some(Err(message)) => Err(anyhow!(message)),
                None => Ok(PickerOutcome::Cancelled),
            }
        })
    }

    fn capture(&self, _target: Target, size: PixelSize) -> BackendFuture<DynamicImage> {
        let error = self.capture_error.clone();
        let captured = self.captured.clone();
        Box::pin(async move {
            if let Some(message) = error {
                return Err(anyhow!(message));
            }
            captured.lock().expect("captured").push(size);
            Ok(DynamicImage::new_rgb8(size.width, size.height))
        })
    }

    fn recognize(
        &self,
        _image: DynamicImage,
        _languages: Vec<String>,
    ) -> BackendFuture<Vec<TextObservation>> {
        let observations = self.observations.clone();
        Box::pin(async move { Ok(observations) })
    }

    fn list_windows(&self) -> BackendFuture<Vec<WindowInfo>> {
        let windows = self.windows.clone();
        Box::pin(async move { Ok(windows) })
    }

    fn window_bounds(&self, id: WindowId) -> BackendFuture<WindowBounds> {
        let bounds = self.live_bounds.get(&id).copied();
        Box::pin(async move { bounds.ok_or_else(|| anyhow!("window {} is gone", id)) })
    }

    fn scale_factor(&self) -> f64 {
        2.0
    }
}
