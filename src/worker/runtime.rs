use anyhow::{Context, Result};
use image::DynamicImage;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::backend::{CaptureBackend, PickerOutcome, PixelSize};
use super::machine::{Effect, Event, Machine, PickResult, ScanJob, Target};
use super::matching::find_matching_window;
use crate::error::WorkerError;
use crate::protocol::{RecognitionResult, Response, WindowBounds, encode_response};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub languages: Vec<String>,
    pub match_tolerance: f64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            languages: vec!["en-US".to_string(), "zh-Hans".to_string()],
            match_tolerance: 2.0,
        }
    }
}

pub async fn run<B, W>(
    backend: Arc<B>,
    mut lines: mpsc::UnboundedReceiver<String>,
    writer: W,
    config: WorkerConfig,
) -> Result<()>
where
    B: CaptureBackend,
    W: AsyncWrite + Unpin,
{
    let mut emitter = Emitter { writer };
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<Event>();
    let mut machine = Machine::new(config.languages.clone());

    emitter
        .emit(&Response::ready(env!("CARGO_PKG_VERSION")))
        .await?;
    info!("worker ready");

    loop {
        let event = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => {
                    debug!(line = %line, "command received");
                    Event::Line(line)
                }
                None => Event::InputClosed,
            },
            Some(event) = events_rx.recv() => event,
        };

        for effect in machine.reduce(event) {
            match effect {
                Effect::Emit(response) => {
                    if let Err(message) = &response.outcome {
                        debug!(kind = response.kind.as_str(), error = %message, "reporting failure");
                    }
                    emitter.emit(&response).await?;
                }
                Effect::OpenPicker => {
                    spawn_picker(backend.clone(), config.match_tolerance, events_tx.clone());
                }
                Effect::CaptureAndRecognize(job) => {
                    spawn_scan(backend.clone(), job, events_tx.clone());
                }
                Effect::Exit => {
                    info!("worker exiting");
                    emitter.close().await;
                    return Ok(());
                }
            }
        }
    }
}

struct Emitter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> Emitter<W> {
    async fn emit(&mut self, response: &Response) -> Result<()> {
        let line = encode_response(response)?;
        self.writer
            .write_all(line.as_bytes())
            .await
            .context("failed to write response")?;
        self.writer.flush().await.context("failed to flush response")?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Err(err) = self.writer.shutdown().await {
            debug!("closing output failed: {}", err);
        }
    }
}

fn spawn_picker<B: CaptureBackend>(
    backend: Arc<B>,
    tolerance: f64,
    events: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        let result = match backend.present_picker().await {
            Ok(PickerOutcome::Selected(target)) => {
                PickResult::Selected(identify_window(backend.as_ref(), target, tolerance).await)
            }
            Ok(PickerOutcome::Cancelled) => PickResult::Cancelled,
            Err(err) => {
                warn!("window picker failed to start: {:#}", err);
                PickResult::StartFailed(format!("{:#}", err))
            }
        };
        let _ = events.send(Event::PickerFinished(result));
    });
}

async fn identify_window<B: CaptureBackend>(backend: &B, mut target: Target, tolerance: f64) -> Target {
    if target.window_id.is_some() {
        return target;
    }
    match backend.list_windows().await {
        Ok(windows) => {
            if let Some(window) = find_matching_window(&windows, &target.bounds, tolerance) {
                debug!(window_id = window.id, "matched picked area to window");
                target.window_id = Some(window.id);
                if target.app_name.is_none() {
                    target.app_name = window.app_name.clone();
                }
                if target.title.is_none() {
                    target.title = window.title.clone();
                }
            }
        }
        Err(err) => debug!("window list unavailable: {:#}", err),
    }
    target
}

fn spawn_scan<B: CaptureBackend>(
    backend: Arc<B>,
    job: ScanJob,
    events: mpsc::UnboundedSender<Event>,
) {
    tokio::spawn(async move {
        let result = capture_and_recognize(backend.as_ref(), job).await;
        if let Err(err) = &result {
            warn!("scan failed: {}", err);
        }
        let _ = events.send(Event::ScanFinished(result));
    });
}

async fn capture_and_recognize<B: CaptureBackend>(
    backend: &B,
    job: ScanJob,
) -> Result<RecognitionResult, WorkerError> {
    let ScanJob { target, request } = job;
    let size = pixel_size(&target.bounds, backend.scale_factor())?;
    let image = backend
        .capture(target.clone(), size)
        .await
        .map_err(|err| WorkerError::CaptureFailed(format!("{:#}", err)))?;

    if let Some(path) = request.save_to {
        save_capture(image.clone(), path).await;
    }

    let bounds = current_bounds(backend, &target).await;
    let (image_width, image_height) = (image.width(), image.height());
    let observations = backend
        .recognize(image, request.languages)
        .await
        .map_err(|err| WorkerError::RecognitionFailed(format!("{:#}", err)))?;

    Ok(RecognitionResult {
        image_width,
        image_height,
        observations,
        bounds,
    })
}

pub fn pixel_size(bounds: &WindowBounds, scale_factor: f64) -> Result<PixelSize, WorkerError> {
    let width = (bounds.width * scale_factor).round();
    let height = (bounds.height * scale_factor).round();
    if !(width >= 1.0 && height >= 1.0) {
        return Err(WorkerError::CaptureFailed(format!(
            "window has no visible area ({}x{})",
            width, height
        )));
    }
    Ok(PixelSize {
        width: width as u32,
        height: height as u32,
    })
}

async fn save_capture(image: DynamicImage, path: PathBuf) {
    let shown = path.display().to_string();
    let saved = tokio::task::spawn_blocking(move || image.save(&path)).await;
    match saved {
        Ok(Ok(())) => debug!(path = %shown, "capture saved"),
        Ok(Err(err)) => warn!(path = %shown, "failed to save capture: {}", err),
        Err(err) => warn!(path = %shown, "failed to save capture: {}", err),
    }
}

async fn current_bounds<B: CaptureBackend>(backend: &B, target: &Target) -> WindowBounds {
    let Some(id) = target.window_id else {
        return target.bounds;
    };
    match backend.window_bounds(id).await {
        Ok(bounds) => bounds,
        Err(err) => {
            debug!(window_id = id, "using selection-time bounds: {:#}", err);
            target.bounds
        }
    }
}
