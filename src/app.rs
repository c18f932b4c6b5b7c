use anyhow::{Context, Result, anyhow, bail};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, WorkerEvent};
use crate::capture::CommandBackend;
use crate::error::BridgeError;
use crate::layout::SurfaceSize;
use crate::overlay::{
    Overlay, OverlayElement, OverlayFont, OverlayRenderer, OverlayStyle, render_png, render_svg,
};
use crate::protocol::{RecognitionResult, ScanOptions, WindowBounds};
use crate::settings::{Settings, load_settings};
use crate::worker;

pub struct AppContext {
    settings: Settings,
    settings_path: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanArgs {
    pub languages: Vec<String>,
    pub save_to: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub surface: Option<SurfaceSize>,
    pub with_capture: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub bounds: WindowBounds,
    pub surface: SurfaceSize,
    pub image_width: u32,
    pub image_height: u32,
    pub elements: Vec<OverlayElement>,
}

impl AppContext {
    pub fn load(settings_path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let settings = load_settings(settings_path.as_deref())?;
        Ok(Self {
            settings,
            settings_path,
            verbose,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn start_bridge(&self) -> Result<(Bridge, mpsc::UnboundedReceiver<WorkerEvent>)> {
        let current_exe = std::env::current_exe()
            .with_context(|| "failed to locate the current executable")?;
        let (program, args) = worker_command(
            &self.settings,
            self.settings_path.as_deref(),
            self.verbose,
            current_exe,
        );
        let (bridge, events) = Bridge::start(&program, &args, self.settings.bridge_timeouts())
            .await
            .with_context(|| format!("failed to start worker: {}", program.display()))?;
        Ok((bridge, events))
    }

    fn overlay(&self) -> (Overlay, OverlayStyle, Option<OverlayFont>) {
        let font = load_overlay_font(&self.settings);
        let mut style = self.settings.overlay_style();
        if let Some(font) = &font {
            style.font_family = Some(font.family().to_string());
        }
        let renderer = OverlayRenderer::new(self.settings.layout_params(), font.clone());
        (Overlay::new(renderer), style, font)
    }
}

fn worker_command(
    settings: &Settings,
    settings_path: Option<&Path>,
    verbose: bool,
    current_exe: PathBuf,
) -> (PathBuf, Vec<String>) {
    if let Some(program) = &settings.worker_program {
        return (program.clone(), Vec::new());
    }
    let mut args = vec!["worker".to_string()];
    if let Some(path) = settings_path {
        args.push("--settings".to_string());
        args.push(path.to_string_lossy().to_string());
    }
    if verbose {
        args.push("--verbose".to_string());
    }
    (current_exe, args)
}

async fn guarded<T, F>(
    events: &mut mpsc::UnboundedReceiver<WorkerEvent>,
    call: F,
) -> Result<Result<T, BridgeError>>
where
    F: Future<Output = Result<T, BridgeError>>,
{
    tokio::pin!(call);
    tokio::select! {
        result = &mut call => Ok(result),
        event = events.recv() => match event {
            Some(event) => {
                check_event(&event)?;
                debug!(?event, "worker exited during call");
                Ok(call.await)
            }
            None => Ok(call.await),
        },
    }
}

fn check_event(event: &WorkerEvent) -> Result<()> {
    match event {
        WorkerEvent::Exited {
            code: Some(code), ..
        } if event.is_crash() => Err(anyhow!("worker crashed with exit code {}", code)),
        WorkerEvent::Exited { code: None, .. } if event.is_crash() => {
            Err(anyhow!("worker was terminated by a signal"))
        }
        WorkerEvent::Fault(message) => Err(anyhow!("worker fault: {}", message)),
        _ => Ok(()),
    }
}

pub async fn run_worker(settings: &Settings) -> Result<()> {
    let backend = Arc::new(CommandBackend::new(settings.command_config()));
    worker::run_stdio(backend, settings.worker_config()).await
}

pub async fn run_pick(ctx: &AppContext) -> Result<()> {
    let (bridge, mut events) = ctx.start_bridge().await?;
    let outcome = guarded(&mut events, bridge.pick()).await;
    bridge.quit().await;
    match outcome? {
        Ok(selection) => {
            println!("{}", serde_json::to_string_pretty(&selection)?);
            Ok(())
        }
        Err(err) if err.is_cancellation() => {
            info!("window selection cancelled");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn run_scan(ctx: &AppContext, args: ScanArgs) -> Result<()> {
    // Holds the capture file for the backdrop until rendering is done.
    let mut capture_file = None;
    let save_to = match (&args.save_to, args.with_capture) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => {
            let file = tempfile::Builder::new()
                .prefix("window-lens-")
                .suffix(".png")
                .tempfile()
                .with_context(|| "failed to create capture file")?;
            let path = file.path().to_path_buf();
            capture_file = Some(file);
            Some(path)
        }
        (None, false) => None,
    };

    let (bridge, mut events) = ctx.start_bridge().await?;
    let options = ScanOptions {
        languages: (!args.languages.is_empty()).then(|| args.languages.clone()),
        save_to: save_to.clone(),
    };
    let outcome = guarded(&mut events, bridge.scan(options)).await;
    bridge.quit().await;
    let result = match outcome? {
        Ok(result) => result,
        Err(err) if err.is_cancellation() => {
            info!("window selection cancelled");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    let (mut overlay, style, font) = ctx.overlay();
    let report = build_report(&mut overlay, &result, args.surface);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(out) = &args.out {
        let backdrop = match save_to.as_deref().filter(|_| args.with_capture) {
            Some(path) => Some((
                std::fs::read(path)
                    .with_context(|| format!("failed to read capture: {}", path.display()))?,
                image_mime(path)?,
            )),
            None => None,
        };
        let svg = render_svg(
            &report.elements,
            report.surface,
            &style,
            backdrop
                .as_ref()
                .map(|(bytes, mime)| (bytes.as_slice(), *mime)),
        );
        write_output(out, &svg, font.as_ref())?;
    }
    drop(capture_file);
    Ok(())
}

pub async fn run_interactive(ctx: &AppContext) -> Result<()> {
    let (bridge, mut events) = ctx.start_bridge().await?;
    let (mut overlay, _, _) = ctx.overlay();
    let mut lines = crate::stdin::spawn_line_reader();
    eprintln!("Interactive mode. Commands: pick, scan [languages...], quit.");

    enum Input {
        Line(Option<String>),
        Worker(Option<WorkerEvent>),
    }

    let outcome = loop {
        let input = tokio::select! {
            line = lines.recv() => Input::Line(line),
            event = events.recv() => Input::Worker(event),
        };
        let line = match input {
            Input::Line(Some(line)) => line,
            Input::Line(None) => break Ok(()),
            Input::Worker(Some(event)) => {
                if let Err(err) = check_event(&event) {
                    break Err(err);
                }
                break Err(anyhow!("worker exited"));
            }
            Input::Worker(None) => break Err(anyhow!("worker exited")),
        };

        let mut words = line.trim().trim_start_matches('/').split_whitespace();
        match words.next() {
            Some("quit") | Some("exit") => break Ok(()),
            Some("help") => eprintln!("Commands: pick, scan [languages...], quit."),
            Some("pick") => match guarded(&mut events, bridge.pick()).await {
                Ok(Ok(selection)) => println!("{}", serde_json::to_string_pretty(&selection)?),
                Ok(Err(err)) => report_call_error(&err),
                Err(err) => break Err(err),
            },
            Some("scan") => {
                let languages: Vec<String> = words.map(|word| word.to_string()).collect();
                let options = ScanOptions {
                    languages: (!languages.is_empty()).then_some(languages),
                    save_to: None,
                };
                match guarded(&mut events, bridge.scan(options)).await {
                    Ok(Ok(result)) => {
                        let report = build_report(&mut overlay, &result, None);
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    }
                    Ok(Err(err)) => report_call_error(&err),
                    Err(err) => break Err(err),
                }
            }
            Some(other) => eprintln!("Unknown command: {}", other),
            None => {}
        }
    };

    overlay.clear();
    bridge.quit().await;
    outcome
}

fn report_call_error(err: &BridgeError) {
    if err.is_cancellation() {
        info!("window selection cancelled");
    } else {
        eprintln!("error: {}", err);
    }
}

fn build_report(
    overlay: &mut Overlay,
    result: &RecognitionResult,
    surface: Option<SurfaceSize>,
) -> ScanReport {
    let surface = surface.unwrap_or_else(|| default_surface(result));
    let elements = overlay.render(result, surface).to_vec();
    ScanReport {
        bounds: result.bounds,
        surface,
        image_width: result.image_width,
        image_height: result.image_height,
        elements,
    }
}

fn default_surface(result: &RecognitionResult) -> SurfaceSize {
    if result.bounds.width > 0.0 && result.bounds.height > 0.0 {
        SurfaceSize::new(result.bounds.width, result.bounds.height)
    } else {
        SurfaceSize::new(result.image_width as f64, result.image_height as f64)
    }
}

fn write_output(out: &Path, svg: &str, font: Option<&OverlayFont>) -> Result<()> {
    let extension = out
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    let bytes = match extension.as_deref() {
        Some("svg") => svg.as_bytes().to_vec(),
        Some("png") => render_png(svg, font)?,
        _ => bail!("unsupported output format: {} (use .svg or .png)", out.display()),
    };
    std::fs::write(out, bytes).with_context(|| format!("failed to write {}", out.display()))?;
    debug!(path = %out.display(), "overlay written");
    Ok(())
}

fn image_mime(path: &Path) -> Result<&'static str> {
    let format = image::ImageFormat::from_path(path)
        .with_context(|| format!("unknown image format: {}", path.display()))?;
    Ok(format.to_mime_type())
}

fn load_overlay_font(settings: &Settings) -> Option<OverlayFont> {
    match OverlayFont::load(
        settings.overlay_font_path.as_deref(),
        settings.overlay_font_family.as_deref(),
    ) {
        Ok(font) => Some(font),
        Err(err) => {
            warn!("overlay font unavailable, estimating text widths: {}", err);
            None
        }
    }
}
