mod command;
mod tesseract;

pub use command::{format_geometry, parse_geometry, parse_window_list};
pub use tesseract::{list_languages, parse_tsv, resolve_languages, tesseract_code};

use anyhow::{Context, Result, anyhow};
use image::DynamicImage;
use std::sync::Arc;
use tracing::debug;

use crate::protocol::TextObservation;
use crate::worker::{BackendFuture, CaptureBackend, PickerOutcome, PixelSize, Target, WindowInfo};

#[derive(Debug, Clone)]
pub struct CommandConfig {
    pub picker_command: Vec<String>,
    pub capture_command: Vec<String>,
    pub windows_command: Option<Vec<String>>,
    pub tesseract_program: String,
    pub scale_factor: f64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            picker_command: vec!["slurp".to_string()],
            capture_command: ["grim", "-g", "{geometry}", "-"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
            windows_command: None,
            tesseract_program: "tesseract".to_string(),
            scale_factor: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandBackend {
    config: Arc<CommandConfig>,
}

impl CommandBackend {
    pub fn new(config: CommandConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl CaptureBackend for CommandBackend {
    fn present_picker(&self) -> BackendFuture<PickerOutcome> {
        Box::pin(run_picker(self.config.clone()))
    }

    fn capture(&self, target: Target, size: PixelSize) -> BackendFuture<DynamicImage> {
        Box::pin(capture_target(self.config.clone(), target, size))
    }

    fn recognize(
        &self,
        image: DynamicImage,
        languages: Vec<String>,
    ) -> BackendFuture<Vec<TextObservation>> {
        Box::pin(recognize_text(self.config.clone(), image, languages))
    }

    fn list_windows(&self) -> BackendFuture<Vec<WindowInfo>> {
        Box::pin(list_windows(self.config.clone()))
    }

    fn scale_factor(&self) -> f64 {
        self.config.scale_factor
    }
}

async fn run_picker(config: Arc<CommandConfig>) -> Result<PickerOutcome> {
    let output = command::run_capturing(&config.picker_command).await?;
    if !output.status.success() {
        debug!("picker dismissed: {}", command::stderr_text(&output));
        return Ok(PickerOutcome::Cancelled);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let bounds = parse_geometry(&stdout).with_context(|| "unexpected picker output")?;
    Ok(PickerOutcome::Selected(Target {
        window_id: None,
        app_name: None,
        title: None,
        bounds,
    }))
}

async fn capture_target(
    config: Arc<CommandConfig>,
    target: Target,
    size: PixelSize,
) -> Result<DynamicImage> {
    let geometry = format_geometry(&target.bounds);
    let argv = command::substitute_geometry(&config.capture_command, &geometry);
    let output = command::run_capturing(&argv).await?;
    if !output.status.success() {
        return Err(anyhow!(
            "{} failed: {}",
            argv.first().map(String::as_str).unwrap_or_default(),
            command::stderr_text(&output)
        ));
    }
    tokio::task::spawn_blocking(move || decode_capture(&output.stdout, size))
        .await
        .with_context(|| "capture decoding task failed")?
}

fn decode_capture(bytes: &[u8], size: PixelSize) -> Result<DynamicImage> {
    let image = image::load_from_memory(bytes).with_context(|| "failed to decode captured image")?;
    if image.width() == size.width && image.height() == size.height {
        return Ok(image);
    }
    Ok(image.resize_exact(
        size.width,
        size.height,
        image::imageops::FilterType::Triangle,
    ))
}

async fn recognize_text(
    config: Arc<CommandConfig>,
    image: DynamicImage,
    languages: Vec<String>,
) -> Result<Vec<TextObservation>> {
    tokio::task::spawn_blocking(move || {
        tesseract::recognize(&config.tesseract_program, &image, &languages)
    })
    .await
    .with_context(|| "recognition task failed")?
}

async fn list_windows(config: Arc<CommandConfig>) -> Result<Vec<WindowInfo>> {
    let argv = config
        .windows_command
        .as_ref()
        .ok_or_else(|| anyhow!("no window list command configured"))?;
    let output = command::run_capturing(argv).await?;
    if !output.status.success() {
        return Err(anyhow!(
            "window list command failed: {}",
            command::stderr_text(&output)
        ));
    }
    parse_window_list(&output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[tokio::test]
    async fn picker_output_becomes_target() {
        let backend = CommandBackend::new(CommandConfig {
            picker_command: sh("echo '10,20 300x200'"),
            ..CommandConfig::default()
        });
        let outcome = backend.present_picker().await.expect("picker");
        let PickerOutcome::Selected(target) = outcome else {
            panic!("expected a selection");
        };
        assert_eq!(target.window_id, None);
        assert_eq!(target.bounds.width, 300.0);
    }

    #[tokio::test]
    async fn picker_exit_code_means_cancelled() {
        let backend = CommandBackend::new(CommandConfig {
            picker_command: sh("echo 'selection cancelled' >&2; exit 1"),
            ..CommandConfig::default()
        });
        assert_eq!(
            backend.present_picker().await.expect("picker"),
            PickerOutcome::Cancelled
        );
    }

    #[tokio::test]
    async fn missing_picker_fails_to_start() {
        let backend = CommandBackend::new(CommandConfig {
            picker_command: vec!["/nonexistent/window-picker".to_string()],
            ..CommandConfig::default()
        });
        assert!(backend.present_picker().await.is_err());
    }

    #[test]
    fn capture_is_resized_to_pixel_size() {
        let mut png = Vec::new();
        DynamicImage::new_rgb8(40, 30)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .expect("encode");
        let image = decode_capture(
            &png,
            PixelSize {
                width: 80,
                height: 60,
            },
        )
        .expect("decode");
        assert_eq!((image.width(), image.height()), (80, 60));
        assert!(decode_capture(b"not an image", PixelSize { width: 1, height: 1 }).is_err());
    }

    #[tokio::test]
    async fn window_list_requires_a_command() {
        let backend = CommandBackend::new(CommandConfig::default());
        let err = backend.list_windows().await.expect_err("no command");
        assert!(err.to_string().contains("no window list command"));

        let backend = CommandBackend::new(CommandConfig {
            windows_command: Some(sh(
                r#"echo '[{"id":3,"x":1,"y":2,"width":3,"height":4}]'"#,
            )),
            ..CommandConfig::default()
        });
        let bounds = backend.window_bounds(3).await.expect("bounds");
        assert_eq!(bounds.height, 4.0);
        assert!(backend.window_bounds(9).await.is_err());
    }
}
