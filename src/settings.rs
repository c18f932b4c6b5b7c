use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bridge::BridgeTimeouts;
use crate::capture::CommandConfig;
use crate::layout::LayoutParams;
use crate::overlay::OverlayStyle;
use crate::paths;
use crate::worker::WorkerConfig;

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub worker_languages: Vec<String>,
    pub worker_program: Option<PathBuf>,
    pub ready_timeout: Duration,
    pub pick_timeout: Duration,
    pub scan_timeout: Duration,
    pub picker_command: Vec<String>,
    pub capture_command: Vec<String>,
    pub windows_command: Option<Vec<String>>,
    pub tesseract: String,
    pub scale_factor: f64,
    pub match_tolerance: f64,
    pub overlay_text_color: String,
    pub overlay_background_color: String,
    pub overlay_font_family: Option<String>,
    pub overlay_font_path: Option<PathBuf>,
    pub min_font_size: f64,
    pub rotation_threshold: f64,
    pub padding: f64,
    pub noise_min_width: f64,
    pub noise_min_height: f64,
}

impl Default for Settings {
    fn default() -> Self {
        let timeouts = BridgeTimeouts::default();
        let capture = CommandConfig::default();
        let layout = LayoutParams::default();
        let style = OverlayStyle::default();
        Self {
            worker_languages: WorkerConfig::default().languages,
            worker_program: None,
            ready_timeout: timeouts.ready,
            pick_timeout: timeouts.pick,
            scan_timeout: timeouts.scan,
            picker_command: capture.picker_command,
            capture_command: capture.capture_command,
            windows_command: None,
            tesseract: capture.tesseract_program,
            scale_factor: capture.scale_factor,
            match_tolerance: WorkerConfig::default().match_tolerance,
            overlay_text_color: style.text_color,
            overlay_background_color: style.background_color,
            overlay_font_family: None,
            overlay_font_path: None,
            min_font_size: layout.min_font_size,
            rotation_threshold: layout.rotation_threshold,
            padding: layout.padding,
            noise_min_width: layout.noise_min_width,
            noise_min_height: layout.noise_min_height,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    worker: Option<WorkerSection>,
    bridge: Option<BridgeSection>,
    capture: Option<CaptureSection>,
    overlay: Option<OverlaySection>,
}

#[derive(Debug, Default, Deserialize)]
struct WorkerSection {
    languages: Option<Vec<String>>,
    program: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BridgeSection {
    ready_timeout_secs: Option<u64>,
    pick_timeout_secs: Option<u64>,
    scan_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CaptureSection {
    picker_command: Option<Vec<String>>,
    capture_command: Option<Vec<String>>,
    windows_command: Option<Vec<String>>,
    tesseract: Option<String>,
    scale_factor: Option<f64>,
    match_tolerance: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct OverlaySection {
    text_color: Option<String>,
    background_color: Option<String>,
    font_family: Option<String>,
    font_path: Option<String>,
    min_font_size: Option<f64>,
    rotation_threshold: Option<f64>,
    padding: Option<f64>,
    noise_min_width: Option<f64>,
    noise_min_height: Option<f64>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let base = paths::base_dir();
    if let Some(base) = &base {
        ensure_home_settings_file(base)?;
    }

    let mut ordered_paths = vec![
        PathBuf::from("settings.toml"),
        PathBuf::from("settings.local.toml"),
    ];
    if let Some(base) = base {
        ordered_paths.push(base.join("settings.toml"));
        ordered_paths.push(base.join("settings.local.toml"));
    }
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    load_layers(&ordered_paths)
}

pub fn load_layers(paths: &[PathBuf]) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile =
        toml::from_str(DEFAULT_SETTINGS_TOML).with_context(|| "failed to parse default settings")?;
    settings.merge(defaults);

    for path in paths {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(worker) = incoming.worker {
            if let Some(languages) = worker.languages {
                let languages: Vec<String> = languages
                    .into_iter()
                    .map(|lang| lang.trim().to_string())
                    .filter(|lang| !lang.is_empty())
                    .collect();
                if !languages.is_empty() {
                    self.worker_languages = languages;
                }
            }
            if let Some(program) = non_empty(worker.program) {
                self.worker_program = Some(PathBuf::from(program));
            }
        }
        if let Some(bridge) = incoming.bridge {
            merge_secs(&mut self.ready_timeout, bridge.ready_timeout_secs);
            merge_secs(&mut self.pick_timeout, bridge.pick_timeout_secs);
            merge_secs(&mut self.scan_timeout, bridge.scan_timeout_secs);
        }
        if let Some(capture) = incoming.capture {
            merge_command(&mut self.picker_command, capture.picker_command);
            merge_command(&mut self.capture_command, capture.capture_command);
            if let Some(command) = capture.windows_command {
                self.windows_command = (!command.is_empty()).then_some(command);
            }
            if let Some(program) = non_empty(capture.tesseract) {
                self.tesseract = program;
            }
            merge_positive(&mut self.scale_factor, capture.scale_factor);
            if let Some(tolerance) = capture.match_tolerance {
                if tolerance >= 0.0 {
                    self.match_tolerance = tolerance;
                }
            }
        }
        if let Some(overlay) = incoming.overlay {
            if let Some(color) = non_empty(overlay.text_color) {
                self.overlay_text_color = color;
            }
            if let Some(color) = non_empty(overlay.background_color) {
                self.overlay_background_color = color;
            }
            if let Some(family) = non_empty(overlay.font_family) {
                self.overlay_font_family = Some(family);
            }
            if let Some(path) = non_empty(overlay.font_path) {
                self.overlay_font_path = Some(PathBuf::from(path));
            }
            merge_positive(&mut self.min_font_size, overlay.min_font_size);
            if let Some(threshold) = overlay.rotation_threshold {
                if threshold >= 0.0 {
                    self.rotation_threshold = threshold;
                }
            }
            if let Some(padding) = overlay.padding {
                if padding >= 0.0 {
                    self.padding = padding;
                }
            }
            merge_positive(&mut self.noise_min_width, overlay.noise_min_width);
            merge_positive(&mut self.noise_min_height, overlay.noise_min_height);
        }
    }

    pub fn bridge_timeouts(&self) -> BridgeTimeouts {
        BridgeTimeouts {
            ready: self.ready_timeout,
            pick: self.pick_timeout,
            scan: self.scan_timeout,
        }
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            languages: self.worker_languages.clone(),
            match_tolerance: self.match_tolerance,
        }
    }

    pub fn command_config(&self) -> CommandConfig {
        CommandConfig {
            picker_command: self.picker_command.clone(),
            capture_command: self.capture_command.clone(),
            windows_command: self.windows_command.clone(),
            tesseract_program: self.tesseract.clone(),
            scale_factor: self.scale_factor,
        }
    }

    pub fn layout_params(&self) -> LayoutParams {
        LayoutParams {
            noise_min_width: self.noise_min_width,
            noise_min_height: self.noise_min_height,
            padding: self.padding,
            rotation_threshold: self.rotation_threshold,
            min_font_size: self.min_font_size,
        }
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            text_color: self.overlay_text_color.clone(),
            background_color: self.overlay_background_color.clone(),
            font_family: self.overlay_font_family.clone(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn merge_secs(target: &mut Duration, secs: Option<u64>) {
    if let Some(secs) = secs.filter(|secs| *secs > 0) {
        *target = Duration::from_secs(secs);
    }
}

fn merge_positive(target: &mut f64, value: Option<f64>) {
    if let Some(value) = value.filter(|value| *value > 0.0) {
        *target = value;
    }
}

fn merge_command(target: &mut Vec<String>, command: Option<Vec<String>>) {
    if let Some(command) = command.filter(|command| !command.is_empty()) {
        *target = command;
    }
}

fn ensure_home_settings_file(base: &Path) -> Result<()> {
    fs::create_dir_all(base)
        .with_context(|| format!("failed to create settings directory: {}", base.display()))?;
    let path = base.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::with_temp_home;

    #[test]
    fn embedded_defaults_match_built_in_defaults() {
        let settings = load_layers(&[]).expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.worker_languages, vec!["en-US", "zh-Hans"]);
        assert_eq!(settings.bridge_timeouts(), BridgeTimeouts::default());
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = dir.path().join("settings.toml");
        let second = dir.path().join("settings.local.toml");
        fs::write(
            &first,
            "[worker]\nlanguages = [\"ja\"]\n[bridge]\npick_timeout_secs = 90\n[overlay]\npadding = 2.0\n",
        )
        .expect("write");
        fs::write(
            &second,
            "[bridge]\npick_timeout_secs = 15\nscan_timeout_secs = 0\n[capture]\nwindows_command = [\"list-windows\"]\n",
        )
        .expect("write");

        let settings = load_layers(&[first, second, dir.path().join("absent.toml")]).expect("load");
        assert_eq!(settings.worker_languages, vec!["ja"]);
        assert_eq!(settings.pick_timeout, Duration::from_secs(15));
        assert_eq!(settings.scan_timeout, Duration::from_secs(30));
        assert_eq!(settings.padding, 2.0);
        assert_eq!(
            settings.command_config().windows_command,
            Some(vec!["list-windows".to_string()])
        );
    }

    #[test]
    fn invalid_file_reports_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[bridge\n").expect("write");
        let err = load_layers(&[path]).expect_err("parse error");
        assert!(format!("{err:#}").contains("broken.toml"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        with_temp_home(|base| {
            let missing = base.join("nope.toml");
            let err = load_settings(Some(&missing)).expect_err("missing");
            assert!(err.to_string().contains("settings file not found"));
        });
    }

    #[test]
    fn load_settings_seeds_and_reads_the_base_dir() {
        with_temp_home(|base| {
            let extra = base.with_file_name("extra.toml");
            fs::write(&extra, "[bridge]\nscan_timeout_secs = 45\n").expect("write");
            fs::create_dir_all(base).expect("base dir");
            fs::write(
                base.join("settings.local.toml"),
                "[capture]\nscale_factor = 2.0\n",
            )
            .expect("write");

            let settings = load_settings(Some(&extra)).expect("load");
            assert!(base.join("settings.toml").exists());
            assert_eq!(settings.scale_factor, 2.0);
            assert_eq!(settings.scan_timeout, Duration::from_secs(45));
        });
    }

    #[test]
    fn home_settings_file_is_seeded_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().join("lens");
        ensure_home_settings_file(&base).expect("seed");
        let path = base.join("settings.toml");
        assert_eq!(fs::read_to_string(&path).expect("read"), DEFAULT_SETTINGS_TOML);

        fs::write(&path, "[worker]\nlanguages = [\"ko\"]\n").expect("write");
        ensure_home_settings_file(&base).expect("seed again");
        assert!(fs::read_to_string(&path).expect("read").contains("ko"));
    }
}
