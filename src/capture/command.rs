use anyhow::{Context, Result, anyhow};
use std::process::Output;
use tokio::process::Command;

use crate::protocol::WindowBounds;
use crate::worker::WindowInfo;

pub async fn run_capturing(argv: &[String]) -> Result<Output> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| anyhow!("command is empty"))?;
    Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run {}", program))
}

pub fn substitute_geometry(argv: &[String], geometry: &str) -> Vec<String> {
    argv.iter()
        .map(|arg| arg.replace("{geometry}", geometry))
        .collect()
}

pub fn format_geometry(bounds: &WindowBounds) -> String {
    format!(
        "{},{} {}x{}",
        bounds.x.round(),
        bounds.y.round(),
        bounds.width.round(),
        bounds.height.round()
    )
}

pub fn parse_geometry(text: &str) -> Result<WindowBounds> {
    let text = text.trim();
    let (origin, size) = text
        .split_once(' ')
        .ok_or_else(|| anyhow!("expected 'x,y WxH', got '{}'", text))?;
    let (x, y) = origin
        .split_once(',')
        .ok_or_else(|| anyhow!("expected 'x,y' origin, got '{}'", origin))?;
    let (width, height) = size
        .trim()
        .split_once('x')
        .ok_or_else(|| anyhow!("expected 'WxH' size, got '{}'", size))?;
    let number = |value: &str| {
        value
            .trim()
            .parse::<f64>()
            .with_context(|| format!("invalid number '{}' in '{}'", value, text))
    };
    let bounds = WindowBounds {
        x: number(x)?,
        y: number(y)?,
        width: number(width)?,
        height: number(height)?,
    };
    if bounds.width < 0.0 || bounds.height < 0.0 {
        return Err(anyhow!("negative size in '{}'", text));
    }
    Ok(bounds)
}

pub fn parse_window_list(json: &[u8]) -> Result<Vec<WindowInfo>> {
    serde_json::from_slice(json).with_context(|| "invalid window list")
}

pub fn stderr_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}
