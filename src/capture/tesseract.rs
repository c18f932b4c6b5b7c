use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, GenericImageView};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use tracing::{debug, warn};

use crate::protocol::{NormalizedPoint, NormalizedRect, TextObservation};

pub fn recognize(
    program: &str,
    image: &DynamicImage,
    languages: &[String],
) -> Result<Vec<TextObservation>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Ok(Vec::new());
    }
    let available = match list_languages(program) {
        Ok(list) => Some(list),
        Err(err) => {
            debug!("could not list tesseract languages: {:#}", err);
            None
        }
    };
    let codes = resolve_languages(languages, available.as_deref())?;
    let scale = ocr_scale(width);
    let prepared = preprocess(image, scale);

    let mut tmp = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .with_context(|| "failed to create temp file for recognition")?;
    prepared
        .write_to(&mut tmp, image::ImageFormat::Png)
        .with_context(|| "failed to write temp image for recognition")?;
    tmp.flush().ok();

    let tsv = run_tsv(program, tmp.path(), &codes)?;
    Ok(parse_tsv(&tsv, width * scale, height * scale))
}

pub fn list_languages(program: &str) -> Result<Vec<String>> {
    let output = Command::new(program)
        .arg("--list-langs")
        .output()
        .with_context(|| format!("failed to run {} --list-langs", program))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} --list-langs failed: {}", program, stderr.trim()));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

pub fn tesseract_code(tag: &str) -> Option<&'static str> {
    let tag = tag.trim();
    let lower = tag.to_ascii_lowercase().replace('_', "-");
    match lower.as_str() {
        "zh-hans" | "zh-cn" | "zh-sg" | "zh" => return Some("chi_sim"),
        "zh-hant" | "zh-tw" | "zh-hk" | "zh-mo" => return Some("chi_tra"),
        _ => {}
    }
    let primary = lower.split('-').next().unwrap_or_default();
    let code = match primary {
        "en" => "eng",
        "ja" => "jpn",
        "ko" => "kor",
        "de" => "deu",
        "fr" => "fra",
        "es" => "spa",
        "it" => "ita",
        "pt" => "por",
        "ru" => "rus",
        "nl" => "nld",
        "vi" => "vie",
        _ => return None,
    };
    Some(code)
}

pub fn resolve_languages(requested: &[String], available: Option<&[String]>) -> Result<String> {
    let mut chosen: Vec<String> = Vec::new();
    let mut missing = Vec::new();
    for tag in requested {
        let code = match tesseract_code(tag) {
            Some(code) => code.to_string(),
            None if looks_like_tesseract_code(tag) => tag.trim().to_string(),
            None => {
                warn!("no recognition language for tag '{}'", tag);
                continue;
            }
        };
        if chosen.contains(&code) {
            continue;
        }
        match available {
            Some(list) if !list.iter().any(|value| *value == code) => missing.push(code),
            _ => chosen.push(code),
        }
    }
    if chosen.is_empty() {
        return Err(anyhow!(
            "no recognition language available for [{}] (missing: {})",
            requested.join(", "),
            missing.join(", ")
        ));
    }
    if !missing.is_empty() {
        warn!(
            "recognition language(s) not installed: {}",
            missing.join(", ")
        );
    }
    Ok(chosen.join("+"))
}

fn looks_like_tesseract_code(tag: &str) -> bool {
    let tag = tag.trim();
    tag.len() >= 3
        && tag
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch == '_')
}

fn ocr_scale(width: u32) -> u32 {
    let max_width = 4000u32;
    let mut scale = 2u32;
    while width.saturating_mul(scale) > max_width && scale > 1 {
        scale -= 1;
    }
    scale
}

fn preprocess(image: &DynamicImage, scale: u32) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut luma = image::GrayImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = a as f32 / 255.0;
        let blend = |channel: u8| channel as f32 * alpha + 255.0 * (1.0 - alpha);
        let value = (0.299 * blend(r) + 0.587 * blend(g) + 0.114 * blend(b)).round() as u8;
        luma.put_pixel(x, y, image::Luma([value]));
    }
    if scale > 1 {
        luma = image::imageops::resize(
            &luma,
            width.saturating_mul(scale),
            height.saturating_mul(scale),
            image::imageops::FilterType::Lanczos3,
        );
    }
    DynamicImage::ImageLuma8(luma)
}

fn run_tsv(program: &str, path: &Path, languages: &str) -> Result<String> {
    let output = Command::new(program)
        .arg(path)
        .arg("stdout")
        .arg("-l")
        .arg(languages)
        .arg("--psm")
        .arg("3")
        .arg("tsv")
        .output()
        .with_context(|| format!("failed to run {} (is it installed?)", program))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} failed: {}", program, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

struct LineAcc {
    text: String,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
    conf_sum: f64,
    words: usize,
}

pub fn parse_tsv(tsv: &str, width: u32, height: u32) -> Vec<TextObservation> {
    let mut index: HashMap<(i32, i32, i32, i32), usize> = HashMap::new();
    let mut lines: Vec<LineAcc> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols = row.split('\t').collect::<Vec<_>>();
        if cols.len() < 12 {
            continue;
        }
        if cols[0].parse::<i32>().unwrap_or(0) != 5 {
            continue;
        }
        let text = cols[11].trim();
        let conf: f64 = cols[10].trim().parse().unwrap_or(-1.0);
        if text.is_empty() || conf < 0.0 {
            continue;
        }
        let field = |idx: usize| cols[idx].trim().parse::<i32>().unwrap_or(0);
        let px = |idx: usize| cols[idx].trim().parse::<u32>().unwrap_or(0);
        let key = (field(1), field(2), field(3), field(4));
        let (left, top, w, h) = (px(6), px(7), px(8), px(9));

        let slot = *index.entry(key).or_insert_with(|| {
            lines.push(LineAcc {
                text: String::new(),
                left,
                top,
                right: left + w,
                bottom: top + h,
                conf_sum: 0.0,
                words: 0,
            });
            lines.len() - 1
        });
        let line = &mut lines[slot];
        if !line.text.is_empty() && needs_space(&line.text, text) {
            line.text.push(' ');
        }
        line.text.push_str(text);
        line.left = line.left.min(left);
        line.top = line.top.min(top);
        line.right = line.right.max(left + w);
        line.bottom = line.bottom.max(top + h);
        line.conf_sum += conf;
        line.words += 1;
    }

    let (fw, fh) = (width.max(1) as f64, height.max(1) as f64);
    lines
        .into_iter()
        .map(|line| {
            let x = line.left as f64 / fw;
            let w = (line.right - line.left) as f64 / fw;
            let h = (line.bottom - line.top) as f64 / fh;
            let y = 1.0 - line.bottom as f64 / fh;
            TextObservation {
                text: line.text,
                confidence: (line.conf_sum / line.words.max(1) as f64 / 100.0).clamp(0.0, 1.0),
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
        })
        .collect()
}

fn needs_space(left: &str, right: &str) -> bool {
    let last = left.chars().next_back();
    let first = right.chars().next();
    match (last, first) {
        (Some(a), Some(b)) => !(is_wide(a) && is_wide(b)),
        _ => false,
    }
}

fn is_wide(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3000..=0x303F | 0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xFF00..=0xFFEF
    )
}
