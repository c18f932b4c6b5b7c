use std::path::{Path, PathBuf};

const BASE_DIR_ENV: &str = "WINDOW_LENS_DIR";
const DEFAULT_DIR_NAME: &str = ".window-lens";

pub(crate) fn base_dir() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok();
    let override_dir = std::env::var(BASE_DIR_ENV).ok();
    resolve_base_dir(override_dir.as_deref(), home.as_deref())
}

fn resolve_base_dir(override_dir: Option<&str>, home: Option<&str>) -> Option<PathBuf> {
    if let Some(dir) = override_dir.and_then(|value| normalize_dir(value, home)) {
        return Some(dir);
    }
    home.map(str::trim)
        .filter(|home| !home.is_empty())
        .map(|home| Path::new(home).join(DEFAULT_DIR_NAME))
}

fn normalize_dir(value: &str, home: Option<&str>) -> Option<PathBuf> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    let expanded = expand_tilde(trimmed, home);
    let mut normalized = PathBuf::new();
    for component in Path::new(&expanded).components() {
        normalized.push(component.as_os_str());
    }
    Some(normalized)
}

fn expand_tilde(value: &str, home: Option<&str>) -> String {
    let Some(home) = home.map(str::trim).filter(|home| !home.is_empty()) else {
        return value.to_string();
    };
    if value == "~" {
        return home.to_string();
    }
    match value.strip_prefix("~/") {
        Some(rest) => format!("{}/{}", home.trim_end_matches('/'), rest),
        None => value.to_string(),
    }
}
