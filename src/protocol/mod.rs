mod codec;

pub use codec::{decode_command, decode_response, encode_command, encode_response};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub type WindowId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Pick,
    Scan,
    Quit,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Pick => "pick",
            Action::Scan => "scan",
            Action::Quit => "quit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pick" => Some(Action::Pick),
            "scan" => Some(Action::Scan),
            "quit" => Some(Action::Quit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOptions {
    pub languages: Option<Vec<String>>,
    pub save_to: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub action: Action,
    pub languages: Option<Vec<String>>,
    pub save_to: Option<PathBuf>,
}

impl Command {
    pub fn pick() -> Self {
        Self {
            action: Action::Pick,
            languages: None,
            save_to: None,
        }
    }

    pub fn scan(options: ScanOptions) -> Self {
        Self {
            action: Action::Scan,
            languages: options.languages,
            save_to: options.save_to,
        }
    }

    pub fn quit() -> Self {
        Self {
            action: Action::Quit,
            languages: None,
            save_to: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Ready,
    Pick,
    Scan,
    Error,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Ready => "ready",
            ResponseType::Pick => "pick",
            ResponseType::Scan => "scan",
            ResponseType::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextObservation {
    pub text: String,
    pub confidence: f64,
    pub bounding_box: NormalizedRect,
    pub top_left: NormalizedPoint,
    pub top_right: NormalizedPoint,
    pub bottom_right: NormalizedPoint,
    pub bottom_left: NormalizedPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadyInfo {
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowSelection {
    pub window_id: Option<WindowId>,
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    pub bounds: Option<WindowBounds>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub image_width: u32,
    pub image_height: u32,
    pub observations: Vec<TextObservation>,
    pub bounds: WindowBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Ready(ReadyInfo),
    Pick(WindowSelection),
    Scan(RecognitionResult),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub kind: ResponseType,
    pub outcome: Result<Payload, String>,
}

impl Response {
    pub fn ready(version: impl Into<String>) -> Self {
        Self {
            kind: ResponseType::Ready,
            outcome: Ok(Payload::Ready(ReadyInfo {
                version: version.into(),
            })),
        }
    }

    pub fn picked(selection: WindowSelection) -> Self {
        Self {
            kind: ResponseType::Pick,
            outcome: Ok(Payload::Pick(selection)),
        }
    }

    pub fn scanned(result: RecognitionResult) -> Self {
        Self {
            kind: ResponseType::Scan,
            outcome: Ok(Payload::Scan(result)),
        }
    }

    pub fn failure(kind: ResponseType, message: impl Into<String>) -> Self {
        Self {
            kind,
            outcome: Err(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}
