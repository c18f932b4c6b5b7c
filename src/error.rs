use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkerError {
    #[error("Window selection was cancelled")]
    PickCancelled,
    #[error("Failed to start window picker: {0}")]
    PickStartFailed(String),
    #[error("A window picker is already open")]
    PickerBusy,
    #[error("No window selected")]
    NoTargetForScan,
    #[error("Capture failed: {0}")]
    CaptureFailed(String),
    #[error("Text recognition failed: {0}")]
    RecognitionFailed(String),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to launch worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("worker did not become ready within {}s", .0.as_secs())]
    StartupTimeout(Duration),
    #[error("window pick timed out after {}s", .0.as_secs())]
    PickTimedOut(Duration),
    #[error("scan timed out after {}s", .0.as_secs())]
    ScanTimedOut(Duration),
    #[error("a {0} call is already pending")]
    CallPending(&'static str),
    #[error("{0}")]
    Rejected(String),
    #[error("worker exited before replying")]
    WorkerGone,
    #[error("worker I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl BridgeError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, BridgeError::Rejected(message) if is_cancellation(message))
    }
}

pub fn is_cancellation(message: &str) -> bool {
    message.to_ascii_lowercase().contains("cancel")
}
