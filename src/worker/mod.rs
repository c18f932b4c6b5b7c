mod backend;
mod machine;
mod matching;
mod runtime;

pub use backend::{BackendFuture, CaptureBackend, PickerOutcome, PixelSize, WindowInfo};
pub use machine::{
    Effect, Event, Machine, PickResult, ScanJob, ScanRequest, Target, TargetState,
};
pub use matching::find_matching_window;
pub use runtime::{WorkerConfig, pixel_size, run};

use anyhow::Result;
use std::sync::Arc;

pub async fn run_stdio<B: CaptureBackend>(backend: Arc<B>, config: WorkerConfig) -> Result<()> {
    let lines = crate::stdin::spawn_line_reader();
    run(backend, lines, tokio::io::stdout(), config).await
}
