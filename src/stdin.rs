use std::io::{self, BufRead};

use tokio::sync::mpsc;
use tracing::{debug, error};

pub(crate) fn spawn_line_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(text) => {
                    let trimmed = text.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if tx.send(trimmed.to_string()).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    error!("failed to read stdin: {}", err);
                    break;
                }
            }
        }
        debug!("stdin closed");
    });

    rx
}
