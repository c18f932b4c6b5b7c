mod lines;
mod slots;

pub use lines::LineBuffer;
pub use slots::{Routed, Slots};

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command as ProcessCommand;
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::protocol::{
    Command, ReadyInfo, RecognitionResult, ScanOptions, WindowSelection, decode_response,
    encode_command,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeTimeouts {
    pub ready: Duration,
    pub pick: Duration,
    pub scan: Duration,
}

impl Default for BridgeTimeouts {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(5),
            pick: Duration::from_secs(60),
            scan: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Exited { code: Option<i32>, requested: bool },
    Fault(String),
}

impl WorkerEvent {
    pub fn is_crash(&self) -> bool {
        match self {
            WorkerEvent::Exited { code, requested } => !requested && *code != Some(0),
            WorkerEvent::Fault(_) => false,
        }
    }
}

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct Bridge {
    writer: Mutex<Option<BoxedWriter>>,
    slots: Arc<Mutex<Slots>>,
    ready: Mutex<Option<oneshot::Receiver<Result<ReadyInfo, BridgeError>>>>,
    timeouts: BridgeTimeouts,
    quit_requested: Arc<AtomicBool>,
}

impl Bridge {
    pub async fn start(
        program: &Path,
        args: &[String],
        timeouts: BridgeTimeouts,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>), BridgeError> {
        let (bridge, events) = Self::spawn(program, args, timeouts)?;
        let info = bridge.wait_ready().await?;
        info!(version = %info.version, "worker ready");
        Ok((bridge, events))
    }

    pub fn spawn(
        program: &Path,
        args: &[String],
        timeouts: BridgeTimeouts,
    ) -> Result<(Self, mpsc::UnboundedReceiver<WorkerEvent>), BridgeError> {
        debug!(program = %program.display(), ?args, "launching worker");
        let mut child = ProcessCommand::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(BridgeError::Spawn)?;

        let missing = |name: &str| {
            BridgeError::Spawn(std::io::Error::other(format!("worker {} is not piped", name)))
        };
        let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing("stderr"))?;

        let bridge = Self::connect(stdout, stdin, timeouts);
        forward_stderr(stderr);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let requested = bridge.quit_requested.clone();
        tokio::spawn(async move {
            let event = match child.wait().await {
                Ok(status) => WorkerEvent::Exited {
                    code: status.code(),
                    requested: requested.load(Ordering::SeqCst),
                },
                Err(err) => WorkerEvent::Fault(format!("failed to wait for worker: {}", err)),
            };
            if event.is_crash() {
                warn!(?event, "worker crashed");
            } else {
                debug!(?event, "worker exited");
            }
            let _ = events_tx.send(event);
        });

        Ok((bridge, events_rx))
    }

    pub fn connect<R, W>(reader: R, writer: W, timeouts: BridgeTimeouts) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut slots = Slots::default();
        let (ready_tx, ready_rx) = oneshot::channel();
        // Installed before the reader starts so an early `ready` is not lost.
        let _ = slots.install_ready(ready_tx);
        let slots = Arc::new(Mutex::new(slots));
        spawn_reader(reader, slots.clone());

        Self {
            writer: Mutex::new(Some(Box::new(writer))),
            slots,
            ready: Mutex::new(Some(ready_rx)),
            timeouts,
            quit_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn timeouts(&self) -> BridgeTimeouts {
        self.timeouts
    }

    pub async fn wait_ready(&self) -> Result<ReadyInfo, BridgeError> {
        let rx = self
            .ready
            .lock()
            .await
            .take()
            .ok_or(BridgeError::CallPending("ready"))?;
        match tokio::time::timeout(self.timeouts.ready, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::WorkerGone),
            Err(_) => {
                self.slots.lock().await.clear_ready();
                Err(BridgeError::StartupTimeout(self.timeouts.ready))
            }
        }
    }

    pub async fn pick(&self) -> Result<WindowSelection, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().await.install_pick(tx)?;
        if let Err(err) = self.send(&Command::pick()).await {
            self.slots.lock().await.clear_pick();
            return Err(err);
        }
        match tokio::time::timeout(self.timeouts.pick, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::WorkerGone),
            Err(_) => {
                self.slots.lock().await.clear_pick();
                Err(BridgeError::PickTimedOut(self.timeouts.pick))
            }
        }
    }

    pub async fn scan(&self, options: ScanOptions) -> Result<RecognitionResult, BridgeError> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().await.install_scan(tx)?;
        if let Err(err) = self.send(&Command::scan(options)).await {
            self.slots.lock().await.clear_scan();
            return Err(err);
        }
        match tokio::time::timeout(self.timeouts.scan, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(BridgeError::WorkerGone),
            Err(_) => {
                self.slots.lock().await.clear_scan();
                Err(BridgeError::ScanTimedOut(self.timeouts.scan))
            }
        }
    }

    pub async fn quit(&self) {
        self.quit_requested.store(true, Ordering::SeqCst);
        let Some(mut writer) = self.writer.lock().await.take() else {
            return;
        };
        match encode_command(&Command::quit()) {
            Ok(line) => {
                if let Err(err) = writer.write_all(line.as_bytes()).await {
                    debug!("failed to send quit: {}", err);
                }
            }
            Err(err) => debug!("failed to encode quit: {}", err),
        }
        if let Err(err) = writer.shutdown().await {
            debug!("failed to close worker stdin: {}", err);
        }
    }

    async fn send(&self, command: &Command) -> Result<(), BridgeError> {
        let line = encode_command(command)?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(BridgeError::WorkerGone)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        debug!(action = command.action.as_str(), "command sent");
        Ok(())
    }
}

fn spawn_reader<R>(mut reader: R, slots: Arc<Mutex<Slots>>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut buffer = LineBuffer::new();
        let mut chunk = vec![0u8; 8 * 1024];
        loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) => {
                    warn!("failed to read worker output: {}", err);
                    break;
                }
            };
            for line in buffer.push(&chunk[..read]) {
                dispatch(&line, &slots).await;
            }
        }
        if let Some(line) = buffer.finish() {
            dispatch(&line, &slots).await;
        }
        debug!("worker output closed");
        slots.lock().await.fail_all();
    });
}

async fn dispatch(line: &str, slots: &Mutex<Slots>) {
    let response = match decode_response(line) {
        Ok(response) => response,
        Err(err) => {
            warn!("discarding worker line: {}", err);
            return;
        }
    };
    match slots.lock().await.route(response) {
        Routed::WorkerError(message) => warn!("worker reported an error: {}", message),
        Routed::Unclaimed(kind) => debug!("no pending call for {} response", kind.as_str()),
        Routed::ScanRejected => debug!("scan ended by failed pick"),
        routed => debug!(?routed, "response delivered"),
    }
}

fn forward_stderr<R>(stderr: R)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => debug!("worker: {}", line),
                Ok(None) => break,
                Err(err) => {
                    debug!("worker stderr unreadable: {}", err);
                    break;
                }
            }
        }
    });
}
