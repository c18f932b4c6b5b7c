use tokio::sync::oneshot;

use crate::error::BridgeError;
use crate::protocol::{Payload, ReadyInfo, RecognitionResult, Response, ResponseType, WindowSelection};

pub type Reply<T> = oneshot::Sender<Result<T, BridgeError>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Ready,
    Pick,
    IntermediatePick,
    ScanRejected,
    Scan,
    WorkerError(String),
    Unclaimed(ResponseType),
}

#[derive(Default)]
pub struct Slots {
    ready: Option<Reply<ReadyInfo>>,
    pick: Option<Reply<WindowSelection>>,
    scan: Option<Reply<RecognitionResult>>,
    closed: bool,
}

impl Slots {
    pub fn install_ready(&mut self, reply: Reply<ReadyInfo>) -> Result<(), BridgeError> {
        install(&mut self.ready, reply, "ready", self.closed)
    }

    // A targetless scan also answers with `pick`, so the two kinds exclude each other.
    pub fn install_pick(&mut self, reply: Reply<WindowSelection>) -> Result<(), BridgeError> {
        if !self.closed && is_live(&self.scan) {
            return Err(BridgeError::CallPending("scan"));
        }
        install(&mut self.pick, reply, "pick", self.closed)
    }

    pub fn install_scan(&mut self, reply: Reply<RecognitionResult>) -> Result<(), BridgeError> {
        if !self.closed && is_live(&self.pick) {
            return Err(BridgeError::CallPending("pick"));
        }
        install(&mut self.scan, reply, "scan", self.closed)
    }

    pub fn clear_pick(&mut self) {
        self.pick = None;
    }

    pub fn clear_scan(&mut self) {
        self.scan = None;
    }

    pub fn clear_ready(&mut self) {
        self.ready = None;
    }

    pub fn route(&mut self, response: Response) -> Routed {
        let Response { kind, outcome } = response;
        match kind {
            ResponseType::Ready => match self.ready.take() {
                Some(reply) => {
                    let _ = reply.send(expect_payload(kind, outcome, |payload| match payload {
                        Payload::Ready(info) => Some(info),
                        _ => None,
                    }));
                    Routed::Ready
                }
                None => Routed::Unclaimed(kind),
            },
            ResponseType::Pick => {
                if let Some(reply) = self.pick.take() {
                    let _ = reply.send(expect_payload(kind, outcome, pick_payload));
                    return Routed::Pick;
                }
                if self.scan.is_none() {
                    return Routed::Unclaimed(kind);
                }
                match outcome {
                    Ok(_) => Routed::IntermediatePick,
                    Err(message) => {
                        if let Some(reply) = self.scan.take() {
                            let _ = reply.send(Err(BridgeError::Rejected(message)));
                        }
                        Routed::ScanRejected
                    }
                }
            }
            ResponseType::Scan => match self.scan.take() {
                Some(reply) => {
                    let _ = reply.send(expect_payload(kind, outcome, |payload| match payload {
                        Payload::Scan(result) => Some(result),
                        _ => None,
                    }));
                    Routed::Scan
                }
                None => Routed::Unclaimed(kind),
            },
            ResponseType::Error => Routed::WorkerError(
                outcome
                    .err()
                    .unwrap_or_else(|| "worker sent an error without a message".to_string()),
            ),
        }
    }

    pub fn fail_all(&mut self) {
        self.closed = true;
        if let Some(reply) = self.ready.take() {
            let _ = reply.send(Err(BridgeError::WorkerGone));
        }
        if let Some(reply) = self.pick.take() {
            let _ = reply.send(Err(BridgeError::WorkerGone));
        }
        if let Some(reply) = self.scan.take() {
            let _ = reply.send(Err(BridgeError::WorkerGone));
        }
    }
}

fn install<T>(
    slot: &mut Option<Reply<T>>,
    reply: Reply<T>,
    name: &'static str,
    closed: bool,
) -> Result<(), BridgeError> {
    if closed {
        return Err(BridgeError::WorkerGone);
    }
    if is_live(slot) {
        return Err(BridgeError::CallPending(name));
    }
    *slot = Some(reply);
    Ok(())
}

// A closed sender belongs to a caller that stopped waiting.
fn is_live<T>(slot: &Option<Reply<T>>) -> bool {
    slot.as_ref().is_some_and(|existing| !existing.is_closed())
}

fn pick_payload(payload: Payload) -> Option<WindowSelection> {
    match payload {
        Payload::Pick(selection) => Some(selection),
        _ => None,
    }
}

fn expect_payload<T>(
    kind: ResponseType,
    outcome: Result<Payload, String>,
    extract: impl FnOnce(Payload) -> Option<T>,
) -> Result<T, BridgeError> {
    match outcome {
        Ok(payload) => extract(payload).ok_or_else(|| {
            BridgeError::Rejected(format!("unexpected data in {} response", kind.as_str()))
        }),
        Err(message) => Err(BridgeError::Rejected(message)),
    }
}
