pub mod app;
pub mod bridge;
pub mod capture;
pub mod error;
pub mod layout;
pub mod logging;
pub mod overlay;
mod paths;
pub mod protocol;
pub mod settings;
mod stdin;
#[cfg(test)]
mod test_util;
pub mod worker;

pub use app::{AppContext, ScanArgs, ScanReport};
pub use bridge::{Bridge, BridgeTimeouts, WorkerEvent};
pub use error::{BridgeError, ProtocolError, WorkerError};
pub use settings::Settings;
