//! Background-worker message protocol

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// JSON-shaped message envelope exchanged between the background worker and
/// open tabs, tagged by a `type` field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    /// worker → tab: a new version activated; the tab should treat the
    /// update as available without re-deriving from the persisted record
    #[serde(rename = "SW_UPDATED")]
    SwUpdated {
        version: String,
        build: u32,
        timestamp: i64,
    },
    /// tab → worker: request the worker's current version
    #[serde(rename = "VERSION_CHECK")]
    VersionCheck,
    /// worker → tab: reply to `VERSION_CHECK`
    #[serde(rename = "VERSION_INFO")]
    VersionInfo {
        version: String,
        build: u32,
        timestamp: i64,
    },
    /// tab → worker: request immediate activation of a pending worker
    #[serde(rename = "SKIP_WAITING")]
    SkipWaiting,
}

/// A tab → worker message plus an optional reply port, mirroring the message
/// ports the browser transport provides
#[derive(Debug)]
pub struct Envelope {
    pub message: WorkerMessage,
    pub reply: Option<oneshot::Sender<WorkerMessage>>,
}

impl Envelope {
    /// A one-way message with no reply expected
    pub fn notify(message: WorkerMessage) -> Self {
        Self {
            message,
            reply: None,
        }
    }

    /// A request carrying a reply port
    pub fn request(message: WorkerMessage) -> (Self, oneshot::Receiver<WorkerMessage>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: Some(tx),
            },
            rx,
        )
    }
}
