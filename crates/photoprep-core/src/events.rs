//! Client event types.
//!
//! Every user-relevant state change and every failure is emitted here so a
//! host can show it (toast, status line, stderr). Emission is best-effort
//! and never blocks the caller.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::images::{LocalId, RemoteId};
use crate::session::PlanId;

/// Events emitted by the client core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    LoggedIn { user_id: String, plan: PlanId },
    /// Handoff exchange failed; the user lands on the public page.
    AuthFailed { message: String },
    /// Stored credential was rejected (or could not be checked).
    SessionRejected { message: String },
    LoggedOut,
    /// Credit balance changed. `authoritative` is false for the local
    /// estimate applied right after a successful processing.
    CreditsChanged { credits: u32, authoritative: bool },
    PlanChanged { plan: PlanId, credits: u32 },
    ImageUploaded { local_id: LocalId, remote_id: RemoteId },
    UploadRejected { message: String },
    ProcessingStarted { local_id: LocalId },
    ProcessingCompleted { local_id: LocalId, result_url: String },
    ProcessingFailed { local_id: LocalId, message: String },
    ImageDownloaded { local_id: LocalId, path: String },
    DownloadFailed { local_id: LocalId, message: String },
    /// Local registry entry removed (no server-side deletion).
    ImageRemoved { local_id: LocalId },
    /// Server confirmed deletion from history.
    ImageDeleted { remote_id: RemoteId },
    /// A request outside the image lifecycle failed (profile, history, ...).
    RequestFailed { operation: String, message: String },
}

impl ClientEvent {
    /// True for events reporting a failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            ClientEvent::AuthFailed { .. }
                | ClientEvent::SessionRejected { .. }
                | ClientEvent::UploadRejected { .. }
                | ClientEvent::ProcessingFailed { .. }
                | ClientEvent::DownloadFailed { .. }
                | ClientEvent::RequestFailed { .. }
        )
    }
}

/// Channel-based event sender (bounded).
pub type ClientEventTx = mpsc::Sender<Arc<ClientEvent>>;

/// Channel-based event receiver (bounded).
pub type ClientEventRx = mpsc::Receiver<Arc<ClientEvent>>;

/// Default channel capacity for event streams.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

/// Creates a bounded event channel with the default capacity.
pub fn create_event_channel() -> (ClientEventTx, ClientEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Best-effort event emitter shared by all components.
#[derive(Debug, Clone, Default)]
pub struct EventSender {
    tx: Option<ClientEventTx>,
}

impl EventSender {
    pub fn new(tx: ClientEventTx) -> Self {
        Self { tx: Some(tx) }
    }

    /// Sender that drops every event.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    /// Never awaits; drops the event if the channel is full or closed.
    pub fn emit(&self, event: ClientEvent) {
        if let Some(tx) = &self.tx
            && let Err(err) = tx.try_send(Arc::new(event))
        {
            tracing::debug!("client event dropped: {err}");
        }
    }
}
