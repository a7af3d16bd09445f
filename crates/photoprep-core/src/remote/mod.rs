//! Remote authority: the server that owns users, images and credits.
//!
//! The core only talks to it through [`RemoteAuthority`], so tests can drive
//! the state machines with a scripted fake and the CLI with [`HttpRemote`].

use std::future::Future;

use bytes::Bytes;

use crate::auth::HandoffArtifact;
use crate::error::RemoteResult;
use crate::images::RemoteId;

mod http;
mod types;

pub use http::{HttpRemote, mask_token};
pub use types::{
    HealthStatus, HistoryRecord, PlanChange, PlanReceipt, ProcessReceipt, ProfileSnapshot,
    SessionSnapshot, UploadFile, UploadReceipt, credits_from_wire,
};

/// Operations the client core consumes from the remote authority.
///
/// Implementations carry the existing session credential (if any) on every
/// call. Futures are awaited on the caller's task; none of them need `Send`.
pub trait RemoteAuthority {
    /// Exchanges a one-time login artifact for a session.
    fn exchange_handoff(
        &self,
        artifact: &HandoffArtifact,
    ) -> impl Future<Output = RemoteResult<SessionSnapshot>>;

    /// Validates the current credential.
    fn validate(&self) -> impl Future<Output = RemoteResult<SessionSnapshot>>;

    /// Ends the remote session.
    fn logout(&self) -> impl Future<Output = RemoteResult<()>>;

    fn upload(&self, file: &UploadFile) -> impl Future<Output = RemoteResult<UploadReceipt>>;

    /// Submits an uploaded image for transformation. Not idempotent.
    fn process(&self, remote_id: &RemoteId) -> impl Future<Output = RemoteResult<ProcessReceipt>>;

    /// Fetches the processed bytes.
    fn fetch_result(&self, remote_id: &RemoteId) -> impl Future<Output = RemoteResult<Bytes>>;

    fn delete(&self, remote_id: &RemoteId) -> impl Future<Output = RemoteResult<()>>;

    fn history(&self) -> impl Future<Output = RemoteResult<Vec<HistoryRecord>>>;

    fn profile(&self) -> impl Future<Output = RemoteResult<ProfileSnapshot>>;

    fn change_plan(&self, change: &PlanChange) -> impl Future<Output = RemoteResult<PlanReceipt>>;
}
