//! Wire types exchanged with the remote authority.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::images::{ImageStatus, RemoteId};
use crate::session::{Identity, PlanId, Session};

/// User document returned by login, validation and profile calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub user_id: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub picture: Option<String>,
    /// Remaining credits; negative means unlimited.
    #[serde(default)]
    pub credits: i64,
    #[serde(alias = "plan")]
    pub subscription: PlanId,
}

impl SessionSnapshot {
    pub fn into_session(self) -> Session {
        Session {
            identity: Identity {
                id: self.user_id,
                name: self.name,
                email: self.email,
                avatar: self.picture,
            },
            plan: self.subscription,
            credits_remaining: credits_from_wire(self.credits),
        }
    }
}

/// Maps a wire credit count to a balance. Negative (unlimited) maps to 0;
/// unmetered plans never consult it.
pub fn credits_from_wire(credits: i64) -> u32 {
    u32::try_from(credits.max(0)).unwrap_or(u32::MAX)
}

/// Profile response: the session fields plus usage counters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileSnapshot {
    #[serde(flatten)]
    pub session: SessionSnapshot,
    #[serde(default)]
    pub total_images: u64,
    #[serde(default)]
    pub images_this_month: u64,
}

/// An image file ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    /// MIME type sniffed from the content, if recognized.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadFile {
    /// Builds an upload, detecting the MIME type from the content.
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let content_type = infer::get(&bytes).map(|kind| kind.mime_type().to_string());
        Self {
            file_name: file_name.into(),
            content_type,
            bytes,
        }
    }
}

/// Successful upload response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    #[serde(rename = "image_id", alias = "remote_id")]
    pub remote_id: RemoteId,
    #[serde(rename = "original_url", alias = "preview_url")]
    pub preview_url: String,
}

/// Successful processing response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProcessReceipt {
    #[serde(rename = "processed_url", alias = "result_url")]
    pub result_url: String,
    /// Authoritative credit count, when the server includes one.
    #[serde(default, alias = "updated_credits")]
    pub credits: Option<i64>,
}

/// One entry of the server-side history.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "image_id")]
    pub remote_id: RemoteId,
    pub status: ImageStatus,
    #[serde(default)]
    pub original_filename: Option<String>,
    pub original_url: String,
    #[serde(default)]
    pub processed_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Requested plan change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanChange {
    Upgrade(PlanId),
    /// Back to the free plan.
    Downgrade,
}

/// Plan change response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlanReceipt {
    #[serde(rename = "subscription", alias = "plan")]
    pub plan: PlanId,
    #[serde(default)]
    pub credits: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Health probe response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}
