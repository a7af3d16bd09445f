//! Error types for remote calls and client operations.
//!
//! Transport failures and explicit server rejections are both "this attempt
//! did not succeed". State transitions never branch on the difference; it
//! only changes the message shown to the user.

use std::fmt;

use serde_json::Value;

use crate::images::{ImageStatus, LocalId};
use crate::session::PlanId;

/// Categories of remote authority failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Non-success HTTP status other than 401/403.
    HttpStatus,
    /// The credential was rejected (401/403).
    Unauthorized,
    /// Connection or request timeout.
    Timeout,
    /// Connection failed or was dropped.
    Transport,
    /// The response body did not have the expected shape.
    Parse,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteErrorKind::HttpStatus => write!(f, "http_status"),
            RemoteErrorKind::Unauthorized => write!(f, "unauthorized"),
            RemoteErrorKind::Timeout => write!(f, "timeout"),
            RemoteErrorKind::Transport => write!(f, "transport"),
            RemoteErrorKind::Parse => write!(f, "parse"),
        }
    }
}

/// Structured error from the remote authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// HTTP status, when the server answered.
    pub status: Option<u16>,
    /// One-line summary suitable for display
    pub message: String,
    /// Raw response body, if any
    pub details: Option<String>,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Creates an error from a non-success response.
    ///
    /// Uses the `detail` field of a JSON body as the message when present.
    pub fn http_status(status: u16, body: &str) -> Self {
        let kind = if matches!(status, 401 | 403) {
            RemoteErrorKind::Unauthorized
        } else {
            RemoteErrorKind::HttpStatus
        };

        let detail = serde_json::from_str::<Value>(body).ok().and_then(|json| {
            json.get("detail")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

        let message = match detail {
            Some(detail) => detail,
            None => format!("HTTP {status}"),
        };

        Self {
            kind,
            status: Some(status),
            message,
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Timeout, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Parse, message)
    }

    /// True when the server never produced an answer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Transport | RemoteErrorKind::Timeout
        )
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RemoteError {}

/// Result type for remote authority calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Failures of client operations.
#[derive(Debug)]
pub enum ClientError {
    /// The handoff artifact was rejected, expired, or could not be exchanged.
    AuthExchangeFailed(RemoteError),
    /// The navigation carried a `session_id` marker without a usable value.
    MalformedHandoff,
    /// The stored credential was rejected during validation.
    ValidationFailed(RemoteError),
    /// The operation requires a session and there is none.
    Unauthenticated,
    /// Local policy refused an upload: no credits left on a gated plan.
    CreditExhausted { plan: PlanId },
    /// The file is not an accepted image type.
    InvalidImage { detected: Option<String> },
    UploadFailed(RemoteError),
    UnknownImage(LocalId),
    /// A processing request for this image is already in flight.
    AlreadyInFlight(LocalId),
    /// The image's status does not allow a new processing request.
    NotProcessable { id: LocalId, status: ImageStatus },
    ProcessingFailed(RemoteError),
    /// Download requested for an image without a result.
    NotProcessed(LocalId),
    DownloadFailed(RemoteError),
    /// The host could not save downloaded bytes.
    SaveFailed(std::io::Error),
    DeleteFailed(RemoteError),
    /// A delete for this remote image is already in flight.
    DeleteInFlight(String),
    PlanChangeFailed(RemoteError),
    /// Remote logout failed; the local session is cleared regardless.
    LogoutFailed(RemoteError),
    ProfileFailed(RemoteError),
    HistoryFailed(RemoteError),
}

impl ClientError {
    /// Returns the underlying remote error, if any.
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            ClientError::AuthExchangeFailed(e)
            | ClientError::ValidationFailed(e)
            | ClientError::UploadFailed(e)
            | ClientError::ProcessingFailed(e)
            | ClientError::DownloadFailed(e)
            | ClientError::DeleteFailed(e)
            | ClientError::PlanChangeFailed(e)
            | ClientError::LogoutFailed(e)
            | ClientError::ProfileFailed(e)
            | ClientError::HistoryFailed(e) => Some(e),
            _ => None,
        }
    }

    /// True when the failure was a transport problem (message purposes only).
    pub fn is_transport(&self) -> bool {
        self.remote().is_some_and(RemoteError::is_transport)
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::AuthExchangeFailed(e) => write!(f, "Login failed: {e}"),
            ClientError::MalformedHandoff => write!(f, "Login failed: malformed login callback"),
            ClientError::ValidationFailed(e) => write!(f, "Session is no longer valid: {e}"),
            ClientError::Unauthenticated => write!(f, "Not logged in"),
            ClientError::CreditExhausted { plan } => write!(
                f,
                "No credits remaining on the {plan} plan. Upgrade for more processing."
            ),
            ClientError::InvalidImage { detected: Some(mime) } => {
                write!(f, "Unsupported file type: {mime}")
            }
            ClientError::InvalidImage { detected: None } => {
                write!(f, "Unsupported file type: not a recognized image")
            }
            ClientError::UploadFailed(e) => write!(f, "Upload failed: {e}"),
            ClientError::UnknownImage(id) => write!(f, "Unknown image {id}"),
            ClientError::AlreadyInFlight(id) => write!(f, "Image {id} is already processing"),
            ClientError::NotProcessable { id, status } => {
                write!(f, "Image {id} cannot be processed while {status}")
            }
            ClientError::ProcessingFailed(e) => write!(f, "Processing failed: {e}"),
            ClientError::NotProcessed(id) => write!(f, "Image {id} has not been processed yet"),
            ClientError::DownloadFailed(e) => write!(f, "Download failed: {e}"),
            ClientError::SaveFailed(e) => write!(f, "Download failed: could not save file: {e}"),
            ClientError::DeleteFailed(e) => write!(f, "Delete failed: {e}"),
            ClientError::DeleteInFlight(id) => write!(f, "Image {id} is already being deleted"),
            ClientError::PlanChangeFailed(e) => write!(f, "Plan change failed: {e}"),
            ClientError::LogoutFailed(e) => write!(f, "Logout failed: {e}"),
            ClientError::ProfileFailed(e) => write!(f, "Could not load profile: {e}"),
            ClientError::HistoryFailed(e) => write!(f, "Could not load history: {e}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::SaveFailed(e) => Some(e),
            other => other
                .remote()
                .map(|e| e as &(dyn std::error::Error + 'static)),
        }
    }
}
