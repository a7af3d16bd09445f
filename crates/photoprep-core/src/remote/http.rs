//! HTTP implementation of the remote authority.
//!
//! The session credential travels as the `session_token` cookie. It is
//! captured from `Set-Cookie` on a successful handoff exchange and never
//! logged in full.

use std::cell::RefCell;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use reqwest::header::{COOKIE, HeaderMap, SET_COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::types::{
    HealthStatus, HistoryRecord, PlanChange, PlanReceipt, ProcessReceipt, ProfileSnapshot,
    SessionSnapshot, UploadFile, UploadReceipt,
};
use super::RemoteAuthority;
use crate::auth::HandoffArtifact;
use crate::config::Config;
use crate::error::{RemoteError, RemoteErrorKind, RemoteResult};
use crate::images::RemoteId;

const API_PREFIX: &str = "/api";

/// Cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "session_token";

/// Remote authority reached over HTTP.
#[derive(Debug)]
pub struct HttpRemote {
    client: reqwest::Client,
    api_base: String,
    credential: RefCell<Option<String>>,
}

impl HttpRemote {
    /// Creates a client for `base_url` (without the `/api` prefix).
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: format!("{}{API_PREFIX}", base_url.trim_end_matches('/')),
            credential: RefCell::new(None),
        })
    }

    /// Creates a client from configuration.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.effective_base_url(), config.request_timeout())
    }

    /// Attaches a previously stored credential.
    #[must_use]
    pub fn with_credential(self, token: Option<String>) -> Self {
        *self.credential.borrow_mut() = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Returns the current credential (for the host to persist).
    pub fn credential(&self) -> Option<String> {
        self.credential.borrow().clone()
    }

    pub fn clear_credential(&self) {
        self.credential.borrow_mut().take();
    }

    /// Probes `GET /health`.
    ///
    /// # Errors
    /// Returns an error if the server is unreachable or unhealthy.
    pub async fn health(&self) -> RemoteResult<HealthStatus> {
        self.send_json(self.request(Method::GET, "/health")).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.credential.borrow().as_deref() {
            Some(token) => builder.header(COOKIE, format!("{SESSION_COOKIE}={token}")),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> RemoteResult<Response> {
        let response = builder.send().await.map_err(map_send_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::http_status(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> RemoteResult<T> {
        let response = self.send(builder).await?;
        parse_json(response).await
    }
}

impl RemoteAuthority for HttpRemote {
    async fn exchange_handoff(&self, artifact: &HandoffArtifact) -> RemoteResult<SessionSnapshot> {
        let builder = self
            .request(Method::POST, "/auth/session")
            .json(&serde_json::json!({ "session_id": artifact.as_str() }));
        let response = self.send(builder).await?;

        if let Some(token) = session_token_from_headers(response.headers()) {
            tracing::debug!(token = %mask_token(&token), "session credential issued");
            *self.credential.borrow_mut() = Some(token);
        }

        parse_json(response).await
    }

    async fn validate(&self) -> RemoteResult<SessionSnapshot> {
        if self.credential.borrow().is_none() {
            return Err(RemoteError::new(
                RemoteErrorKind::Unauthorized,
                "No session credential",
            ));
        }
        self.send_json(self.request(Method::GET, "/auth/me")).await
    }

    async fn logout(&self) -> RemoteResult<()> {
        let result = self.send(self.request(Method::POST, "/auth/logout")).await;
        self.clear_credential();
        result.map(drop)
    }

    async fn upload(&self, file: &UploadFile) -> RemoteResult<UploadReceipt> {
        let mut part = Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
        if let Some(content_type) = &file.content_type {
            part = part
                .mime_str(content_type)
                .map_err(|e| RemoteError::parse(format!("Invalid content type: {e}")))?;
        }
        let form = Form::new().part("file", part);

        self.send_json(self.request(Method::POST, "/images/upload").multipart(form))
            .await
    }

    async fn process(&self, remote_id: &RemoteId) -> RemoteResult<ProcessReceipt> {
        let path = format!("/images/process/{}", segment(remote_id));
        self.send_json(self.request(Method::POST, &path)).await
    }

    async fn fetch_result(&self, remote_id: &RemoteId) -> RemoteResult<Bytes> {
        let path = format!("/images/file/{}/processed", segment(remote_id));
        let response = self.send(self.request(Method::GET, &path)).await?;
        response.bytes().await.map_err(map_send_error)
    }

    async fn delete(&self, remote_id: &RemoteId) -> RemoteResult<()> {
        let path = format!("/images/{}", segment(remote_id));
        self.send(self.request(Method::DELETE, &path))
            .await
            .map(drop)
    }

    async fn history(&self) -> RemoteResult<Vec<HistoryRecord>> {
        self.send_json(self.request(Method::GET, "/images/history"))
            .await
    }

    async fn profile(&self) -> RemoteResult<ProfileSnapshot> {
        self.send_json(self.request(Method::GET, "/user/profile"))
            .await
    }

    async fn change_plan(&self, change: &PlanChange) -> RemoteResult<PlanReceipt> {
        let builder = match change {
            PlanChange::Upgrade(plan) => self
                .request(Method::POST, "/user/upgrade")
                .json(&serde_json::json!({ "plan": plan })),
            PlanChange::Downgrade => self.request(Method::POST, "/user/downgrade"),
        };
        self.send_json(builder).await
    }
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> RemoteResult<T> {
    response
        .json()
        .await
        .map_err(|e| RemoteError::parse(format!("Failed to parse response: {e}")))
}

fn map_send_error(err: reqwest::Error) -> RemoteError {
    if err.is_timeout() {
        RemoteError::timeout(format!("Request timed out: {err}"))
    } else {
        RemoteError::transport(format!("Request failed: {err}"))
    }
}

/// Percent-encodes an id for use as one path segment.
///
/// Form encoding writes a space as `+`, which a path keeps literally; a
/// literal `+` in the id is already `%2B` at that point.
fn segment(remote_id: &RemoteId) -> String {
    url::form_urlencoded::byte_serialize(remote_id.as_str().as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn session_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, value)| name.trim() == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| value.trim().to_string())
}

/// Returns a masked version of a token for display (first 12 chars + ...).
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}
