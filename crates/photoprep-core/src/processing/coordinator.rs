//! Processing coordinator.
//!
//! Drives registry entries through `uploaded -> processing -> completed`
//! and keeps the session's credit balance in line with the server:
//!
//! - at most one request per image is in flight;
//! - credits are only touched after the server confirms success;
//! - a local `-1` on metered plans is provisional and any authoritative
//!   count in the same response overwrites it;
//! - a failed attempt restores the pre-attempt status and never costs a
//!   credit.

use std::path::PathBuf;
use std::rc::Rc;

use futures_util::future::join_all;

use super::download::{SaveTarget, download_file_name};
use super::inflight::InFlight;
use crate::config::PlanCatalog;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventSender};
use crate::images::{ImageRegistry, LocalId};
use crate::remote::{ProcessReceipt, RemoteAuthority, credits_from_wire};
use crate::session::SessionStore;

/// Successful result of [`ProcessingCoordinator::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The server processed the image.
    Completed {
        result_url: String,
        /// Balance after reconciliation (`None` without a session).
        credits: Option<u32>,
    },
    /// The image already had a result; no request was made.
    AlreadyCompleted { result_url: String },
    /// The entry was removed while the request was in flight. Credits were
    /// reconciled; the result was dropped.
    Discarded,
}

pub struct ProcessingCoordinator<R> {
    remote: Rc<R>,
    session: SessionStore,
    registry: ImageRegistry,
    plans: PlanCatalog,
    in_flight: InFlight<LocalId>,
    events: EventSender,
}

impl<R: RemoteAuthority> ProcessingCoordinator<R> {
    pub fn new(
        remote: Rc<R>,
        session: SessionStore,
        registry: ImageRegistry,
        plans: PlanCatalog,
        events: EventSender,
    ) -> Self {
        Self {
            remote,
            session,
            registry,
            plans,
            in_flight: InFlight::new(),
            events,
        }
    }

    /// True while a processing request for `id` is pending.
    pub fn is_in_flight(&self, id: LocalId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Submits one image for processing.
    ///
    /// # Errors
    /// `UnknownImage`, `Unauthenticated`, `AlreadyInFlight`, `NotProcessable`
    /// (no request is made) or `ProcessingFailed` (status restored, credits
    /// untouched). Dropping the future before the server answers also
    /// restores the status.
    pub async fn process(&self, id: LocalId) -> Result<ProcessOutcome, ClientError> {
        let image = self.registry.get(id).ok_or(ClientError::UnknownImage(id))?;
        if let Some(result_url) = image.result_url() {
            return Ok(ProcessOutcome::AlreadyCompleted {
                result_url: result_url.to_string(),
            });
        }
        if !self.session.is_authenticated() {
            return Err(ClientError::Unauthenticated);
        }

        // Marker and status flip happen before the first await.
        let Some(_guard) = self.in_flight.try_begin(id) else {
            tracing::debug!(local_id = %id, "processing already in flight");
            return Err(ClientError::AlreadyInFlight(id));
        };
        if !self.registry.begin_processing(id) {
            let status = self
                .registry
                .get(id)
                .map_or(image.status(), |current| current.status());
            return Err(ClientError::NotProcessable { id, status });
        }
        let mut pending = RevertOnDrop::new(&self.registry, id);
        self.events
            .emit(ClientEvent::ProcessingStarted { local_id: id });

        let result = self.remote.process(image.remote_id()).await;
        pending.disarm();

        match result {
            Ok(receipt) => Ok(self.on_success(id, receipt)),
            Err(err) => {
                let error = ClientError::ProcessingFailed(err);
                let message = error
                    .remote()
                    .map_or_else(|| error.to_string(), |e| e.message.clone());
                self.registry.revert(id, message.clone());
                tracing::warn!(local_id = %id, "processing failed: {message}");
                self.events.emit(ClientEvent::ProcessingFailed {
                    local_id: id,
                    message,
                });
                Err(error)
            }
        }
    }

    /// Processes several images concurrently; each stays single-flight.
    /// Results come back in input order.
    pub async fn process_many(
        &self,
        ids: &[LocalId],
    ) -> Vec<(LocalId, Result<ProcessOutcome, ClientError>)> {
        let results = join_all(ids.iter().map(|id| self.process(*id))).await;
        ids.iter().copied().zip(results).collect()
    }

    /// Fetches the processed bytes and hands them to `target`.
    ///
    /// Never changes the image's status, whatever happens.
    ///
    /// # Errors
    /// `UnknownImage`, `NotProcessed`, `DownloadFailed` or `SaveFailed`.
    pub async fn download(
        &self,
        id: LocalId,
        target: &impl SaveTarget,
    ) -> Result<PathBuf, ClientError> {
        let image = self.registry.get(id).ok_or(ClientError::UnknownImage(id))?;
        if image.result_url().is_none() {
            return Err(ClientError::NotProcessed(id));
        }

        let bytes = match self.remote.fetch_result(image.remote_id()).await {
            Ok(bytes) => bytes,
            Err(err) => return Err(self.download_failed(id, ClientError::DownloadFailed(err))),
        };

        let file_name = download_file_name(image.remote_id());
        let path = target
            .save(&file_name, &bytes)
            .map_err(|err| self.download_failed(id, ClientError::SaveFailed(err)))?;

        self.events.emit(ClientEvent::ImageDownloaded {
            local_id: id,
            path: path.display().to_string(),
        });
        Ok(path)
    }

    fn on_success(&self, id: LocalId, receipt: ProcessReceipt) -> ProcessOutcome {
        let credits = self.reconcile_credits(receipt.credits);

        if !self.registry.complete(id, receipt.result_url.clone()) {
            tracing::debug!(local_id = %id, "entry removed while processing; result discarded");
            return ProcessOutcome::Discarded;
        }

        tracing::debug!(local_id = %id, "processing completed");
        self.events.emit(ClientEvent::ProcessingCompleted {
            local_id: id,
            result_url: receipt.result_url.clone(),
        });
        ProcessOutcome::Completed {
            result_url: receipt.result_url,
            credits,
        }
    }

    fn reconcile_credits(&self, authoritative: Option<i64>) -> Option<u32> {
        let plan = self.session.plan()?;

        if self.plans.is_metered(&plan)
            && let Some(credits) = self.session.adjust_credits(-1)
        {
            self.events.emit(ClientEvent::CreditsChanged {
                credits,
                authoritative: false,
            });
        }

        if let Some(credits) = authoritative.map(credits_from_wire)
            && self.session.assign_credits(credits).is_some()
        {
            self.events.emit(ClientEvent::CreditsChanged {
                credits,
                authoritative: true,
            });
        }

        self.session.credits_remaining()
    }

    fn download_failed(&self, id: LocalId, error: ClientError) -> ClientError {
        tracing::warn!(local_id = %id, "download failed: {error}");
        self.events.emit(ClientEvent::DownloadFailed {
            local_id: id,
            message: error.to_string(),
        });
        error
    }
}

/// Puts a `processing` entry back to `uploaded` when the request future is
/// dropped before the remote answered.
struct RevertOnDrop<'a> {
    registry: &'a ImageRegistry,
    id: LocalId,
    armed: bool,
}

impl<'a> RevertOnDrop<'a> {
    fn new(registry: &'a ImageRegistry, id: LocalId) -> Self {
        Self {
            registry,
            id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for RevertOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed && self.registry.revert(self.id, ABANDONED.to_string()) {
            tracing::debug!(local_id = %self.id, "processing abandoned; status restored");
        }
    }
}

const ABANDONED: &str = "Processing was cancelled before the server answered";
