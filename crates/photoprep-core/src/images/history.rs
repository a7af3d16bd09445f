//! Server-side image history.

use std::rc::Rc;

use super::{ImageRegistry, RemoteId};
use crate::error::ClientError;
use crate::events::{ClientEvent, EventSender};
use crate::processing::InFlight;
use crate::remote::{HistoryRecord, RemoteAuthority};

/// Lists and deletes images stored by the remote authority.
pub struct HistoryService<R> {
    remote: Rc<R>,
    registry: ImageRegistry,
    deleting: InFlight<RemoteId>,
    events: EventSender,
}

impl<R: RemoteAuthority> HistoryService<R> {
    pub fn new(remote: Rc<R>, registry: ImageRegistry, events: EventSender) -> Self {
        Self {
            remote,
            registry,
            deleting: InFlight::new(),
            events,
        }
    }

    /// Returns the user's images, newest first as the server orders them.
    ///
    /// # Errors
    /// `HistoryFailed` if the request fails.
    pub async fn list(&self) -> Result<Vec<HistoryRecord>, ClientError> {
        self.remote.history().await.map_err(|err| {
            let error = ClientError::HistoryFailed(err);
            self.report("history", &error);
            error
        })
    }

    /// Deletes an image on the server. The matching local entry is removed
    /// only once the server has confirmed.
    ///
    /// # Errors
    /// `DeleteInFlight` if a delete for the same image is pending,
    /// `DeleteFailed` if the server refuses or cannot be reached.
    pub async fn delete(&self, remote_id: &RemoteId) -> Result<(), ClientError> {
        let Some(_guard) = self.deleting.try_begin(remote_id.clone()) else {
            return Err(ClientError::DeleteInFlight(remote_id.to_string()));
        };

        if let Err(err) = self.remote.delete(remote_id).await {
            let error = ClientError::DeleteFailed(err);
            self.report("delete", &error);
            return Err(error);
        }

        if let Some(removed) = self.registry.remove_by_remote(remote_id) {
            self.events.emit(ClientEvent::ImageRemoved {
                local_id: removed.local_id(),
            });
        }
        tracing::debug!(remote_id = %remote_id, "image deleted");
        self.events.emit(ClientEvent::ImageDeleted {
            remote_id: remote_id.clone(),
        });
        Ok(())
    }

    fn report(&self, operation: &str, error: &ClientError) {
        tracing::warn!("{operation} failed: {error}");
        self.events.emit(ClientEvent::RequestFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        });
    }
}
