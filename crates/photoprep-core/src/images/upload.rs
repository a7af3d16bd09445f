//! Credit-gated image upload.

use std::rc::Rc;

use super::{ImageRegistry, ManagedImage};
use crate::config::PlanCatalog;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventSender};
use crate::remote::{RemoteAuthority, UploadFile};
use crate::session::SessionStore;

/// Uploads images and registers them on success.
pub struct ImageUploader<R> {
    remote: Rc<R>,
    session: SessionStore,
    registry: ImageRegistry,
    plans: PlanCatalog,
    allowed_types: Vec<String>,
    events: EventSender,
}

impl<R: RemoteAuthority> ImageUploader<R> {
    pub fn new(
        remote: Rc<R>,
        session: SessionStore,
        registry: ImageRegistry,
        plans: PlanCatalog,
        allowed_types: Vec<String>,
        events: EventSender,
    ) -> Self {
        Self {
            remote,
            session,
            registry,
            plans,
            allowed_types,
            events,
        }
    }

    /// Uploads `file` and registers it in status `uploaded`.
    ///
    /// Local checks run before any request: a session must exist, a gated
    /// plan must have credits left, and the content must be an accepted
    /// image type. The registry is untouched unless the upload succeeds.
    ///
    /// # Errors
    /// `Unauthenticated`, `CreditExhausted`, `InvalidImage` or `UploadFailed`.
    pub async fn upload(&self, file: UploadFile) -> Result<ManagedImage, ClientError> {
        if let Err(err) = self.precheck(&file) {
            return Err(self.rejected(err));
        }

        let receipt = match self.remote.upload(&file).await {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.rejected(ClientError::UploadFailed(err))),
        };

        let image = self.registry.register(
            receipt.remote_id,
            file.file_name,
            file.bytes,
            receipt.preview_url,
        );
        tracing::debug!(local_id = %image.local_id(), remote_id = %image.remote_id(), "image uploaded");
        self.events.emit(ClientEvent::ImageUploaded {
            local_id: image.local_id(),
            remote_id: image.remote_id().clone(),
        });
        Ok(image)
    }

    fn precheck(&self, file: &UploadFile) -> Result<(), ClientError> {
        let session = self.session.get().ok_or(ClientError::Unauthenticated)?;

        if self.plans.gates_uploads(&session.plan) && session.credits_remaining == 0 {
            return Err(ClientError::CreditExhausted { plan: session.plan });
        }

        match file.content_type.as_deref() {
            Some(mime) if self.accepts(mime) => Ok(()),
            detected => Err(ClientError::InvalidImage {
                detected: detected.map(str::to_string),
            }),
        }
    }

    fn accepts(&self, mime: &str) -> bool {
        self.allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(mime))
    }

    fn rejected(&self, error: ClientError) -> ClientError {
        tracing::warn!("upload rejected: {error}");
        self.events.emit(ClientEvent::UploadRejected {
            message: error.to_string(),
        });
        error
    }
}
