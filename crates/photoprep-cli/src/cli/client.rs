//! Connected client shared by the commands.
//!
//! Builds the HTTP remote with the stored credential, wires the core and
//! keeps the event receiver so commands can drain it before exiting.

use std::ops::Deref;

use anyhow::{Result, anyhow, bail};
use photoprep_core::app::PhotoPrep;
use photoprep_core::auth::GuardDecision;
use photoprep_core::config::Config;
use photoprep_core::error::{ClientError, RemoteErrorKind};
use photoprep_core::events::{ClientEvent, ClientEventRx, EventSender, create_event_channel};
use photoprep_core::navigation::{Navigation, View};
use photoprep_core::remote::HttpRemote;
use photoprep_core::session::Session;

use crate::credential::{self, StoredCredential};

pub const NOT_LOGGED_IN: &str = "Not logged in. Run `photoprep login <callback-url>` first.";

pub struct Client {
    app: PhotoPrep<HttpRemote>,
    events: ClientEventRx,
}

impl Client {
    /// Connects with whatever credential is stored (possibly none).
    pub fn connect(config: &Config) -> Result<Self> {
        let stored = credential::load()?;
        let remote =
            HttpRemote::from_config(config)?.with_credential(stored.map(|c| c.token));
        let (tx, events) = create_event_channel();

        Ok(Self {
            app: PhotoPrep::new(remote, config, EventSender::new(tx)),
            events,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.app.remote().credential().is_some()
    }

    /// Validates the stored credential and loads the session.
    ///
    /// A rejected credential is forgotten; an unreachable server leaves it
    /// in place for the next attempt.
    pub async fn require_session(&mut self) -> Result<Session> {
        if !self.has_credential() {
            bail!(NOT_LOGGED_IN);
        }

        let decision = self
            .app
            .guard()
            .check(&Navigation::to(View::Dashboard))
            .await;
        self.drain_events();

        match decision {
            GuardDecision::Admit(session) => Ok(session),
            GuardDecision::Redirect { error, .. } => {
                let rejected = error
                    .remote()
                    .is_some_and(|e| e.kind == RemoteErrorKind::Unauthorized);
                if rejected {
                    credential::clear()?;
                    bail!("Session expired or revoked. Run `photoprep login <callback-url>`.");
                }
                Err(client_error(&error).context("Could not validate session"))
            }
        }
    }

    /// Persists the credential the remote currently holds.
    pub fn persist_credential(&self, session: &Session) -> Result<()> {
        let Some(token) = self.app.remote().credential() else {
            bail!("Server did not issue a session cookie");
        };
        credential::save(&StoredCredential::new(token, Some(session.identity.id.clone())))
    }

    /// Empties the event channel, logging each event.
    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            if event.is_failure() {
                tracing::info!(event = ?event, "client failure event");
            } else {
                tracing::debug!(event = ?event, "client event");
            }
            drained.push(ClientEvent::clone(&event));
        }
        drained
    }
}

impl Deref for Client {
    type Target = PhotoPrep<HttpRemote>;

    fn deref(&self) -> &Self::Target {
        &self.app
    }
}

/// Converts a core error for display. The message already includes the
/// remote cause, so the source chain is not carried over.
pub fn client_error(error: &ClientError) -> anyhow::Error {
    anyhow!("{error}")
}
