//! Route guard for protected views.
//!
//! Admission requires a session that is known to be valid. Every outcome
//! other than a successful validation denies access and clears the store.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::ClientError;
use crate::events::{ClientEvent, EventSender};
use crate::navigation::{Navigation, View};
use crate::remote::RemoteAuthority;
use crate::session::{Session, SessionStore};

/// What the guard is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuardState {
    /// No check has run yet.
    #[default]
    Idle,
    /// Validation pending; render a neutral loading state.
    Validating,
    Admitted,
    Denied,
}

impl GuardState {
    /// True while neither protected content nor a redirect may be shown.
    pub fn is_loading(self) -> bool {
        matches!(self, GuardState::Idle | GuardState::Validating)
    }
}

/// Guard verdict for one navigation.
#[derive(Debug)]
pub enum GuardDecision {
    Admit(Session),
    Redirect { to: Navigation, error: ClientError },
}

/// Gates protected views on a validated session.
pub struct RouteGuard<R> {
    remote: Rc<R>,
    session: SessionStore,
    events: EventSender,
    state: Rc<Cell<GuardState>>,
}

impl<R: RemoteAuthority> RouteGuard<R> {
    pub fn new(remote: Rc<R>, session: SessionStore, events: EventSender) -> Self {
        Self {
            remote,
            session,
            events,
            state: Rc::new(Cell::new(GuardState::Idle)),
        }
    }

    pub fn state(&self) -> GuardState {
        self.state.get()
    }

    /// Decides whether `navigation` may enter its protected view.
    ///
    /// A session carried by the navigation (fresh from the handoff) is used
    /// as is. Otherwise the stored credential is validated remotely.
    pub async fn check(&self, navigation: &Navigation) -> GuardDecision {
        if let Some(session) = navigation.session() {
            self.session.set(session.clone());
            self.state.set(GuardState::Admitted);
            return GuardDecision::Admit(session.clone());
        }

        self.state.set(GuardState::Validating);
        match self.remote.validate().await {
            Ok(snapshot) => {
                let session = snapshot.into_session();
                self.session.set(session.clone());
                self.state.set(GuardState::Admitted);
                GuardDecision::Admit(session)
            }
            Err(err) => {
                if err.is_transport() {
                    tracing::warn!("session validation unreachable, denying: {err}");
                } else {
                    tracing::debug!("session rejected: {err}");
                }
                self.session.clear();
                self.state.set(GuardState::Denied);
                let error = ClientError::ValidationFailed(err);
                self.events.emit(ClientEvent::SessionRejected {
                    message: error.to_string(),
                });
                GuardDecision::Redirect {
                    to: Navigation::to(View::Landing),
                    error,
                }
            }
        }
    }
}
