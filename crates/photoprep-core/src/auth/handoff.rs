//! One-time login handoff.
//!
//! After external login the identity provider sends the user back with
//! `#session_id=<artifact>` in the URL fragment. The artifact is exchanged
//! for a session exactly once per value, however many times the callback
//! view is initialized.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use crate::error::ClientError;
use crate::events::{ClientEvent, EventSender};
use crate::navigation::{Navigation, View};
use crate::remote::{RemoteAuthority, mask_token};
use crate::session::SessionStore;

/// Fragment key carrying the handoff artifact.
pub const HANDOFF_KEY: &str = "session_id";

/// True when a URL fragment carries a handoff marker.
///
/// Cheap substring check meant for the synchronous routing pass; the value
/// itself is validated by [`HandoffArtifact::from_fragment`].
pub fn is_handoff_fragment(fragment: &str) -> bool {
    fragment.contains("session_id=")
}

/// Opaque one-time login artifact. `Debug` never shows the full value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HandoffArtifact(String);

impl HandoffArtifact {
    /// Extracts the artifact from a URL fragment.
    ///
    /// Returns `None` when the fragment has no handoff marker and
    /// `Some(Err(MalformedHandoff))` when the marker is present but no
    /// usable value follows it.
    pub fn from_fragment(fragment: &str) -> Option<Result<Self, ClientError>> {
        if !is_handoff_fragment(fragment) {
            return None;
        }

        let fragment = fragment.strip_prefix('#').unwrap_or(fragment);
        let value = url::form_urlencoded::parse(fragment.as_bytes())
            .find(|(key, _)| key == HANDOFF_KEY)
            .map(|(_, value)| value.trim().to_string());

        Some(match value {
            Some(value) if !value.is_empty() => Ok(Self(value)),
            _ => Err(ClientError::MalformedHandoff),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for HandoffArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HandoffArtifact")
            .field(&mask_token(&self.0))
            .finish()
    }
}

/// Remembers which artifact values have already been claimed.
///
/// Clones share the same set, so a remounted resolver built from the same
/// latch still sees earlier claims.
#[derive(Debug, Clone, Default)]
pub struct HandoffLatch {
    claimed: Rc<RefCell<HashSet<String>>>,
}

impl HandoffLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `artifact`. Returns false if it was claimed before.
    pub fn try_claim(&self, artifact: &HandoffArtifact) -> bool {
        self.claimed.borrow_mut().insert(artifact.0.clone())
    }

    pub fn is_claimed(&self, artifact: &HandoffArtifact) -> bool {
        self.claimed.borrow().contains(&artifact.0)
    }
}

/// Result of a handoff resolution.
#[derive(Debug)]
pub enum HandoffOutcome {
    /// Another resolution already owns this artifact; nothing was done.
    AlreadyClaimed,
    /// Session established; navigate to the dashboard carrying it.
    Authenticated(Navigation),
    /// Exchange failed or the artifact was malformed; land logged out.
    Rejected { to: Navigation, error: ClientError },
}

/// Exchanges handoff artifacts for sessions.
pub struct HandoffResolver<R> {
    remote: Rc<R>,
    session: SessionStore,
    latch: HandoffLatch,
    events: EventSender,
}

impl<R: RemoteAuthority> HandoffResolver<R> {
    pub fn new(
        remote: Rc<R>,
        session: SessionStore,
        latch: HandoffLatch,
        events: EventSender,
    ) -> Self {
        Self {
            remote,
            session,
            latch,
            events,
        }
    }

    /// Resolves the handoff carried by `navigation`.
    ///
    /// The latch is claimed before the first suspension point, so a second
    /// call for the same artifact returns [`HandoffOutcome::AlreadyClaimed`]
    /// even while the first exchange is still pending.
    pub async fn resolve(&self, navigation: &Navigation) -> HandoffOutcome {
        let artifact = match navigation.handoff() {
            Some(Ok(artifact)) => artifact,
            Some(Err(error)) => return self.reject(error),
            None => return self.reject(ClientError::MalformedHandoff),
        };

        if !self.latch.try_claim(&artifact) {
            tracing::debug!(artifact = ?artifact, "handoff already claimed");
            return HandoffOutcome::AlreadyClaimed;
        }

        match self.remote.exchange_handoff(&artifact).await {
            Ok(snapshot) => {
                let session = snapshot.into_session();
                self.session.set(session.clone());
                tracing::info!(user = %session.identity.id, plan = %session.plan, "logged in");
                self.events.emit(ClientEvent::LoggedIn {
                    user_id: session.identity.id.clone(),
                    plan: session.plan.clone(),
                });
                HandoffOutcome::Authenticated(Navigation::to(View::Dashboard).with_session(session))
            }
            Err(err) => self.reject(ClientError::AuthExchangeFailed(err)),
        }
    }

    fn reject(&self, error: ClientError) -> HandoffOutcome {
        tracing::warn!("login handoff failed: {error}");
        self.events.emit(ClientEvent::AuthFailed {
            message: error.to_string(),
        });
        HandoffOutcome::Rejected {
            to: Navigation::to(View::Landing),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_channel;
    use crate::test_support::{FakeRemote, server_error, snapshot};

    fn resolver(remote: &Rc<FakeRemote>) -> (HandoffResolver<FakeRemote>, SessionStore) {
        let session = SessionStore::new();
        let resolver = HandoffResolver::new(
            Rc::clone(remote),
            session.clone(),
            HandoffLatch::new(),
            EventSender::disabled(),
        );
        (resolver, session)
    }

    fn callback(fragment: &str) -> Navigation {
        Navigation::new("/").with_fragment(fragment)
    }

    #[test]
    fn test_artifact_parsing() {
        let artifact = HandoffArtifact::from_fragment("session_id=abc&state=x")
            .unwrap()
            .unwrap();
        assert_eq!(artifact.as_str(), "abc");

        let artifact = HandoffArtifact::from_fragment("#foo=1&session_id=a%2Bb")
            .unwrap()
            .unwrap();
        assert_eq!(artifact.as_str(), "a+b");

        assert!(HandoffArtifact::from_fragment("top").is_none());
        assert!(matches!(
            HandoffArtifact::from_fragment("session_id="),
            Some(Err(ClientError::MalformedHandoff))
        ));
    }

    #[test]
    fn test_debug_masks_artifact() {
        let artifact = HandoffArtifact("sess_0123456789abcdefghij".to_string());
        let debug = format!("{artifact:?}");
        assert!(!debug.contains("abcdefghij"));
    }

    #[test]
    fn test_latch_claims_once_per_value() {
        let latch = HandoffLatch::new();
        let a = HandoffArtifact("a".to_string());
        let b = HandoffArtifact("b".to_string());
        assert!(latch.try_claim(&a));
        assert!(!latch.clone().try_claim(&a));
        assert!(latch.try_claim(&b));
        assert!(latch.is_claimed(&a));
    }

    #[tokio::test]
    async fn test_successful_exchange_populates_session() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_exchange(Ok(snapshot("free", 3)));
        let (resolver, session) = resolver(&remote);

        let outcome = resolver.resolve(&callback("session_id=abc")).await;

        let HandoffOutcome::Authenticated(nav) = outcome else {
            panic!("expected authenticated");
        };
        assert_eq!(View::from_path(nav.path()), Some(View::Dashboard));
        assert_eq!(nav.session().map(|s| s.credits_remaining), Some(3));
        assert_eq!(session.credits_remaining(), Some(3));
        assert_eq!(remote.count("exchange_handoff"), 1);
    }

    #[tokio::test]
    async fn test_reentry_during_exchange_sends_one_request() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_exchange(Ok(snapshot("free", 3)));
        remote.hold("exchange_handoff");
        let (resolver, _session) = resolver(&remote);
        let nav = callback("session_id=abc");

        let (first, second) = tokio::join!(resolver.resolve(&nav), async {
            let outcome = resolver.resolve(&nav).await;
            remote.release();
            outcome
        });

        assert!(matches!(first, HandoffOutcome::Authenticated(_)));
        assert!(matches!(second, HandoffOutcome::AlreadyClaimed));
        assert_eq!(remote.count("exchange_handoff"), 1);

        // A later remount with the same artifact is still a no-op.
        let third = resolver.resolve(&nav).await;
        assert!(matches!(third, HandoffOutcome::AlreadyClaimed));
        assert_eq!(remote.count("exchange_handoff"), 1);
    }

    #[tokio::test]
    async fn test_rejected_exchange_lands_logged_out() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_exchange(Err(server_error(401, "Invalid session")));
        let (tx, mut rx) = create_event_channel();
        let session = SessionStore::new();
        let resolver = HandoffResolver::new(
            Rc::clone(&remote),
            session.clone(),
            HandoffLatch::new(),
            EventSender::new(tx),
        );

        let outcome = resolver.resolve(&callback("session_id=expired")).await;

        let HandoffOutcome::Rejected { to, error } = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(to.path(), "/");
        assert!(matches!(error, ClientError::AuthExchangeFailed(_)));
        assert!(!session.is_authenticated());
        assert!(matches!(*rx.try_recv().unwrap(), ClientEvent::AuthFailed { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_is_treated_as_rejection() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_exchange(Err(crate::error::RemoteError::transport("refused")));
        let (resolver, session) = resolver(&remote);

        let outcome = resolver.resolve(&callback("session_id=abc")).await;

        assert!(matches!(outcome, HandoffOutcome::Rejected { .. }));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_malformed_artifact_makes_no_request() {
        let remote = Rc::new(FakeRemote::new());
        let (resolver, _session) = resolver(&remote);

        let outcome = resolver.resolve(&callback("session_id=&x=1")).await;

        assert!(matches!(
            outcome,
            HandoffOutcome::Rejected {
                error: ClientError::MalformedHandoff,
                ..
            }
        ));
        assert_eq!(remote.count("exchange_handoff"), 0);
    }
}
