//! Client facade wiring the stores and services together.

use std::rc::Rc;

use crate::account::AccountService;
use crate::auth::{GuardDecision, HandoffLatch, HandoffOutcome, HandoffResolver, RouteGuard};
use crate::config::Config;
use crate::events::{ClientEvent, EventSender};
use crate::images::{HistoryService, ImageRegistry, ImageUploader, LocalId, ManagedImage};
use crate::navigation::{Navigation, Route, Router, View};
use crate::processing::ProcessingCoordinator;
use crate::remote::RemoteAuthority;
use crate::session::{Session, SessionStore};

/// What the host should render after a navigation settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Neutral loading state (a handoff owned by another resolution).
    Loading,
    Public(View),
    Protected { view: View, session: Session },
}

/// One client session: shared stores plus the services that mutate them.
pub struct PhotoPrep<R> {
    remote: Rc<R>,
    session: SessionStore,
    registry: ImageRegistry,
    events: EventSender,
    resolver: HandoffResolver<R>,
    guard: RouteGuard<R>,
    uploader: ImageUploader<R>,
    coordinator: ProcessingCoordinator<R>,
    history: HistoryService<R>,
    account: AccountService<R>,
}

impl<R: RemoteAuthority> PhotoPrep<R> {
    pub fn new(remote: R, config: &Config, events: EventSender) -> Self {
        let remote = Rc::new(remote);
        let session = SessionStore::new();
        let registry = ImageRegistry::new();
        let plans = config.plan_catalog();

        Self {
            resolver: HandoffResolver::new(
                Rc::clone(&remote),
                session.clone(),
                HandoffLatch::new(),
                events.clone(),
            ),
            guard: RouteGuard::new(Rc::clone(&remote), session.clone(), events.clone()),
            uploader: ImageUploader::new(
                Rc::clone(&remote),
                session.clone(),
                registry.clone(),
                plans.clone(),
                config.allowed_image_types.clone(),
                events.clone(),
            ),
            coordinator: ProcessingCoordinator::new(
                Rc::clone(&remote),
                session.clone(),
                registry.clone(),
                plans.clone(),
                events.clone(),
            ),
            history: HistoryService::new(Rc::clone(&remote), registry.clone(), events.clone()),
            account: AccountService::new(
                Rc::clone(&remote),
                session.clone(),
                registry.clone(),
                plans,
                events.clone(),
            ),
            remote,
            session,
            registry,
            events,
        }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn registry(&self) -> &ImageRegistry {
        &self.registry
    }

    pub fn guard(&self) -> &RouteGuard<R> {
        &self.guard
    }

    pub fn uploader(&self) -> &ImageUploader<R> {
        &self.uploader
    }

    pub fn coordinator(&self) -> &ProcessingCoordinator<R> {
        &self.coordinator
    }

    pub fn history(&self) -> &HistoryService<R> {
        &self.history
    }

    pub fn account(&self) -> &AccountService<R> {
        &self.account
    }

    /// Follows a navigation until it settles on a screen.
    ///
    /// The handoff check comes first; protected views go through the
    /// guard. Every redirect leads to the landing page or to the dashboard
    /// with a freshly resolved session, so this terminates.
    pub async fn navigate(&self, navigation: Navigation) -> Screen {
        let mut navigation = navigation;
        loop {
            match Router::route(&navigation) {
                Route::AuthCallback => match self.resolver.resolve(&navigation).await {
                    HandoffOutcome::AlreadyClaimed => return Screen::Loading,
                    HandoffOutcome::Authenticated(next) => navigation = next,
                    HandoffOutcome::Rejected { to, .. } => navigation = to,
                },
                Route::Public(view) => return Screen::Public(view),
                Route::Protected(view) => match self.guard.check(&navigation).await {
                    GuardDecision::Admit(session) => return Screen::Protected { view, session },
                    GuardDecision::Redirect { to, .. } => navigation = to,
                },
            }
        }
    }

    /// Resolves a login callback directly, keeping the failure for the host.
    pub async fn resolve_handoff(&self, navigation: &Navigation) -> HandoffOutcome {
        self.resolver.resolve(navigation).await
    }

    /// Removes an image locally (no server-side deletion).
    pub fn remove_image(&self, id: LocalId) -> Option<ManagedImage> {
        let removed = self.registry.remove(id)?;
        self.events.emit(ClientEvent::ImageRemoved { local_id: id });
        Some(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::create_event_channel;
    use crate::images::ImageStatus;
    use crate::test_support::{FakeRemote, jpeg_upload, snapshot};

    fn app() -> PhotoPrep<FakeRemote> {
        PhotoPrep::new(FakeRemote::new(), &Config::default(), EventSender::disabled())
    }

    #[tokio::test]
    async fn test_handoff_lands_on_dashboard_without_validation() {
        let app = app();
        app.remote().set_exchange(Ok(snapshot("free", 3)));

        let screen = app
            .navigate(Navigation::parse("/#session_id=abc").unwrap())
            .await;

        let Screen::Protected { view, session } = screen else {
            panic!("expected the dashboard");
        };
        assert_eq!(view, View::Dashboard);
        assert_eq!(session.credits_remaining, 3);
        assert_eq!(app.remote().count("exchange_handoff"), 1);
        assert_eq!(app.remote().count("validate"), 0);
    }

    #[tokio::test]
    async fn test_duplicate_callback_is_a_noop() {
        let app = app();
        app.remote().set_exchange(Ok(snapshot("free", 3)));
        app.remote().hold("exchange_handoff");
        let nav = Navigation::parse("/#session_id=abc").unwrap();

        let (first, second) = tokio::join!(app.navigate(nav.clone()), async {
            let screen = app.navigate(nav.clone()).await;
            app.remote().release();
            screen
        });

        assert!(matches!(first, Screen::Protected { .. }));
        assert_eq!(second, Screen::Loading);
        assert_eq!(app.remote().count("exchange_handoff"), 1);
    }

    #[tokio::test]
    async fn test_failed_handoff_lands_on_public_page() {
        let app = app();
        let screen = app
            .navigate(Navigation::parse("/#session_id=bad").unwrap())
            .await;
        assert_eq!(screen, Screen::Public(View::Landing));
        assert!(!app.session().is_authenticated());
    }

    #[tokio::test]
    async fn test_resolve_handoff_reports_rejection() {
        let app = app();
        let outcome = app
            .resolve_handoff(&Navigation::parse("/#session_id=bad").unwrap())
            .await;
        assert!(matches!(
            outcome,
            HandoffOutcome::Rejected {
                error: crate::error::ClientError::AuthExchangeFailed(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_protected_view_without_session_redirects() {
        let app = app();
        let screen = app.navigate(Navigation::to(View::History)).await;
        assert_eq!(screen, Screen::Public(View::Landing));
        assert_eq!(app.remote().count("validate"), 1);
    }

    #[tokio::test]
    async fn test_public_views_make_no_requests() {
        let app = app();
        let screen = app.navigate(Navigation::to(View::Pricing)).await;
        assert_eq!(screen, Screen::Public(View::Pricing));
        assert_eq!(app.remote().count("validate"), 0);
    }

    #[tokio::test]
    async fn test_upload_process_remove_flow() {
        let (tx, mut rx) = create_event_channel();
        let app = PhotoPrep::new(FakeRemote::new(), &Config::default(), EventSender::new(tx));
        app.remote().set_validate(Ok(snapshot("free", 1)));
        app.navigate(Navigation::to(View::Dashboard)).await;

        let image = app.uploader().upload(jpeg_upload("a.jpg")).await.unwrap();
        app.coordinator().process(image.local_id()).await.unwrap();
        assert_eq!(
            app.registry().get(image.local_id()).unwrap().status(),
            ImageStatus::Completed
        );
        assert_eq!(app.session().credits_remaining(), Some(0));

        // Out of credits on a gated plan: the next upload is refused locally.
        assert!(app.uploader().upload(jpeg_upload("b.jpg")).await.is_err());
        assert_eq!(app.remote().count("upload"), 1);

        assert!(app.registry().select(image.local_id()));
        assert!(app.remove_image(image.local_id()).is_some());
        assert!(app.registry().selected().is_none());
        assert!(app.remove_image(image.local_id()).is_none());

        let mut saw_removed = false;
        while let Ok(event) = rx.try_recv() {
            saw_removed |= matches!(*event, ClientEvent::ImageRemoved { .. });
        }
        assert!(saw_removed);
    }
}
