//! Account operations: profile refresh, plan changes and logout.

use std::rc::Rc;

use crate::config::PlanCatalog;
use crate::error::ClientError;
use crate::events::{ClientEvent, EventSender};
use crate::images::ImageRegistry;
use crate::navigation::{Navigation, View};
use crate::remote::{PlanChange, ProfileSnapshot, RemoteAuthority, credits_from_wire};
use crate::session::{Session, SessionStore};

pub struct AccountService<R> {
    remote: Rc<R>,
    session: SessionStore,
    registry: ImageRegistry,
    plans: PlanCatalog,
    events: EventSender,
}

impl<R: RemoteAuthority> AccountService<R> {
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
            events,
        }
    }

    /// Fetches the profile; its session part replaces the stored snapshot.
    ///
    /// # Errors
    /// `ProfileFailed` if the request fails.
    pub async fn profile(&self) -> Result<ProfileSnapshot, ClientError> {
        match self.remote.profile().await {
            Ok(profile) => {
                self.session.set(profile.session.clone().into_session());
                Ok(profile)
            }
            Err(err) => Err(self.report("profile", ClientError::ProfileFailed(err))),
        }
    }

    /// Changes the subscription plan.
    ///
    /// Credits in the response are authoritative. Without them the balance
    /// resets to the new plan's monthly allowance, or stays as it was when
    /// the plan has none.
    ///
    /// # Errors
    /// `Unauthenticated` or `PlanChangeFailed`.
    pub async fn change_plan(&self, change: PlanChange) -> Result<Session, ClientError> {
        if !self.session.is_authenticated() {
            return Err(ClientError::Unauthenticated);
        }

        let receipt = match self.remote.change_plan(&change).await {
            Ok(receipt) => receipt,
            Err(err) => return Err(self.report("plan", ClientError::PlanChangeFailed(err))),
        };

        // Logged out while the request was pending.
        let Some(mut session) = self.session.get() else {
            return Err(ClientError::Unauthenticated);
        };
        session.credits_remaining = match receipt.credits {
            Some(credits) => credits_from_wire(credits),
            None => self
                .plans
                .monthly_credits(&receipt.plan)
                .unwrap_or(session.credits_remaining),
        };
        session.plan = receipt.plan;
        self.session.set(session.clone());

        tracing::info!(plan = %session.plan, credits = session.credits_remaining, "plan changed");
        self.events.emit(ClientEvent::PlanChanged {
            plan: session.plan.clone(),
            credits: session.credits_remaining,
        });
        Ok(session)
    }

    /// Ends the session. The remote call is best effort: local state is
    /// always cleared and the user always lands on the public page.
    pub async fn logout(&self) -> Navigation {
        if let Err(err) = self.remote.logout().await {
            self.report("logout", ClientError::LogoutFailed(err));
        }

        self.session.clear();
        self.registry.clear();
        tracing::info!("logged out");
        self.events.emit(ClientEvent::LoggedOut);
        Navigation::to(View::Landing)
    }

    fn report(&self, operation: &str, error: ClientError) -> ClientError {
        tracing::warn!("{operation} failed: {error}");
        self.events.emit(ClientEvent::RequestFailed {
            operation: operation.to_string(),
            message: error.to_string(),
        });
        error
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::events::create_event_channel;
    use crate::images::RemoteId;
    use crate::remote::PlanReceipt;
    use crate::session::PlanId;
    use crate::test_support::{FakeRemote, server_error, session_with, snapshot};

    fn service(remote: &Rc<FakeRemote>, session: &SessionStore) -> AccountService<FakeRemote> {
        AccountService::new(
            Rc::clone(remote),
            session.clone(),
            ImageRegistry::new(),
            PlanCatalog::default(),
            EventSender::disabled(),
        )
    }

    #[tokio::test]
    async fn test_profile_replaces_session() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_profile(Ok(ProfileSnapshot {
            session: snapshot("starter", 17),
            total_images: 12,
            images_this_month: 3,
        }));
        let session = SessionStore::new();
        session.set(session_with("free", 1));

        let profile = service(&remote, &session).profile().await.unwrap();

        assert_eq!(profile.total_images, 12);
        assert_eq!(session.plan(), Some(PlanId::new("starter")));
        assert_eq!(session.credits_remaining(), Some(17));
    }

    #[tokio::test]
    async fn test_profile_failure_keeps_session() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_profile(Err(server_error(500, "boom")));
        let session = SessionStore::new();
        session.set(session_with("free", 1));

        let err = service(&remote, &session).profile().await.unwrap_err();

        assert!(matches!(err, ClientError::ProfileFailed(_)));
        assert_eq!(session.credits_remaining(), Some(1));
    }

    #[tokio::test]
    async fn test_upgrade_assigns_response_credits() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_plan(Ok(PlanReceipt {
            plan: PlanId::new("pro"),
            credits: Some(-1),
            message: Some("Upgraded".to_string()),
        }));
        let session = SessionStore::new();
        session.set(session_with("free", 2));

        let updated = service(&remote, &session)
            .change_plan(PlanChange::Upgrade(PlanId::new("pro")))
            .await
            .unwrap();

        assert_eq!(updated.plan, PlanId::new("pro"));
        assert_eq!(updated.credits_remaining, 0);
        assert_eq!(session.get(), Some(updated));
        assert_eq!(
            remote.plan_changes(),
            vec![PlanChange::Upgrade(PlanId::new("pro"))]
        );
    }

    #[tokio::test]
    async fn test_downgrade_without_credits_uses_plan_allowance() {
        let remote = Rc::new(FakeRemote::new());
        let session = SessionStore::new();
        session.set(session_with("pro", 0));

        let updated = service(&remote, &session)
            .change_plan(PlanChange::Downgrade)
            .await
            .unwrap();

        assert_eq!(updated.plan, PlanId::new("free"));
        assert_eq!(updated.credits_remaining, 3);
    }

    #[tokio::test]
    async fn test_failed_plan_change_leaves_session() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_plan(Err(server_error(400, "Invalid plan")));
        let session = SessionStore::new();
        session.set(session_with("free", 2));

        let err = service(&remote, &session)
            .change_plan(PlanChange::Upgrade(PlanId::new("gold")))
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::PlanChangeFailed(_)));
        assert_eq!(session.get(), Some(session_with("free", 2)));
    }

    #[tokio::test]
    async fn test_plan_change_requires_session() {
        let remote = Rc::new(FakeRemote::new());
        let err = service(&remote, &SessionStore::new())
            .change_plan(PlanChange::Downgrade)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Unauthenticated));
        assert_eq!(remote.count("change_plan"), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_state_even_when_remote_fails() {
        let remote = Rc::new(FakeRemote::new());
        remote.set_logout(Err(crate::error::RemoteError::transport("offline")));
        let session = SessionStore::new();
        session.set(session_with("free", 2));
        let registry = ImageRegistry::new();
        registry.register(
            RemoteId::new("img_1"),
            "a.jpg",
            Bytes::from_static(b"jpeg"),
            "/o",
        );
        let (tx, mut rx) = create_event_channel();
        let service = AccountService::new(
            Rc::clone(&remote),
            session.clone(),
            registry.clone(),
            PlanCatalog::default(),
            EventSender::new(tx),
        );

        let to = service.logout().await;

        assert_eq!(to.path(), "/");
        assert!(!session.is_authenticated());
        assert!(registry.is_empty());
        assert!(matches!(
            &*rx.try_recv().unwrap(),
            ClientEvent::RequestFailed { operation, .. } if operation == "logout"
        ));
        assert_eq!(*rx.try_recv().unwrap(), ClientEvent::LoggedOut);
    }
}
