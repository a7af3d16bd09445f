//! Session store: who is logged in and what they may still do.
//!
//! `SessionStore` is a cheap `Clone` handle; every clone sees the same
//! session. The snapshot is replaced as a whole on login/refresh; the
//! credit balance is the only field that is ever updated on its own.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Subscription plan identifier as reported by the remote authority.
///
/// Plans are data, not code: their metering rules come from
/// [`crate::config::PlanCatalog`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PlanId(String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for PlanId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for PlanId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<PlanId> for String {
    fn from(value: PlanId) -> Self {
        value.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Authenticated user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub name: String,
    pub email: String,
    /// Avatar image URL, if the identity provider supplied one.
    pub avatar: Option<String>,
}

/// Snapshot of the logged-in user and their credit budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub plan: PlanId,
    /// Best known remaining credits. Authoritative values from the remote
    /// authority always overwrite local estimates.
    pub credits_remaining: u32,
}

/// Single source of truth for the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Rc<RefCell<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current session, or `None` when unauthenticated.
    pub fn get(&self) -> Option<Session> {
        self.inner.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.borrow().is_some()
    }

    pub fn plan(&self) -> Option<PlanId> {
        self.inner.borrow().as_ref().map(|s| s.plan.clone())
    }

    pub fn credits_remaining(&self) -> Option<u32> {
        self.inner.borrow().as_ref().map(|s| s.credits_remaining)
    }

    /// Replaces the whole session (login, validation, profile refresh).
    pub fn set(&self, session: Session) {
        tracing::debug!(
            user = %session.identity.id,
            plan = %session.plan,
            credits = session.credits_remaining,
            "session replaced"
        );
        *self.inner.borrow_mut() = Some(session);
    }

    /// Applies a provisional credit change, saturating at zero.
    ///
    /// Returns the new balance, or `None` when there is no session.
    pub fn adjust_credits(&self, delta: i64) -> Option<u32> {
        let mut guard = self.inner.borrow_mut();
        let session = guard.as_mut()?;
        let next = (i64::from(session.credits_remaining) + delta).clamp(0, i64::from(u32::MAX));
        session.credits_remaining = u32::try_from(next).unwrap_or(0);
        Some(session.credits_remaining)
    }

    /// Overwrites the balance with an authoritative value from the remote
    /// authority. Assignment, never arithmetic, so repeating it is harmless.
    pub fn assign_credits(&self, credits: u32) -> Option<u32> {
        let mut guard = self.inner.borrow_mut();
        let session = guard.as_mut()?;
        session.credits_remaining = credits;
        Some(credits)
    }

    /// Drops the session (logout, validation failure).
    pub fn clear(&self) -> Option<Session> {
        self.inner.borrow_mut().take()
    }
}
