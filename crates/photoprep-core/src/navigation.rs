//! Navigation context and routing.
//!
//! A [`Navigation`] is what the host hands the core when the user moves to a
//! location: the path, the URL fragment (which never reaches a server) and,
//! optionally, a session that was just resolved by the login handoff.

use std::fmt;

use url::Url;

use crate::auth::{self, HandoffArtifact};
use crate::error::ClientError;
use crate::session::Session;

/// Views of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    Landing,
    Pricing,
    Dashboard,
    History,
    Profile,
    /// Transient "logging you in" screen shown while a handoff resolves.
    AuthCallback,
}

impl View {
    pub fn path(self) -> &'static str {
        match self {
            // The identity provider redirects back to the site root.
            View::Landing | View::AuthCallback => "/",
            View::Pricing => "/pricing",
            View::Dashboard => "/dashboard",
            View::History => "/history",
            View::Profile => "/profile",
        }
    }

    /// Maps a path to a routable view. Trailing slashes are ignored.
    pub fn from_path(path: &str) -> Option<Self> {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Some(View::Landing),
            "/pricing" => Some(View::Pricing),
            "/dashboard" => Some(View::Dashboard),
            "/history" => Some(View::History),
            "/profile" => Some(View::Profile),
            _ => None,
        }
    }

    /// True for views that require a valid session.
    pub fn is_protected(self) -> bool {
        matches!(self, View::Dashboard | View::History | View::Profile)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Landing => write!(f, "landing"),
            View::Pricing => write!(f, "pricing"),
            View::Dashboard => write!(f, "dashboard"),
            View::History => write!(f, "history"),
            View::Profile => write!(f, "profile"),
            View::AuthCallback => write!(f, "auth_callback"),
        }
    }
}

/// One navigation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    path: String,
    fragment: Option<String>,
    session: Option<Session>,
}

impl Navigation {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            fragment: None,
            session: None,
        }
    }

    /// Navigation to a view's canonical path.
    pub fn to(view: View) -> Self {
        Self::new(view.path())
    }

    /// Parses an absolute URL or a site-relative location such as
    /// `/dashboard#session_id=abc`.
    ///
    /// # Errors
    /// Returns an error if `location` is not a valid URL.
    pub fn parse(location: &str) -> Result<Self, url::ParseError> {
        let url = match Url::parse(location) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Url::parse("http://localhost/")?.join(location)?
            }
            Err(err) => return Err(err),
        };

        Ok(Self {
            path: url.path().to_string(),
            fragment: url.fragment().map(str::to_string),
            session: None,
        })
    }

    #[must_use]
    pub fn with_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Attaches a freshly resolved session so the route guard can skip
    /// re-validation.
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True when the fragment carries a login handoff marker.
    pub fn carries_handoff(&self) -> bool {
        self.fragment().is_some_and(auth::is_handoff_fragment)
    }

    /// Extracts the handoff artifact, if the fragment carries one.
    pub fn handoff(&self) -> Option<Result<HandoffArtifact, ClientError>> {
        self.fragment().and_then(HandoffArtifact::from_fragment)
    }
}

/// Where a navigation leads before any session check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The fragment carries a login handoff; it wins over the path.
    AuthCallback,
    Public(View),
    Protected(View),
}

/// Maps navigations to routes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router;

impl Router {
    /// Synchronous; inspects the fragment before anything else so the
    /// handoff is consumed before a redirect can strip it.
    pub fn route(navigation: &Navigation) -> Route {
        if navigation.carries_handoff() {
            return Route::AuthCallback;
        }

        match View::from_path(navigation.path()) {
            Some(view) if view.is_protected() => Route::Protected(view),
            Some(view) => Route::Public(view),
            None => Route::Public(View::Landing),
        }
    }
}
