//! Route guards.
//!
//! Guards gate navigation into protected areas. Each evaluation waits for
//! the session to settle, takes one snapshot, and resolves to an explicit
//! decision; no guard path returns an error.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::warn;

use crate::session::SessionManager;
use ssokit_common::access;

/// Outcome of a guard evaluation. `Redirect` carries the route the router
/// should navigate to instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
    Redirect(String),
}

/// Plain authentication gate.
///
/// Allows authenticated navigations. An unauthenticated navigation
/// normally redirects the browser into the login flow with the requested
/// URL as the post-login destination — except right after a failed
/// provider callback, where it redirects to the home route instead so a
/// broken login cannot loop.
pub struct AuthGuard {
    session: Arc<SessionManager>,
}

impl AuthGuard {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn check(&self, requested_url: &str) -> Decision {
        // Settles the session first; repeated checks hit the cached result.
        self.session.init().await;
        let snapshot = self.session.snapshot().await;

        if snapshot.user.is_some() {
            return Decision::Allow;
        }

        if snapshot.callback_failed {
            return Decision::Redirect(self.session.config().routes.home.clone());
        }

        if let Err(e) = self.session.login(Some(requested_url)).await {
            warn!("Login redirect from guard failed: {}", e);
            return Decision::Redirect(self.session.config().routes.home.clone());
        }
        Decision::Deny
    }
}

/// Role-restricted gate. Any one matching role suffices.
pub struct RoleGuard {
    session: Arc<SessionManager>,
    required: BTreeSet<String>,
}

impl RoleGuard {
    pub fn new(session: Arc<SessionManager>, required: impl IntoIterator<Item = String>) -> Self {
        Self {
            session,
            required: required.into_iter().collect(),
        }
    }

    pub async fn check(&self) -> Decision {
        self.session.init().await;
        let snapshot = self.session.snapshot().await;

        let user = match snapshot.user {
            Some(user) => user,
            None => return Decision::Redirect(self.session.config().routes.home.clone()),
        };

        if access::has_any_role(&user.roles, &self.required) {
            Decision::Allow
        } else {
            Decision::Redirect(self.session.config().routes.unauthorized.clone())
        }
    }
}
