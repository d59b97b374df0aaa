//! Core types for the session kit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An authenticated user, as derived from the provider's access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Deduplicated union of client-scoped and realm-scoped roles
    pub roles: BTreeSet<String>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// The token material held for an authenticated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Bearer token attached to outbound requests
    pub access_token: String,
    /// Refresh token, if the provider issued one
    pub refresh_token: Option<String>,
    /// ID token, passed as a hint on logout
    pub id_token: Option<String>,
    /// Access token expiry as unix seconds
    pub expires_at: i64,
}

impl TokenSet {
    /// True when the access token expires within `margin_secs` of `now`.
    ///
    /// `now` is passed in by the caller so the margin check stays testable
    /// against clock skew between client and provider.
    pub fn expires_within(&self, margin_secs: i64, now: i64) -> bool {
        self.expires_at - now < margin_secs
    }
}
