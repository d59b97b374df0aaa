//! Session kit configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the SSO session kit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SsoConfig {
    /// Base URL of the identity provider (e.g., "https://sso.example.com")
    pub provider_url: String,

    /// Provider realm (tenant) name
    pub realm: String,

    /// OAuth2 client ID registered for this application
    pub client_id: String,

    /// Scopes to request
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Minimum remaining token validity before an outbound call, in seconds.
    /// A token closer to expiry than this is refreshed first.
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: i64,

    /// Application routes referenced by the session flow
    #[serde(default)]
    pub routes: RouteConfig,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string(), "email".to_string()]
}

fn default_refresh_margin() -> i64 {
    30
}

impl SsoConfig {
    /// OIDC issuer URL for the configured realm (Keycloak layout).
    pub fn issuer(&self) -> String {
        format!(
            "{}/realms/{}",
            self.provider_url.trim_end_matches('/'),
            self.realm
        )
    }
}

/// Application routes the session flow redirects to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Default authenticated landing route
    #[serde(default = "default_landing")]
    pub landing: String,

    /// Neutral/home route, safe for unauthenticated users
    #[serde(default = "default_home")]
    pub home: String,

    /// Route shown when a role check denies access
    #[serde(default = "default_unauthorized")]
    pub unauthorized: String,
}

fn default_landing() -> String {
    "/positions".to_string()
}

fn default_home() -> String {
    "/".to_string()
}

fn default_unauthorized() -> String {
    "/unauthorized".to_string()
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            landing: default_landing(),
            home: default_home(),
            unauthorized: default_unauthorized(),
        }
    }
}
