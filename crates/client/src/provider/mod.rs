//! Identity-provider abstraction.
//!
//! The session manager drives the authorization-code flow through this
//! trait; [`OidcClient`] is the stock implementation against a Keycloak-
//! style issuer.

use async_trait::async_trait;

use ssokit_common::{Result, TokenSet};

mod oidc;

pub use oidc::OidcClient;

/// Everything needed to send the browser into the provider's login page
#[derive(Debug, Clone)]
pub struct AuthorizationRedirect {
    /// Fully built authorization URL
    pub url: String,
    /// Opaque request state echoed back in the callback
    pub state: String,
    /// PKCE code verifier; must survive the redirect and be presented at
    /// the code exchange
    pub pkce_verifier: String,
}

/// Operations of the external identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Build the authorization URL for a login redirect
    async fn authorization_url(&self, redirect_uri: &str) -> Result<AuthorizationRedirect>;

    /// Exchange a single-use authorization code for tokens
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: &str,
    ) -> Result<TokenSet>;

    /// Refresh the token set in place
    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet>;

    /// Build the RP-initiated logout URL
    async fn end_session_url(
        &self,
        post_logout_redirect: &str,
        id_token_hint: Option<&str>,
    ) -> Result<String>;
}
