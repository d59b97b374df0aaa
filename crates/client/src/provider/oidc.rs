//! OIDC client for Keycloak-style identity providers.

use data_encoding::BASE64URL_NOPAD;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;
use tracing::debug;

use super::{AuthorizationRedirect, IdentityProvider};
use async_trait::async_trait;
use ssokit_common::claims::decode_access_claims;
use ssokit_common::{Error, Result, SsoConfig, TokenSet};

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
    refresh_token: Option<String>,
    id_token: Option<String>,
}

/// OIDC discovery document
#[derive(Debug, Clone, Deserialize)]
struct OidcDiscovery {
    authorization_endpoint: String,
    token_endpoint: String,
    #[serde(default)]
    end_session_endpoint: Option<String>,
}

/// OIDC client for a public (PKCE-only) client registration
pub struct OidcClient {
    config: SsoConfig,
    http_client: reqwest::Client,
    /// Discovered endpoints (cached)
    discovery: RwLock<Option<OidcDiscovery>>,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// S256 code challenge for a PKCE verifier (RFC 7636)
fn pkce_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    BASE64URL_NOPAD.encode(&hasher.finalize())
}

impl OidcClient {
    pub fn new(config: SsoConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
            discovery: RwLock::new(None),
        }
    }

    /// Discover OIDC endpoints
    async fn discover(&self) -> Result<OidcDiscovery> {
        // Check cache
        {
            let cached = self.discovery.read().await;
            if let Some(disc) = cached.as_ref() {
                return Ok(disc.clone());
            }
        }

        let discovery_url = format!(
            "{}/.well-known/openid-configuration",
            self.config.issuer()
        );
        debug!("Fetching OIDC discovery document from {}", discovery_url);

        let resp = self.http_client.get(&discovery_url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::Discovery(resp.status().to_string()));
        }
        let disc: OidcDiscovery = resp
            .json()
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;

        // Cache it
        {
            let mut cached = self.discovery.write().await;
            *cached = Some(disc.clone());
        }

        Ok(disc)
    }

    fn build_authorization_url(
        &self,
        authorization_endpoint: &str,
        redirect_uri: &str,
        state: &str,
        nonce: &str,
        challenge: &str,
    ) -> String {
        let scopes = self.config.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&nonce={}&code_challenge={}&code_challenge_method=S256",
            authorization_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state),
            urlencoding::encode(nonce),
            urlencoding::encode(challenge),
        )
    }

    fn build_end_session_url(
        &self,
        endpoint: Option<&str>,
        post_logout_redirect: &str,
        id_token_hint: Option<&str>,
    ) -> Result<String> {
        let endpoint = endpoint
            .ok_or_else(|| Error::Discovery("no end_session_endpoint advertised".to_string()))?;

        let mut url = format!(
            "{}?client_id={}&post_logout_redirect_uri={}",
            endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(post_logout_redirect),
        );
        if let Some(hint) = id_token_hint {
            url.push_str("&id_token_hint=");
            url.push_str(&urlencoding::encode(hint));
        }
        Ok(url)
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenSet> {
        let disc = self.discover().await?;

        let resp = self
            .http_client
            .post(&disc.token_endpoint)
            .form(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::TokenExchange(format!("{}: {}", status, body)));
        }

        let tokens: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::TokenExchange(e.to_string()))?;

        // Prefer the endpoint's lifetime hint; fall back to the exp claim
        let expires_at = match tokens.expires_in {
            Some(secs) => unix_now() + secs as i64,
            None => decode_access_claims(&tokens.access_token)?.exp,
        };

        Ok(TokenSet {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            id_token: tokens.id_token,
            expires_at,
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcClient {
    async fn authorization_url(&self, redirect_uri: &str) -> Result<AuthorizationRedirect> {
        let disc = self.discover().await?;

        let state = uuid::Uuid::new_v4().to_string();
        let nonce = uuid::Uuid::new_v4().to_string();

        // Generate PKCE
        let verifier_bytes: [u8; 32] = rand::random();
        let pkce_verifier = BASE64URL_NOPAD.encode(&verifier_bytes);
        let challenge = pkce_challenge(&pkce_verifier);

        let url = self.build_authorization_url(
            &disc.authorization_endpoint,
            redirect_uri,
            &state,
            &nonce,
            &challenge,
        );

        Ok(AuthorizationRedirect {
            url,
            state,
            pkce_verifier,
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
        pkce_verifier: &str,
    ) -> Result<TokenSet> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.config.client_id),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", pkce_verifier),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.config.client_id),
            ("refresh_token", refresh_token),
        ])
        .await
        .map_err(|e| match e {
            Error::TokenExchange(msg) => Error::TokenRefresh(msg),
            other => other,
        })
    }

    async fn end_session_url(
        &self,
        post_logout_redirect: &str,
        id_token_hint: Option<&str>,
    ) -> Result<String> {
        let disc = self.discover().await?;
        self.build_end_session_url(
            disc.end_session_endpoint.as_deref(),
            post_logout_redirect,
            id_token_hint,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SsoConfig {
        serde_json::from_value(serde_json::json!({
            "provider_url": "https://sso.example.com",
            "realm": "staff",
            "client_id": "staff-web",
        }))
        .unwrap()
    }

    #[test]
    fn test_pkce_challenge_rfc7636_vector() {
        assert_eq!(
            pkce_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url_shape() {
        let client = OidcClient::new(config());
        let url = client.build_authorization_url(
            "https://sso.example.com/realms/staff/protocol/openid-connect/auth",
            "https://app.example.com/positions",
            "st",
            "no",
            "ch",
        );

        assert!(url.starts_with("https://sso.example.com/realms/staff/protocol/openid-connect/auth?"));
        assert!(url.contains("client_id=staff-web"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fpositions"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("scope=openid%20profile%20email"));
        assert!(url.contains("code_challenge=ch"));
        assert!(url.contains("code_challenge_method=S256"));
    }

    #[test]
    fn test_end_session_url_shape() {
        let client = OidcClient::new(config());
        let endpoint = "https://sso.example.com/realms/staff/protocol/openid-connect/logout";

        let url = client
            .build_end_session_url(Some(endpoint), "https://app.example.com/", Some("idt"))
            .unwrap();
        assert!(url.starts_with(
            "https://sso.example.com/realms/staff/protocol/openid-connect/logout?"
        ));
        assert!(url.contains("client_id=staff-web"));
        assert!(url.contains("post_logout_redirect_uri=https%3A%2F%2Fapp.example.com%2F"));
        assert!(url.contains("id_token_hint=idt"));

        let without_hint = client
            .build_end_session_url(Some(endpoint), "https://app.example.com/", None)
            .unwrap();
        assert!(!without_hint.contains("id_token_hint"));
    }

    #[test]
    fn test_end_session_url_requires_advertised_endpoint() {
        let client = OidcClient::new(config());
        let err = client
            .build_end_session_url(None, "https://app.example.com/", None)
            .unwrap_err();
        assert!(matches!(err, Error::Discovery(_)));
    }
}
