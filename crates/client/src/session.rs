//! Session manager.
//!
//! Owns the single session state bundle (authenticated user, token set,
//! initialization and callback-failure flags) and coordinates the
//! handshake, login/logout navigation and token refresh. All consumers
//! read settled snapshots; nothing else mutates session state.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::{self, Browser};
use crate::provider::IdentityProvider;
use ssokit_common::claims::decode_access_claims;
use ssokit_common::{Capabilities, Error, Result, SsoConfig, TokenSet, User};

/// Stash key carrying the PKCE verifier across the login redirect
const PKCE_VERIFIER_KEY: &str = "ssokit.pkce_verifier";
/// Stash key carrying the request state across the login redirect
const LOGIN_STATE_KEY: &str = "ssokit.login_state";

/// Authenticated portion of the session. Holding user, capabilities and
/// tokens together makes "user present iff authenticated" structural.
struct AuthState {
    user: User,
    capabilities: Capabilities,
    tokens: TokenSet,
}

#[derive(Default)]
struct SessionState {
    /// Latched once the first handshake settles; reset only by a fresh
    /// init cycle triggered by a new callback
    initialized: bool,
    /// True iff the most recent init followed a provider callback that did
    /// not yield authentication
    callback_failed: bool,
    auth: Option<AuthState>,
}

/// One consistent read of the session state
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub authenticated: bool,
    pub user: Option<User>,
    pub capabilities: Capabilities,
    pub initialized: bool,
    pub callback_failed: bool,
}

/// How an `init()` caller enters the handshake cycle
enum InitEntry {
    /// Already settled, nothing to do
    Done(bool),
    /// A handshake is in flight; share its outcome
    Wait(watch::Receiver<bool>),
    /// This caller runs the handshake
    Run { had_callback: bool },
}

/// The session manager. One instance per application, created at bootstrap
/// and handed to consumers explicitly.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    browser: Arc<dyn Browser>,
    config: SsoConfig,
    state: RwLock<SessionState>,
    /// True while a handshake is settling; guards wait on this
    loading_tx: watch::Sender<bool>,
    /// Elects exactly one handshake runner among concurrent `init` callers
    init_gate: Mutex<()>,
    /// Serializes token refreshes so a burst of requests refreshes once
    refresh_gate: Mutex<()>,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl SessionManager {
    pub fn new(
        config: SsoConfig,
        provider: Arc<dyn IdentityProvider>,
        browser: Arc<dyn Browser>,
    ) -> Self {
        let (loading_tx, _) = watch::channel(false);
        Self {
            provider,
            browser,
            config,
            state: RwLock::new(SessionState::default()),
            loading_tx,
            init_gate: Mutex::new(()),
            refresh_gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SsoConfig {
        &self.config
    }

    /// Initialize the session, returning whether it is authenticated.
    ///
    /// Concurrent callers share a single handshake: while one is in flight
    /// every additional call waits for the same outcome instead of starting
    /// a second handshake (a second run would consume the single-use
    /// authorization code). Once settled, repeated calls without callback
    /// markers in the URL short-circuit to the cached result with no
    /// network activity.
    pub async fn init(&self) -> bool {
        let entry = {
            let _gate = self.init_gate.lock().await;
            if *self.loading_tx.borrow() {
                InitEntry::Wait(self.loading_tx.subscribe())
            } else {
                let had_callback = browser::has_callback_markers(&self.browser.current_url());
                let state = self.state.read().await;
                if state.initialized && !had_callback {
                    InitEntry::Done(state.auth.is_some())
                } else {
                    // Claim the handshake before releasing the gate so
                    // concurrent callers see it in flight.
                    self.loading_tx.send_replace(true);
                    InitEntry::Run { had_callback }
                }
            }
        };

        match entry {
            InitEntry::Done(authenticated) => authenticated,
            InitEntry::Wait(rx) => {
                wait_until_settled(rx).await;
                self.state.read().await.auth.is_some()
            }
            InitEntry::Run { had_callback } => self.run_handshake(had_callback).await,
        }
    }

    /// Wait until no handshake is settling. Guards call this before taking
    /// their one snapshot.
    pub async fn settled(&self) {
        wait_until_settled(self.loading_tx.subscribe()).await;
    }

    async fn run_handshake(&self, had_callback: bool) -> bool {
        // Capture the URL before contacting the provider; the handshake
        // may consume or alter it.
        let url = self.browser.current_url();

        let outcome = if had_callback {
            self.complete_callback(&url).await
        } else {
            // No callback markers: nothing to exchange, settle anonymous.
            Ok(None)
        };

        // Strip the callback markers on every outcome, including failure,
        // so back/refresh cannot replay a consumed authorization code and
        // loop the redirect.
        if had_callback {
            self.browser.replace_url(&browser::stripped(&url));
        }

        let auth = match outcome {
            Ok(Some(tokens)) => match self.auth_state_from(tokens) {
                Ok(auth) => Some(auth),
                Err(e) => {
                    warn!("Failed to derive user from access token: {}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("SSO handshake failed: {}", e);
                None
            }
        };
        let authenticated = auth.is_some();

        // Write the whole bundle before resuming any waiter, so every
        // reader observes one consistent snapshot.
        {
            let mut state = self.state.write().await;
            state.auth = auth;
            state.initialized = true;
            state.callback_failed = had_callback && !authenticated;
        }
        self.loading_tx.send_replace(false);

        if authenticated {
            info!("SSO session established");
        } else if had_callback {
            warn!("Provider callback did not yield authentication");
        }
        authenticated
    }

    /// Complete an authorization-code callback: validate the echoed state
    /// against the stashed one and exchange the code.
    async fn complete_callback(&self, url: &Url) -> Result<Option<TokenSet>> {
        let params = browser::parse_callback(url);
        if let Some(error) = params.error {
            return Err(Error::Callback(error));
        }
        let code = match params.code {
            Some(code) => code,
            None => return Ok(None),
        };

        let verifier = self
            .browser
            .take_stash(PKCE_VERIFIER_KEY)
            .ok_or(Error::MissingLoginState)?;
        let expected_state = self
            .browser
            .take_stash(LOGIN_STATE_KEY)
            .ok_or(Error::MissingLoginState)?;
        if params.state.as_deref() != Some(expected_state.as_str()) {
            return Err(Error::StateMismatch);
        }

        // The exchange presents the same redirect URI the authorize
        // request used: the origin plus the callback path.
        let redirect_uri = format!("{}{}", self.browser.origin(), url.path());
        debug!("Exchanging authorization code");
        let tokens = self
            .provider
            .exchange_code(&code, &redirect_uri, &verifier)
            .await?;
        Ok(Some(tokens))
    }

    fn auth_state_from(&self, tokens: TokenSet) -> Result<AuthState> {
        let claims = decode_access_claims(&tokens.access_token)?;
        let user = claims.user_for_client(&self.config.client_id);
        let capabilities = Capabilities::from_roles(&user.roles);
        Ok(AuthState {
            user,
            capabilities,
            tokens,
        })
    }

    /// Send the browser to the provider's login page.
    ///
    /// Terminal for the current page lifetime on the success path: the
    /// provider navigates away and comes back via the redirect URI
    /// (`return_url`, defaulting to the landing route).
    pub async fn login(&self, return_url: Option<&str>) -> Result<()> {
        if !self.state.read().await.initialized {
            self.init().await;
        }

        let destination = return_url.unwrap_or(&self.config.routes.landing);
        let redirect_uri = format!("{}{}", self.browser.origin(), destination);
        let redirect = self.provider.authorization_url(&redirect_uri).await?;

        self.browser.stash(PKCE_VERIFIER_KEY, &redirect.pkce_verifier);
        self.browser.stash(LOGIN_STATE_KEY, &redirect.state);
        info!("Redirecting to identity provider login");
        self.browser.navigate(&redirect.url);
        Ok(())
    }

    /// End the session at the provider and navigate away.
    ///
    /// Clears the authenticated state; `initialized`/`callback_failed` are
    /// left to be re-evaluated on the next load.
    pub async fn logout(&self) -> Result<()> {
        let id_token = {
            let mut state = self.state.write().await;
            state.auth.take().and_then(|auth| auth.tokens.id_token)
        };

        let post_logout = format!("{}{}", self.browser.origin(), self.config.routes.home);
        let url = self
            .provider
            .end_session_url(&post_logout, id_token.as_deref())
            .await?;
        info!("Ending SSO session");
        self.browser.navigate(&url);
        Ok(())
    }

    /// Current bearer credential, refreshed in place when it expires within
    /// the configured margin.
    ///
    /// Returns `None` when there is no session or the refresh fails; in the
    /// failure case the session is treated as expired and a `login()`
    /// redirect is triggered. Callers must not send a request without a
    /// credential.
    pub async fn credential(&self) -> Option<String> {
        enum Need {
            Fresh(String),
            Refresh(Option<String>),
        }

        let _gate = self.refresh_gate.lock().await;
        let need = {
            let state = self.state.read().await;
            let auth = state.auth.as_ref()?;
            if auth
                .tokens
                .expires_within(self.config.refresh_margin_secs, unix_now())
            {
                Need::Refresh(auth.tokens.refresh_token.clone())
            } else {
                Need::Fresh(auth.tokens.access_token.clone())
            }
        };

        match need {
            Need::Fresh(token) => Some(token),
            Need::Refresh(refresh_token) => match self.try_refresh(refresh_token).await {
                Ok(token) => Some(token),
                // The session was ended while the refresh was in flight;
                // there is nothing to re-enter.
                Err(Error::Unauthenticated) => None,
                Err(e) => {
                    warn!("Token refresh failed, treating session as expired: {}", e);
                    if let Err(e) = self.login(None).await {
                        warn!("Login redirect after refresh failure failed: {}", e);
                    }
                    None
                }
            },
        }
    }

    async fn try_refresh(&self, refresh_token: Option<String>) -> Result<String> {
        let refresh_token = refresh_token
            .ok_or_else(|| Error::TokenRefresh("no refresh token held".to_string()))?;
        let tokens = self.provider.refresh(&refresh_token).await?;
        // Re-derive the user snapshot from the fresh token; role grants
        // may have changed since login.
        let auth = self.auth_state_from(tokens)?;
        let access = auth.tokens.access_token.clone();
        let mut state = self.state.write().await;
        // A logout may have cleared the session while the provider call
        // was in flight; installing the fresh tokens then would resurrect
        // a session the user just ended.
        match state.auth.as_mut() {
            Some(slot) => {
                *slot = auth;
                Ok(access)
            }
            None => Err(Error::Unauthenticated),
        }
    }

    /// Hook for the provider's "credential expired" notification: one
    /// best-effort refresh. Failure is swallowed (logged only) because no
    /// specific pending request is being serviced.
    pub async fn handle_token_expired(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        let refresh_token = {
            let state = self.state.read().await;
            match state.auth.as_ref() {
                Some(auth) => auth.tokens.refresh_token.clone(),
                None => return false,
            }
        };
        match self.try_refresh(refresh_token).await {
            Ok(_) => {
                debug!("Access token refreshed in background");
                true
            }
            Err(e) => {
                warn!("Background token refresh failed: {}", e);
                false
            }
        }
    }

    /// Background task that fires `handle_token_expired` when the access
    /// token reaches its expiry.
    ///
    /// Safe to wire at bootstrap, before the first handshake settles:
    /// while there is no authenticated session the task parks on the next
    /// settle instead of exiting. It stops after a failed refresh or when
    /// the manager is dropped.
    pub fn spawn_expiry_watcher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let session = Arc::clone(self);
        let mut loading_rx = self.loading_tx.subscribe();
        tokio::spawn(async move {
            loop {
                let expires_at = {
                    let state = session.state.read().await;
                    state.auth.as_ref().map(|auth| auth.tokens.expires_at)
                };
                match expires_at {
                    Some(expires_at) => {
                        let wait = (expires_at - unix_now()).max(0) as u64;
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        if !session.handle_token_expired().await {
                            break;
                        }
                    }
                    // No session yet (or logged out): wake on the next
                    // settle and look again.
                    None => {
                        if loading_rx.changed().await.is_err() {
                            break;
                        }
                    }
                }
            }
        })
    }

    /// One consistent read of the session state
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.read().await;
        Snapshot {
            authenticated: state.auth.is_some(),
            user: state.auth.as_ref().map(|auth| auth.user.clone()),
            capabilities: state
                .auth
                .as_ref()
                .map(|auth| auth.capabilities)
                .unwrap_or_default(),
            initialized: state.initialized,
            callback_failed: state.callback_failed,
        }
    }

    /// True iff the current user holds `role`. False, not an error, when
    /// unauthenticated.
    pub async fn has_role(&self, role: &str) -> bool {
        let state = self.state.read().await;
        state
            .auth
            .as_ref()
            .map(|auth| auth.user.has_role(role))
            .unwrap_or(false)
    }
}

async fn wait_until_settled(mut rx: watch::Receiver<bool>) {
    while *rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}
