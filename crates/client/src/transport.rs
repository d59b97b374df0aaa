//! Auth-aware request layer contract.
//!
//! Feature services issue their calls through [`AuthenticatedClient`],
//! which enforces the session contract: fetch the current credential
//! before every call, abort when it is absent, and re-enter the login flow
//! on an authorization-denied response instead of handing the failure back
//! to application code.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::session::SessionManager;
use ssokit_common::{Error, Result};

/// HTTP verbs the feature services use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

/// An outbound API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<serde_json::Value>,
    /// Bearer credential attached by the auth-aware layer
    pub bearer: Option<String>,
}

/// An API response, reduced to what the auth layer needs to see
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Transport executing a single request. Implemented by the application's
/// HTTP stack; the auth layer stays agnostic of it.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// Transport wrapper implementing the auth-aware request contract
pub struct AuthenticatedClient<T> {
    transport: T,
    session: Arc<SessionManager>,
}

impl<T: HttpTransport> AuthenticatedClient<T> {
    pub fn new(transport: T, session: Arc<SessionManager>) -> Self {
        Self { transport, session }
    }

    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::Get, url, None).await
    }

    pub async fn put(&self, url: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(Method::Put, url, Some(body)).await
    }

    pub async fn post(&self, url: &str, body: serde_json::Value) -> Result<ApiResponse> {
        self.send(Method::Post, url, Some(body)).await
    }

    pub async fn delete(&self, url: &str) -> Result<ApiResponse> {
        self.send(Method::Delete, url, None).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse> {
        // An absent credential means the session could not produce a valid
        // token; the request must not go out.
        let bearer = match self.session.credential().await {
            Some(token) => token,
            None => return Err(Error::Unauthenticated),
        };

        let response = self
            .transport
            .execute(ApiRequest {
                method,
                url: url.to_string(),
                body,
                bearer: Some(bearer),
            })
            .await?;

        if response.is_unauthorized() {
            warn!("Remote rejected credential, re-entering login flow");
            self.session.login(None).await?;
            return Err(Error::Unauthenticated);
        }
        Ok(response)
    }
}
