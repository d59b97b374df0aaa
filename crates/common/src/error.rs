//! Error types for ssokit

use thiserror::Error;

/// Result type alias using ssokit Error
pub type Result<T> = std::result::Result<T, Error>;

/// ssokit error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Token decode error: {0}")]
    TokenDecode(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Authorization callback error: {0}")]
    Callback(String),

    #[error("Callback state mismatch")]
    StateMismatch,

    #[error("Missing stashed login state for redirect")]
    MissingLoginState,

    #[error("Not authenticated")]
    Unauthenticated,
}
