//! ssokit Common Library
//!
//! Shared types, configuration and claims handling for the ssokit
//! client-side SSO session kit.

pub mod access;
pub mod claims;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use access::Capabilities;
pub use claims::AccessClaims;
pub use config::{RouteConfig, SsoConfig};
pub use error::{Error, Result};
pub use types::{TokenSet, User};

/// ssokit version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
