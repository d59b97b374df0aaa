//! SSO session subsystem for a single-page frontend.
//!
//! Establishes an OIDC/PKCE session against an external identity provider,
//! derives the caller's identity and role set, gates navigation into
//! protected areas, and keeps the bearer token fresh for outbound requests.
//!
//! The moving parts:
//! - [`SessionManager`] owns the single session state bundle and drives
//!   init / login / logout / token refresh.
//! - [`AuthGuard`] and [`RoleGuard`] turn the settled session into
//!   allow/deny/redirect navigation decisions.
//! - [`Browser`] and [`IdentityProvider`] are the seams to the host
//!   environment and the provider; [`OidcClient`] is the stock provider
//!   implementation.
//! - [`AuthenticatedClient`] shows the contract every outbound request
//!   layer must follow: fetch the credential first, abort when absent,
//!   re-enter login on an authorization-denied response.

pub mod browser;
pub mod guard;
pub mod provider;
pub mod session;
pub mod transport;

pub use browser::Browser;
pub use guard::{AuthGuard, Decision, RoleGuard};
pub use provider::{AuthorizationRedirect, IdentityProvider, OidcClient};
pub use session::{SessionManager, Snapshot};
pub use transport::{ApiRequest, ApiResponse, AuthenticatedClient, HttpTransport, Method};
