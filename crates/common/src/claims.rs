//! Access-token claims decoding.
//!
//! The provider's access token carries the identity claims and two
//! independently scoped role lists: roles granted under this application's
//! client registration (`resource_access`) and roles granted at the realm
//! level (`realm_access`). Both scopes are equally authoritative.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;
use crate::types::User;

/// A `{ "roles": [...] }` claim object
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolesClaim {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims consumed from the decoded access token
#[derive(Debug, Clone, Deserialize)]
pub struct AccessClaims {
    pub sub: String,
    #[serde(default)]
    pub preferred_username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// Expiry as unix seconds, stamped by the provider
    pub exp: i64,
    /// Per-client role grants, keyed by client ID
    #[serde(default)]
    pub resource_access: HashMap<String, RolesClaim>,
    /// Realm-level role grants
    #[serde(default)]
    pub realm_access: RolesClaim,
}

impl AccessClaims {
    /// Derive the user snapshot for the given client registration.
    ///
    /// The role set is the deduplicated union of the client-scoped and
    /// realm-scoped grants; a role present in either scope counts.
    pub fn user_for_client(&self, client_id: &str) -> User {
        let mut roles: BTreeSet<String> = self
            .resource_access
            .get(client_id)
            .map(|c| c.roles.iter().cloned().collect())
            .unwrap_or_default();
        roles.extend(self.realm_access.roles.iter().cloned());

        User {
            id: self.sub.clone(),
            username: self.preferred_username.clone(),
            email: self.email.clone(),
            first_name: self.given_name.clone(),
            last_name: self.family_name.clone(),
            roles,
        }
    }
}

/// Decode the claims of a provider-issued access token.
///
/// Signature validation is disabled: the token was received directly from
/// the provider's token endpoint over TLS and is only inspected locally,
/// never accepted from an untrusted party. Expiry is checked by the session
/// refresh logic, not here.
pub fn decode_access_claims(token: &str) -> Result<AccessClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<AccessClaims>(
        token,
        &DecodingKey::from_secret(&[]),
        &validation,
    )?;
    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_encoding::BASE64URL_NOPAD;

    fn unsigned_token(claims: serde_json::Value) -> String {
        let header = BASE64URL_NOPAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let payload = BASE64URL_NOPAD.encode(claims.to_string().as_bytes());
        format!("{}.{}.sig", header, payload)
    }

    #[test]
    fn test_role_scopes_union_without_duplicates() {
        let token = unsigned_token(serde_json::json!({
            "sub": "u-1",
            "preferred_username": "jdoe",
            "email": "jdoe@example.com",
            "given_name": "Jane",
            "family_name": "Doe",
            "exp": 2_000_000_000u64,
            "resource_access": { "staff-web": { "roles": ["a", "b"] } },
            "realm_access": { "roles": ["b", "c"] },
        }));

        let claims = decode_access_claims(&token).unwrap();
        let user = claims.user_for_client("staff-web");

        assert_eq!(user.roles.len(), 3);
        assert!(user.has_role("a"));
        assert!(user.has_role("b"));
        assert!(user.has_role("c"));
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.first_name, "Jane");
        assert_eq!(user.last_name, "Doe");
    }

    #[test]
    fn test_missing_role_claims_default_empty() {
        let token = unsigned_token(serde_json::json!({
            "sub": "u-2",
            "exp": 2_000_000_000u64,
        }));

        let claims = decode_access_claims(&token).unwrap();
        let user = claims.user_for_client("staff-web");
        assert!(user.roles.is_empty());
        assert_eq!(user.username, "");
    }

    #[test]
    fn test_other_clients_grants_are_ignored() {
        let token = unsigned_token(serde_json::json!({
            "sub": "u-3",
            "exp": 2_000_000_000u64,
            "resource_access": { "other-app": { "roles": ["admin"] } },
        }));

        let claims = decode_access_claims(&token).unwrap();
        let user = claims.user_for_client("staff-web");
        assert!(!user.has_role("admin"));
    }

    #[test]
    fn test_expired_token_still_decodes() {
        // Expiry is the refresh logic's concern; decoding must not reject.
        let token = unsigned_token(serde_json::json!({
            "sub": "u-4",
            "exp": 1_000u64,
        }));
        assert!(decode_access_claims(&token).is_ok());
    }
}
