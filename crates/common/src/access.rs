//! Capability derivation from the session role set.
//!
//! This is the single point of truth for authorization predicates: guards
//! and feature-level visibility decisions consume these, nothing re-derives
//! roles on its own.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Role granting full administrative access
pub const ROLE_ADMIN: &str = "admin";
/// Role allowed to manage job postings
pub const ROLE_JOB_MANAGER: &str = "job_manager";
/// Role held by professors
pub const ROLE_PROFESSOR: &str = "professor";
/// Role held by regular employees
pub const ROLE_EMPLOYEE: &str = "employee";

/// Named capabilities derived from a role set.
///
/// Computed once per user snapshot; a fresh snapshot (login, refresh)
/// recomputes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub admin: bool,
    pub job_manager: bool,
    pub professor: bool,
    pub employee: bool,
}

impl Capabilities {
    pub fn from_roles(roles: &BTreeSet<String>) -> Self {
        Self {
            admin: roles.contains(ROLE_ADMIN),
            job_manager: roles.contains(ROLE_JOB_MANAGER),
            professor: roles.contains(ROLE_PROFESSOR),
            employee: roles.contains(ROLE_EMPLOYEE),
        }
    }
}

/// True when any required role is present (logical OR).
pub fn has_any_role(roles: &BTreeSet<String>, required: &BTreeSet<String>) -> bool {
    required.iter().any(|r| roles.contains(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_capabilities_from_roles() {
        let caps = Capabilities::from_roles(&roles(&["employee", "job_manager"]));
        assert!(caps.job_manager);
        assert!(caps.employee);
        assert!(!caps.admin);
        assert!(!caps.professor);

        let none = Capabilities::from_roles(&BTreeSet::new());
        assert_eq!(none, Capabilities::default());
    }

    #[test]
    fn test_any_of_semantics() {
        let required = roles(&["admin", "job_manager"]);
        assert!(has_any_role(&roles(&["employee", "admin"]), &required));
        assert!(!has_any_role(&roles(&["employee"]), &required));
        assert!(!has_any_role(&BTreeSet::new(), &required));
    }
}
