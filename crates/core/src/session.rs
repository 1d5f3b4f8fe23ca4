//! Session context supplied by the host application.
//!
//! The core does not authenticate anyone. It receives the current user, provider and location
//! from the session collaborator and asks a [`PrivilegeCheck`] whether edits are allowed.

use crate::constants::{LOCATION, PRACTITIONER, SUPERUSER_ROLE};
use serde::Deserialize;

/// The logged-in user, as far as privilege checks are concerned.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct User {
    pub uuid: String,
    #[serde(default)]
    pub privileges: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Who is dispensing, and where.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SessionContext {
    #[serde(default)]
    pub user: Option<User>,
    /// Uuid of the provider record of the current user.
    #[serde(default)]
    pub current_provider: Option<String>,
    /// Uuid of the location the session is logged into.
    #[serde(default)]
    pub session_location: Option<String>,
}

impl SessionContext {
    /// `Practitioner/<uuid>`, or an empty string when the session has no provider.
    pub fn performer_reference(&self) -> String {
        prefixed(PRACTITIONER, self.current_provider.as_deref())
    }

    /// `Location/<uuid>`, or an empty string when the session has no location.
    pub fn location_reference(&self) -> String {
        prefixed(LOCATION, self.session_location.as_deref())
    }
}

fn prefixed(resource_type: &str, uuid: Option<&str>) -> String {
    uuid.map(str::trim)
        .filter(|u| !u.is_empty())
        .map(|u| format!("{resource_type}/{u}"))
        .unwrap_or_default()
}

/// `hasPrivilege(privilegeName, user)` as provided by the session collaborator.
pub trait PrivilegeCheck {
    fn has_privilege(&self, privilege: &str, user: &User) -> bool;
}

/// Checks the privileges listed on the user itself.
///
/// Users holding the superuser role pass every check.
#[derive(Clone, Copy, Debug, Default)]
pub struct UserPrivileges;

impl PrivilegeCheck for UserPrivileges {
    fn has_privilege(&self, privilege: &str, user: &User) -> bool {
        user.roles.iter().any(|r| r == SUPERUSER_ROLE)
            || user.privileges.iter().any(|p| p == privilege)
    }
}

impl<F> PrivilegeCheck for F
where
    F: Fn(&str, &User) -> bool,
{
    fn has_privilege(&self, privilege: &str, user: &User) -> bool {
        self(privilege, user)
    }
}
