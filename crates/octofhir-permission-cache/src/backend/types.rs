//! Strongly typed directory backend responses.

use serde::{Deserialize, Serialize};

/// Identity of the actor the backend session is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorIdentity {
    /// Numeric principal ID on the directory backend.
    pub id: u64,

    /// Login name (claims-encoded account name on most directories).
    pub login_name: String,

    /// Primary email address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl ActorIdentity {
    /// Creates an identity with only the required fields set.
    #[must_use]
    pub fn new(id: u64, login_name: impl Into<String>) -> Self {
        Self {
            id,
            login_name: login_name.into(),
            email: None,
            display_name: None,
        }
    }

    /// Set the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set the display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }
}

/// A directory group the actor belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    /// Numeric group ID.
    pub id: u64,

    /// Group title as shown by the directory ("Site Owners").
    pub title: String,
}

impl GroupInfo {
    /// Creates a group.
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}

/// Whether a role assignment targets a single user or a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    User,
    Group,
}

/// The principal a role assignment is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: u64,
    pub title: String,
    pub kind: PrincipalKind,
}

/// One role assignment on a resource item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Who the roles are assigned to.
    pub principal: Principal,

    /// Role definition names ("Read", "Contribute", "Full Control").
    pub role_definitions: Vec<String>,
}

impl RoleAssignment {
    /// Creates an assignment for a single user.
    #[must_use]
    pub fn user(id: u64, title: impl Into<String>, roles: &[&str]) -> Self {
        Self::new(id, title, PrincipalKind::User, roles)
    }

    /// Creates an assignment for a group.
    #[must_use]
    pub fn group(id: u64, title: impl Into<String>, roles: &[&str]) -> Self {
        Self::new(id, title, PrincipalKind::Group, roles)
    }

    fn new(id: u64, title: impl Into<String>, kind: PrincipalKind, roles: &[&str]) -> Self {
        Self {
            principal: Principal {
                id,
                title: title.into(),
                kind,
            },
            role_definitions: roles.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}
