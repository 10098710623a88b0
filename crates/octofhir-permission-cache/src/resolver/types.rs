//! Values returned by the permission resolver.

use serde::{Deserialize, Serialize};

use crate::backend::{ActorIdentity, GroupInfo, RoleAssignment};

// =============================================================================
// Permission Result
// =============================================================================

/// Outcome of a permission or role check.
///
/// `granted == false` covers both an actual denial and a backend failure
/// (with `error` set). Callers render both as "no access".
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionResult {
    /// Whether access is granted.
    pub granted: bool,

    /// The permission level that was checked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Roles that matched (role checks only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,

    /// Why the check could not be completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PermissionResult {
    /// A successful check with the given outcome.
    #[must_use]
    pub fn new(granted: bool) -> Self {
        Self {
            granted,
            ..Default::default()
        }
    }

    /// A granted result.
    #[must_use]
    pub fn granted() -> Self {
        Self::new(true)
    }

    /// A denied result.
    #[must_use]
    pub fn denied() -> Self {
        Self::new(false)
    }

    /// A fail-closed result for a check that could not be completed.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            granted: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Attach the checked level.
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Attach the matched roles.
    #[must_use]
    pub fn with_roles(mut self, roles: Vec<String>) -> Self {
        self.roles = Some(roles);
        self
    }

    /// Returns `true` if the check failed rather than completed.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// Actor Profile
// =============================================================================

/// The current actor with group memberships and effective permission levels.
///
/// A profile that could not be loaded is empty with `error` set, so callers
/// that only look at `groups` or `permission_levels` see no access.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProfile {
    pub id: u64,
    pub login_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Titles of the groups the actor belongs to.
    pub groups: Vec<String>,

    /// Configured level names granted by the actor's effective permissions.
    pub permission_levels: Vec<String>,

    /// Why the profile could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActorProfile {
    /// Assemble a profile from its backend parts.
    #[must_use]
    pub fn new(actor: ActorIdentity, groups: &[GroupInfo], permission_levels: Vec<String>) -> Self {
        Self {
            id: actor.id,
            login_name: actor.login_name,
            email: actor.email,
            display_name: actor.display_name,
            groups: groups.iter().map(|g| g.title.clone()).collect(),
            permission_levels,
            error: None,
        }
    }

    /// An empty, fail-closed profile.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Returns `true` if the profile could not be loaded.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// Resource Permissions
// =============================================================================

/// Raw role assignment data for one item, as fetched from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRoleAssignments {
    /// Whether the item breaks inheritance.
    pub unique: bool,

    /// Every role assignment on the item.
    pub assignments: Vec<RoleAssignment>,
}

/// Roles the current actor holds on a group's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPermission {
    pub group_id: u64,
    pub group_title: String,
    pub roles: Vec<String>,
}

/// How the current actor is granted access to one item.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourcePermissions {
    /// Whether the item has its own role assignments.
    pub unique_permissions: bool,

    /// Role definitions assigned directly to the actor.
    pub actor_permissions: Vec<String>,

    /// Role definitions assigned to groups the actor belongs to.
    pub group_permissions: Vec<GroupPermission>,

    /// Why the permissions could not be loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResourcePermissions {
    /// Project an item's role assignments onto one actor and its groups.
    #[must_use]
    pub fn for_actor(
        assignments: &ItemRoleAssignments,
        actor_id: u64,
        groups: &[GroupInfo],
    ) -> Self {
        use crate::backend::PrincipalKind;

        let mut actor_permissions = Vec::new();
        let mut group_permissions = Vec::new();

        for assignment in &assignments.assignments {
            let principal = &assignment.principal;
            match principal.kind {
                PrincipalKind::User if principal.id == actor_id => {
                    actor_permissions.extend(assignment.role_definitions.iter().cloned());
                }
                PrincipalKind::Group if groups.iter().any(|g| g.id == principal.id) => {
                    group_permissions.push(GroupPermission {
                        group_id: principal.id,
                        group_title: principal.title.clone(),
                        roles: assignment.role_definitions.clone(),
                    });
                }
                _ => {}
            }
        }

        actor_permissions.sort();
        actor_permissions.dedup();

        Self {
            unique_permissions: assignments.unique,
            actor_permissions,
            group_permissions,
            error: None,
        }
    }

    /// Empty, fail-closed permissions for a lookup that could not complete.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Returns `true` if the lookup could not complete.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_result_is_fail_closed() {
        let result = PermissionResult::failed("timeout");
        assert!(!result.granted);
        assert!(result.is_error());
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_result_serializes_without_empty_fields() {
        let json = serde_json::to_value(PermissionResult::granted().with_level("edit")).unwrap();
        assert_eq!(json, serde_json::json!({"granted": true, "level": "edit"}));
    }

    #[test]
    fn test_resource_permissions_for_actor() {
        let assignments = ItemRoleAssignments {
            unique: true,
            assignments: vec![
                RoleAssignment::user(7, "Jane", &["Contribute", "Read"]),
                RoleAssignment::user(8, "Someone Else", &["Full Control"]),
                RoleAssignment::group(3, "Site Members", &["Edit"]),
                RoleAssignment::group(4, "Site Owners", &["Full Control"]),
            ],
        };
        let groups = vec![GroupInfo::new(3, "Site Members")];

        let perms = ResourcePermissions::for_actor(&assignments, 7, &groups);

        assert!(perms.unique_permissions);
        assert_eq!(perms.actor_permissions, vec!["Contribute", "Read"]);
        assert_eq!(perms.group_permissions.len(), 1);
        assert_eq!(perms.group_permissions[0].group_title, "Site Members");
        assert_eq!(perms.group_permissions[0].roles, vec!["Edit"]);
    }

    #[test]
    fn test_failed_reads_are_empty() {
        let profile = ActorProfile::failed("timeout");
        assert!(profile.is_error());
        assert!(profile.groups.is_empty());
        assert!(profile.permission_levels.is_empty());

        let perms = ResourcePermissions::failed("timeout");
        assert!(perms.is_error());
        assert!(!perms.unique_permissions);
        assert!(perms.actor_permissions.is_empty());
        assert!(perms.group_permissions.is_empty());
    }

    #[test]
    fn test_profile_from_parts() {
        let actor = ActorIdentity::new(7, "i:0#.f|membership|jane@contoso.com")
            .with_email("jane@contoso.com");
        let groups = vec![GroupInfo::new(3, "Site Members"), GroupInfo::new(5, "HR")];

        let profile = ActorProfile::new(actor, &groups, vec!["read".to_string()]);

        assert_eq!(profile.id, 7);
        assert_eq!(profile.groups, vec!["Site Members", "HR"]);
        assert_eq!(profile.email.as_deref(), Some("jane@contoso.com"));
        assert_eq!(profile.permission_levels, vec!["read"]);
    }
}
