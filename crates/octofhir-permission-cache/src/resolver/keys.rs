//! Cache key construction.
//!
//! A key is an operation name followed by its discriminating parameters,
//! joined with `:`. Parameters are escaped (`%` as `%25`, `:` as `%3A`) so a
//! resource called `Tasks:Archive` can never share a prefix with `Tasks`.
//! Level names are resolved to a [`PermissionKind`] before they reach this
//! module, so aliases collapse to one key.

use std::fmt::Write as _;

use crate::mapping::PermissionKind;

pub const RESOURCE_PERMISSION: &str = "resource_permission";
pub const ITEM_PERMISSION: &str = "item_permission";
pub const CURRENT_ACTOR: &str = "current_actor";
pub const ACTOR_GROUPS: &str = "actor_groups";
pub const EFFECTIVE_PERMISSIONS: &str = "effective_permissions";
pub const ROLE_ASSIGNMENTS: &str = "role_assignments";
pub const ACTOR_PROFILE: &str = "actor_profile";

/// Placeholder segment for "no resource" (the scope root).
const ROOT_SEGMENT: &str = "*";

/// Escape one key segment.
pub fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for ch in segment.chars() {
        match ch {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn build(operation: &str, segments: &[&str]) -> String {
    let mut key = String::from(operation);
    for segment in segments {
        key.push(':');
        key.push_str(&escape_segment(segment));
    }
    key
}

pub fn resource_permission(resource_id: &str, kind: PermissionKind) -> String {
    build(RESOURCE_PERMISSION, &[resource_id, kind.as_str()])
}

pub fn item_permission(resource_id: &str, item_id: u64, kind: PermissionKind) -> String {
    let item = item_id.to_string();
    build(ITEM_PERMISSION, &[resource_id, &item, kind.as_str()])
}

pub fn current_actor() -> String {
    CURRENT_ACTOR.to_string()
}

pub fn actor_groups(actor_id: u64) -> String {
    let mut key = String::from(ACTOR_GROUPS);
    let _ = write!(key, ":{}", actor_id);
    key
}

pub fn effective_permissions(resource_id: Option<&str>) -> String {
    build(EFFECTIVE_PERMISSIONS, &[resource_id.unwrap_or(ROOT_SEGMENT)])
}

pub fn role_assignments(resource_id: &str, item_id: u64) -> String {
    let item = item_id.to_string();
    build(ROLE_ASSIGNMENTS, &[resource_id, &item])
}

pub fn actor_profile(resource_id: Option<&str>) -> String {
    build(ACTOR_PROFILE, &[resource_id.unwrap_or(ROOT_SEGMENT)])
}

// =============================================================================
// Invalidation matchers
// =============================================================================

/// Matches cache keys during invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMatcher {
    Exact(String),
    Prefix(String),
}

impl KeyMatcher {
    fn prefix(operation: &str, segments: &[&str]) -> Self {
        Self::Prefix(format!("{}:", build(operation, segments)))
    }

    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Exact(exact) => key == exact,
            Self::Prefix(prefix) => key.starts_with(prefix.as_str()),
        }
    }
}

/// Returns `true` if any matcher accepts `key`.
pub fn matches_any(matchers: &[KeyMatcher], key: &str) -> bool {
    matchers.iter().any(|m| m.matches(key))
}

/// Every key that depends on `resource_id`.
pub fn resource_matchers(resource_id: &str) -> Vec<KeyMatcher> {
    vec![
        KeyMatcher::prefix(RESOURCE_PERMISSION, &[resource_id]),
        KeyMatcher::prefix(ITEM_PERMISSION, &[resource_id]),
        KeyMatcher::prefix(ROLE_ASSIGNMENTS, &[resource_id]),
        KeyMatcher::Exact(effective_permissions(Some(resource_id))),
        KeyMatcher::Exact(actor_profile(Some(resource_id))),
    ]
}

/// Every key that depends on one item.
pub fn item_matchers(resource_id: &str, item_id: u64) -> Vec<KeyMatcher> {
    let item = item_id.to_string();
    vec![
        KeyMatcher::prefix(ITEM_PERMISSION, &[resource_id, &item]),
        KeyMatcher::Exact(role_assignments(resource_id, item_id)),
    ]
}

/// Keys that depend on actor identity and group membership.
///
/// With `actor_id` only that actor's group list is targeted; without it every
/// cached group list goes. The current actor and every aggregated profile
/// are always included.
pub fn actor_role_matchers(actor_id: Option<u64>) -> Vec<KeyMatcher> {
    let groups = match actor_id {
        Some(id) => KeyMatcher::Exact(actor_groups(id)),
        None => KeyMatcher::Prefix(format!("{}:", ACTOR_GROUPS)),
    };
    vec![
        groups,
        KeyMatcher::Exact(current_actor()),
        KeyMatcher::Prefix(format!("{}:", ACTOR_PROFILE)),
    ]
}
