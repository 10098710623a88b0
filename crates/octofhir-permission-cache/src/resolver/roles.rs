//! Role name normalization and matching.
//!
//! Roles are checked against the titles of the groups the actor belongs to.
//! A configured alias (`admin` -> `Owners`) is applied first, then both sides
//! are normalized and compared by substring containment in either direction,
//! so `owners` matches a group titled `Site Owners`.
//!
//! Containment is loose: `HR` also matches `HR-Archive`. Keep short role
//! names unambiguous or map them to a full group title.

use std::collections::HashMap;

use crate::backend::GroupInfo;

/// Lowercase and strip all whitespace.
pub fn normalize_role_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Apply the configured alias for `role`, if any.
///
/// Alias lookup is by normalized name, so `Admin` and ` admin ` both hit an
/// `admin` entry. If several aliases normalize alike the smallest key wins;
/// validated configurations never contain such aliases.
pub fn map_role_name<'a>(role_name_map: &'a HashMap<String, String>, role: &'a str) -> &'a str {
    let normalized = normalize_role_name(role);
    role_name_map
        .get(&normalized)
        .or_else(|| {
            role_name_map
                .iter()
                .filter(|(alias, _)| normalize_role_name(alias) == normalized)
                .min_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, target)| target)
        })
        .map(String::as_str)
        .unwrap_or(role)
}

/// Returns `true` if the normalized names contain one another.
///
/// Empty names never match.
pub fn role_matches(role: &str, group_title: &str) -> bool {
    let role = normalize_role_name(role);
    let title = normalize_role_name(group_title);
    if role.is_empty() || title.is_empty() {
        return false;
    }
    title.contains(&role) || role.contains(&title)
}

/// Titles of the groups that satisfy `role`.
pub fn matching_groups(role: &str, groups: &[GroupInfo]) -> Vec<String> {
    groups
        .iter()
        .filter(|g| role_matches(role, &g.title))
        .map(|g| g.title.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aliases() -> HashMap<String, String> {
        HashMap::from([
            ("admin".to_string(), "Owners".to_string()),
            ("member".to_string(), "Members".to_string()),
        ])
    }

    #[test]
    fn test_normalize_role_name() {
        assert_eq!(normalize_role_name("  Site Owners "), "siteowners");
        assert_eq!(normalize_role_name("HR\tTeam"), "hrteam");
        assert_eq!(normalize_role_name(""), "");
    }

    #[test]
    fn test_map_role_name() {
        let map = aliases();
        assert_eq!(map_role_name(&map, "admin"), "Owners");
        assert_eq!(map_role_name(&map, " Admin "), "Owners");
        assert_eq!(map_role_name(&map, "Approvers"), "Approvers");
    }

    #[test]
    fn test_map_role_name_is_stable_with_colliding_aliases() {
        let mut map = aliases();
        map.insert("Admin".to_string(), "Approvers".to_string());

        for _ in 0..16 {
            assert_eq!(map_role_name(&map, " ADMIN"), "Owners");
        }

        map.remove("admin");
        map.insert("ADMIN".to_string(), "Site Admins".to_string());
        assert_eq!(map_role_name(&map, "admin"), "Site Admins");
    }

    #[test]
    fn test_role_matches_either_direction() {
        assert!(role_matches("Owners", "Site Owners"));
        assert!(role_matches("site owners group", "Site Owners"));
        assert!(role_matches("siteowners", "Site Owners"));
        assert!(!role_matches("Visitors", "Site Owners"));
        assert!(!role_matches("", "Site Owners"));
    }

    #[test]
    fn test_short_role_matches_longer_group_title() {
        // Loose containment: a user in "HR-Archive" passes a check for "HR".
        assert!(role_matches("HR", "HR-Archive"));
        assert!(role_matches("HR-Archive", "HR"));
    }

    #[test]
    fn test_matching_groups() {
        let groups = vec![
            GroupInfo::new(1, "Site Owners"),
            GroupInfo::new(2, "Site Members"),
            GroupInfo::new(3, "Finance Owners"),
        ];
        assert_eq!(
            matching_groups("owners", &groups),
            vec!["Site Owners", "Finance Owners"]
        );
        assert!(matching_groups("visitors", &groups).is_empty());
    }
}
