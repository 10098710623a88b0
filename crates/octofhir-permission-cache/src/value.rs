//! Values stored in the cache tiers.
//!
//! Both the instance cache and the process registry hold one
//! [`CachedValue`] per query key. Each cacheable backend response type
//! converts into and out of it through [`Cacheable`].

use crate::backend::{ActorIdentity, GroupInfo};
use crate::mapping::PermissionMask;
use crate::resolver::types::{ActorProfile, ItemRoleAssignments};

/// Any value the resolver caches.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Actor(ActorIdentity),
    Groups(Vec<GroupInfo>),
    Granted(bool),
    Mask(PermissionMask),
    Assignments(ItemRoleAssignments),
    Profile(ActorProfile),
}

impl CachedValue {
    /// Short variant name for log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Actor(_) => "actor",
            Self::Groups(_) => "groups",
            Self::Granted(_) => "granted",
            Self::Mask(_) => "mask",
            Self::Assignments(_) => "assignments",
            Self::Profile(_) => "profile",
        }
    }
}

/// A type that can live in the cache tiers.
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// Wrap into the shared representation.
    fn into_cached(self) -> CachedValue;

    /// Unwrap from the shared representation, `None` on a variant mismatch.
    fn from_cached(value: &CachedValue) -> Option<Self>;
}

macro_rules! impl_cacheable {
    ($ty:ty, $variant:ident) => {
        impl Cacheable for $ty {
            fn into_cached(self) -> CachedValue {
                CachedValue::$variant(self)
            }

            fn from_cached(value: &CachedValue) -> Option<Self> {
                match value {
                    CachedValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_cacheable!(ActorIdentity, Actor);
impl_cacheable!(Vec<GroupInfo>, Groups);
impl_cacheable!(bool, Granted);
impl_cacheable!(PermissionMask, Mask);
impl_cacheable!(ItemRoleAssignments, Assignments);
impl_cacheable!(ActorProfile, Profile);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_cached_value() {
        let groups = vec![GroupInfo::new(1, "Site Owners")];
        let cached = groups.clone().into_cached();
        assert_eq!(cached.kind(), "groups");
        assert_eq!(Vec::<GroupInfo>::from_cached(&cached), Some(groups));
    }

    #[test]
    fn test_variant_mismatch_is_none() {
        let cached = true.into_cached();
        assert_eq!(PermissionMask::from_cached(&cached), None);
        assert_eq!(bool::from_cached(&cached), Some(true));
    }
}
