//! Permission kinds, permission masks and level-name mapping.
//!
//! The directory backend reports effective rights as a 64-bit base
//! permission mask split into a high and a low 32-bit word. Each
//! [`PermissionKind`] names one bit in that mask (its API value minus one),
//! except [`PermissionKind::FullMask`] which requires every defined bit.
//!
//! Callers speak in level names ("read", "edit", "full control"). Those are
//! mapped to kinds through the configured `permission_level_map` before any
//! cache key is built, so aliases of one level share a cache entry.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single base permission understood by the directory backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PermissionKind {
    /// No permission.
    EmptyMask,
    ViewListItems,
    AddListItems,
    EditListItems,
    DeleteListItems,
    ApproveItems,
    OpenItems,
    ViewVersions,
    DeleteVersions,
    CancelCheckout,
    ManagePersonalViews,
    ManageLists,
    ViewFormPages,
    Open,
    ViewPages,
    AddAndCustomizePages,
    ApplyThemeAndBorder,
    ApplyStyleSheets,
    ViewUsageData,
    CreateSSCSite,
    ManageSubwebs,
    CreateGroups,
    ManagePermissions,
    BrowseDirectories,
    BrowseUserInfo,
    AddDelPrivateWebParts,
    UpdatePersonalWebParts,
    ManageWeb,
    UseClientIntegration,
    UseRemoteAPIs,
    ManageAlerts,
    CreateAlerts,
    EditMyUserInfo,
    EnumeratePermissions,
    /// Every permission.
    FullMask,
}

impl PermissionKind {
    /// Every kind, in declaration order.
    pub const ALL: [PermissionKind; 35] = [
        Self::EmptyMask,
        Self::ViewListItems,
        Self::AddListItems,
        Self::EditListItems,
        Self::DeleteListItems,
        Self::ApproveItems,
        Self::OpenItems,
        Self::ViewVersions,
        Self::DeleteVersions,
        Self::CancelCheckout,
        Self::ManagePersonalViews,
        Self::ManageLists,
        Self::ViewFormPages,
        Self::Open,
        Self::ViewPages,
        Self::AddAndCustomizePages,
        Self::ApplyThemeAndBorder,
        Self::ApplyStyleSheets,
        Self::ViewUsageData,
        Self::CreateSSCSite,
        Self::ManageSubwebs,
        Self::CreateGroups,
        Self::ManagePermissions,
        Self::BrowseDirectories,
        Self::BrowseUserInfo,
        Self::AddDelPrivateWebParts,
        Self::UpdatePersonalWebParts,
        Self::ManageWeb,
        Self::UseClientIntegration,
        Self::UseRemoteAPIs,
        Self::ManageAlerts,
        Self::CreateAlerts,
        Self::EditMyUserInfo,
        Self::EnumeratePermissions,
        Self::FullMask,
    ];

    /// Numeric value used by the backend API.
    #[must_use]
    pub fn value(self) -> u32 {
        match self {
            Self::EmptyMask => 0,
            Self::ViewListItems => 1,
            Self::AddListItems => 2,
            Self::EditListItems => 3,
            Self::DeleteListItems => 4,
            Self::ApproveItems => 5,
            Self::OpenItems => 6,
            Self::ViewVersions => 7,
            Self::DeleteVersions => 8,
            Self::CancelCheckout => 9,
            Self::ManagePersonalViews => 10,
            Self::ManageLists => 12,
            Self::ViewFormPages => 13,
            Self::Open => 17,
            Self::ViewPages => 18,
            Self::AddAndCustomizePages => 19,
            Self::ApplyThemeAndBorder => 20,
            Self::ApplyStyleSheets => 21,
            Self::ViewUsageData => 22,
            Self::CreateSSCSite => 23,
            Self::ManageSubwebs => 24,
            Self::CreateGroups => 25,
            Self::ManagePermissions => 26,
            Self::BrowseDirectories => 27,
            Self::BrowseUserInfo => 28,
            Self::AddDelPrivateWebParts => 29,
            Self::UpdatePersonalWebParts => 30,
            Self::ManageWeb => 31,
            Self::UseClientIntegration => 37,
            Self::UseRemoteAPIs => 38,
            Self::ManageAlerts => 39,
            Self::CreateAlerts => 40,
            Self::EditMyUserInfo => 41,
            Self::EnumeratePermissions => 63,
            Self::FullMask => 65,
        }
    }

    /// Stable name used in cache keys and serialized output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyMask => "EmptyMask",
            Self::ViewListItems => "ViewListItems",
            Self::AddListItems => "AddListItems",
            Self::EditListItems => "EditListItems",
            Self::DeleteListItems => "DeleteListItems",
            Self::ApproveItems => "ApproveItems",
            Self::OpenItems => "OpenItems",
            Self::ViewVersions => "ViewVersions",
            Self::DeleteVersions => "DeleteVersions",
            Self::CancelCheckout => "CancelCheckout",
            Self::ManagePersonalViews => "ManagePersonalViews",
            Self::ManageLists => "ManageLists",
            Self::ViewFormPages => "ViewFormPages",
            Self::Open => "Open",
            Self::ViewPages => "ViewPages",
            Self::AddAndCustomizePages => "AddAndCustomizePages",
            Self::ApplyThemeAndBorder => "ApplyThemeAndBorder",
            Self::ApplyStyleSheets => "ApplyStyleSheets",
            Self::ViewUsageData => "ViewUsageData",
            Self::CreateSSCSite => "CreateSSCSite",
            Self::ManageSubwebs => "ManageSubwebs",
            Self::CreateGroups => "CreateGroups",
            Self::ManagePermissions => "ManagePermissions",
            Self::BrowseDirectories => "BrowseDirectories",
            Self::BrowseUserInfo => "BrowseUserInfo",
            Self::AddDelPrivateWebParts => "AddDelPrivateWebParts",
            Self::UpdatePersonalWebParts => "UpdatePersonalWebParts",
            Self::ManageWeb => "ManageWeb",
            Self::UseClientIntegration => "UseClientIntegration",
            Self::UseRemoteAPIs => "UseRemoteAPIs",
            Self::ManageAlerts => "ManageAlerts",
            Self::CreateAlerts => "CreateAlerts",
            Self::EditMyUserInfo => "EditMyUserInfo",
            Self::EnumeratePermissions => "EnumeratePermissions",
            Self::FullMask => "FullMask",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = String;

    /// Parses a kind by name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown permission kind '{}'", s))
    }
}

// =============================================================================
// Permission Mask
// =============================================================================

const HIGH_FULL: u32 = 0x7FFF_FFFF;
const LOW_FULL: u32 = 0xFFFF_FFFF;

/// Effective permissions of an actor on a resource, as a split 64-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionMask {
    /// Upper 32 bits.
    pub high: u32,
    /// Lower 32 bits.
    pub low: u32,
}

impl PermissionMask {
    /// A mask granting nothing.
    pub const EMPTY: PermissionMask = PermissionMask { high: 0, low: 0 };

    /// A mask granting everything.
    pub const FULL: PermissionMask = PermissionMask {
        high: HIGH_FULL,
        low: LOW_FULL,
    };

    /// Creates a mask from its two words.
    #[must_use]
    pub fn new(high: u32, low: u32) -> Self {
        Self { high, low }
    }

    /// Builds a mask with exactly the given kinds set.
    #[must_use]
    pub fn from_kinds(kinds: impl IntoIterator<Item = PermissionKind>) -> Self {
        let mut mask = Self::EMPTY;
        for kind in kinds {
            mask.set(kind);
        }
        mask
    }

    /// Sets the bit for `kind`.
    pub fn set(&mut self, kind: PermissionKind) {
        match kind {
            PermissionKind::EmptyMask => {}
            PermissionKind::FullMask => *self = Self::FULL,
            other => {
                let bit = other.value() - 1;
                if bit < 32 {
                    self.low |= 1 << bit;
                } else {
                    self.high |= 1 << (bit - 32);
                }
            }
        }
    }

    /// Returns `true` if the mask grants `kind`.
    #[must_use]
    pub fn has(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::EmptyMask => true,
            PermissionKind::FullMask => {
                (self.high & HIGH_FULL) == HIGH_FULL && self.low == LOW_FULL
            }
            other => {
                let bit = other.value() - 1;
                if bit < 32 {
                    self.low & (1 << bit) != 0
                } else {
                    self.high & (1 << (bit - 32)) != 0
                }
            }
        }
    }
}

// =============================================================================
// Level Mapping
// =============================================================================

/// Normalizes a level name for map lookup: trimmed, lowercased, inner
/// whitespace collapsed to a single space.
#[must_use]
pub fn normalize_level_name(level: &str) -> String {
    level
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Resolves a caller-supplied level name to a permission kind.
///
/// The configured map wins; otherwise the name is parsed as a kind name
/// (`"EditListItems"`). A validated map has one entry per normalized name;
/// if an unvalidated map has several, the smallest key wins.
#[must_use]
pub fn resolve_level(
    level_map: &HashMap<String, PermissionKind>,
    level: &str,
) -> Option<PermissionKind> {
    let normalized = normalize_level_name(level);
    level_map
        .get(&normalized)
        .or_else(|| {
            level_map
                .iter()
                .filter(|(name, _)| normalize_level_name(name) == normalized)
                .min_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, kind)| kind)
        })
        .copied()
        .or_else(|| level.parse().ok())
}

/// Lists the configured level names whose kind is granted by `mask`.
///
/// Names are normalized and returned sorted so the output is stable.
#[must_use]
pub fn levels_for_mask(
    level_map: &HashMap<String, PermissionKind>,
    mask: &PermissionMask,
) -> Vec<String> {
    level_map
        .iter()
        .filter(|(_, kind)| **kind != PermissionKind::EmptyMask && mask.has(**kind))
        .map(|(name, _)| normalize_level_name(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Default level aliases.
#[must_use]
pub fn default_level_map() -> HashMap<String, PermissionKind> {
    [
        ("read", PermissionKind::ViewListItems),
        ("view", PermissionKind::ViewListItems),
        ("add", PermissionKind::AddListItems),
        ("contribute", PermissionKind::AddListItems),
        ("edit", PermissionKind::EditListItems),
        ("delete", PermissionKind::DeleteListItems),
        ("approve", PermissionKind::ApproveItems),
        ("design", PermissionKind::ManageLists),
        ("manage", PermissionKind::ManagePermissions),
        ("full control", PermissionKind::FullMask),
    ]
    .into_iter()
    .map(|(name, kind)| (name.to_string(), kind))
    .collect()
}
