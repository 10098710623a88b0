//! Permission resolver configuration.
//!
//! A [`ResolverConfig`] is supplied when a resolver is built and is
//! immutable afterwards. To change it, build a new resolver.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::mapping::{PermissionKind, default_level_map, normalize_level_name};
use crate::resolver::roles::normalize_role_name;

/// Resolver configuration.
///
/// # Example (TOML)
///
/// ```toml
/// caching_enabled = true
/// cache_ttl = "5m"
/// cache_capacity = 500
///
/// [role_name_map]
/// admin = "Owners"
///
/// [permission_level_map]
/// read = "ViewListItems"
/// edit = "EditListItems"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Serve repeated queries from the instance cache and the registry.
    /// When disabled, concurrent identical queries are still coalesced.
    pub caching_enabled: bool,

    /// Lifetime of an instance cache entry.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Maximum number of entries in the instance cache.
    pub cache_capacity: usize,

    /// Role aliases, e.g. `admin` -> `Owners`, applied before matching.
    pub role_name_map: HashMap<String, String>,

    /// Level names accepted by permission checks.
    /// Names not listed here are parsed as a [`PermissionKind`] name.
    pub permission_level_map: HashMap<String, PermissionKind>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            caching_enabled: true,
            cache_ttl: Duration::from_secs(300), // 5 minutes
            cache_capacity: 500,
            role_name_map: default_role_name_map(),
            permission_level_map: default_level_map(),
        }
    }
}

/// Default role aliases.
pub fn default_role_name_map() -> HashMap<String, String> {
    [
        ("admin", "Owners"),
        ("member", "Members"),
        ("visitor", "Visitors"),
    ]
    .into_iter()
    .map(|(alias, title)| (alias.to_string(), title.to_string()))
    .collect()
}

impl ResolverConfig {
    /// Parse a configuration from TOML. Missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set whether caching is enabled.
    #[must_use]
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Set the instance cache TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the instance cache capacity.
    #[must_use]
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Add a role alias, replacing any alias that normalizes to the same name.
    #[must_use]
    pub fn with_role_alias(mut self, alias: impl Into<String>, title: impl Into<String>) -> Self {
        let alias = alias.into();
        let normalized = normalize_role_name(&alias);
        self.role_name_map
            .retain(|existing, _| normalize_role_name(existing) != normalized);
        self.role_name_map.insert(alias, title.into());
        self
    }

    /// Add a level name, replacing any name that normalizes to the same one.
    #[must_use]
    pub fn with_level(mut self, name: impl Into<String>, kind: PermissionKind) -> Self {
        let name = name.into();
        let normalized = normalize_level_name(&name);
        self.permission_level_map
            .retain(|existing, _| normalize_level_name(existing) != normalized);
        self.permission_level_map.insert(name, kind);
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - `cache_capacity` is zero
    /// - `cache_ttl` is zero while caching is enabled
    /// - a role alias or level name is blank, or an alias has a blank target
    /// - two role aliases or two level names normalize to the same name
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "cache_capacity must be > 0".to_string(),
            ));
        }

        if self.caching_enabled && self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "cache_ttl must be > 0 when caching is enabled".to_string(),
            ));
        }

        for (alias, title) in &self.role_name_map {
            if alias.trim().is_empty() || title.trim().is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "Invalid role alias: '{}' -> '{}'",
                    alias, title
                )));
            }
        }

        if let Some(name) = self
            .permission_level_map
            .keys()
            .find(|name| name.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue(format!(
                "Invalid permission level name: '{}'",
                name
            )));
        }

        check_unique("role alias", self.role_name_map.keys(), normalize_role_name)?;
        check_unique(
            "permission level name",
            self.permission_level_map.keys(),
            normalize_level_name,
        )?;

        Ok(())
    }
}

/// Rejects names that collide once normalized; lookups would otherwise
/// depend on map iteration order.
fn check_unique<'a>(
    what: &str,
    names: impl Iterator<Item = &'a String>,
    normalize: fn(&str) -> String,
) -> Result<(), ConfigError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for name in names {
        if let Some(previous) = seen.insert(normalize(name), name) {
            // Sorted so the message does not depend on iteration order.
            let (first, second) = if previous <= name.as_str() {
                (previous, name.as_str())
            } else {
                (name.as_str(), previous)
            };
            return Err(ConfigError::InvalidValue(format!(
                "Duplicate {}: '{}' and '{}'",
                what, first, second
            )));
        }
    }
    Ok(())
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

impl From<ConfigError> for CacheError {
    fn from(err: ConfigError) -> Self {
        CacheError::configuration(err.to_string())
    }
}
