//! Permission resolver.
//!
//! [`PermissionResolver`] answers permission and role questions about the
//! actor a [`DirectoryClient`] is authenticated as. Every backend query goes
//! through three tiers:
//!
//! 1. the resolver's own bounded, TTL-limited cache,
//! 2. resolved values in the shared [`ProcessRegistry`],
//! 3. an in-flight fetch for the same query started by any resolver sharing
//!    the registry.
//!
//! Only when all three miss is the backend called, and then exactly once
//! per `(scope, query)` no matter how many callers arrive meanwhile.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use octofhir_permission_cache::{PermissionResolver, ProcessRegistry, ResolverConfig};
//!
//! let registry = Arc::new(ProcessRegistry::new());
//! let resolver = PermissionResolver::new(client, registry, site_url, ResolverConfig::default())?;
//!
//! if resolver.has_permission_on_resource("Tasks", "edit").await.granted {
//!     // ...
//! }
//! ```

pub mod keys;
pub mod roles;
pub mod types;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::future::{self, BoxFuture, FutureExt};
use parking_lot::Mutex;

use crate::CacheResult;
use crate::backend::{ActorIdentity, BackendError, DirectoryClient, GroupInfo};
use crate::cache::{BoundedCache, CacheEntry};
use crate::config::ResolverConfig;
use crate::error::CacheError;
use crate::mapping::{self, PermissionKind, PermissionMask};
use crate::registry::{Flight, ProcessRegistry, RegistryKey};
use crate::value::{CachedValue, Cacheable};

use self::keys::KeyMatcher;

pub use types::{
    ActorProfile, GroupPermission, ItemRoleAssignments, PermissionResult, ResourcePermissions,
};

// =============================================================================
// Permission Resolver
// =============================================================================

/// Cached, single-flight permission lookups for one backend scope.
pub struct PermissionResolver {
    client: Arc<dyn DirectoryClient>,
    registry: Arc<ProcessRegistry>,

    /// Backend target (site URL) this resolver answers for.
    scope: String,

    config: ResolverConfig,

    /// Instance cache. Never held across an await.
    cache: Mutex<BoundedCache<String, CacheEntry<CachedValue>>>,

    hits: AtomicU64,
    misses: AtomicU64,
}

impl PermissionResolver {
    /// Create a resolver for `scope`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Configuration` if the scope is blank or the
    /// configuration does not validate.
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        registry: Arc<ProcessRegistry>,
        scope: impl Into<String>,
        config: ResolverConfig,
    ) -> CacheResult<Self> {
        let scope = scope.into();
        if scope.trim().is_empty() {
            return Err(CacheError::configuration("scope cannot be empty"));
        }
        config.validate()?;
        let cache = BoundedCache::new(config.cache_capacity)?;

        tracing::debug!(
            scope = %scope,
            caching_enabled = config.caching_enabled,
            capacity = config.cache_capacity,
            ttl = ?config.cache_ttl,
            "Permission resolver created"
        );

        Ok(Self {
            client,
            registry,
            scope,
            config,
            cache: Mutex::new(cache),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// The backend scope this resolver answers for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The configuration the resolver was built with.
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The shared registry.
    pub fn registry(&self) -> &Arc<ProcessRegistry> {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Permission checks
    // -------------------------------------------------------------------------

    /// Check whether the current actor holds `level` on a resource.
    ///
    /// Never fails: an unknown level or a backend failure is reported as a
    /// denied result with `error` set.
    pub async fn has_permission_on_resource(&self, resource_id: &str, level: &str) -> PermissionResult {
        let kind = match self.resolve_kind(level) {
            Ok(kind) => kind,
            Err(err) => return PermissionResult::failed(err.to_string()).with_level(level),
        };

        let resource = resource_id.to_string();
        let outcome = self
            .resolve::<bool, _>(keys::resource_permission(resource_id, kind), move |client| {
                async move { client.resource_has_permission(&resource, kind).await }.boxed()
            })
            .await;

        match outcome {
            Ok(granted) => PermissionResult::new(granted).with_level(level),
            Err(err) => {
                tracing::warn!(
                    scope = %self.scope,
                    resource_id,
                    level,
                    error = %err,
                    "Resource permission check failed"
                );
                PermissionResult::failed(err.to_string()).with_level(level)
            }
        }
    }

    /// Check whether the current actor holds `level` on one item.
    ///
    /// Never fails, see [`Self::has_permission_on_resource`].
    pub async fn has_permission_on_item(
        &self,
        resource_id: &str,
        item_id: u64,
        level: &str,
    ) -> PermissionResult {
        let kind = match self.resolve_kind(level) {
            Ok(kind) => kind,
            Err(err) => return PermissionResult::failed(err.to_string()).with_level(level),
        };

        let resource = resource_id.to_string();
        let outcome = self
            .resolve::<bool, _>(
                keys::item_permission(resource_id, item_id, kind),
                move |client| {
                    async move { client.item_has_permission(&resource, item_id, kind).await }
                        .boxed()
                },
            )
            .await;

        match outcome {
            Ok(granted) => PermissionResult::new(granted).with_level(level),
            Err(err) => {
                tracing::warn!(
                    scope = %self.scope,
                    resource_id,
                    item_id,
                    level,
                    error = %err,
                    "Item permission check failed"
                );
                PermissionResult::failed(err.to_string()).with_level(level)
            }
        }
    }

    /// Check several levels on one resource concurrently.
    ///
    /// A level whose check fails maps to `false`.
    pub async fn check_multiple_permissions<S>(
        &self,
        resource_id: &str,
        levels: &[S],
    ) -> HashMap<String, bool>
    where
        S: AsRef<str>,
    {
        let checks = levels.iter().map(|level| async move {
            let level = level.as_ref();
            let result = self.has_permission_on_resource(resource_id, level).await;
            (level.to_string(), result.granted)
        });

        future::join_all(checks).await.into_iter().collect()
    }

    // -------------------------------------------------------------------------
    // Role checks
    // -------------------------------------------------------------------------

    /// Check whether the current actor belongs to a group matching `role`.
    ///
    /// `roles` on the result holds `role` when it matched.
    pub async fn actor_has_role(&self, role: &str) -> PermissionResult {
        self.actor_has_any_role(&[role]).await
    }

    /// Check whether the current actor matches at least one of `roles`.
    ///
    /// An empty list is denied. `roles` on the result lists the roles that
    /// matched.
    pub async fn actor_has_any_role<S: AsRef<str>>(&self, roles: &[S]) -> PermissionResult {
        match self.matched_roles(roles).await {
            Ok(matched) => PermissionResult::new(!matched.is_empty()).with_roles(matched),
            Err(err) => PermissionResult::failed(err.to_string()),
        }
    }

    /// Check whether the current actor matches every one of `roles`.
    ///
    /// An empty list is denied. `roles` on the result lists the roles that
    /// matched.
    pub async fn actor_has_all_roles<S: AsRef<str>>(&self, roles: &[S]) -> PermissionResult {
        match self.matched_roles(roles).await {
            Ok(matched) => {
                let granted = !roles.is_empty() && matched.len() == roles.len();
                PermissionResult::new(granted).with_roles(matched)
            }
            Err(err) => PermissionResult::failed(err.to_string()),
        }
    }

    async fn matched_roles<S: AsRef<str>>(&self, roles: &[S]) -> CacheResult<Vec<String>> {
        if roles.is_empty() {
            return Ok(Vec::new());
        }

        let (_, groups) = self.actor_and_groups().await.inspect_err(|err| {
            tracing::warn!(scope = %self.scope, error = %err, "Role check failed");
        })?;

        Ok(roles
            .iter()
            .map(|role| role.as_ref())
            .filter(|role| {
                let target = roles::map_role_name(&self.config.role_name_map, role);
                !roles::matching_groups(target, &groups).is_empty()
            })
            .map(str::to_string)
            .collect())
    }

    // -------------------------------------------------------------------------
    // Structured reads
    // -------------------------------------------------------------------------

    /// Get the current actor with group titles and permission levels.
    ///
    /// Levels come from the actor's effective permissions on `resource_id`,
    /// or on the scope root when `None`.
    ///
    /// Never fails: a backend failure yields an empty profile with `error`
    /// set, which is not cached.
    pub async fn current_actor_permissions(&self, resource_id: Option<&str>) -> ActorProfile {
        match self.actor_profile(resource_id).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(
                    scope = %self.scope,
                    resource_id,
                    error = %err,
                    "Actor profile lookup failed"
                );
                ActorProfile::failed(err.to_string())
            }
        }
    }

    async fn actor_profile(&self, resource_id: Option<&str>) -> CacheResult<ActorProfile> {
        let key = keys::actor_profile(resource_id);
        let generation = self.registry.generation(&self.scope);
        if let Some(profile) = self.lookup::<ActorProfile>(&key) {
            return Ok(profile);
        }

        let (actor, groups) = self.actor_and_groups().await?;
        let mask = self.effective_permissions(resource_id).await?;
        let levels = mapping::levels_for_mask(&self.config.permission_level_map, &mask);
        let profile = ActorProfile::new(actor, &groups, levels);

        if self.config.caching_enabled {
            self.remember(key.clone(), profile.clone().into_cached(), generation);
            self.registry.store_if_current(
                self.registry_key(&key),
                profile.clone().into_cached(),
                generation,
            );
        }
        Ok(profile)
    }

    /// Get how the current actor is granted access to one item.
    ///
    /// Never fails: a backend failure yields empty permissions with `error`
    /// set.
    pub async fn resource_permissions(&self, resource_id: &str, item_id: u64) -> ResourcePermissions {
        match self.item_permissions(resource_id, item_id).await {
            Ok(perms) => perms,
            Err(err) => {
                tracing::warn!(
                    scope = %self.scope,
                    resource_id,
                    item_id,
                    error = %err,
                    "Resource permissions lookup failed"
                );
                ResourcePermissions::failed(err.to_string())
            }
        }
    }

    async fn item_permissions(
        &self,
        resource_id: &str,
        item_id: u64,
    ) -> CacheResult<ResourcePermissions> {
        let resource = resource_id.to_string();
        let assignments = self
            .resolve::<ItemRoleAssignments, _>(
                keys::role_assignments(resource_id, item_id),
                move |client| {
                    async move {
                        let (assignments, unique) = future::try_join(
                            client.role_assignments(&resource, item_id),
                            client.has_unique_role_assignments(&resource, item_id),
                        )
                        .await?;
                        Ok::<_, BackendError>(ItemRoleAssignments {
                            unique,
                            assignments,
                        })
                    }
                    .boxed()
                },
            )
            .await?;

        let (actor, groups) = self.actor_and_groups().await?;
        Ok(ResourcePermissions::for_actor(&assignments, actor.id, &groups))
    }

    async fn actor_and_groups(&self) -> CacheResult<(ActorIdentity, Vec<GroupInfo>)> {
        let actor = self
            .resolve::<ActorIdentity, _>(keys::current_actor(), |client| {
                async move { client.current_actor().await }.boxed()
            })
            .await?;

        let actor_id = actor.id;
        let groups = self
            .resolve::<Vec<GroupInfo>, _>(keys::actor_groups(actor_id), move |client| {
                async move { client.actor_groups(actor_id).await }.boxed()
            })
            .await?;

        Ok((actor, groups))
    }

    async fn effective_permissions(&self, resource_id: Option<&str>) -> CacheResult<PermissionMask> {
        let resource = resource_id.map(str::to_string);
        self.resolve::<PermissionMask, _>(keys::effective_permissions(resource_id), move |client| {
            async move { client.effective_permissions(resource.as_deref()).await }.boxed()
        })
        .await
    }

    // -------------------------------------------------------------------------
    // Invalidation
    // -------------------------------------------------------------------------

    /// Drop every cached answer about `resource_id`.
    ///
    /// Clears this resolver's cache and this scope's registry entries.
    /// In-flight fetches are not cancelled, but a fetch that settles after
    /// this call is not cached, so it cannot restore a stale answer.
    /// Returns the number of instance cache entries removed.
    pub fn invalidate_resource(&self, resource_id: &str) -> usize {
        let removed = self.invalidate(&keys::resource_matchers(resource_id));
        tracing::debug!(scope = %self.scope, resource_id, removed, "Invalidated resource");
        removed
    }

    /// Drop every cached answer about one item.
    ///
    /// Returns `true` if the instance cache held anything for it.
    pub fn invalidate_item(&self, resource_id: &str, item_id: u64) -> bool {
        let removed = self.invalidate(&keys::item_matchers(resource_id, item_id));
        tracing::debug!(scope = %self.scope, resource_id, item_id, removed, "Invalidated item");
        removed > 0
    }

    /// Drop cached identity and group membership.
    ///
    /// With `actor_id` only that actor's groups are dropped, otherwise all
    /// group lists. The current actor and aggregated profiles always go.
    pub fn invalidate_actor_roles(&self, actor_id: Option<u64>) -> usize {
        let removed = self.invalidate(&keys::actor_role_matchers(actor_id));
        tracing::debug!(scope = %self.scope, actor_id, removed, "Invalidated actor roles");
        removed
    }

    /// Drop everything this resolver and its scope have cached.
    pub fn clear_cache(&self) {
        let registry_removed = self.registry.clear_scope(&self.scope);
        let removed = {
            let mut cache = self.cache.lock();
            let len = cache.len();
            cache.clear();
            len
        };
        tracing::info!(
            scope = %self.scope,
            removed,
            registry_removed,
            "Permission cache cleared"
        );
    }

    fn invalidate(&self, matchers: &[KeyMatcher]) -> usize {
        // Registry first: bumping the generation stops in-flight fetches
        // from repopulating the instance cache after it is purged.
        self.registry
            .remove_where(&self.scope, |key| keys::matches_any(matchers, key));
        self.cache
            .lock()
            .delete_where(|key, _| keys::matches_any(matchers, key))
    }

    // -------------------------------------------------------------------------
    // Statistics
    // -------------------------------------------------------------------------

    /// Get cache statistics.
    pub fn cache_stats(&self) -> ResolverCacheStats {
        let stats = self.cache.lock().stats();
        ResolverCacheStats {
            size: stats.size,
            capacity: stats.capacity,
            utilization_percent: stats.utilization_percent,
            is_full: stats.is_full,
            evictions: stats.evictions,
            caching_enabled: self.config.caching_enabled,
            ttl: self.config.cache_ttl,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    // -------------------------------------------------------------------------
    // Lookup tiers
    // -------------------------------------------------------------------------

    fn resolve_kind(&self, level: &str) -> CacheResult<PermissionKind> {
        mapping::resolve_level(&self.config.permission_level_map, level)
            .ok_or_else(|| CacheError::unknown_level(level))
    }

    fn registry_key(&self, key: &str) -> RegistryKey {
        RegistryKey::new(self.scope.as_str(), key)
    }

    /// Tiers 1 and 2: the instance cache, then resolved registry entries.
    fn lookup<T: Cacheable>(&self, key: &str) -> Option<T> {
        if !self.config.caching_enabled {
            return None;
        }

        if let Some(value) = self.cached(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(scope = %self.scope, key, "Permission cache hit");
            return Some(value);
        }

        let generation = self.registry.generation(&self.scope);
        let value = self.registry.get_fresh(&self.registry_key(key))?;
        let typed = T::from_cached(&value)?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(scope = %self.scope, key, "Registry hit");
        self.remember(key.to_string(), value, generation);
        Some(typed)
    }

    /// Resolve one backend query through all tiers.
    async fn resolve<T, F>(&self, key: String, fetch: F) -> CacheResult<T>
    where
        T: Cacheable,
        F: FnOnce(Arc<dyn DirectoryClient>) -> BoxFuture<'static, Result<T, BackendError>>,
    {
        if let Some(value) = self.lookup::<T>(&key) {
            return Ok(value);
        }

        let caching = self.config.caching_enabled;
        let current = self.registry.generation(&self.scope);
        let client = Arc::clone(&self.client);
        let flight = self
            .registry
            .join_or_start(&self.registry_key(&key), caching, move || {
                let fetch = fetch(client);
                async move { fetch.await.map(T::into_cached) }.boxed()
            });

        let (value, generation) = match flight {
            Flight::Resolved(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                (value, current)
            }
            Flight::Joined(pending) | Flight::Started(pending) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(scope = %self.scope, key = %key, "Permission cache miss");
                (pending.fetch.await?, pending.generation)
            }
        };

        let typed = T::from_cached(&value).ok_or_else(|| {
            CacheError::internal(format!(
                "unexpected {} value cached for '{}'",
                value.kind(),
                key
            ))
        })?;

        if caching {
            self.remember(key, value, generation);
        }
        Ok(typed)
    }

    /// Read the instance cache, deleting the entry if it has expired.
    fn cached<T: Cacheable>(&self, key: &str) -> Option<T> {
        let mut cache = self.cache.lock();
        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired() => return T::from_cached(&entry.data),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.delete(key);
            tracing::trace!(scope = %self.scope, key, "Instance cache entry expired");
        }
        None
    }

    /// Cache a value computed under `generation`, unless this scope was
    /// invalidated since.
    fn remember(&self, key: String, value: CachedValue, generation: u64) {
        let mut cache = self.cache.lock();
        // Checked under the cache lock: invalidation bumps the generation
        // before purging, so a stale value is either skipped here or purged.
        if !self.registry.is_current(&self.scope, generation) {
            tracing::trace!(scope = %self.scope, key = %key, "Skipping stale result");
            return;
        }
        let entry = CacheEntry::new(value, self.config.cache_ttl);
        if let Some((evicted, _)) = cache.set(key, entry) {
            tracing::trace!(scope = %self.scope, evicted = %evicted, "Instance cache eviction");
        }
    }
}

impl fmt::Debug for PermissionResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PermissionResolver")
            .field("scope", &self.scope)
            .field("caching_enabled", &self.config.caching_enabled)
            .field("cache", &*self.cache.lock())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Cache Statistics
// =============================================================================

/// Statistics about a resolver's instance cache.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverCacheStats {
    /// Number of entries.
    pub size: usize,

    /// Maximum number of entries.
    pub capacity: usize,

    /// `size / capacity` as a percentage.
    pub utilization_percent: f64,

    /// Whether the next new key will evict.
    pub is_full: bool,

    /// Entries evicted for capacity.
    pub evictions: u64,

    /// Whether caching is enabled.
    pub caching_enabled: bool,

    /// Instance cache TTL.
    pub ttl: Duration,

    /// Queries answered from the instance cache or the registry.
    pub hits: u64,

    /// Queries that had to wait for a backend fetch.
    pub misses: u64,
}

impl ResolverCacheStats {
    /// Fraction of queries served without waiting on the backend.
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
