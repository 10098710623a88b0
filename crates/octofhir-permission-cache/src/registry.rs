//! Process-wide registry of resolved and in-flight directory queries.
//!
//! A host can construct many [`PermissionResolver`](crate::PermissionResolver)
//! instances backed by the same directory session. Each has its own bounded
//! cache, but they all share one [`ProcessRegistry`] so that:
//!
//! - a value fetched by one instance is reused by the others until the
//!   registry TTL runs out, and
//! - at most one backend call per `(scope, key)` is ever in flight. A second
//!   caller, from any instance, joins the outstanding call instead of
//!   starting its own.
//!
//! Removing entries bumps the scope's invalidation generation. A fetch that
//! started under an older generation still answers its callers, but its
//! result is not stored, so an invalidation issued while a fetch is in
//! flight is not undone when that fetch settles.
//!
//! Build one registry per process and hand the same `Arc` to every resolver.
//!
//! ```ignore
//! let registry = Arc::new(ProcessRegistry::new());
//! let a = PermissionResolver::new(client.clone(), registry.clone(), "https://contoso/sites/hr", config.clone())?;
//! let b = PermissionResolver::new(client, registry, "https://contoso/sites/hr", config)?;
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::time::Instant;

use crate::backend::BackendError;
use crate::value::CachedValue;

/// Default lifetime of a resolved registry entry (5 minutes).
pub const DEFAULT_REGISTRY_TTL: Duration = Duration::from_secs(300);

/// Outcome of one backend fetch, shared by every caller that joined it.
pub type FetchOutcome = Result<CachedValue, BackendError>;

/// An in-flight backend fetch that any number of callers can await.
pub type PendingFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Registry key: the backend scope plus the query key within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryKey {
    /// Backend target, e.g. the site URL.
    pub scope: String,

    /// Query key, see [`crate::resolver::keys`].
    pub key: String,
}

impl RegistryKey {
    /// Creates a registry key.
    #[must_use]
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scope, self.key)
    }
}

/// An in-flight fetch together with the scope generation it started under.
#[derive(Clone)]
pub struct InFlight {
    pub fetch: PendingFetch,
    pub generation: u64,
}

/// How a registry lookup was satisfied.
pub enum Flight {
    /// A resolved value younger than the registry TTL.
    Resolved(CachedValue),
    /// Another caller's fetch was already in flight.
    Joined(InFlight),
    /// This caller started the fetch.
    Started(InFlight),
}

struct ResolvedEntry {
    value: CachedValue,
    stored_at: Instant,
}

struct PendingSlot {
    flight_id: u64,
    flight: InFlight,
}

/// Shared registry of resolved values and in-flight fetches.
pub struct ProcessRegistry {
    resolved: DashMap<RegistryKey, ResolvedEntry>,
    pending: DashMap<RegistryKey, PendingSlot>,
    generations: DashMap<String, u64>,
    next_flight: AtomicU64,
    ttl: Duration,
}

impl ProcessRegistry {
    /// Create a registry with the default TTL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_REGISTRY_TTL)
    }

    /// Create a registry whose resolved entries live for `ttl`.
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            resolved: DashMap::new(),
            pending: DashMap::new(),
            generations: DashMap::new(),
            next_flight: AtomicU64::new(1),
            ttl,
        }
    }

    /// Lifetime of resolved entries.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a resolved value if it is younger than the TTL.
    ///
    /// Expired entries are removed.
    pub fn get_fresh(&self, key: &RegistryKey) -> Option<CachedValue> {
        let now = Instant::now();
        {
            let entry = self.resolved.get(key)?;
            if now.duration_since(entry.stored_at) < self.ttl {
                return Some(entry.value.clone());
            }
        }

        self.resolved
            .remove_if(key, |_, entry| now.duration_since(entry.stored_at) >= self.ttl);
        tracing::trace!(key = %key, "Registry entry expired");
        None
    }

    /// Store a resolved value, replacing any previous one.
    pub fn store(&self, key: RegistryKey, value: CachedValue) {
        self.resolved.insert(
            key,
            ResolvedEntry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Current invalidation generation of `scope`.
    pub fn generation(&self, scope: &str) -> u64 {
        self.generations.get(scope).map_or(0, |g| *g)
    }

    /// Returns `true` if nothing in `scope` was invalidated since `generation`.
    pub fn is_current(&self, scope: &str, generation: u64) -> bool {
        self.generation(scope) == generation
    }

    /// Store a value computed under `generation`, unless the scope has been
    /// invalidated since. Returns `true` if the value was stored.
    pub fn store_if_current(&self, key: RegistryKey, value: CachedValue, generation: u64) -> bool {
        // The read guard keeps a concurrent bump from slipping between the
        // check and the insert.
        let current = self.generations.get(&key.scope);
        if current.as_deref().copied().unwrap_or(0) != generation {
            tracing::debug!(key = %key, "Dropping result fetched before invalidation");
            return false;
        }
        self.store(key, value);
        drop(current);
        true
    }

    fn bump_generation(&self, scope: &str) {
        *self.generations.entry(scope.to_string()).or_insert(0) += 1;
    }

    /// Resolve `key` through the registry, starting `fetch` only when no
    /// fresh value exists and no other fetch for the key is in flight.
    ///
    /// The pending entry is registered before this returns, and removed by
    /// the fetch task itself once it settles (success, error or panic).
    /// The fetch runs on its own task: callers that stop awaiting do not
    /// cancel it, and its result is still stored for the next caller when
    /// `store` is set and the scope was not invalidated meanwhile.
    pub fn join_or_start<F>(self: &Arc<Self>, key: &RegistryKey, store: bool, fetch: F) -> Flight
    where
        F: FnOnce() -> BoxFuture<'static, FetchOutcome>,
    {
        match self.pending.entry(key.clone()) {
            Entry::Occupied(slot) => {
                tracing::debug!(key = %key, "Joining in-flight directory fetch");
                Flight::Joined(slot.get().flight.clone())
            }
            Entry::Vacant(slot) => {
                // A fetch may have settled between the caller's resolved
                // check and taking this slot; its value is stored by now.
                if store {
                    if let Some(value) = self.get_fresh(key) {
                        return Flight::Resolved(value);
                    }
                }

                let flight_id = self.next_flight.fetch_add(1, Ordering::Relaxed);
                let generation = self.generation(&key.scope);
                let flight = InFlight {
                    fetch: self.spawn_fetch(key.clone(), flight_id, generation, store, fetch()),
                    generation,
                };
                slot.insert(PendingSlot {
                    flight_id,
                    flight: flight.clone(),
                });
                tracing::debug!(key = %key, flight_id, generation, "Started directory fetch");
                Flight::Started(flight)
            }
        }
    }

    fn spawn_fetch(
        self: &Arc<Self>,
        key: RegistryKey,
        flight_id: u64,
        generation: u64,
        store: bool,
        fetch: BoxFuture<'static, FetchOutcome>,
    ) -> PendingFetch {
        let registry = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let _guard = PendingGuard {
                registry: Arc::clone(&registry),
                key: key.clone(),
                flight_id,
            };

            let outcome = fetch.await;
            if store {
                if let Ok(value) = &outcome {
                    registry.store_if_current(key, value.clone(), generation);
                }
            }
            outcome
        });

        async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(err) => Err(BackendError::other(format!(
                    "directory fetch task failed: {}",
                    err
                ))),
            }
        }
        .boxed()
        .shared()
    }

    /// Returns `true` if a fetch for `key` is in flight.
    pub fn is_pending(&self, key: &RegistryKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of in-flight fetches.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of resolved entries, including expired ones not yet purged.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Remove one resolved entry.
    pub fn remove(&self, key: &RegistryKey) -> bool {
        self.bump_generation(&key.scope);
        self.resolved.remove(key).is_some()
    }

    /// Remove resolved entries of `scope` whose query key matches `predicate`.
    ///
    /// In-flight fetches keep running for the callers awaiting them, but
    /// their results are no longer stored. Returns the number removed.
    pub fn remove_where<F>(&self, scope: &str, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        self.bump_generation(scope);
        let mut removed = 0;
        self.resolved.retain(|key, _| {
            let doomed = key.scope == scope && predicate(&key.key);
            if doomed {
                removed += 1;
            }
            !doomed
        });
        removed
    }

    /// Remove every resolved entry of `scope`.
    pub fn clear_scope(&self, scope: &str) -> usize {
        self.remove_where(scope, |_| true)
    }

    /// Drop all expired resolved entries.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        self.resolved.retain(|_, entry| {
            let fresh = now.duration_since(entry.stored_at) < self.ttl;
            if !fresh {
                removed += 1;
            }
            fresh
        });
        if removed > 0 {
            tracing::debug!(removed, "Purged expired registry entries");
        }
        removed
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("resolved", &self.resolved.len())
            .field("pending", &self.pending.len())
            .field("scopes", &self.generations.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

/// Clears a pending slot when the fetch task ends, however it ends.
struct PendingGuard {
    registry: Arc<ProcessRegistry>,
    key: RegistryKey,
    flight_id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let flight_id = self.flight_id;
        self.registry
            .pending
            .remove_if(&self.key, |_, slot| slot.flight_id == flight_id);
    }
}
