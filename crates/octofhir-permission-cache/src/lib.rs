//! # octofhir-permission-cache
//!
//! Permission resolution cache for OctoFHIR directory backends.
//!
//! This crate provides:
//! - A bounded LRU cache with per-entry TTL
//! - A process-wide registry that shares resolved answers between resolver
//!   instances and coalesces concurrent identical backend calls
//! - A permission resolver answering permission, role and profile queries
//!   for the current actor
//! - A batch resolver for checking many permissions at once
//!
//! ## Overview
//!
//! Every backend query goes through three tiers: the resolver's own cache,
//! the shared registry's resolved values, and the registry's in-flight
//! fetches. For a given `(scope, query)` at most one backend call is ever in
//! flight. Permission checks fail closed: a backend error becomes a denied
//! [`PermissionResult`] with `error` set.
//!
//! ## Modules
//!
//! - [`backend`] - Directory client trait and backend types
//! - [`batch`] - Concurrent batch permission checks
//! - [`cache`] - Bounded LRU cache and TTL entries
//! - [`config`] - Resolver configuration
//! - [`error`] - Error types
//! - [`mapping`] - Permission kinds, masks and level names
//! - [`registry`] - Shared resolved/in-flight registry
//! - [`resolver`] - The permission resolver

pub mod backend;
pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod resolver;
pub mod value;

pub use backend::{
    ActorIdentity, BackendError, BackendResult, DirectoryClient, GroupInfo, Principal,
    PrincipalKind, RoleAssignment,
};
pub use batch::{BatchRequest, BatchResolver};
pub use cache::{BoundedCache, BoundedCacheStats, CacheEntry};
pub use config::{ConfigError, ResolverConfig};
pub use error::{CacheError, ErrorCategory};
pub use mapping::{PermissionKind, PermissionMask};
pub use registry::{DEFAULT_REGISTRY_TTL, ProcessRegistry, RegistryKey};
pub use resolver::{
    ActorProfile, GroupPermission, ItemRoleAssignments, PermissionResolver, PermissionResult,
    ResolverCacheStats, ResourcePermissions,
};

/// Type alias for permission cache results.
pub type CacheResult<T> = Result<T, CacheError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use octofhir_permission_cache::prelude::*;
/// ```
pub mod prelude {
    pub use crate::CacheResult;
    pub use crate::backend::{
        ActorIdentity, BackendError, BackendResult, DirectoryClient, GroupInfo, RoleAssignment,
    };
    pub use crate::batch::{BatchRequest, BatchResolver};
    pub use crate::config::ResolverConfig;
    pub use crate::error::CacheError;
    pub use crate::mapping::{PermissionKind, PermissionMask};
    pub use crate::registry::ProcessRegistry;
    pub use crate::resolver::{
        ActorProfile, PermissionResolver, PermissionResult, ResourcePermissions,
    };
}
