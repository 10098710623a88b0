//! Directory backend client interface.
//!
//! The resolver talks to the remote authorization/directory service only
//! through [`DirectoryClient`]. Response mapping and normalization from the
//! service's wire format happen inside implementations of this trait, so the
//! cache layer only ever sees the typed values in [`types`].
//!
//! # Implementations
//!
//! Implementations live with the application that owns the backend session
//! (an HTTP client against the site's security API, an in-memory fake in
//! tests).

pub mod error;
pub mod types;

use async_trait::async_trait;

use crate::mapping::{PermissionKind, PermissionMask};

pub use error::{BackendError, BackendResult};
pub use types::{ActorIdentity, GroupInfo, Principal, PrincipalKind, RoleAssignment};

/// Client for the remote directory/authorization backend.
///
/// Every method is a network round trip. The resolver guarantees that at
/// most one call per `(scope, query)` is in flight at a time, so
/// implementations do not need their own request coalescing.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Get the actor the backend session is authenticated as.
    async fn current_actor(&self) -> BackendResult<ActorIdentity>;

    /// Get the groups an actor is a member of.
    async fn actor_groups(&self, actor_id: u64) -> BackendResult<Vec<GroupInfo>>;

    /// Check whether the current actor holds `kind` on a resource (list/library).
    async fn resource_has_permission(
        &self,
        resource_id: &str,
        kind: PermissionKind,
    ) -> BackendResult<bool>;

    /// Check whether the current actor holds `kind` on one item of a resource.
    async fn item_has_permission(
        &self,
        resource_id: &str,
        item_id: u64,
        kind: PermissionKind,
    ) -> BackendResult<bool>;

    /// Get the current actor's effective permission mask.
    ///
    /// `None` asks for the permissions on the scope root (the site itself).
    async fn effective_permissions(&self, resource_id: Option<&str>)
    -> BackendResult<PermissionMask>;

    /// Get the role assignments of one item.
    async fn role_assignments(
        &self,
        resource_id: &str,
        item_id: u64,
    ) -> BackendResult<Vec<RoleAssignment>>;

    /// Check whether an item breaks role inheritance from its parent.
    async fn has_unique_role_assignments(
        &self,
        resource_id: &str,
        item_id: u64,
    ) -> BackendResult<bool>;
}
