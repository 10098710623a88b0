//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use octofhir_permission_cache::{
    ActorIdentity, BackendError, BackendResult, DirectoryClient, GroupInfo, PermissionKind,
    PermissionMask, PermissionResolver, ProcessRegistry, ResolverConfig, RoleAssignment,
};
use parking_lot::Mutex;

pub const SCOPE: &str = "https://contoso.sharepoint.com/sites/hr";

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// In-memory directory with per-method call counters.
///
/// Every call sleeps for `latency` first so concurrent callers overlap.
pub struct MockDirectory {
    pub latency: Duration,
    pub groups: Vec<GroupInfo>,
    granted: Mutex<HashSet<(String, PermissionKind)>>,
    failing: Mutex<HashSet<String>>,
    panicking: Mutex<HashSet<String>>,
    pub actor_calls: AtomicUsize,
    pub group_calls: AtomicUsize,
    pub permission_calls: AtomicUsize,
    pub item_calls: AtomicUsize,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            latency: Duration::from_millis(20),
            groups: vec![
                GroupInfo::new(1, "HR Owners"),
                GroupInfo::new(2, "HR-Archive Members"),
            ],
            granted: Mutex::new(HashSet::new()),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            actor_calls: AtomicUsize::new(0),
            group_calls: AtomicUsize::new(0),
            permission_calls: AtomicUsize::new(0),
            item_calls: AtomicUsize::new(0),
        }
    }

    pub fn grant(&self, resource_id: &str, kind: PermissionKind) {
        self.granted.lock().insert((resource_id.to_string(), kind));
    }

    /// Make every permission call on `resource_id` fail.
    pub fn fail(&self, resource_id: &str) {
        self.failing.lock().insert(resource_id.to_string());
    }

    pub fn recover(&self, resource_id: &str) {
        self.failing.lock().remove(resource_id);
    }

    /// Make every permission call on `resource_id` panic.
    pub fn panic_on(&self, resource_id: &str) {
        self.panicking.lock().insert(resource_id.to_string());
    }

    pub fn permission_calls(&self) -> usize {
        self.permission_calls.load(Ordering::SeqCst)
    }

    pub fn item_calls(&self) -> usize {
        self.item_calls.load(Ordering::SeqCst)
    }

    pub fn actor_calls(&self) -> usize {
        self.actor_calls.load(Ordering::SeqCst)
    }

    fn check(&self, resource_id: &str, kind: PermissionKind) -> BackendResult<bool> {
        if self.panicking.lock().contains(resource_id) {
            panic!("directory client panicked on {}", resource_id);
        }
        if self.failing.lock().contains(resource_id) {
            return Err(BackendError::unavailable(format!("{} is offline", resource_id)));
        }
        Ok(self
            .granted
            .lock()
            .contains(&(resource_id.to_string(), kind)))
    }
}

impl Default for MockDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    async fn current_actor(&self) -> BackendResult<ActorIdentity> {
        self.actor_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(ActorIdentity::new(7, "i:0#.f|membership|jane@contoso.com")
            .with_email("jane@contoso.com"))
    }

    async fn actor_groups(&self, _actor_id: u64) -> BackendResult<Vec<GroupInfo>> {
        self.group_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(self.groups.clone())
    }

    async fn resource_has_permission(
        &self,
        resource_id: &str,
        kind: PermissionKind,
    ) -> BackendResult<bool> {
        self.permission_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.check(resource_id, kind)
    }

    async fn item_has_permission(
        &self,
        resource_id: &str,
        _item_id: u64,
        kind: PermissionKind,
    ) -> BackendResult<bool> {
        self.item_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.check(resource_id, kind)
    }

    async fn effective_permissions(
        &self,
        _resource_id: Option<&str>,
    ) -> BackendResult<PermissionMask> {
        tokio::time::sleep(self.latency).await;
        Ok(PermissionMask::from_kinds([PermissionKind::ViewListItems]))
    }

    async fn role_assignments(
        &self,
        _resource_id: &str,
        _item_id: u64,
    ) -> BackendResult<Vec<RoleAssignment>> {
        tokio::time::sleep(self.latency).await;
        Ok(vec![RoleAssignment::group(1, "HR Owners", &["Full Control"])])
    }

    async fn has_unique_role_assignments(
        &self,
        _resource_id: &str,
        _item_id: u64,
    ) -> BackendResult<bool> {
        Ok(false)
    }
}

/// Build a resolver over `client` sharing `registry`.
pub fn resolver(
    client: &Arc<MockDirectory>,
    registry: &Arc<ProcessRegistry>,
    config: ResolverConfig,
) -> PermissionResolver {
    PermissionResolver::new(client.clone(), registry.clone(), SCOPE, config)
        .expect("valid resolver config")
}
