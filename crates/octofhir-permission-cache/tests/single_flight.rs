//! Integration tests for request coalescing across resolver instances.
//!
//! Every resolver built over the same `ProcessRegistry` must share one
//! backend call per `(scope, query)`, and a failed or abandoned call must
//! never leave a stuck in-flight entry behind.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockDirectory, SCOPE, init_tracing, resolver};
use futures_util::future::join_all;
use octofhir_permission_cache::{
    PermissionKind, PermissionResolver, ProcessRegistry, RegistryKey, ResolverConfig,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_instances_share_one_backend_call() {
    init_tracing();
    let client = Arc::new(MockDirectory::new());
    client.grant("Tasks", PermissionKind::EditListItems);
    let registry = Arc::new(ProcessRegistry::new());

    let a = resolver(&client, &registry, ResolverConfig::default());
    let b = resolver(&client, &registry, ResolverConfig::default());

    let (ra, rb) = tokio::join!(
        a.has_permission_on_resource("Tasks", "edit"),
        b.has_permission_on_resource("Tasks", "edit"),
    );

    assert!(ra.granted);
    assert!(rb.granted);
    assert_eq!(client.permission_calls(), 1);
    assert_eq!(registry.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_many_concurrent_callers_share_one_backend_call() {
    init_tracing();
    let client = Arc::new(MockDirectory::new());
    client.grant("Tasks", PermissionKind::ViewListItems);
    let registry = Arc::new(ProcessRegistry::new());

    let resolvers: Vec<Arc<PermissionResolver>> = (0..4)
        .map(|_| Arc::new(resolver(&client, &registry, ResolverConfig::default())))
        .collect();

    let handles = (0..20).map(|i| {
        let resolver = Arc::clone(&resolvers[i % resolvers.len()]);
        // "read", "view" and the kind name all resolve to ViewListItems.
        let level = ["read", "view", "ViewListItems"][i % 3];
        tokio::spawn(async move { resolver.has_permission_on_resource("Tasks", level).await })
    });

    for result in join_all(handles).await {
        assert!(result.expect("task completed").granted);
    }
    assert_eq!(client.permission_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resolved_value_is_reused_by_a_new_instance() {
    let client = Arc::new(MockDirectory::new());
    client.grant("Tasks", PermissionKind::ViewListItems);
    let registry = Arc::new(ProcessRegistry::new());

    let first = resolver(&client, &registry, ResolverConfig::default());
    assert!(first.has_permission_on_resource("Tasks", "read").await.granted);

    let second = resolver(&client, &registry, ResolverConfig::default());
    assert!(second.has_permission_on_resource("Tasks", "read").await.granted);

    assert_eq!(client.permission_calls(), 1);
    let stats = second.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.size, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_scopes_do_not_share_calls() {
    let client = Arc::new(MockDirectory::new());
    let registry = Arc::new(ProcessRegistry::new());

    let hr = resolver(&client, &registry, ResolverConfig::default());
    let it = PermissionResolver::new(
        client.clone(),
        registry.clone(),
        "https://contoso.sharepoint.com/sites/it",
        ResolverConfig::default(),
    )
    .expect("valid resolver config");

    tokio::join!(
        hr.has_permission_on_resource("Tasks", "edit"),
        it.has_permission_on_resource("Tasks", "edit"),
    );

    assert_eq!(client.permission_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_clears_pending_and_next_call_retries() {
    init_tracing();
    let client = Arc::new(MockDirectory::new());
    client.grant("Tasks", PermissionKind::EditListItems);
    client.fail("Tasks");
    let registry = Arc::new(ProcessRegistry::new());

    let a = resolver(&client, &registry, ResolverConfig::default());
    let b = resolver(&client, &registry, ResolverConfig::default());

    let (ra, rb) = tokio::join!(
        a.has_permission_on_resource("Tasks", "edit"),
        b.has_permission_on_resource("Tasks", "edit"),
    );

    assert!(!ra.granted);
    assert!(!rb.granted);
    assert!(ra.error.as_deref().unwrap_or_default().contains("offline"));
    assert!(rb.is_error());
    assert_eq!(client.permission_calls(), 1);
    assert_eq!(registry.pending_count(), 0);
    assert_eq!(registry.resolved_count(), 0);

    client.recover("Tasks");
    let retry = a.has_permission_on_resource("Tasks", "edit").await;

    assert!(retry.granted);
    assert!(!retry.is_error());
    assert_eq!(client.permission_calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_panicking_backend_fails_closed_and_clears_pending() {
    init_tracing();
    let client = Arc::new(MockDirectory::new());
    client.panic_on("Broken");
    let registry = Arc::new(ProcessRegistry::new());
    let resolver = resolver(&client, &registry, ResolverConfig::default());

    let result = resolver.has_permission_on_item("Broken", 1, "read").await;

    assert!(!result.granted);
    assert!(result.is_error());
    assert_eq!(registry.pending_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_abandoned_caller_does_not_cancel_fetch() {
    let client = Arc::new(MockDirectory::new());
    client.grant("Tasks", PermissionKind::ViewListItems);
    let registry = Arc::new(ProcessRegistry::new());
    let resolver = Arc::new(resolver(&client, &registry, ResolverConfig::default()));

    let caller = {
        let resolver = Arc::clone(&resolver);
        tokio::spawn(async move { resolver.has_permission_on_resource("Tasks", "read").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    caller.abort();

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(registry.pending_count(), 0);
    assert!(
        registry
            .get_fresh(&RegistryKey::new(SCOPE, "resource_permission:Tasks:ViewListItems"))
            .is_some()
    );

    assert!(resolver.has_permission_on_resource("Tasks", "read").await.granted);
    assert_eq!(client.permission_calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_caching_disabled_still_coalesces_concurrent_calls() {
    let client = Arc::new(MockDirectory::new());
    let registry = Arc::new(ProcessRegistry::new());
    let resolver = resolver(&client, &registry, ResolverConfig::default().with_caching(false));

    tokio::join!(
        resolver.has_permission_on_resource("Tasks", "edit"),
        resolver.has_permission_on_resource("Tasks", "edit"),
    );
    assert_eq!(client.permission_calls(), 1);

    resolver.has_permission_on_resource("Tasks", "edit").await;
    assert_eq!(client.permission_calls(), 2);
    assert_eq!(registry.resolved_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_role_checks_share_identity_calls() {
    let client = Arc::new(MockDirectory::new());
    let registry = Arc::new(ProcessRegistry::new());
    let a = resolver(&client, &registry, ResolverConfig::default());
    let b = resolver(&client, &registry, ResolverConfig::default());

    let (owners, visitors) = tokio::join!(a.actor_has_role("Owners"), b.actor_has_role("visitor"));

    assert!(owners.granted);
    assert!(!visitors.granted);
    assert_eq!(client.actor_calls(), 1);
}
