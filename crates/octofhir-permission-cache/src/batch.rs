//! Concurrent permission checks.
//!
//! [`BatchResolver`] runs many checks through one [`PermissionResolver`] at
//! once, so requests that share a query share its backend call. Each check
//! is isolated: one failing or panicking check yields a fail-closed entry
//! without affecting the rest.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::future::{self, FutureExt};
use serde::{Deserialize, Serialize};

use crate::resolver::{PermissionResolver, PermissionResult};

/// One permission check in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub resource_id: String,

    /// Check one item instead of the whole resource.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<u64>,

    pub level: String,

    /// Result key. Defaults to `resource[:item]:level`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl BatchRequest {
    /// A check on a whole resource.
    #[must_use]
    pub fn resource(resource_id: impl Into<String>, level: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            item_id: None,
            level: level.into(),
            key: None,
        }
    }

    /// A check on one item.
    #[must_use]
    pub fn item(resource_id: impl Into<String>, item_id: u64, level: impl Into<String>) -> Self {
        Self {
            item_id: Some(item_id),
            ..Self::resource(resource_id, level)
        }
    }

    /// Set the result key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The key this request's result is stored under.
    pub fn result_key(&self) -> String {
        if let Some(key) = &self.key {
            return key.clone();
        }
        match self.item_id {
            Some(item_id) => format!("{}:{}:{}", self.resource_id, item_id, self.level),
            None => format!("{}:{}", self.resource_id, self.level),
        }
    }
}

/// Resolves many permission checks concurrently.
#[derive(Debug, Clone)]
pub struct BatchResolver {
    resolver: Arc<PermissionResolver>,
}

impl BatchResolver {
    /// Create a batch resolver over `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<PermissionResolver>) -> Self {
        Self { resolver }
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &Arc<PermissionResolver> {
        &self.resolver
    }

    /// Run every request concurrently and collect results by key.
    ///
    /// Requests sharing a key overwrite each other; the last one in input
    /// order wins.
    pub async fn resolve_all(&self, requests: Vec<BatchRequest>) -> HashMap<String, PermissionResult> {
        let total = requests.len();
        let checks = requests.into_iter().map(|request| async move {
            let key = request.result_key();
            let result = AssertUnwindSafe(self.check(&request))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(
                        key = %key,
                        panic = %message,
                        "Permission check panicked"
                    );
                    PermissionResult::failed(format!("Permission check panicked: {}", message))
                        .with_level(request.level.as_str())
                });
            (key, result)
        });

        let results: HashMap<String, PermissionResult> =
            future::join_all(checks).await.into_iter().collect();

        let failed = results.values().filter(|r| r.is_error()).count();
        tracing::debug!(
            scope = %self.resolver.scope(),
            requests = total,
            results = results.len(),
            failed,
            "Batch resolved"
        );
        results
    }

    /// Check one level across many resources, keyed by resource id.
    pub async fn check_resources<S: AsRef<str>>(
        &self,
        resource_ids: &[S],
        level: &str,
    ) -> HashMap<String, PermissionResult> {
        let requests = resource_ids
            .iter()
            .map(|id| BatchRequest::resource(id.as_ref(), level).with_key(id.as_ref()))
            .collect();
        self.resolve_all(requests).await
    }

    async fn check(&self, request: &BatchRequest) -> PermissionResult {
        match request.item_id {
            Some(item_id) => {
                self.resolver
                    .has_permission_on_item(&request.resource_id, item_id, &request.level)
                    .await
            }
            None => {
                self.resolver
                    .has_permission_on_resource(&request.resource_id, &request.level)
                    .await
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
