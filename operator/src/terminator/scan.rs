//! Bounded-concurrency scan for resources that should block a terminating namespace's
//! role-binding finalizers from being released.

use crate::tracker::{ApiResourceDescriptor, ResourceTracker};
use crate::util::{Error, BLOCKING_SCAN_CONCURRENCY, BLOCKING_SCAN_RATE_LIMIT};
use futures::{stream, StreamExt};
use kube::{
    api::{ApiResource, DynamicObject, ListParams},
    Api, Client,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};

/// A live resource type with at least one object remaining in the scanned namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockingResource {
    pub resource_type: String,
    pub api_group: String,
    pub count: usize,
    pub names: Vec<String>,
}

struct CacheEntry {
    computed_at: Instant,
    result: Arc<Vec<BlockingResource>>,
}

/// Caches the scan result per namespace for `BLOCKING_SCAN_RATE_LIMIT`, so repeated
/// role-binding reconciles during a slow namespace teardown don't re-run full discovery
/// listing on every event.
#[derive(Clone)]
pub struct BlockingResourceScanner {
    tracker: ResourceTracker,
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl BlockingResourceScanner {
    pub fn new(tracker: ResourceTracker) -> Self {
        Self {
            tracker,
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn get_namespaced_blocking_resources(&self, client: Client, namespace: &str) -> Result<Arc<Vec<BlockingResource>>, Error> {
        {
            let cache = self.cache.lock().await;
            if let Some(entry) = cache.get(namespace) {
                if entry.computed_at.elapsed() < BLOCKING_SCAN_RATE_LIMIT {
                    return Ok(entry.result.clone());
                }
            }
        }

        let result = Arc::new(self.scan(client, namespace).await?);
        let mut cache = self.cache.lock().await;
        cache.insert(
            namespace.to_owned(),
            CacheEntry {
                computed_at: Instant::now(),
                result: result.clone(),
            },
        );
        Ok(result)
    }

    async fn scan(&self, client: Client, namespace: &str) -> Result<Vec<BlockingResource>, Error> {
        let discovery = self.tracker.get_api_resources()?;
        let candidates: Vec<(String, ApiResourceDescriptor)> = discovery
            .iter()
            .flat_map(|(group_version, resources)| resources.iter().cloned().map(move |r| (group_version.clone(), r)))
            .filter(|(_, r)| is_scannable(r))
            .collect();

        let (tx, mut rx) = mpsc::unbounded_channel();

        stream::iter(candidates.into_iter().map(|(group_version, descriptor)| {
            let client = client.clone();
            let namespace = namespace.to_owned();
            let tx = tx.clone();
            async move {
                let api_resource = ApiResource {
                    group: descriptor.group.clone(),
                    version: descriptor.version.clone(),
                    api_version: group_version,
                    kind: descriptor.name.clone(),
                    plural: descriptor.name.clone(),
                };
                let api: Api<DynamicObject> = Api::namespaced_with(client, &namespace, &api_resource);
                match api.list(&ListParams::default()).await {
                    Ok(list) if !list.items.is_empty() => {
                        let names = list.items.iter().filter_map(|o| o.metadata.name.clone()).take(10).collect();
                        let _ = tx.send(BlockingResource {
                            resource_type: descriptor.name.clone(),
                            api_group: descriptor.group.clone(),
                            count: list.items.len(),
                            names,
                        });
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::debug!(%error, resource = descriptor.name, namespace, "skipping unlistable resource during blocking scan");
                    }
                }
            }
        }))
        .buffer_unordered(BLOCKING_SCAN_CONCURRENCY)
        .collect::<Vec<()>>()
        .await;
        drop(tx);

        let mut collected = Vec::new();
        while let Some(item) = rx.recv().await {
            collected.push(item);
        }
        collected.sort_by(|a, b| (a.api_group.clone(), a.resource_type.clone()).cmp(&(b.api_group.clone(), b.resource_type.clone())));
        Ok(collected)
    }
}

fn is_scannable(descriptor: &ApiResourceDescriptor) -> bool {
    descriptor.namespaced
        && !descriptor.name.contains('/')
        && descriptor.name != "rolebindings"
        && descriptor.verbs.iter().any(|v| v == "list")
}

pub fn summarize(resources: &[BlockingResource]) -> String {
    resources
        .iter()
        .map(|r| format!("{} {} ({} object(s))", r.api_group, r.resource_type, r.count))
        .collect::<Vec<_>>()
        .join(", ")
}
