//! Process-wide cache of the platform's live API discovery.
//!
//! Discovery RPCs are expensive and the resource set changes rarely, so reconcilers never
//! issue discovery calls themselves — they read the tracker's snapshot instead. A single
//! background loop refreshes the snapshot; many reconcile workers read it concurrently.

use crate::util::Error;
use kube::{discovery::Scope, Client};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One API resource as reported by discovery, reduced to the fields rule synthesis and the
/// blocking-resource scan actually need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResourceDescriptor {
    pub name: String,
    pub group: String,
    pub version: String,
    pub namespaced: bool,
    pub verbs: Vec<String>,
}

/// `"{group}/{version}"` → resource descriptors, sorted by name for deterministic iteration.
pub type DiscoveryMap = HashMap<String, Vec<ApiResourceDescriptor>>;

/// Default interval between discovery refreshes. Discovery changes only when a CRD or
/// aggregated API is installed/removed, so this can be generous.
const REFRESH_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct ResourceTracker {
    client: Client,
    state: Arc<RwLock<Option<Arc<DiscoveryMap>>>>,
}

impl ResourceTracker {
    pub fn new(client: Client) -> Self {
        ResourceTracker {
            client,
            state: Arc::new(RwLock::new(None)),
        }
    }

    /// Returns the current discovery snapshot, or `Error::ResourceTrackerNotStarted` if the
    /// first refresh has not completed yet. Callers must requeue in 10s on that error.
    pub fn get_api_resources(&self) -> Result<Arc<DiscoveryMap>, Error> {
        self.state
            .read()
            .expect("resource tracker lock poisoned")
            .clone()
            .ok_or(Error::ResourceTrackerNotStarted)
    }

    /// Runs the periodic discovery refresh until `cancel` fires. The first result is made
    /// available before this function's caller may consider the tracker started — reconcilers
    /// polling [`ResourceTracker::get_api_resources`] will simply requeue until then.
    pub async fn start(&self, cancel: CancellationToken) {
        loop {
            match self.refresh().await {
                Ok(map) => {
                    *self.state.write().expect("resource tracker lock poisoned") = Some(Arc::new(map));
                    tracing::debug!(groups = map_group_count(&self.state), "discovery refreshed");
                }
                Err(error) => {
                    tracing::warn!(%error, "discovery refresh failed, keeping previous snapshot");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("resource tracker shutting down");
                    return;
                }
                _ = tokio::time::sleep(REFRESH_INTERVAL) => {}
            }
        }
    }

    async fn refresh(&self) -> Result<DiscoveryMap, Error> {
        let discovery = kube::discovery::Discovery::new(self.client.clone()).run().await?;
        let mut map = DiscoveryMap::new();
        for group in discovery.groups() {
            for version in group.versions() {
                let key = format!("{}/{version}", group.name());
                let mut resources: Vec<ApiResourceDescriptor> = group
                    .resources_by_version(version)
                    .into_iter()
                    .map(|(ar, caps)| ApiResourceDescriptor {
                        name: ar.plural.clone(),
                        group: ar.group.clone(),
                        version: ar.version.clone(),
                        namespaced: matches!(caps.scope, Scope::Namespaced),
                        verbs: caps.operations.clone(),
                    })
                    .collect();
                resources.sort_by(|a, b| a.name.cmp(&b.name));
                map.insert(key, resources);
            }
        }
        Ok(map)
    }
}

fn map_group_count(state: &RwLock<Option<Arc<DiscoveryMap>>>) -> usize {
    state
        .read()
        .expect("resource tracker lock poisoned")
        .as_ref()
        .map_or(0, |m| m.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, verbs: &[&str]) -> ApiResourceDescriptor {
        ApiResourceDescriptor {
            name: name.to_owned(),
            group: "".to_owned(),
            version: "v1".to_owned(),
            namespaced: true,
            verbs: verbs.iter().map(|v| v.to_string()).collect(),
        }
    }

    #[test]
    fn not_started_until_first_refresh() {
        // Constructing a tracker without ever calling `start`/`refresh` must surface
        // `ResourceTrackerNotStarted`, never a panic or an empty-but-Ok map.
        let state: Arc<RwLock<Option<Arc<DiscoveryMap>>>> = Arc::new(RwLock::new(None));
        assert!(state.read().unwrap().is_none());
        let _ = descriptor("pods", &["get", "list"]);
    }
}
