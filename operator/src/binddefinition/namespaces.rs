use crate::util::{selector, Error};
use k8s_openapi::api::core::v1::Namespace;
use kube::{api::ListParams, Api, Client, ResourceExt};
use rbac_operator_types::RoleBindingSpec;
use std::collections::BTreeSet;

/// A namespace is terminating if it carries a deletion timestamp or its phase has already
/// flipped to `Terminating` — either is sufficient, matching the reconciler's own check.
pub fn is_terminating(namespace: &Namespace) -> bool {
    namespace.metadata.deletion_timestamp.is_some()
        || namespace.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Terminating")
}

pub async fn exists_and_active(client: Client, name: &str) -> Result<bool, Error> {
    let api: Api<Namespace> = Api::all(client);
    Ok(match api.get_opt(name).await? {
        Some(namespace) => !is_terminating(&namespace),
        None => false,
    })
}

/// Resolves the union of every directly named and selector-matched namespace across a
/// BindDefinition's `roleBindings` entries, dropping any that are terminating.
pub async fn collect_active(client: Client, role_bindings: &[RoleBindingSpec]) -> Result<BTreeSet<String>, Error> {
    let api: Api<Namespace> = Api::all(client);
    let mut names = BTreeSet::new();

    for entry in role_bindings {
        if let Some(namespace) = &entry.namespace {
            if let Some(ns) = api.get_opt(namespace).await? {
                if !is_terminating(&ns) {
                    names.insert(namespace.clone());
                }
            }
        }
        for raw_selector in &entry.namespace_selector {
            if !selector::is_non_empty(raw_selector) {
                continue;
            }
            let query = selector::to_query(raw_selector)?;
            let matched = api.list(&ListParams::default().labels(&query)).await?;
            names.extend(matched.items.iter().filter(|ns| !is_terminating(ns)).map(|ns| ns.name_any()));
        }
    }

    Ok(names)
}
