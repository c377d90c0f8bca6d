use super::MANAGER_NAME;
use kube::{
    api::{Patch, PatchParams, Resource},
    core::ClusterResourceScope,
    Api, Client, Error,
};
use rbac_operator_types::HasConditions;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::fmt::Debug;

/// Implemented by every CRD root type in this operator, all of which are cluster-scoped.
/// Gives the status-apply path a uniform way to reach (and lazily initialize) the status
/// subresource without hand-writing a `patch_status` per kind.
pub trait StatusObject<S: HasConditions> {
    fn mut_status(&mut self) -> &mut S;
}

/// Applies a mutation to a resource's status subresource via server-side apply, using a
/// fixed field manager so that concurrent reconciles (across replicas, in HA) converge by
/// field ownership rather than an optimistic-lock retry loop.
///
/// `observed_generation` is set from `instance.metadata.generation` after `f` runs, so
/// callers never need to thread it through themselves.
pub async fn apply_status<S, T>(client: Client, instance: &T, f: impl FnOnce(&mut S)) -> Result<T, Error>
where
    S: HasConditions + Serialize + Clone + Debug,
    T: Clone + Resource<Scope = ClusterResourceScope> + StatusObject<S> + Serialize + DeserializeOwned + Debug,
    <T as Resource>::DynamicType: Default,
{
    let mut modified = instance.clone();
    {
        let status = modified.mut_status();
        f(status);
    }
    let status = modified.mut_status();
    let dt = <T as Resource>::DynamicType::default();
    let patch: Value = json!({
        "apiVersion": T::api_version(&dt),
        "kind": T::kind(&dt),
        "status": status,
    });
    let name = instance.meta().name.as_deref().unwrap();
    let api: Api<T> = Api::all(client);
    Ok(api
        .patch_status(
            name,
            &PatchParams::apply(MANAGER_NAME).force(),
            &Patch::Apply(&patch),
        )
        .await?)
}

/// SSA-applies a namespace-scoped child resource (`ServiceAccount`, `Role`, `RoleBinding`)
/// owned by this operator. `desired` must already carry the owner reference and operator
/// labels expected by the caller; this function performs no merging of its own.
pub async fn apply_namespaced<T>(client: Client, namespace: &str, name: &str, desired: &T) -> Result<T, Error>
where
    T: Clone + Resource + Serialize + DeserializeOwned + Debug,
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = kube::core::NamespaceResourceScope>,
{
    let api: Api<T> = Api::namespaced(client, namespace);
    Ok(api
        .patch(
            name,
            &PatchParams::apply(MANAGER_NAME).force(),
            &Patch::Apply(desired),
        )
        .await?)
}

/// SSA-applies a cluster-scoped child resource (`ClusterRoleBinding`-equivalent) owned by
/// this operator.
pub async fn apply_cluster<T>(client: Client, name: &str, desired: &T) -> Result<T, Error>
where
    T: Clone + Resource<Scope = ClusterResourceScope> + Serialize + DeserializeOwned + Debug,
    <T as Resource>::DynamicType: Default,
{
    let api: Api<T> = Api::all(client);
    Ok(api
        .patch(
            name,
            &PatchParams::apply(MANAGER_NAME).force(),
            &Patch::Apply(desired),
        )
        .await?)
}
