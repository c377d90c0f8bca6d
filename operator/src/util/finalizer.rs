use kube::{
    api::{Patch, PatchParams, Resource},
    core::{ClusterResourceScope, NamespaceResourceScope},
    Api, Client, Error,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::{clone::Clone, fmt::Debug};

/// Finalizer carried by every `RoleDefinition`.
pub const ROLE_DEFINITION_FINALIZER: &str = "rbac-operator.io/role-definition";

/// Finalizer carried by every `BindDefinition`.
pub const BIND_DEFINITION_FINALIZER: &str = "rbac-operator.io/bind-definition";

/// Finalizer carried by every namespace role binding generated by a `BindDefinition`,
/// sequenced against namespace teardown by the `RoleBindingTerminator`.
pub const ROLE_BINDING_FINALIZER: &str = "rbac-operator.io/role-binding";

/// Adds a finalizer record to a cluster-scoped resource. If the finalizer already exists,
/// this action has no effect.
///
/// Note: Does not check for resource's existence for simplicity.
pub async fn add_cluster<T: Clone + Resource + Serialize + DeserializeOwned + Debug>(
    client: Client,
    finalizer: &str,
    name: &str,
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = ClusterResourceScope>,
{
    let api: Api<T> = Api::all(client);
    let patch: Value = json!({ "metadata": { "finalizers": [finalizer] } });
    Ok(api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}

/// Removes all finalizers from a cluster-scoped resource. If there are no finalizers
/// already, this action has no effect.
pub async fn remove_cluster<T: Clone + Resource + Serialize + DeserializeOwned + Debug>(
    client: Client,
    name: &str,
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = ClusterResourceScope>,
{
    let api: Api<T> = Api::all(client);
    let patch: Value = json!({ "metadata": { "finalizers": null } });
    Ok(api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}

/// Adds a finalizer record to a namespace-scoped resource. If the finalizer already
/// exists, this action has no effect.
pub async fn add_namespaced<T: Clone + Resource + Serialize + DeserializeOwned + Debug>(
    client: Client,
    finalizer: &str,
    name: &str,
    namespace: &str,
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<T> = Api::namespaced(client, namespace);
    let patch: Value = json!({ "metadata": { "finalizers": [finalizer] } });
    Ok(api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}

/// Removes all finalizers from a namespace-scoped resource.
pub async fn remove_namespaced<T: Clone + Resource + Serialize + DeserializeOwned + Debug>(
    client: Client,
    name: &str,
    namespace: &str,
) -> Result<T, Error>
where
    <T as Resource>::DynamicType: Default,
    T: Resource<Scope = NamespaceResourceScope>,
{
    let api: Api<T> = Api::namespaced(client, namespace);
    let patch: Value = json!({ "metadata": { "finalizers": null } });
    Ok(api
        .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
        .await?)
}
