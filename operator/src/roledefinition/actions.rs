use crate::util::patch::StatusObject;
use crate::util::{Error, CREATED_BY_LABEL, MANAGER_NAME};
use k8s_openapi::api::rbac::v1::{ClusterRole, PolicyRule, Role};
use kube::{
    api::{DeleteParams, ObjectMeta},
    Api, Client, ResourceExt,
};
use rbac_operator_types::{RoleDefinition, RoleDefinitionStatus, PARENT_KIND_ANNOTATION, PARENT_NAME_ANNOTATION};
use std::collections::BTreeMap;

impl StatusObject<RoleDefinitionStatus> for RoleDefinition {
    fn mut_status(&mut self) -> &mut RoleDefinitionStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(CREATED_BY_LABEL.to_owned(), MANAGER_NAME.to_owned())])
}

fn annotations(instance: &RoleDefinition) -> BTreeMap<String, String> {
    BTreeMap::from([
        (PARENT_KIND_ANNOTATION.to_owned(), "RoleDefinition".to_owned()),
        (PARENT_NAME_ANNOTATION.to_owned(), instance.name_any()),
    ])
}

fn owner_meta(instance: &RoleDefinition, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_owned()),
        labels: Some(labels()),
        annotations: Some(annotations(instance)),
        owner_references: Some(vec![instance.controller_owner_ref(&()).expect("RoleDefinition always has metadata.uid")]),
        ..Default::default()
    }
}

/// `true` when `object`'s owner references name this RoleDefinition as a controller, i.e. the
/// operator is free to mutate it. A same-named foreign object must never be touched.
fn is_owned_by(owners: Option<&Vec<kube::api::OwnerReference>>, instance: &RoleDefinition) -> bool {
    let uid = instance.uid();
    owners.is_some_and(|refs| {
        refs.iter()
            .any(|o| o.controller == Some(true) && Some(&o.uid) == uid.as_ref())
    })
}

pub enum EnsureOutcome<T> {
    /// The object was applied and its rules changed relative to the last observation.
    Changed(T),
    /// The object was applied and already matched the desired rules.
    Unchanged(T),
    /// A foreign, non-owned object occupies the target name; nothing was mutated.
    ForeignObject,
}

/// Scope-erased summary of an [`EnsureOutcome`], so the reconciler can apply the same status
/// logic regardless of whether the generated object was a `ClusterRole` or a `Role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Foreign,
    Changed,
    Unchanged,
}

impl<T> EnsureOutcome<T> {
    pub fn simplify(&self) -> Outcome {
        match self {
            EnsureOutcome::ForeignObject => Outcome::Foreign,
            EnsureOutcome::Changed(_) => Outcome::Changed,
            EnsureOutcome::Unchanged(_) => Outcome::Unchanged,
        }
    }
}

pub async fn ensure_cluster_role(
    client: Client,
    instance: &RoleDefinition,
    name: &str,
    rules: Vec<PolicyRule>,
) -> Result<EnsureOutcome<ClusterRole>, Error> {
    let api: Api<ClusterRole> = Api::all(client.clone());
    let existing = match api.get_opt(name).await? {
        Some(existing) => existing,
        None => {
            let applied = crate::util::patch::apply_cluster(
                client,
                name,
                &ClusterRole {
                    metadata: owner_meta(instance, name),
                    rules: Some(rules),
                    ..Default::default()
                },
            )
            .await?;
            return Ok(EnsureOutcome::Changed(applied));
        }
    };

    if !is_owned_by(existing.metadata.owner_references.as_ref(), instance) {
        return Ok(EnsureOutcome::ForeignObject);
    }

    let rules_changed = existing.rules.as_ref() != Some(&rules);
    let applied = crate::util::patch::apply_cluster(
        client,
        name,
        &ClusterRole {
            metadata: owner_meta(instance, name),
            rules: Some(rules),
            ..Default::default()
        },
    )
    .await?;
    Ok(if rules_changed {
        EnsureOutcome::Changed(applied)
    } else {
        EnsureOutcome::Unchanged(applied)
    })
}

pub async fn ensure_namespace_role(
    client: Client,
    instance: &RoleDefinition,
    namespace: &str,
    name: &str,
    rules: Vec<PolicyRule>,
) -> Result<EnsureOutcome<Role>, Error> {
    let api: Api<Role> = Api::namespaced(client.clone(), namespace);
    let existing = match api.get_opt(name).await? {
        Some(existing) => existing,
        None => {
            let mut meta = owner_meta(instance, name);
            meta.namespace = Some(namespace.to_owned());
            let applied = crate::util::patch::apply_namespaced(
                client,
                namespace,
                name,
                &Role {
                    metadata: meta,
                    rules: Some(rules),
                    ..Default::default()
                },
            )
            .await?;
            return Ok(EnsureOutcome::Changed(applied));
        }
    };

    if !is_owned_by(existing.metadata.owner_references.as_ref(), instance) {
        return Ok(EnsureOutcome::ForeignObject);
    }

    let rules_changed = existing.rules.as_ref() != Some(&rules);
    let mut meta = owner_meta(instance, name);
    meta.namespace = Some(namespace.to_owned());
    let applied = crate::util::patch::apply_namespaced(
        client,
        namespace,
        name,
        &Role {
            metadata: meta,
            rules: Some(rules),
            ..Default::default()
        },
    )
    .await?;
    Ok(if rules_changed {
        EnsureOutcome::Changed(applied)
    } else {
        EnsureOutcome::Unchanged(applied)
    })
}

/// Deletes the generated cluster role. Returns `Ok(true)` once the platform confirms it is
/// gone (either it never existed, or the delete call itself succeeded).
pub async fn delete_cluster_role(client: Client, name: &str) -> Result<bool, Error> {
    let api: Api<ClusterRole> = Api::all(client);
    match api.get_opt(name).await? {
        None => Ok(true),
        Some(_) => {
            api.delete(name, &DeleteParams::default()).await?;
            Ok(false)
        }
    }
}

pub async fn delete_namespace_role(client: Client, namespace: &str, name: &str) -> Result<bool, Error> {
    let api: Api<Role> = Api::namespaced(client, namespace);
    match api.get_opt(name).await? {
        None => Ok(true),
        Some(_) => {
            api.delete(name, &DeleteParams::default()).await?;
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::{ObjectMeta, OwnerReference};

    fn role_definition(uid: &str) -> RoleDefinition {
        RoleDefinition {
            metadata: ObjectMeta {
                name: Some("readers".to_owned()),
                uid: Some(uid.to_owned()),
                ..Default::default()
            },
            spec: Default::default(),
            status: None,
        }
    }

    fn owner_ref(kind: &str, uid: &str, controller: bool) -> OwnerReference {
        OwnerReference {
            api_version: "rbac-operator.io/v1".to_owned(),
            kind: kind.to_owned(),
            name: "readers".to_owned(),
            uid: uid.to_owned(),
            controller: Some(controller),
            ..Default::default()
        }
    }

    #[test]
    fn object_owned_by_this_role_definition_is_recognized() {
        let instance = role_definition("uid-a");
        let owners = vec![owner_ref("RoleDefinition", "uid-a", true)];
        assert!(is_owned_by(Some(&owners), &instance));
    }

    #[test]
    fn foreign_object_with_no_owner_refs_is_not_owned() {
        let instance = role_definition("uid-a");
        assert!(!is_owned_by(None, &instance));
    }

    #[test]
    fn object_owned_by_a_different_role_definition_is_foreign() {
        let instance = role_definition("uid-a");
        let owners = vec![owner_ref("RoleDefinition", "uid-b", true)];
        assert!(!is_owned_by(Some(&owners), &instance));
    }

    #[test]
    fn matching_uid_without_controller_flag_is_not_owned() {
        let instance = role_definition("uid-a");
        let owners = vec![owner_ref("RoleDefinition", "uid-a", false)];
        assert!(!is_owned_by(Some(&owners), &instance));
    }
}
