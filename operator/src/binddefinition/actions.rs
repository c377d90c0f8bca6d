use crate::util::patch::StatusObject;
use crate::util::{Error, CREATED_BY_LABEL, MANAGER_NAME};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding, RoleRef, Subject as K8sSubject};
use kube::{
    api::{DeleteParams, ObjectMeta},
    Api, Client, ResourceExt,
};
use rbac_operator_types::{
    BindDefinition, BindDefinitionStatus, Subject, SubjectKind, PARENT_KIND_ANNOTATION, PARENT_NAME_ANNOTATION,
};
use std::collections::BTreeMap;

impl StatusObject<BindDefinitionStatus> for BindDefinition {
    fn mut_status(&mut self) -> &mut BindDefinitionStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

/// Outcome of a per-object delete helper; all three are non-errors to the caller and exist
/// only to drive which event gets emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    NotFound,
    NoOwnerRef,
}

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";

fn labels() -> BTreeMap<String, String> {
    BTreeMap::from([(CREATED_BY_LABEL.to_owned(), MANAGER_NAME.to_owned())])
}

fn annotations(instance: &BindDefinition) -> BTreeMap<String, String> {
    BTreeMap::from([
        (PARENT_KIND_ANNOTATION.to_owned(), "BindDefinition".to_owned()),
        (PARENT_NAME_ANNOTATION.to_owned(), instance.name_any()),
    ])
}

fn owner_meta(instance: &BindDefinition, name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_owned()),
        namespace: namespace.map(str::to_owned),
        labels: Some(labels()),
        annotations: Some(annotations(instance)),
        owner_references: Some(vec![instance.controller_owner_ref(&()).expect("BindDefinition always has metadata.uid")]),
        ..Default::default()
    }
}

fn is_owned_by(owners: Option<&Vec<kube::api::OwnerReference>>, instance: &BindDefinition) -> bool {
    let uid = instance.uid();
    owners.is_some_and(|refs| refs.iter().any(|o| o.controller == Some(true) && Some(&o.uid) == uid.as_ref()))
}

/// `true` when some other, non-deleting BindDefinition still lists this service account
/// subject — in which case it must not be deleted alongside `instance`.
fn is_referenced_elsewhere(instance: &BindDefinition, subject: &Subject, namespace: &str, other_binddefinitions: &[BindDefinition]) -> bool {
    other_binddefinitions.iter().any(|other| {
        other.uid() != instance.uid()
            && other.metadata.deletion_timestamp.is_none()
            && other
                .spec
                .subjects
                .iter()
                .any(|s| s.kind == SubjectKind::ServiceAccount && s.name == subject.name && s.namespace.as_deref() == Some(namespace))
    })
}

fn to_k8s_subject(subject: &Subject) -> K8sSubject {
    K8sSubject {
        kind: match subject.kind {
            SubjectKind::User => "User",
            SubjectKind::Group => "Group",
            SubjectKind::ServiceAccount => "ServiceAccount",
        }
        .to_owned(),
        name: subject.name.clone(),
        namespace: subject.namespace.clone(),
        api_group: subject.api_group.clone().or(match subject.kind {
            SubjectKind::ServiceAccount => None,
            _ => Some(RBAC_API_GROUP.to_owned()),
        }),
    }
}

/// `"ClusterRole"` for a cluster-role ref, `"Role"` for a namespace-role ref — the native
/// RBAC `roleRef.kind` values that our domain's `clusterRoleRefs`/`roleRefs` map onto.
pub fn role_ref_kind(is_cluster_ref: bool) -> &'static str {
    if is_cluster_ref {
        "ClusterRole"
    } else {
        "Role"
    }
}

pub async fn cluster_role_exists(client: Client, name: &str) -> Result<bool, Error> {
    let api: Api<k8s_openapi::api::rbac::v1::ClusterRole> = Api::all(client);
    Ok(api.get_opt(name).await?.is_some())
}

pub async fn namespace_role_exists(client: Client, namespace: &str, name: &str) -> Result<bool, Error> {
    let api: Api<k8s_openapi::api::rbac::v1::Role> = Api::namespaced(client, namespace);
    Ok(api.get_opt(name).await?.is_some())
}

/// SSA-applies a service account subject. Returns `None` (skip, not an error) when the
/// subject's namespace does not exist or is terminating.
pub async fn ensure_service_account(client: Client, instance: &BindDefinition, subject: &Subject) -> Result<Option<Subject>, Error> {
    let namespace = match &subject.namespace {
        Some(ns) => ns,
        None => return Ok(None),
    };
    if !super::namespaces::exists_and_active(client.clone(), namespace).await? {
        tracing::debug!(namespace, name = subject.name, "skipping service account, namespace inactive");
        return Ok(None);
    }

    let automount = instance.spec.automount_service_account_token.unwrap_or(true);
    let sa = ServiceAccount {
        metadata: owner_meta(instance, &subject.name, Some(namespace)),
        automount_service_account_token: Some(automount),
        ..Default::default()
    };
    crate::util::patch::apply_namespaced(client, namespace, &subject.name, &sa).await?;
    Ok(Some(subject.clone()))
}

pub async fn ensure_cluster_role_binding(
    client: Client,
    instance: &BindDefinition,
    ref_name: &str,
    subjects: Vec<K8sSubject>,
) -> Result<(), Error> {
    let name = super::naming::build_binding_name(&instance.spec.target_name, ref_name);
    let binding = ClusterRoleBinding {
        metadata: owner_meta(instance, &name, None),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_owned(),
            kind: role_ref_kind(true).to_owned(),
            name: ref_name.to_owned(),
        },
        subjects: Some(subjects),
    };
    crate::util::patch::apply_cluster(client, &name, &binding).await?;
    Ok(())
}

pub async fn ensure_namespace_role_binding(
    client: Client,
    instance: &BindDefinition,
    namespace: &str,
    ref_name: &str,
    is_cluster_ref: bool,
    subjects: Vec<K8sSubject>,
) -> Result<(), Error> {
    let name = super::naming::build_binding_name(&instance.spec.target_name, ref_name);
    let binding = RoleBinding {
        metadata: owner_meta(instance, &name, Some(namespace)),
        role_ref: RoleRef {
            api_group: RBAC_API_GROUP.to_owned(),
            kind: role_ref_kind(is_cluster_ref).to_owned(),
            name: ref_name.to_owned(),
        },
        subjects: Some(subjects),
    };
    crate::util::patch::apply_namespaced(client, namespace, &name, &binding).await?;
    Ok(())
}

/// Deletes the service account subject unless another, non-deleting BindDefinition still
/// references it as a subject — shared service accounts outlive any single owner.
pub async fn delete_service_account_unless_shared(
    client: Client,
    instance: &BindDefinition,
    subject: &Subject,
    other_binddefinitions: &[BindDefinition],
) -> Result<DeleteResult, Error> {
    let namespace = match &subject.namespace {
        Some(ns) => ns,
        None => return Ok(DeleteResult::NotFound),
    };

    if is_referenced_elsewhere(instance, subject, namespace, other_binddefinitions) {
        return Ok(DeleteResult::NoOwnerRef);
    }

    let api: Api<ServiceAccount> = Api::namespaced(client, namespace);
    let existing = match api.get_opt(&subject.name).await? {
        Some(existing) => existing,
        None => return Ok(DeleteResult::NotFound),
    };
    if !is_owned_by(existing.metadata.owner_references.as_ref(), instance) {
        return Ok(DeleteResult::NoOwnerRef);
    }
    api.delete(&subject.name, &DeleteParams::default()).await?;
    Ok(DeleteResult::Deleted)
}

pub async fn delete_cluster_role_binding(client: Client, instance: &BindDefinition, ref_name: &str) -> Result<DeleteResult, Error> {
    let name = super::naming::build_binding_name(&instance.spec.target_name, ref_name);
    let api: Api<ClusterRoleBinding> = Api::all(client);
    let existing = match api.get_opt(&name).await? {
        Some(existing) => existing,
        None => return Ok(DeleteResult::NotFound),
    };
    if !is_owned_by(existing.metadata.owner_references.as_ref(), instance) {
        return Ok(DeleteResult::NoOwnerRef);
    }
    api.delete(&name, &DeleteParams::default()).await?;
    Ok(DeleteResult::Deleted)
}

pub async fn delete_namespace_role_binding(
    client: Client,
    instance: &BindDefinition,
    namespace: &str,
    ref_name: &str,
) -> Result<DeleteResult, Error> {
    let name = super::naming::build_binding_name(&instance.spec.target_name, ref_name);
    let api: Api<RoleBinding> = Api::namespaced(client, namespace);
    let existing = match api.get_opt(&name).await? {
        Some(existing) => existing,
        None => return Ok(DeleteResult::NotFound),
    };
    if !is_owned_by(existing.metadata.owner_references.as_ref(), instance) {
        return Ok(DeleteResult::NoOwnerRef);
    }
    api.delete(&name, &DeleteParams::default()).await?;
    Ok(DeleteResult::Deleted)
}

pub fn to_k8s_subjects(subjects: &[Subject]) -> Vec<K8sSubject> {
    subjects.iter().map(to_k8s_subject).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    fn bind_definition(uid: &str, name: &str, subjects: Vec<Subject>, deleting: bool) -> BindDefinition {
        BindDefinition {
            metadata: ObjectMeta {
                name: Some(name.to_owned()),
                uid: Some(uid.to_owned()),
                deletion_timestamp: deleting.then(|| Time(chrono::Utc::now())),
                ..Default::default()
            },
            spec: rbac_operator_types::BindDefinitionSpec {
                target_name: name.to_owned(),
                subjects,
                ..Default::default()
            },
            status: None,
        }
    }

    fn sa_subject(name: &str, namespace: &str) -> Subject {
        Subject {
            kind: SubjectKind::ServiceAccount,
            name: name.to_owned(),
            namespace: Some(namespace.to_owned()),
            api_group: None,
        }
    }

    #[test]
    fn shared_service_account_is_not_deleted_while_another_owner_references_it() {
        let instance = bind_definition("uid-a", "readers", vec![sa_subject("shared-sa", "team-a")], false);
        let other = bind_definition("uid-b", "writers", vec![sa_subject("shared-sa", "team-a")], false);
        assert!(is_referenced_elsewhere(&instance, &sa_subject("shared-sa", "team-a"), "team-a", &[other]));
    }

    #[test]
    fn unshared_service_account_is_free_to_delete() {
        let instance = bind_definition("uid-a", "readers", vec![sa_subject("solo-sa", "team-a")], false);
        let other = bind_definition("uid-b", "writers", vec![sa_subject("other-sa", "team-a")], false);
        assert!(!is_referenced_elsewhere(&instance, &sa_subject("solo-sa", "team-a"), "team-a", &[other]));
    }

    #[test]
    fn a_deleting_sibling_does_not_count_as_still_referencing() {
        let instance = bind_definition("uid-a", "readers", vec![sa_subject("shared-sa", "team-a")], false);
        let other = bind_definition("uid-b", "writers", vec![sa_subject("shared-sa", "team-a")], true);
        assert!(!is_referenced_elsewhere(&instance, &sa_subject("shared-sa", "team-a"), "team-a", &[other]));
    }

    #[test]
    fn foreign_service_account_is_not_owned() {
        let instance = bind_definition("uid-a", "readers", vec![], false);
        assert!(!is_owned_by(None, &instance));
    }
}
