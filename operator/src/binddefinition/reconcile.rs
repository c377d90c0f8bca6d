use super::actions::{self, DeleteResult};
use super::namespaces;
use crate::util::{conditions, events, finalizer, messages, patch, Error, PROBE_INTERVAL};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRoleBinding, RoleBinding};
use kube::{
    api::ListParams,
    runtime::{controller::Action, events::Recorder, Controller},
    Api, Client, ResourceExt,
};
use rbac_operator_types::{conditions::types, BindDefinition, Subject, SubjectKind};
use std::sync::Arc;
use std::time::Duration;

struct ContextData {
    client: Client,
    recorder: Recorder,
    #[cfg(feature = "metrics")]
    metrics: crate::util::metrics::ControllerMetrics,
}

pub async fn run(client: Client) -> Result<(), Error> {
    tracing::info!("starting BindDefinition controller");
    let api: Api<BindDefinition> = Api::all(client.clone());
    let context = Arc::new(ContextData {
        client: client.clone(),
        recorder: events::recorder(client.clone()),
        #[cfg(feature = "metrics")]
        metrics: crate::util::metrics::ControllerMetrics::new("bind_definition"),
    });

    Controller::new(api, ListParams::default())
        .owns(Api::<ClusterRoleBinding>::all(client.clone()), ListParams::default())
        .owns(Api::<RoleBinding>::all(client.clone()), ListParams::default())
        .owns(Api::<ServiceAccount>::all(client), ListParams::default())
        .run(reconcile, on_error, context)
        .for_each(|result| async move {
            if let Err(error) = result {
                tracing::warn!(%error, "BindDefinition reconcile failed");
            }
        })
        .await;
    Ok(())
}

async fn reconcile(instance: Arc<BindDefinition>, ctx: Arc<ContextData>) -> Result<Action, Error> {
    let client = ctx.client.clone();
    let generation = instance.meta().generation.unwrap_or_default();

    #[cfg(feature = "metrics")]
    ctx.metrics.reconcile_counter.with_label_values(&[&instance.name_any(), ""]).inc();

    if instance.meta().deletion_timestamp.is_some() {
        return reconcile_delete(client, &ctx.recorder, instance.as_ref()).await;
    }

    let mut status = instance.status.clone().unwrap_or_default();
    status.observed_generation = Some(generation);
    conditions::mark(&mut status, types::RECONCILING, true, "Reconciling", "bindings are being converged", generation);
    let instance = patch::apply_status(client.clone(), instance.as_ref(), |s| *s = status).await?;

    let instance: BindDefinition = finalizer::add_cluster(client.clone(), finalizer::BIND_DEFINITION_FINALIZER, &instance.name_any()).await?;

    let active_namespaces = namespaces::collect_active(client.clone(), &instance.spec.role_bindings).await?;

    let mut role_refs_valid = true;
    if let Some(crb) = &instance.spec.cluster_role_bindings {
        for cluster_role_ref in &crb.cluster_role_refs {
            if !actions::cluster_role_exists(client.clone(), cluster_role_ref).await? {
                role_refs_valid = false;
                events::warning(&ctx.recorder, &instance, messages::REASON_ROLE_REF_MISSING, format!("cluster role {cluster_role_ref} does not exist"), "Reconcile").await;
            }
        }
    }
    for entry in &instance.spec.role_bindings {
        for cluster_role_ref in &entry.cluster_role_refs {
            if !actions::cluster_role_exists(client.clone(), cluster_role_ref).await? {
                role_refs_valid = false;
                events::warning(&ctx.recorder, &instance, messages::REASON_ROLE_REF_MISSING, format!("cluster role {cluster_role_ref} does not exist"), "Reconcile").await;
            }
        }
        for namespace in &active_namespaces {
            for role_ref in &entry.role_refs {
                if !actions::namespace_role_exists(client.clone(), namespace, role_ref).await? {
                    role_refs_valid = false;
                    events::warning(&ctx.recorder, &instance, messages::REASON_ROLE_REF_MISSING, format!("role {role_ref} does not exist in namespace {namespace}"), "Reconcile").await;
                }
            }
        }
    }

    let mut generated_service_accounts: Vec<Subject> = Vec::new();
    for subject in &instance.spec.subjects {
        if subject.kind != SubjectKind::ServiceAccount {
            continue;
        }
        if let Some(ensured) = actions::ensure_service_account(client.clone(), &instance, subject).await? {
            generated_service_accounts.push(ensured);
        }
    }

    let k8s_subjects = actions::to_k8s_subjects(&instance.spec.subjects);

    if let Some(crb) = &instance.spec.cluster_role_bindings {
        for cluster_role_ref in &crb.cluster_role_refs {
            actions::ensure_cluster_role_binding(client.clone(), &instance, cluster_role_ref, k8s_subjects.clone()).await?;
        }
    }

    for entry in &instance.spec.role_bindings {
        for namespace in &active_namespaces {
            for cluster_role_ref in &entry.cluster_role_refs {
                actions::ensure_namespace_role_binding(client.clone(), &instance, namespace, cluster_role_ref, true, k8s_subjects.clone()).await?;
            }
            for role_ref in &entry.role_refs {
                actions::ensure_namespace_role_binding(client.clone(), &instance, namespace, role_ref, false, k8s_subjects.clone()).await?;
            }
        }
    }

    let mut status = instance.status.clone().unwrap_or_default();
    status.observed_generation = Some(generation);
    generated_service_accounts.sort_by(|a, b| (a.namespace.clone(), a.name.clone()).cmp(&(b.namespace.clone(), b.name.clone())));
    generated_service_accounts.dedup_by(|a, b| a.name == b.name && a.namespace == b.namespace);
    status.generated_service_accounts = generated_service_accounts;
    status.bind_reconciled = true;
    conditions::mark(&mut status, types::RECONCILING, false, "Reconciled", messages::RECONCILED, generation);
    conditions::mark(&mut status, types::ROLE_REF_VALID, role_refs_valid, if role_refs_valid { "Valid" } else { "Missing" }, if role_refs_valid { "all referenced roles exist" } else { messages::ROLE_REF_MISSING }, generation);
    conditions::mark(&mut status, types::READY, true, "Ready", messages::RECONCILED, generation);
    patch::apply_status(client, &instance, |s| *s = status).await?;

    Ok(Action::requeue(PROBE_INTERVAL))
}

async fn reconcile_delete(client: Client, recorder: &Recorder, instance: &BindDefinition) -> Result<Action, Error> {
    let generation = instance.meta().generation.unwrap_or_default();
    let name = instance.name_any();

    let mut status = instance.status.clone().unwrap_or_default();
    conditions::mark(&mut status, types::DELETE, true, messages::REASON_DELETED, "deleting generated bindings and service accounts", generation);
    let instance_for_status = patch::apply_status(client.clone(), instance, |s| *s = status).await?;

    let all = Api::<BindDefinition>::all(client.clone()).list(&ListParams::default()).await?.items;
    let mut errors = Vec::new();

    for subject in &instance.spec.subjects {
        if subject.kind != SubjectKind::ServiceAccount {
            continue;
        }
        match actions::delete_service_account_unless_shared(client.clone(), instance, subject, &all).await {
            Ok(DeleteResult::Deleted) => {
                events::normal(recorder, instance, messages::REASON_DELETED, format!("deleted service account {}", subject.name), "Delete").await
            }
            Ok(DeleteResult::NotFound) => {}
            Ok(DeleteResult::NoOwnerRef) => {
                events::normal(recorder, instance, "NotDeleting", format!("service account {} is shared or not owned; leaving in place", subject.name), "Delete").await
            }
            Err(error) => errors.push(error),
        }
    }

    if let Some(crb) = &instance.spec.cluster_role_bindings {
        for cluster_role_ref in &crb.cluster_role_refs {
            match actions::delete_cluster_role_binding(client.clone(), instance, cluster_role_ref).await {
                Ok(_) => {}
                Err(error) => errors.push(error),
            }
        }
    }

    let active_namespaces = namespaces::collect_active(client.clone(), &instance.spec.role_bindings).await.unwrap_or_default();
    for entry in &instance.spec.role_bindings {
        for namespace in &active_namespaces {
            for role_ref in entry.cluster_role_refs.iter().chain(entry.role_refs.iter()) {
                if let Err(error) = actions::delete_namespace_role_binding(client.clone(), instance, namespace, role_ref).await {
                    errors.push(error);
                }
            }
        }
    }

    if let Some(combined) = Error::combine("failed to delete one or more BindDefinition children", errors) {
        let mut status = instance_for_status.status.clone().unwrap_or_default();
        conditions::mark(&mut status, types::DELETE, false, messages::REASON_RECONCILE_ERROR, &combined.to_string(), generation);
        return Err(match patch::apply_status(client, &instance_for_status, |s| *s = status).await {
            Ok(_) => combined,
            Err(apply_error) => Error::combine(
                "failed to delete children and record the resulting status",
                vec![combined, Error::from(apply_error)],
            )
            .expect("two errors were just supplied"),
        });
    }

    let mut status = instance_for_status.status.clone().unwrap_or_default();
    conditions::mark(&mut status, types::FINALIZER, false, messages::REASON_FINALIZER_REMOVED, "children deleted", generation);
    let instance_for_status = patch::apply_status(client.clone(), &instance_for_status, |s| *s = status).await?;

    finalizer::remove_cluster::<BindDefinition>(client, &name).await?;
    events::normal(recorder, &instance_for_status, messages::REASON_FINALIZER_REMOVED, "all children deleted", "Delete").await;
    Ok(Action::await_change())
}

fn on_error(instance: Arc<BindDefinition>, error: &Error, _ctx: Arc<ContextData>) -> Action {
    tracing::error!(name = instance.name_any(), %error, "BindDefinition reconcile error");
    Action::requeue(Duration::from_secs(5))
}
