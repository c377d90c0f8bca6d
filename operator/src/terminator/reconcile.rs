use super::scan::{self, BlockingResourceScanner};
use crate::tracker::ResourceTracker;
use crate::util::{conditions, events, finalizer, messages, patch, Error, NAMESPACE_BLOCKED_INTERVAL, TRACKER_NOT_STARTED_INTERVAL};
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, NamespaceCondition};
use k8s_openapi::api::rbac::v1::RoleBinding;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{
    api::{ListParams, Patch, PatchParams},
    runtime::{controller::Action, events::Recorder, Controller},
    Api, Client, Resource, ResourceExt,
};
use rbac_operator_types::{conditions::types, BindDefinition};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const NAMESPACE_TERMINATION_BLOCKED: &str = "NamespaceTerminationBlocked";

struct ContextData {
    client: Client,
    recorder: Recorder,
    scanner: BlockingResourceScanner,
    #[cfg(feature = "metrics")]
    metrics: crate::util::metrics::ControllerMetrics,
}

pub async fn run(client: Client, tracker: ResourceTracker) -> Result<(), Error> {
    tracing::info!("starting RoleBindingTerminator controller");
    let api: Api<RoleBinding> = Api::all(client.clone());
    let context = Arc::new(ContextData {
        client: client.clone(),
        recorder: events::recorder(client),
        scanner: BlockingResourceScanner::new(tracker),
        #[cfg(feature = "metrics")]
        metrics: crate::util::metrics::ControllerMetrics::new("role_binding_terminator"),
    });

    Controller::new(api, ListParams::default())
        .run(reconcile, on_error, context)
        .for_each(|result| async move {
            if let Err(error) = result {
                tracing::warn!(%error, "RoleBindingTerminator reconcile failed");
            }
        })
        .await;
    Ok(())
}

fn owning_bind_definition_name(binding: &RoleBinding) -> Option<String> {
    let refs = binding.metadata.owner_references.as_ref()?;
    refs.iter()
        .find(|o| o.controller == Some(true) && o.kind == "BindDefinition" && o.api_version.starts_with("rbac-operator.io/"))
        .map(|o| o.name.clone())
}

async fn reconcile(binding: Arc<RoleBinding>, ctx: Arc<ContextData>) -> Result<Action, Error> {
    let client = ctx.client.clone();
    let name = binding.name_any();
    let namespace = binding.namespace().unwrap_or_default();

    #[cfg(feature = "metrics")]
    ctx.metrics.reconcile_counter.with_label_values(&[&name, &namespace]).inc();

    let Some(bind_definition_name) = owning_bind_definition_name(&binding) else {
        return Ok(Action::await_change());
    };

    if binding.meta().deletion_timestamp.is_none() {
        if !binding.finalizers().iter().any(|f| f == finalizer::ROLE_BINDING_FINALIZER) {
            finalizer::add_namespaced::<RoleBinding>(client, finalizer::ROLE_BINDING_FINALIZER, &name, &namespace).await?;
        }
        return Ok(Action::await_change());
    }

    let ns_api: Api<Namespace> = Api::all(client.clone());
    let Some(ns) = ns_api.get_opt(&namespace).await? else {
        return Ok(Action::await_change());
    };

    if !super::is_terminating(&ns) {
        finalizer::remove_namespaced::<RoleBinding>(client, &name, &namespace).await?;
        return Ok(Action::await_change());
    }

    let bind_definition_api: Api<BindDefinition> = Api::all(client.clone());
    let bind_definition_generation = bind_definition_api
        .get_opt(&bind_definition_name)
        .await?
        .and_then(|bd| bd.meta().generation);

    let blocking = match ctx.scanner.get_namespaced_blocking_resources(client.clone(), &namespace).await {
        Ok(blocking) => blocking,
        Err(Error::ResourceTrackerNotStarted) => return Ok(Action::requeue(TRACKER_NOT_STARTED_INTERVAL)),
        Err(error) => return Err(error),
    };
    if !blocking.is_empty() {
        set_namespace_blocked_condition(&ns_api, &namespace, true, &scan::summarize(&blocking)).await?;
        mark_bind_definition_blocked(client.clone(), &bind_definition_name, bind_definition_generation, true, &scan::summarize(&blocking)).await?;
        return Ok(Action::requeue(NAMESPACE_BLOCKED_INTERVAL));
    }

    finalizer::remove_namespaced::<RoleBinding>(client.clone(), &name, &namespace).await?;
    set_namespace_blocked_condition(&ns_api, &namespace, false, "no blocking resources remain").await?;
    mark_bind_definition_blocked(client.clone(), &bind_definition_name, bind_definition_generation, false, "no blocking resources remain").await?;

    if let Some(bind_definition) = bind_definition_api.get_opt(&bind_definition_name).await? {
        events::normal(
            &ctx.recorder,
            &bind_definition,
            messages::REASON_FINALIZER_REMOVED,
            format!("released role binding {name} in namespace {namespace}, no blocking resources remain"),
            "Terminate",
        )
        .await;
    }

    Ok(Action::await_change())
}

/// Mirrors the blocking-resource state onto the owning BindDefinition's own status, so it is
/// visible without having to inspect the namespace's native conditions directly.
async fn mark_bind_definition_blocked(
    client: Client,
    name: &str,
    generation: Option<i64>,
    blocked: bool,
    summary: &str,
) -> Result<(), Error> {
    let api: Api<BindDefinition> = Api::all(client.clone());
    let Some(bind_definition) = api.get_opt(name).await? else {
        return Ok(());
    };
    let mut status = bind_definition.status.clone().unwrap_or_default();
    conditions::mark(
        &mut status,
        types::NAMESPACE_TERMINATION_BLOCKED,
        blocked,
        messages::REASON_NAMESPACE_BLOCKED,
        summary,
        generation.unwrap_or_default(),
    );
    patch::apply_status(client, &bind_definition, |s| *s = status).await?;
    Ok(())
}

/// Updates (or inserts) the `NamespaceTerminationBlocked` condition in the namespace's native
/// status, preserving every other condition the platform has already recorded there.
async fn set_namespace_blocked_condition(api: &Api<Namespace>, namespace: &str, blocked: bool, message: &str) -> Result<(), Error> {
    let Some(current) = api.get_opt(namespace).await? else {
        return Ok(());
    };
    let mut conditions = current.status.and_then(|s| s.conditions).unwrap_or_default();
    let now = Time(chrono::Utc::now());
    let status = if blocked { "True" } else { "False" };
    let reason = if blocked { "BlockingResourcesPresent" } else { "NamespaceTerminationAllowed" };

    match conditions.iter_mut().find(|c| c.type_ == NAMESPACE_TERMINATION_BLOCKED) {
        Some(existing) if existing.status == status => {
            existing.message = Some(message.to_owned());
            existing.reason = Some(reason.to_owned());
        }
        Some(existing) => {
            existing.status = status.to_owned();
            existing.reason = Some(reason.to_owned());
            existing.message = Some(message.to_owned());
            existing.last_transition_time = Some(now);
        }
        None => conditions.push(NamespaceCondition {
            type_: NAMESPACE_TERMINATION_BLOCKED.to_owned(),
            status: status.to_owned(),
            reason: Some(reason.to_owned()),
            message: Some(message.to_owned()),
            last_transition_time: Some(now),
        }),
    }

    let patch = json!({ "status": { "conditions": conditions } });
    api.patch_status(namespace, &PatchParams::default(), &Patch::Merge(&patch)).await?;
    Ok(())
}

fn on_error(binding: Arc<RoleBinding>, error: &Error, _ctx: Arc<ContextData>) -> Action {
    tracing::error!(name = binding.name_any(), %error, "RoleBindingTerminator reconcile error");
    Action::requeue(Duration::from_secs(5))
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::api::{ObjectMeta, OwnerReference};

    fn binding_owned_by(kind: &str, api_version: &str, controller: bool, name: &str) -> RoleBinding {
        RoleBinding {
            metadata: ObjectMeta {
                owner_references: Some(vec![OwnerReference {
                    api_version: api_version.to_owned(),
                    kind: kind.to_owned(),
                    name: name.to_owned(),
                    controller: Some(controller),
                    ..Default::default()
                }]),
                ..Default::default()
            },
            role_ref: Default::default(),
            subjects: None,
        }
    }

    #[test]
    fn finds_the_controlling_bind_definition_owner() {
        let binding = binding_owned_by("BindDefinition", "rbac-operator.io/v1", true, "readers");
        assert_eq!(owning_bind_definition_name(&binding), Some("readers".to_owned()));
    }

    #[test]
    fn ignores_non_controller_owner_references() {
        let binding = binding_owned_by("BindDefinition", "rbac-operator.io/v1", false, "readers");
        assert_eq!(owning_bind_definition_name(&binding), None);
    }

    #[test]
    fn ignores_owners_of_a_different_kind_or_api_group() {
        let binding = binding_owned_by("RoleDefinition", "rbac-operator.io/v1", true, "readers");
        assert_eq!(owning_bind_definition_name(&binding), None);
        let binding = binding_owned_by("BindDefinition", "example.com/v1", true, "readers");
        assert_eq!(owning_bind_definition_name(&binding), None);
    }

    #[test]
    fn role_binding_with_no_owner_references_has_no_owning_bind_definition() {
        let binding = RoleBinding { metadata: ObjectMeta::default(), role_ref: Default::default(), subjects: None };
        assert_eq!(owning_bind_definition_name(&binding), None);
    }
}
