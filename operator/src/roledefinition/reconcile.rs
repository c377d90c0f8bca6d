use super::actions::{self, Outcome};
use super::rules;
use crate::tracker::ResourceTracker;
use crate::util::{conditions, events, finalizer, messages, patch, Error, DELETE_REQUEUE_INTERVAL, PROBE_INTERVAL, TRACKER_NOT_STARTED_INTERVAL};
use futures::StreamExt;
use k8s_openapi::api::rbac::v1::{ClusterRole, Role};
use kube::{
    api::ListParams,
    runtime::{controller::Action, events::Recorder, Controller},
    Api, Client, ResourceExt,
};
use rbac_operator_types::{conditions::types, RoleDefinition, TargetRole};
use std::sync::Arc;
use std::time::Duration;

struct ContextData {
    client: Client,
    tracker: ResourceTracker,
    recorder: Recorder,
    #[cfg(feature = "metrics")]
    metrics: crate::util::metrics::ControllerMetrics,
}

/// Entrypoint for the RoleDefinition controller.
pub async fn run(client: Client, tracker: ResourceTracker) -> Result<(), Error> {
    tracing::info!("starting RoleDefinition controller");
    let api: Api<RoleDefinition> = Api::all(client.clone());
    let context = Arc::new(ContextData {
        client: client.clone(),
        recorder: events::recorder(client.clone()),
        tracker,
        #[cfg(feature = "metrics")]
        metrics: crate::util::metrics::ControllerMetrics::new("role_definition"),
    });

    Controller::new(api, ListParams::default())
        .owns(Api::<ClusterRole>::all(client.clone()), ListParams::default())
        .owns(Api::<Role>::all(client), ListParams::default())
        .run(reconcile, on_error, context)
        .for_each(|result| async move {
            if let Err(error) = result {
                tracing::warn!(%error, "RoleDefinition reconcile failed");
            }
        })
        .await;
    Ok(())
}

async fn reconcile(instance: Arc<RoleDefinition>, ctx: Arc<ContextData>) -> Result<Action, Error> {
    let client = ctx.client.clone();
    let name = instance.name_any();
    let generation = instance.meta().generation.unwrap_or_default();

    #[cfg(feature = "metrics")]
    ctx.metrics.reconcile_counter.with_label_values(&[&name, ""]).inc();

    if instance.meta().deletion_timestamp.is_some() {
        return handle_deletion(client, &ctx.recorder, instance.as_ref()).await;
    }

    if matches!(instance.spec.target_role, TargetRole::NamespaceScopedRole) && instance.spec.target_namespace.is_none() {
        let mut status = instance.status.clone().unwrap_or_default();
        conditions::mark(
            &mut status,
            types::STALLED,
            true,
            "InvalidSpec",
            "targetNamespace is required when targetRole is NamespaceScopedRole",
            generation,
        );
        patch::apply_status(client, instance.as_ref(), |s| *s = status).await?;
        return Err(Error::UserInputError(format!(
            "RoleDefinition {name}: targetNamespace is required for a namespace-scoped target role"
        )));
    }

    let instance: RoleDefinition = match finalizer::add_cluster(client.clone(), finalizer::ROLE_DEFINITION_FINALIZER, &name).await {
        Ok(instance) => instance,
        Err(error) => {
            let error = Error::from(error);
            let mut status = instance.status.clone().unwrap_or_default();
            conditions::mark(&mut status, types::STALLED, true, "FinalizerError", &error.to_string(), generation);
            patch::apply_status(client, instance.as_ref(), |s| *s = status).await?;
            return Err(error);
        }
    };

    let discovery = match ctx.tracker.get_api_resources() {
        Ok(discovery) => discovery,
        Err(Error::ResourceTrackerNotStarted) => {
            let mut status = instance.status.clone().unwrap_or_default();
            conditions::mark(&mut status, types::STALLED, true, "TrackerNotStarted", messages::TRACKER_NOT_STARTED, generation);
            patch::apply_status(client, &instance, |s| *s = status).await?;
            return Ok(Action::requeue(TRACKER_NOT_STARTED_INTERVAL));
        }
        Err(error) => return Err(error),
    };

    let desired_rules = rules::synthesize(
        &discovery,
        instance.spec.target_role,
        instance.spec.scope_namespaced,
        &instance.spec.restricted_verbs,
        &instance.spec.restricted_resources,
        &instance.spec.restricted_apis,
    );

    let outcome = match instance.spec.target_role {
        TargetRole::ClusterScopedRole => {
            actions::ensure_cluster_role(client.clone(), &instance, &instance.spec.target_name, desired_rules)
                .await?
                .simplify()
        }
        TargetRole::NamespaceScopedRole => {
            let namespace = instance
                .spec
                .target_namespace
                .as_deref()
                .expect("validated above");
            actions::ensure_namespace_role(client.clone(), &instance, namespace, &instance.spec.target_name, desired_rules)
                .await?
                .simplify()
        }
    };

    let mut status = instance.status.clone().unwrap_or_default();
    status.observed_generation = Some(generation);
    match outcome {
        Outcome::Foreign => {
            conditions::mark(
                &mut status,
                types::OWNER_REF,
                false,
                "ForeignObject",
                "an existing object with this name is not owned by this RoleDefinition",
                generation,
            );
            events::warning(
                &ctx.recorder,
                &instance,
                messages::REASON_ROLE_REF_MISSING,
                format!("{} already exists and is not controlled by this RoleDefinition", instance.spec.target_name),
                "Reconcile",
            )
            .await;
            status.role_reconciled = false;
        }
        Outcome::Changed => {
            conditions::mark(&mut status, types::CREATE, true, messages::REASON_CREATED, messages::RECONCILED, generation);
            conditions::mark(&mut status, types::UPDATE, true, messages::REASON_UPDATED, messages::RECONCILED, generation);
            conditions::mark(&mut status, types::OWNER_REF, true, "Owned", "role is controller-owned", generation);
            status.role_reconciled = true;
            #[cfg(feature = "metrics")]
            ctx.metrics.action_counter.with_label_values(&[&name, "", "apply"]).inc();
        }
        Outcome::Unchanged => {
            conditions::mark(&mut status, types::CREATE, true, messages::REASON_CREATED, messages::RECONCILED, generation);
            conditions::mark(&mut status, types::UPDATE, false, "NoDrift", "rules already match discovery", generation);
            conditions::mark(&mut status, types::OWNER_REF, true, "Owned", "role is controller-owned", generation);
            status.role_reconciled = true;
        }
    }
    conditions::mark(&mut status, types::READY, true, "Ready", messages::RECONCILED, generation);

    patch::apply_status(client, &instance, |s| *s = status).await?;
    Ok(Action::requeue(PROBE_INTERVAL))
}

async fn handle_deletion(client: Client, recorder: &Recorder, instance: &RoleDefinition) -> Result<Action, Error> {
    let name = instance.name_any();
    let generation = instance.meta().generation.unwrap_or_default();
    let mut status = instance.status.clone().unwrap_or_default();
    conditions::mark(&mut status, types::DELETE, true, messages::REASON_DELETED, "deleting generated role", generation);
    let instance_for_status = patch::apply_status(client.clone(), instance, |s| *s = status).await?;

    let gone = match instance.spec.target_role {
        TargetRole::ClusterScopedRole => actions::delete_cluster_role(client.clone(), &instance.spec.target_name).await,
        TargetRole::NamespaceScopedRole => {
            let namespace = instance.spec.target_namespace.as_deref().unwrap_or_default();
            actions::delete_namespace_role(client.clone(), namespace, &instance.spec.target_name).await
        }
    };

    let gone = match gone {
        Ok(gone) => gone,
        Err(error) => {
            let mut status = instance_for_status.status.clone().unwrap_or_default();
            conditions::mark(&mut status, types::DELETE, false, messages::REASON_RECONCILE_ERROR, &error.to_string(), generation);
            patch::apply_status(client, &instance_for_status, |s| *s = status).await?;
            return Err(error);
        }
    };

    if !gone {
        return Ok(Action::requeue(DELETE_REQUEUE_INTERVAL));
    }

    finalizer::remove_cluster::<RoleDefinition>(client, &name).await?;
    events::normal(recorder, instance, messages::REASON_FINALIZER_REMOVED, "generated role deleted", "Delete").await;
    Ok(Action::await_change())
}

fn on_error(instance: Arc<RoleDefinition>, error: &Error, _ctx: Arc<ContextData>) -> Action {
    tracing::error!(name = instance.name_any(), %error, "RoleDefinition reconcile error");
    Action::requeue(Duration::from_secs(5))
}
