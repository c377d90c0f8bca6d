use crate::util::patch::StatusObject;
use crate::util::{conditions, messages, patch, selector, Error, PROBE_INTERVAL};
use futures::StreamExt;
use kube::{
    api::ListParams,
    runtime::{controller::Action, Controller},
    Api, Client, ResourceExt,
};
use k8s_openapi::api::core::v1::Namespace;
use rbac_operator_types::{conditions::types, WebhookAuthorizer, WebhookAuthorizerStatus};
use std::sync::Arc;
use std::time::Duration;

impl StatusObject<WebhookAuthorizerStatus> for WebhookAuthorizer {
    fn mut_status(&mut self) -> &mut WebhookAuthorizerStatus {
        self.status.get_or_insert_with(Default::default)
    }
}

struct ContextData {
    client: Client,
    #[cfg(feature = "metrics")]
    metrics: crate::util::metrics::ControllerMetrics,
}

pub async fn run(client: Client) -> Result<(), Error> {
    tracing::info!("starting WebhookAuthorizer controller");
    let api: Api<WebhookAuthorizer> = Api::all(client.clone());
    let context = Arc::new(ContextData {
        client,
        #[cfg(feature = "metrics")]
        metrics: crate::util::metrics::ControllerMetrics::new("webhook_authorizer"),
    });

    Controller::new(api, ListParams::default())
        .run(reconcile, on_error, context)
        .for_each(|result| async move {
            if let Err(error) = result {
                tracing::warn!(%error, "WebhookAuthorizer reconcile failed");
            }
        })
        .await;
    Ok(())
}

async fn reconcile(instance: Arc<WebhookAuthorizer>, ctx: Arc<ContextData>) -> Result<Action, Error> {
    let client = ctx.client.clone();
    let generation = instance.meta().generation.unwrap_or_default();

    #[cfg(feature = "metrics")]
    ctx.metrics.reconcile_counter.with_label_values(&[&instance.name_any(), ""]).inc();

    let mut status = instance.status.clone().unwrap_or_default();

    let matched = match &instance.spec.namespace_selector {
        Some(raw_selector) if selector::is_non_empty(raw_selector) => {
            let query = match selector::to_query(raw_selector) {
                Ok(query) => query,
                Err(Error::InvalidSelector(message)) => {
                    conditions::mark(&mut status, types::STALLED, true, messages::REASON_INVALID_SELECTOR, &message, generation);
                    patch::apply_status(client, instance.as_ref(), |s| *s = status).await?;
                    return Ok(Action::await_change());
                }
                Err(error) => return Err(error),
            };
            let api: Api<Namespace> = Api::all(client.clone());
            let list = api.list(&ListParams::default().labels(&query)).await?;
            list.items.iter().map(|ns| ns.name_any()).collect::<Vec<_>>()
        }
        _ => Vec::new(),
    };

    status.observed_generation = Some(generation);
    status.matched_namespaces = matched;
    status.authorizer_configured = true;
    conditions::mark(&mut status, types::STALLED, false, "Valid", "namespaceSelector is syntactically valid", generation);
    conditions::mark(&mut status, types::READY, true, "Ready", "authorizer configuration reflects live namespaces", generation);
    patch::apply_status(client, instance.as_ref(), |s| *s = status).await?;

    Ok(Action::requeue(PROBE_INTERVAL))
}

fn on_error(instance: Arc<WebhookAuthorizer>, error: &Error, _ctx: Arc<ContextData>) -> Action {
    tracing::error!(name = instance.name_any(), %error, "WebhookAuthorizer reconcile error");
    Action::requeue(Duration::from_secs(5))
}
