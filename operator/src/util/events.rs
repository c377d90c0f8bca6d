//! Typed Kubernetes Events, one per user-visible reconcile action, with stable reason
//! strings so external tooling can alert on them.

use super::MANAGER_NAME;
use kube::{
    runtime::events::{Event, EventType, Recorder, Reporter},
    Client, Resource, ResourceExt,
};

/// Builds a recorder reporting as this operator's controller name.
pub fn recorder(client: Client) -> Recorder {
    Recorder::new(client, Reporter::from(MANAGER_NAME.to_owned()))
}

/// Publishes a `Normal` event referencing `instance`. Event-publish failures are logged, not
/// propagated — losing an event must never fail a reconcile.
pub async fn normal<K>(recorder: &Recorder, instance: &K, reason: &str, note: impl Into<String>, action: &str)
where
    K: Resource<DynamicType = ()>,
{
    publish(recorder, instance, EventType::Normal, reason, note, action).await
}

/// Publishes a `Warning` event referencing `instance`.
pub async fn warning<K>(recorder: &Recorder, instance: &K, reason: &str, note: impl Into<String>, action: &str)
where
    K: Resource<DynamicType = ()>,
{
    publish(recorder, instance, EventType::Warning, reason, note, action).await
}

async fn publish<K>(
    recorder: &Recorder,
    instance: &K,
    type_: EventType,
    reason: &str,
    note: impl Into<String>,
    action: &str,
) where
    K: Resource<DynamicType = ()>,
{
    let reference = instance.object_ref(&());
    let result = recorder
        .publish(
            &Event {
                type_,
                reason: reason.to_owned(),
                note: Some(note.into()),
                action: action.to_owned(),
                secondary: None,
            },
            &reference,
        )
        .await;
    if let Err(error) = result {
        tracing::warn!(%error, name = instance.name_any(), "failed to publish event");
    }
}

