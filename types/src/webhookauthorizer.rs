use crate::conditions::{Condition, HasConditions};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `WebhookAuthorizer` validates a namespace selector and reports the set of namespaces it
/// currently resolves to. It does not materialize any child resources.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "rbac-operator.io",
    version = "v1",
    kind = "WebhookAuthorizer",
    plural = "webhookauthorizers",
    derive = "PartialEq",
    scope = "Cluster",
    status = "WebhookAuthorizerStatus",
    printcolumn = r#"{"jsonPath": ".status.authorizerConfigured", "name": "CONFIGURED", "type": "boolean"}"#
)]
pub struct WebhookAuthorizerSpec {
    #[serde(rename = "namespaceSelector", skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<LabelSelector>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct WebhookAuthorizerStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(rename = "authorizerConfigured", default)]
    pub authorizer_configured: bool,

    #[serde(rename = "matchedNamespaces", default, skip_serializing_if = "Vec::is_empty")]
    pub matched_namespaces: Vec<String>,
}

impl HasConditions for WebhookAuthorizerStatus {
    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}
