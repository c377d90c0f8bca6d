use crate::conditions::{Condition, HasConditions};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `RoleDefinition` synthesizes a single cluster-scoped or namespace-scoped role from live
/// API discovery, filtered by the restrictions named in its spec. See
/// [`RoleDefinitionSpec::target_role`] for the two supported generated-role kinds.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "rbac-operator.io",
    version = "v1",
    kind = "RoleDefinition",
    plural = "roledefinitions",
    derive = "PartialEq",
    scope = "Cluster",
    status = "RoleDefinitionStatus",
    printcolumn = r#"{"jsonPath": ".spec.targetRole", "name": "TARGET ROLE", "type": "string"}"#,
    printcolumn = r#"{"jsonPath": ".status.roleReconciled", "name": "RECONCILED", "type": "boolean"}"#
)]
pub struct RoleDefinitionSpec {
    /// Name of the generated role (and of the non-resource-URL/metrics rule's scope).
    #[serde(rename = "targetName")]
    pub target_name: String,

    /// Whether the generated role is a `ClusterScopedRole` or a `NamespaceScopedRole`.
    #[serde(rename = "targetRole")]
    pub target_role: TargetRole,

    /// Required when `targetRole` is `NamespaceScopedRole`.
    #[serde(rename = "targetNamespace", skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,

    /// If `false`, only non-namespaced API resources are selected; if `true`, only
    /// namespaced ones.
    #[serde(rename = "scopeNamespaced", default)]
    pub scope_namespaced: bool,

    #[serde(rename = "restrictedVerbs", default, skip_serializing_if = "Vec::is_empty")]
    pub restricted_verbs: Vec<String>,

    #[serde(
        rename = "restrictedResources",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub restricted_resources: Vec<RestrictedResource>,

    #[serde(rename = "restrictedAPIs", default, skip_serializing_if = "Vec::is_empty")]
    pub restricted_apis: Vec<RestrictedApi>,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum TargetRole {
    ClusterScopedRole,
    NamespaceScopedRole,
}

impl std::fmt::Display for TargetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetRole::ClusterScopedRole => write!(f, "ClusterScopedRole"),
            TargetRole::NamespaceScopedRole => write!(f, "NamespaceScopedRole"),
        }
    }
}

impl Default for TargetRole {
    fn default() -> Self {
        TargetRole::ClusterScopedRole
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema, Hash)]
pub struct RestrictedResource {
    pub name: String,
    #[serde(default)]
    pub group: String,
}

/// Excludes an entire API group, or only the listed `groupVersion`s of it.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema, Default)]
pub struct RestrictedApi {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub versions: Vec<RestrictedApiVersion>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema)]
pub struct RestrictedApiVersion {
    #[serde(rename = "groupVersion")]
    pub group_version: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct RoleDefinitionStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(rename = "roleReconciled", default)]
    pub role_reconciled: bool,
}

impl HasConditions for RoleDefinitionStatus {
    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}
