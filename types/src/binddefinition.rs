use crate::conditions::{Condition, HasConditions};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// `BindDefinition` materializes role bindings (cluster- and namespace-scoped) and their
/// subject service accounts across every namespace the spec resolves to.
#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "rbac-operator.io",
    version = "v1",
    kind = "BindDefinition",
    plural = "binddefinitions",
    derive = "PartialEq",
    scope = "Cluster",
    status = "BindDefinitionStatus",
    printcolumn = r#"{"jsonPath": ".status.bindReconciled", "name": "RECONCILED", "type": "boolean"}"#
)]
pub struct BindDefinitionSpec {
    /// Prefix used to name every generated binding: `"{targetName}-{refName}-binding"`.
    #[serde(rename = "targetName")]
    pub target_name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subjects: Vec<Subject>,

    #[serde(rename = "clusterRoleBindings", skip_serializing_if = "Option::is_none")]
    pub cluster_role_bindings: Option<ClusterRoleBindingsSpec>,

    #[serde(rename = "roleBindings", default, skip_serializing_if = "Vec::is_empty")]
    pub role_bindings: Vec<RoleBindingSpec>,

    /// Defaults to `true` when absent, for backward compatibility.
    #[serde(rename = "automountServiceAccountToken", skip_serializing_if = "Option::is_none")]
    pub automount_service_account_token: Option<bool>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema, Hash)]
pub enum SubjectKind {
    User,
    Group,
    ServiceAccount,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq, JsonSchema, Hash)]
pub struct Subject {
    pub kind: SubjectKind,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "apiGroup", skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct ClusterRoleBindingsSpec {
    #[serde(rename = "clusterRoleRefs", default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_role_refs: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct RoleBindingSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(rename = "namespaceSelector", default, skip_serializing_if = "Vec::is_empty")]
    pub namespace_selector: Vec<LabelSelector>,

    #[serde(rename = "clusterRoleRefs", default, skip_serializing_if = "Vec::is_empty")]
    pub cluster_role_refs: Vec<String>,

    #[serde(rename = "roleRefs", default, skip_serializing_if = "Vec::is_empty")]
    pub role_refs: Vec<String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct BindDefinitionStatus {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(rename = "generatedServiceAccounts", default, skip_serializing_if = "Vec::is_empty")]
    pub generated_service_accounts: Vec<Subject>,

    #[serde(rename = "bindReconciled", default)]
    pub bind_reconciled: bool,
}

impl HasConditions for BindDefinitionStatus {
    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}
