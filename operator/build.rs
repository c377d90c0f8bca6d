use kube::CustomResourceExt;
use rbac_operator_types::*;
use std::fs;

fn main() {
    fs::create_dir_all("../crds").unwrap();
    fs::write(
        "../crds/rbac-operator.io_roledefinitions_crd.yaml",
        serde_yaml::to_string(&RoleDefinition::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/rbac-operator.io_binddefinitions_crd.yaml",
        serde_yaml::to_string(&BindDefinition::crd()).unwrap(),
    )
    .unwrap();
    fs::write(
        "../crds/rbac-operator.io_webhookauthorizers_crd.yaml",
        serde_yaml::to_string(&WebhookAuthorizer::crd()).unwrap(),
    )
    .unwrap();
}
