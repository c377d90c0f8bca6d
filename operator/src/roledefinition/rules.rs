//! Rule synthesis: projects live API discovery through a RoleDefinition's restrictions into
//! a canonical, deterministic sequence of `PolicyRule`s.

use crate::tracker::DiscoveryMap;
use k8s_openapi::api::rbac::v1::PolicyRule;
use rbac_operator_types::{RestrictedApi, RestrictedResource, TargetRole};
use std::collections::{BTreeMap, BTreeSet};

/// Computes the canonical rule set for a RoleDefinition from a discovery snapshot.
pub fn synthesize(
    discovery: &DiscoveryMap,
    target_role: TargetRole,
    scope_namespaced: bool,
    restricted_verbs: &[String],
    restricted_resources: &[RestrictedResource],
    restricted_apis: &[RestrictedApi],
) -> Vec<PolicyRule> {
    let restricted_verbs: BTreeSet<&str> = restricted_verbs.iter().map(String::as_str).collect();
    let restricted_resources: BTreeSet<(&str, &str)> = restricted_resources
        .iter()
        .map(|r| (r.name.as_str(), r.group.as_str()))
        .collect();

    // Bucket key is (apiGroup, sorted allowed verbs); value accumulates resource names,
    // matching step 2 of rule synthesis ("group by (apiGroup, allowedVerbs-as-set)").
    let mut buckets: BTreeMap<(String, Vec<String>), BTreeSet<String>> = BTreeMap::new();

    for (group_version, resources) in discovery {
        let group = group_version.split('/').next().unwrap_or_default();
        if is_restricted_api(group, group_version, restricted_apis) {
            continue;
        }
        for resource in resources {
            if resource.name.contains('/') || resource.name == "rolebindings" {
                continue;
            }
            if !resource.verbs.iter().any(|v| v == "list") {
                continue;
            }
            if restricted_resources.contains(&(resource.name.as_str(), group)) {
                continue;
            }
            if resource.namespaced != scope_namespaced {
                continue;
            }
            let allowed: BTreeSet<String> = resource
                .verbs
                .iter()
                .filter(|v| !restricted_verbs.contains(v.as_str()))
                .cloned()
                .collect();
            if allowed.is_empty() {
                continue;
            }
            buckets
                .entry((group.to_owned(), allowed.into_iter().collect()))
                .or_default()
                .insert(resource.name.clone());
        }
    }

    let mut rules: Vec<PolicyRule> = buckets
        .into_iter()
        .map(|((group, verbs), resources)| PolicyRule {
            api_groups: Some(vec![group]),
            resources: Some(resources.into_iter().collect()),
            verbs,
            ..Default::default()
        })
        .collect();

    if matches!(target_role, TargetRole::ClusterScopedRole) && !restricted_verbs.contains("get") {
        rules.push(PolicyRule {
            non_resource_urls: Some(vec!["/metrics".to_owned()]),
            verbs: vec!["get".to_owned()],
            ..Default::default()
        });
    }

    canonicalize(&mut rules);
    rules
}

fn is_restricted_api(group: &str, group_version: &str, restricted: &[RestrictedApi]) -> bool {
    restricted.iter().any(|api| {
        if api.name != group {
            return false;
        }
        if api.versions.is_empty() {
            return true;
        }
        api.versions.iter().any(|v| v.group_version == group_version)
    })
}

/// Sorts every rule's fields and then the rule sequence itself, so that two calls over the
/// same logical input always produce byte-identical output (and so non-canonical, externally
/// written rules always compare unequal to the synthesized set, triggering reconvergence).
pub fn canonicalize(rules: &mut [PolicyRule]) {
    for rule in rules.iter_mut() {
        if let Some(v) = rule.api_groups.as_mut() {
            v.sort();
        }
        if let Some(v) = rule.resources.as_mut() {
            v.sort();
        }
        if let Some(v) = rule.resource_names.as_mut() {
            v.sort();
        }
        if let Some(v) = rule.non_resource_urls.as_mut() {
            v.sort();
        }
        rule.verbs.sort();
    }
    rules.sort_by(|a, b| {
        let a_is_nonresource = a.non_resource_urls.is_some();
        let b_is_nonresource = b.non_resource_urls.is_some();
        a_is_nonresource.cmp(&b_is_nonresource).then_with(|| {
            a.api_groups
                .cmp(&b.api_groups)
                .then_with(|| a.resources.cmp(&b.resources))
                .then_with(|| a.verbs.cmp(&b.verbs))
        })
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ApiResourceDescriptor;

    fn discovery_with(entries: Vec<(&str, Vec<(&str, bool, Vec<&str>)>)>) -> DiscoveryMap {
        entries
            .into_iter()
            .map(|(key, resources)| {
                let descriptors = resources
                    .into_iter()
                    .map(|(name, namespaced, verbs)| {
                        let (group, version) = key.split_once('/').unwrap_or(("", key));
                        ApiResourceDescriptor {
                            name: name.to_owned(),
                            group: group.to_owned(),
                            version: version.to_owned(),
                            namespaced,
                            verbs: verbs.into_iter().map(String::from).collect(),
                        }
                    })
                    .collect();
                (key.to_owned(), descriptors)
            })
            .collect()
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let discovery = discovery_with(vec![
            ("apps/v1", vec![("deployments", true, vec!["get", "list", "delete"])]),
            ("/v1", vec![("pods", true, vec!["get", "list"])]),
        ]);
        let mut first = synthesize(&discovery, TargetRole::NamespaceScopedRole, true, &[], &[], &[]);
        let second = synthesize(&discovery, TargetRole::NamespaceScopedRole, true, &[], &[], &[]);
        assert_eq!(first, second);
        canonicalize(&mut first);
        assert_eq!(first, second);
    }

    #[test]
    fn restricted_verb_removed_from_every_rule() {
        let discovery = discovery_with(vec![(
            "apps/v1",
            vec![("deployments", true, vec!["get", "list", "delete", "deletecollection"])],
        )]);
        let rules = synthesize(
            &discovery,
            TargetRole::NamespaceScopedRole,
            true,
            &["delete".to_owned(), "deletecollection".to_owned()],
            &[],
            &[],
        );
        assert!(rules.iter().all(|r| !r.verbs.iter().any(|v| v == "delete" || v == "deletecollection")));
    }

    #[test]
    fn restricted_group_excluded_entirely() {
        let discovery = discovery_with(vec![(
            "certificates.k8s.io/v1",
            vec![("certificatesigningrequests", false, vec!["get", "list"])],
        )]);
        let rules = synthesize(
            &discovery,
            TargetRole::ClusterScopedRole,
            false,
            &[],
            &[],
            &[rbac_operator_types::RestrictedApi {
                name: "certificates.k8s.io".to_owned(),
                versions: vec![],
            }],
        );
        assert!(rules
            .iter()
            .all(|r| r.api_groups.as_deref() != Some(&["certificates.k8s.io".to_owned()][..])));
    }

    #[test]
    fn cluster_scoped_role_gets_metrics_rule_unless_get_restricted() {
        let discovery = DiscoveryMap::new();
        let rules = synthesize(&discovery, TargetRole::ClusterScopedRole, false, &[], &[], &[]);
        assert!(rules
            .iter()
            .any(|r| r.non_resource_urls.as_deref() == Some(&["/metrics".to_owned()][..])));

        let rules = synthesize(
            &discovery,
            TargetRole::ClusterScopedRole,
            false,
            &["get".to_owned()],
            &[],
            &[],
        );
        assert!(rules.iter().all(|r| r.non_resource_urls.is_none()));
    }

    #[test]
    fn scope_namespaced_filter_excludes_disagreeing_resources() {
        let discovery = discovery_with(vec![(
            "/v1",
            vec![
                ("pods", true, vec!["get", "list"]),
                ("nodes", false, vec!["get", "list"]),
            ],
        )]);
        let rules = synthesize(&discovery, TargetRole::NamespaceScopedRole, true, &[], &[], &[]);
        let resources: Vec<&String> = rules.iter().flat_map(|r| r.resources.iter().flatten()).collect();
        assert!(resources.iter().any(|r| r.as_str() == "pods"));
        assert!(!resources.iter().any(|r| r.as_str() == "nodes"));
    }

    #[test]
    fn non_resource_rule_sorts_last() {
        let discovery = discovery_with(vec![("/v1", vec![("pods", true, vec!["get", "list"])])]);
        let rules = synthesize(&discovery, TargetRole::ClusterScopedRole, true, &[], &[], &[]);
        assert!(rules.last().unwrap().non_resource_urls.is_some());
    }
}
