mod reconcile;
mod scan;

pub use reconcile::run;

use k8s_openapi::api::core::v1::Namespace;

pub(crate) fn is_terminating(namespace: &Namespace) -> bool {
    namespace.metadata.deletion_timestamp.is_some()
        || namespace.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Terminating")
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::NamespaceStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::api::ObjectMeta;

    fn namespace(phase: Option<&str>, deleting: bool) -> Namespace {
        Namespace {
            metadata: ObjectMeta {
                deletion_timestamp: deleting.then(|| Time(chrono::Utc::now())),
                ..Default::default()
            },
            status: Some(NamespaceStatus {
                phase: phase.map(str::to_owned),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn active_namespace_is_not_terminating() {
        assert!(!is_terminating(&namespace(Some("Active"), false)));
    }

    #[test]
    fn terminating_phase_without_deletion_timestamp_counts() {
        assert!(is_terminating(&namespace(Some("Terminating"), false)));
    }

    #[test]
    fn deletion_timestamp_alone_counts() {
        assert!(is_terminating(&namespace(Some("Active"), true)));
    }

    #[test]
    fn namespace_with_no_status_is_not_terminating() {
        let ns = Namespace { metadata: ObjectMeta::default(), status: None, ..Default::default() };
        assert!(!is_terminating(&ns));
    }
}
