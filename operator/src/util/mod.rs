use std::time::Duration;

pub mod conditions;
pub mod events;
pub mod finalizer;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod patch;
pub mod selector;

pub(crate) mod messages;

mod error;

pub use error::*;

/// Default interval for requeuing a managed resource once it has converged.
pub(crate) const PROBE_INTERVAL: Duration = Duration::from_secs(60);

/// Requeue interval while the `ResourceTracker` has not yet completed its first
/// discovery pass.
pub(crate) const TRACKER_NOT_STARTED_INTERVAL: Duration = Duration::from_secs(10);

/// Requeue interval for a `RoleBindingTerminator` whose namespace still reports
/// blocking resources.
pub(crate) const NAMESPACE_BLOCKED_INTERVAL: Duration = Duration::from_secs(15);

/// Requeue interval immediately after issuing a delete, to observe the platform's
/// garbage-collector finish the job.
pub(crate) const DELETE_REQUEUE_INTERVAL: Duration = Duration::from_secs(1);

/// Upper bound on concurrent namespace-scoped API listings performed by a single
/// blocking-resource scan.
pub(crate) const BLOCKING_SCAN_CONCURRENCY: usize = 30;

/// Minimum interval between recomputing a given namespace's blocking-resource cache
/// entry, shared across all contending terminator workers.
pub(crate) const BLOCKING_SCAN_RATE_LIMIT: Duration = Duration::from_secs(10);

/// Label applied to every child resource generated by this operator.
pub(crate) const CREATED_BY_LABEL: &str = rbac_operator_types::CREATED_BY_LABEL;

/// Name of the field manager used for every server-side apply issued by this operator.
pub(crate) const MANAGER_NAME: &str = "rbac-operator";
