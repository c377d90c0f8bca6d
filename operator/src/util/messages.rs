//! Short, machine-readable reason strings and human-readable status messages shared by
//! every reconciler and its `Recorder`-emitted events.

pub const REASON_CREATED: &str = "Created";
pub const REASON_UPDATED: &str = "Updated";
pub const REASON_DELETED: &str = "Deleted";
pub const REASON_FINALIZER_REMOVED: &str = "FinalizerRemoved";
pub const REASON_ROLE_REF_MISSING: &str = "RoleRefMissing";
pub const REASON_INVALID_SELECTOR: &str = "InvalidSelector";
pub const REASON_NAMESPACE_BLOCKED: &str = "NamespaceTerminationBlocked";
pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";

pub const RECONCILED: &str = "Rules converged with live API discovery.";
pub const ROLE_REF_MISSING: &str = "One or more referenced roles do not exist; binding deferred.";
pub const TRACKER_NOT_STARTED: &str = "Waiting on the resource tracker's first discovery pass.";
