use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Tri-state condition status, following the upstream `metav1.ConditionStatus` convention.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn from_bool(b: bool) -> Self {
        if b {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, ConditionStatus::True)
    }
}

/// A single kstatus-style condition entry. Every status object that participates in
/// reconciliation carries a `Vec<Condition>`, keyed by `type_` (one entry per type).
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Condition {
    /// The condition type, e.g. "Ready", "Reconciling", "Stalled", or a domain-specific
    /// type such as "OwnerRefCondition".
    #[serde(rename = "type")]
    pub type_: String,

    pub status: ConditionStatus,

    /// A short, machine-readable reason for the condition's last transition.
    pub reason: String,

    /// A human-readable message indicating details about the transition.
    pub message: String,

    /// The `.metadata.generation` that this condition was set with respect to.
    #[serde(rename = "observedGeneration", skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    #[serde(rename = "lastTransitionTime", skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl Condition {
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Condition {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            observed_generation: None,
            last_transition_time: None,
        }
    }
}

/// Well-known kstatus condition type names.
pub mod types {
    pub const READY: &str = "Ready";
    pub const RECONCILING: &str = "Reconciling";
    pub const STALLED: &str = "Stalled";
    pub const FINALIZER: &str = "FinalizerCondition";
    pub const CREATE: &str = "CreateCondition";
    pub const UPDATE: &str = "UpdateCondition";
    pub const DELETE: &str = "DeleteCondition";
    pub const OWNER_REF: &str = "OwnerRefCondition";
    pub const ROLE_REF_VALID: &str = "RoleRefValidCondition";
    pub const NAMESPACE_TERMINATION_BLOCKED: &str = "NamespaceTerminationBlockedCondition";
}

/// Implemented by every status struct that carries a condition set, so that the
/// condition-algebra helpers in `rbac_operator::util::conditions` can operate generically.
pub trait HasConditions {
    fn conditions_mut(&mut self) -> &mut Vec<Condition>;
    fn conditions(&self) -> &[Condition];
}

/// Sets (inserts or replaces) a condition by type, following the standard
/// "meta.SetStatusCondition" semantics: `last_transition_time` only changes when
/// `status` itself changes.
pub fn set_condition(conditions: &mut Vec<Condition>, mut new: Condition, now: &str) {
    if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == new.type_) {
        if existing.status != new.status {
            new.last_transition_time = Some(now.to_owned());
        } else {
            new.last_transition_time = existing.last_transition_time.clone();
        }
        *existing = new;
    } else {
        new.last_transition_time = Some(now.to_owned());
        conditions.push(new);
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_condition_true(conditions: &[Condition], type_: &str) -> bool {
    find_condition(conditions, type_).is_some_and(|c| c.status.is_true())
}
