//! Thin convenience layer over the condition algebra in `rbac_operator_types`, so every
//! reconciler sets conditions the same way instead of hand-rolling `Condition::new` calls.

use rbac_operator_types::{set_condition, Condition, ConditionStatus, HasConditions};

/// Sets `type_` to `ok`, stamping `observed_generation` and the transition time.
pub fn mark(
    status: &mut impl HasConditions,
    type_: &str,
    ok: bool,
    reason: &str,
    message: &str,
    generation: i64,
) {
    let now = chrono::Utc::now().to_rfc3339();
    let mut condition = Condition::new(type_, ConditionStatus::from_bool(ok), reason, message);
    condition.observed_generation = Some(generation);
    set_condition(status.conditions_mut(), condition, &now);
}
