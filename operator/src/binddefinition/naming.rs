/// Deterministic, collision-free name for a generated binding: `"{targetName}-{refName}-binding"`.
pub fn build_binding_name(target_name: &str, ref_name: &str) -> String {
    format!("{target_name}-{ref_name}-binding")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_stable_naming_contract() {
        for (t, r) in [("readers", "view"), ("a", "b"), ("my-app", "edit-role")] {
            assert_eq!(build_binding_name(t, r), format!("{t}-{r}-binding"));
        }
    }
}
