//! Linux capability set arithmetic for the spec overlay's capability union/difference step.
//!
//! Capability names are carried as the free-form `CAP_*` strings the OCI spec and this crate's
//! `CapsConfig` already use; there is no closed enum to validate against; the runtime itself
//! rejects a name it doesn't recognize.

/// Applies a capability overlay to one of a spec's five capability sets: drop everything in
/// `drop` from `orig`, then append everything in `add` not already present, in `add`'s order,
/// without duplicates. The order of retained original entries is preserved.
pub fn apply(orig: &[String], add: &[String], drop: &[String]) -> Vec<String> {
    let mut out: Vec<String> = orig.iter().filter(|c| !drop.contains(c)).cloned().collect();
    for cap in add {
        if !out.contains(cap) {
            out.push(cap.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_drops_then_adds_preserving_order() {
        let orig = vec![
            "CAP_CHOWN".to_string(),
            "CAP_KILL".to_string(),
            "CAP_SETGID".to_string(),
        ];
        let add = vec!["CAP_SYS_ADMIN".to_string(), "CAP_CHOWN".to_string()];
        let drop = vec!["CAP_KILL".to_string()];

        let result = apply(&orig, &add, &drop);

        assert_eq!(
            result,
            vec![
                "CAP_CHOWN".to_string(),
                "CAP_SETGID".to_string(),
                "CAP_SYS_ADMIN".to_string(),
            ]
        );
    }

    #[test]
    fn apply_is_noop_with_empty_add_drop() {
        let orig = vec!["CAP_CHOWN".to_string()];
        assert_eq!(apply(&orig, &[], &[]), orig);
    }

    #[test]
    fn apply_never_duplicates_an_existing_capability() {
        let orig = vec!["CAP_CHOWN".to_string()];
        let add = vec!["CAP_CHOWN".to_string()];
        assert_eq!(apply(&orig, &add, &[]), orig);
    }
}
