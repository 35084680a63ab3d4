//! Method-name classification for call-receiver mutation, directly
//! modeled on `call_classification.rs`'s `CallPurity`/`classify_call`
//! pattern: a small set of exact names checked first, falling back to
//! prefix-pattern matching, with a conservative default.

use once_cell::sync::Lazy;
use std::collections::HashSet;

use super::DefKind;

static EXACT_NO_DEF: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "equals", "hashCode", "toString", "isEmpty", "size", "length", "stream",
    ]
    .into_iter()
    .collect()
});

static EXACT_DEF: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    ["push", "pop", "offer", "poll"].into_iter().collect()
});

const PREFIX_NO_DEF: &[&str] = &["get", "print", "debug", "trace", "info", "warn", "error"];
const PREFIX_DEF: &[&str] = &["set", "add", "remove", "put", "insert", "contains"];

/// Classifies a bare method name (no qualifier) into the def-kind a call
/// to it contributes to its receiver, per spec §4.3.
pub fn classify_call_def(method_name: &str) -> DefKind {
    if EXACT_NO_DEF.contains(method_name) {
        return DefKind::NoDef;
    }
    if EXACT_DEF.contains(method_name) {
        return DefKind::Def;
    }
    if PREFIX_NO_DEF.iter().any(|p| method_name.starts_with(p)) {
        return DefKind::NoDef;
    }
    if PREFIX_DEF.iter().any(|p| method_name.starts_with(p)) {
        return DefKind::Def;
    }
    DefKind::MayDef
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_no_def_names() {
        for name in ["equals", "size", "stream"] {
            assert_eq!(classify_call_def(name), DefKind::NoDef, "{name}");
        }
    }

    #[test]
    fn exact_def_names() {
        for name in ["push", "pop", "offer", "poll"] {
            assert_eq!(classify_call_def(name), DefKind::Def, "{name}");
        }
    }

    #[test]
    fn prefix_patterns() {
        assert_eq!(classify_call_def("getValue"), DefKind::NoDef);
        assert_eq!(classify_call_def("setValue"), DefKind::Def);
        assert_eq!(classify_call_def("addAll"), DefKind::Def);
        assert_eq!(classify_call_def("warnOnce"), DefKind::NoDef);
    }

    #[test]
    fn unknown_name_defaults_to_may_def() {
        assert_eq!(classify_call_def("frobnicate"), DefKind::MayDef);
    }

    #[test]
    fn exact_match_wins_over_prefix() {
        // "size" matches no prefix in PREFIX_DEF/PREFIX_NO_DEF but is an
        // exact NO_DEF name; guard against accidental prefix shadowing.
        assert_eq!(classify_call_def("size"), DefKind::NoDef);
    }
}
