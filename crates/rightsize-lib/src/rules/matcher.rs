//! Rule selector matching

use crate::models::{Service, KIND_KEY, WILDCARD};
use std::collections::BTreeMap;

/// Check whether a rule selector applies to a service.
///
/// Every entry must hold: `kind` compares against [`Service::kind`], other
/// keys against the service metadata. A `*` value is satisfied even when the
/// attribute is missing.
pub fn matches(selector: &BTreeMap<String, String>, service: &Service) -> bool {
    selector.iter().all(|(key, expected)| {
        if expected == WILDCARD {
            return true;
        }

        if key == KIND_KEY {
            return service.kind == *expected;
        }

        service
            .metadata
            .get(key)
            .is_some_and(|actual| actual == expected)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn postgres() -> Service {
        Service::new("db", "db").with_metadata("engine", "postgres")
    }

    #[test]
    fn test_exact_match() {
        let sel = selector(&[("kind", "db"), ("engine", "postgres")]);
        assert!(matches(&sel, &postgres()));
    }

    #[test]
    fn test_wildcard_matches_any_value() {
        let sel = selector(&[("kind", "db"), ("engine", "*")]);
        let mysql = Service::new("db", "db").with_metadata("engine", "mysql");
        assert!(matches(&sel, &mysql));
    }

    #[test]
    fn test_wildcard_matches_absent_key() {
        let sel = selector(&[("lang", "*")]);
        assert!(matches(&sel, &postgres()));
    }

    #[test]
    fn test_kind_mismatch() {
        let sel = selector(&[("kind", "db"), ("engine", "postgres")]);
        let redis = Service::new("cache", "cache").with_metadata("engine", "redis");
        assert!(!matches(&sel, &redis));
    }

    #[test]
    fn test_missing_metadata_key() {
        let sel = selector(&[("lang", "java")]);
        assert!(!matches(&sel, &postgres()));
    }

    #[test]
    fn test_kind_reads_field_not_metadata() {
        // metadata "kind" is ignored in favour of the field
        let svc = Service::new("x", "web").with_metadata("kind", "db");
        assert!(!matches(&selector(&[("kind", "db")]), &svc));
        assert!(matches(&selector(&[("kind", "web")]), &svc));
    }

    #[test]
    fn test_empty_selector_matches_everything() {
        assert!(matches(&BTreeMap::new(), &Service::default()));
        assert!(matches(&BTreeMap::new(), &postgres()));
    }

    #[test]
    fn test_no_substring_matching() {
        let sel = selector(&[("engine", "postgres")]);
        let svc = Service::new("db", "db").with_metadata("engine", "postgresql");
        assert!(!matches(&sel, &svc));
    }
}
